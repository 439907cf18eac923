//! Flattening of the fantasy API JSON envelope
//!
//! Collections come back as objects keyed `"0"`, `"1"`, ... plus a `count`,
//! and each resource is an array of single-key objects rather than one
//! object. The functions here turn that into plain records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A game (one sport in one season).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub game_key: String,
    pub code: String,
    pub name: String,
    pub season: u32,
}

/// One player, flattened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_key: String,
    pub player_id: String,
    pub name: Option<String>,
    pub team: Option<String>,
    pub team_abbr: Option<String>,
    pub position: Option<String>,
    pub uniform_number: Option<String>,
    pub status: Option<String>,
    pub bye_week: Option<u32>,
    /// stat_id -> value
    pub stats: BTreeMap<String, String>,
}

fn content(body: &Value) -> Result<&Value> {
    body.get("fantasy_content")
        .ok_or_else(|| Error::Envelope("missing fantasy_content".into()))
}

/// Render a scalar as text. Ids and counts arrive as strings or numbers
/// depending on the field.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Items of a `{"0": {...}, "1": {...}, "count": n}` collection, in index order.
fn collection_items<'a>(collection: &'a Value, item_key: &str) -> Vec<&'a Value> {
    let Some(object) = collection.as_object() else {
        return Vec::new();
    };
    let count = object
        .get("count")
        .and_then(|c| c.as_u64().or_else(|| c.as_str()?.parse().ok()))
        .unwrap_or(0)
        .min(object.len() as u64);

    (0..count)
        .filter_map(|idx| object.get(&idx.to_string())?.get(item_key))
        .collect()
}

/// Merge a resource's array of single-key objects into one map.
///
/// Nested arrays (the player info block) are merged too; empty arrays are
/// padding and skipped.
fn merge_fields(resource: &Value) -> Map<String, Value> {
    let mut merged = Map::new();
    match resource {
        Value::Object(object) => merged.extend(object.clone()),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(object) => merged.extend(object.clone()),
                    Value::Array(_) => merged.extend(merge_fields(item)),
                    _ => {}
                }
            }
        }
        _ => {}
    }
    merged
}

/// Parse a games collection into its games.
pub fn parse_games(body: &Value) -> Result<Vec<Game>> {
    let games = content(body)?
        .get("games")
        .ok_or_else(|| Error::Envelope("missing games collection".into()))?;

    collection_items(games, "game")
        .into_iter()
        .map(|game| {
            let fields = merge_fields(game);
            let field = |name: &str| {
                fields
                    .get(name)
                    .and_then(text)
                    .ok_or_else(|| Error::Envelope(format!("game without {name}")))
            };
            let season = field("season")?;
            Ok(Game {
                game_key: field("game_key")?,
                code: field("code")?,
                name: field("name")?,
                season: season
                    .parse()
                    .map_err(|_| Error::Envelope(format!("non-numeric season {season:?}")))?,
            })
        })
        .collect()
}

/// Parse a game's players sub-resource into flattened records.
///
/// Players without a player id are skipped.
pub fn parse_players(body: &Value) -> Result<Vec<PlayerRecord>> {
    let game = content(body)?
        .get("game")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Envelope("missing game resource".into()))?;

    let players = game
        .iter()
        .find_map(|part| part.get("players"))
        .ok_or_else(|| Error::Envelope("game resource has no players".into()))?;

    Ok(collection_items(players, "player")
        .into_iter()
        .filter_map(flatten_player)
        .collect())
}

/// Flatten a single `player` resource.
///
/// The first element is the info array; later elements carry sub-resources
/// such as `player_stats`.
pub fn flatten_player(player: &Value) -> Option<PlayerRecord> {
    let parts = player.as_array()?;
    let info = merge_fields(parts.first()?);

    let player_id = info.get("player_id").and_then(text)?;
    let mut record = PlayerRecord {
        player_key: info.get("player_key").and_then(text).unwrap_or_default(),
        player_id,
        name: info
            .get("name")
            .and_then(|n| n.get("full"))
            .and_then(text),
        team: info.get("editorial_team_full_name").and_then(text),
        team_abbr: info.get("editorial_team_abbr").and_then(text),
        position: info.get("display_position").and_then(text),
        uniform_number: info.get("uniform_number").and_then(text),
        status: info.get("status").and_then(text),
        bye_week: info
            .get("bye_weeks")
            .and_then(|b| b.get("week"))
            .and_then(text)
            .and_then(|w| w.parse().ok()),
        stats: BTreeMap::new(),
    };

    if let Some(stats) = info.get("stats") {
        collect_stats(stats, &mut record.stats);
    }
    for part in &parts[1..] {
        if let Some(stats) = part.get("player_stats").and_then(|ps| ps.get("stats")) {
            collect_stats(stats, &mut record.stats);
        }
    }

    Some(record)
}

/// `[{"stat": {"stat_id": "4", "value": "12"}}, ...]`
fn collect_stats(stats: &Value, into: &mut BTreeMap<String, String>) {
    let Some(entries) = stats.as_array() else {
        return;
    };
    for entry in entries {
        let Some(stat) = entry.get("stat") else {
            continue;
        };
        if let Some(id) = stat.get("stat_id").and_then(text) {
            let value = stat.get("value").and_then(text).unwrap_or_default();
            into.insert(id, value);
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    pub(crate) fn games_body() -> Value {
        json!({
            "fantasy_content": {
                "xml:lang": "en-US",
                "games": {
                    "0": {
                        "game": [{
                            "game_key": "449",
                            "game_id": "449",
                            "name": "Football",
                            "code": "nfl",
                            "type": "full",
                            "season": "2024",
                            "is_game_over": 0
                        }]
                    },
                    "count": 1
                }
            }
        })
    }

    pub(crate) fn empty_games_body() -> Value {
        json!({ "fantasy_content": { "games": [] } })
    }

    pub(crate) fn players_body() -> Value {
        json!({
            "fantasy_content": {
                "game": [
                    { "game_key": "449", "code": "nfl", "season": "2024" },
                    {
                        "players": {
                            "0": {
                                "player": [
                                    [
                                        { "player_key": "449.p.30123" },
                                        { "player_id": "30123" },
                                        { "name": { "full": "Patrick Mahomes", "first": "Patrick", "last": "Mahomes" } },
                                        { "editorial_team_full_name": "Kansas City Chiefs" },
                                        { "editorial_team_abbr": "KC" },
                                        { "bye_weeks": { "week": "6" } },
                                        { "uniform_number": "15" },
                                        { "display_position": "QB" },
                                        []
                                    ],
                                    {
                                        "player_stats": {
                                            "coverage_type": "season",
                                            "stats": [
                                                { "stat": { "stat_id": "4", "value": "4183" } },
                                                { "stat": { "stat_id": "5", "value": 26 } }
                                            ]
                                        }
                                    }
                                ]
                            },
                            "1": {
                                "player": [
                                    [
                                        { "player_key": "449.p.32692" },
                                        { "player_id": 32692 },
                                        { "name": { "full": "Ja'Marr Chase" } },
                                        { "editorial_team_full_name": "Cincinnati Bengals" },
                                        { "editorial_team_abbr": "Cin" },
                                        { "status": "Q" },
                                        { "uniform_number": false },
                                        { "display_position": "WR" },
                                        { "stats": [ { "stat": { "stat_id": "12", "value": "1708" } } ] }
                                    ]
                                ]
                            },
                            "2": {
                                "player": [
                                    [
                                        { "player_key": "449.p.0" },
                                        { "name": { "full": "No Id" } }
                                    ]
                                ]
                            },
                            "count": 3
                        }
                    }
                ]
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_current_game() {
        let games = parse_games(&fixtures::games_body()).unwrap();
        assert_eq!(
            games,
            vec![Game {
                game_key: "449".into(),
                code: "nfl".into(),
                name: "Football".into(),
                season: 2024,
            }]
        );
    }

    #[test]
    fn empty_games_collection_yields_no_games() {
        assert!(parse_games(&fixtures::empty_games_body()).unwrap().is_empty());
    }

    #[test]
    fn missing_fantasy_content_is_an_envelope_error() {
        let err = parse_games(&json!({ "error": "nope" })).unwrap_err();
        assert!(matches!(err, Error::Envelope(_)));
    }

    #[test]
    fn game_without_season_is_rejected() {
        let body = json!({
            "fantasy_content": {
                "games": { "0": { "game": [{ "game_key": "1", "code": "nfl", "name": "x" }] }, "count": 1 }
            }
        });
        assert!(matches!(parse_games(&body), Err(Error::Envelope(_))));
    }

    #[test]
    fn parses_players_and_skips_records_without_id() {
        let players = parse_players(&fixtures::players_body()).unwrap();
        assert_eq!(players.len(), 2);

        let mahomes = &players[0];
        assert_eq!(mahomes.player_key, "449.p.30123");
        assert_eq!(mahomes.player_id, "30123");
        assert_eq!(mahomes.name.as_deref(), Some("Patrick Mahomes"));
        assert_eq!(mahomes.team.as_deref(), Some("Kansas City Chiefs"));
        assert_eq!(mahomes.team_abbr.as_deref(), Some("KC"));
        assert_eq!(mahomes.position.as_deref(), Some("QB"));
        assert_eq!(mahomes.uniform_number.as_deref(), Some("15"));
        assert_eq!(mahomes.bye_week, Some(6));
        assert_eq!(mahomes.status, None);
        assert_eq!(mahomes.stats.get("4").map(String::as_str), Some("4183"));
        assert_eq!(mahomes.stats.get("5").map(String::as_str), Some("26"));
    }

    #[test]
    fn reads_stats_from_info_array_and_numeric_ids() {
        let players = parse_players(&fixtures::players_body()).unwrap();
        let chase = &players[1];
        assert_eq!(chase.player_id, "32692");
        assert_eq!(chase.status.as_deref(), Some("Q"));
        assert_eq!(chase.uniform_number, None);
        assert_eq!(chase.bye_week, None);
        assert_eq!(chase.stats.get("12").map(String::as_str), Some("1708"));
    }

    #[test]
    fn players_without_players_block_is_an_envelope_error() {
        let body = json!({ "fantasy_content": { "game": [{ "game_key": "449" }] } });
        assert!(matches!(parse_players(&body), Err(Error::Envelope(_))));
    }

    #[test]
    fn empty_players_collection_is_empty() {
        let body = json!({
            "fantasy_content": { "game": [{ "game_key": "449" }, { "players": [] }] }
        });
        assert!(parse_players(&body).unwrap().is_empty());
    }

    #[test]
    fn collection_count_is_bounded_by_entries() {
        let collection = json!({ "0": { "game": [{ "game_key": "1" }] }, "count": u64::MAX });
        assert_eq!(collection_items(&collection, "game").len(), 1);
    }

    #[test]
    fn collection_count_may_be_a_string() {
        let collection = json!({ "0": { "game": [{ "game_key": "1" }] }, "count": "1" });
        assert_eq!(collection_items(&collection, "game").len(), 1);
    }
}

//! Human-readable command output

use std::fmt::Write;

use fantasy_api::{Game, PlayerRecord};
use yahoo_auth::TokenState;

/// One line describing the stored credential.
pub fn token_status(state: &TokenState, now_millis: u64) -> String {
    match state {
        TokenState::Absent => "absent: run `fantasy-players login`".to_string(),
        TokenState::Valid(credential) => {
            let mins = credential.remaining_millis(now_millis) / 60_000;
            format!("valid: expires in {}h {}m", mins / 60, mins % 60)
        }
        TokenState::Stale(_) => "stale: will be refreshed on next use".to_string(),
        TokenState::Unrecoverable(_) => {
            "unrecoverable: run `fantasy-players login`".to_string()
        }
    }
}

fn cell(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Player table for one page.
pub fn player_table(game: &Game, start: u32, players: &[PlayerRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} (game {}): {} players",
        game.name,
        game.season,
        game.game_key,
        players.len()
    );
    let _ = writeln!(
        out,
        "{:>4}  {:<28} {:<6} {:<5} {:>3}  {:<3}  {:>5}",
        "#", "Name", "Pos", "Team", "Bye", "St", "Stats"
    );
    for (rank, player) in (start as usize + 1..).zip(players) {
        let bye = player
            .bye_week
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:>4}  {:<28} {:<6} {:<5} {:>3}  {:<3}  {:>5}",
            rank,
            cell(&player.name),
            cell(&player.position),
            cell(&player.team_abbr),
            bye,
            cell(&player.status),
            player.stats.len()
        );
    }
    out
}

//! JSON and CSV snapshots of a fetched player page

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::envelope::PlayerRecord;
use crate::error::{Error, Result};

/// Fixed CSV columns; one `stat_<id>` column per stat follows.
pub const CSV_COLUMNS: [&str; 7] = [
    "player_id",
    "name",
    "team",
    "position",
    "status",
    "uniform_number",
    "bye_week",
];

/// On-disk snapshot: `{timestamp, season, data: {player_id: record}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds
    pub timestamp: u64,
    pub season: u32,
    pub data: BTreeMap<String, PlayerRecord>,
}

impl Snapshot {
    pub fn new(season: u32, timestamp: u64, players: &[PlayerRecord]) -> Self {
        Self {
            timestamp,
            season,
            data: players
                .iter()
                .map(|p| (p.player_id.clone(), p.clone()))
                .collect(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("players_{}_{}.json", self.season, self.timestamp)
    }

    pub fn csv_file_name(&self) -> String {
        format!("players_{}_{}.csv", self.season, self.timestamp)
    }

    /// Render the records as CSV, one row per player.
    ///
    /// Stat columns are the union of stat ids across all records, in id
    /// order; a player without a stat leaves its cell empty.
    pub fn to_csv(&self) -> std::result::Result<Vec<u8>, csv::Error> {
        let stat_ids: BTreeSet<&str> = self
            .data
            .values()
            .flat_map(|p| p.stats.keys().map(String::as_str))
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(
            CSV_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .chain(stat_ids.iter().map(|id| format!("stat_{id}"))),
        )?;

        for player in self.data.values() {
            let text = |v: &Option<String>| v.clone().unwrap_or_default();
            let row = [
                player.player_id.clone(),
                text(&player.name),
                text(&player.team),
                text(&player.position),
                text(&player.status),
                text(&player.uniform_number),
                player.bye_week.map(|w| w.to_string()).unwrap_or_default(),
            ];
            writer.write_record(row.into_iter().chain(
                stat_ids
                    .iter()
                    .map(|id| player.stats.get(*id).cloned().unwrap_or_default()),
            ))?;
        }

        writer.into_inner().map_err(|e| e.into_error().into())
    }

    /// Write the CSV form into `dir` (created if missing) and return the file path.
    pub async fn write_csv_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.csv_file_name());
        let snapshot_err = |source: std::io::Error| Error::Snapshot {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(&snapshot_err)?;
        let body = self
            .to_csv()
            .map_err(|e| snapshot_err(std::io::Error::other(e)))?;
        tokio::fs::write(&path, body).await.map_err(&snapshot_err)?;

        info!(path = %path.display(), players = self.data.len(), "wrote player CSV export");
        Ok(path)
    }

    /// Write into `dir` (created if missing) and return the file path.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let snapshot_err = |source: std::io::Error| Error::Snapshot {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(&snapshot_err)?;
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| snapshot_err(std::io::Error::other(e)))?;
        tokio::fs::write(&path, body).await.map_err(&snapshot_err)?;

        info!(path = %path.display(), players = self.data.len(), "wrote player snapshot");
        Ok(path)
    }
}

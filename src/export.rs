// 📤 History export - one CSV row per (round, player)

use crate::history::GameRecord;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    round: usize,
    date: String,
    player: &'a str,
    detail: &'a str,
    total: i64,
    winner: &'a str,
}

/// Write rows for `records` (chronological, rounds numbered from 1)
pub fn write_csv<W: Write>(records: &[GameRecord], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for (index, record) in records.iter().enumerate() {
        let date = record.date_stamp();
        for entry in &record.results {
            wtr.serialize(ExportRow {
                round: index + 1,
                date: date.clone(),
                player: &entry.player,
                detail: &entry.detail,
                total: entry.total,
                winner: &record.winner,
            })
            .context("Failed to write CSV row")?;
            rows += 1;
        }
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(rows)
}

pub fn export_csv(records: &[GameRecord], path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    write_csv(records, file)
}

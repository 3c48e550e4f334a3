use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::stats::{AnalysisResult, SenderStat};

const HEADER: &str = "Sender Name,Sender Email,Email Count,First Email,Last Email";

pub fn default_export_name(date: NaiveDate) -> String {
    format!("inbox-analysis-{}.csv", date.format("%Y-%m-%d"))
}

/// Writes one row per sender. Text fields are always quoted.
pub fn write_csv<W: Write>(mut writer: W, senders: &[SenderStat]) -> std::io::Result<()> {
    writeln!(writer, "{}", HEADER)?;
    for sender in senders {
        writeln!(
            writer,
            "{},{},{},{},{}",
            quote(&sender.name),
            quote(&sender.email),
            sender.count,
            quote(&sender.first_seen.format("%Y-%m-%d").to_string()),
            quote(&sender.last_seen.format("%Y-%m-%d").to_string()),
        )?;
    }
    writer.flush()
}

pub fn export_csv(result: &AnalysisResult, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_csv(BufWriter::new(file), &result.senders)
        .with_context(|| format!("Failed to write {:?}", path))?;

    info!(action = "export", component = "csv", file_path = ?path, row_count = result.senders.len(), "Exported sender table");
    Ok(())
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

//! Spreadsheet ingestion: CSV with a header row

use anyhow::{Context, Result};
use certgen_engine::{CellValue, Row};
use std::path::Path;

/// Load rows from a CSV file, skipping rows whose cells are all blank.
pub async fn load_rows(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let path = path.as_ref().to_owned();
    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let rows = tokio::task::spawn_blocking(move || parse_rows(&contents)).await??;
    log::info!("Loaded {} row(s) from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parse CSV text; the first record names the columns.
pub fn parse_rows(contents: &str) -> Result<Vec<Row>> {
    let contents = contents.trim_start_matches('\u{FEFF}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("CSV has no header row")?
        .iter()
        .enumerate()
        .map(|(i, h)| match h.trim() {
            "" => format!("column_{}", i + 1),
            name => name.to_string(),
        })
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV record {}", line + 2))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            skipped += 1;
            continue;
        }

        let mut row = Row::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let value = if cell.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(cell.to_string())
            };
            // First column wins when headers repeat
            row.entry(header.clone()).or_insert(value);
        }
        rows.push(row);
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} blank row(s)");
    }
    Ok(rows)
}

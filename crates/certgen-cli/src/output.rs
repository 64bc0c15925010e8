//! Naming and writing generated documents

use anyhow::{Context, Result};
use certgen_engine::{OutputMode, Row};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that are not allowed in file names
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect()
}

/// One file name per row, taken from `name_column` when it has a value.
/// Repeated names get the lowest free numeric suffix, compared without
/// case, so no file overwrites another.
pub fn document_names(rows: &[Row], name_column: Option<&str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let stem = name_column
                .and_then(|column| row.get(column))
                .map(|value| sanitize_file_name(&value.to_string()))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("certificate_{}", i + 1));

            let mut name = format!("{stem}.pdf");
            let mut suffix = 1;
            while !taken.insert(name.to_lowercase()) {
                suffix += 1;
                name = format!("{stem}_{suffix}.pdf");
            }
            name
        })
        .collect()
}

/// Default destination: a dated file for a single document, a dated
/// directory for per-row output.
pub fn default_output(mode: OutputMode, date: NaiveDate) -> PathBuf {
    let stamp = date.format("%Y-%m-%d");
    match mode {
        OutputMode::Single => PathBuf::from(format!("certificates_{stamp}.pdf")),
        OutputMode::PerRow => PathBuf::from(format!("certificates_{stamp}")),
    }
}

/// Write generated buffers; returns the paths written.
pub async fn write_outputs(
    mode: OutputMode,
    buffers: &[Vec<u8>],
    names: &[String],
    output: &Path,
) -> Result<Vec<PathBuf>> {
    match mode {
        OutputMode::Single => {
            let buffer = buffers.first().context("No document was generated")?;
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(output, buffer)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(vec![output.to_path_buf()])
        }
        OutputMode::PerRow => {
            tokio::fs::create_dir_all(output)
                .await
                .with_context(|| format!("Failed to create {}", output.display()))?;

            let mut written = Vec::with_capacity(buffers.len());
            for (buffer, name) in buffers.iter().zip(names) {
                let path = output.join(name);
                tokio::fs::write(&path, buffer)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log::debug!("Wrote {}", path.display());
                written.push(path);
            }
            Ok(written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certgen_engine::row;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(" a/b:c*d? "), "a_b_c_d_");
        assert_eq!(sanitize_file_name("\u{0633}\u{0627}\u{0631}\u{0627}"), "\u{0633}\u{0627}\u{0631}\u{0627}");
    }

    #[test]
    fn test_document_names() {
        let rows = vec![
            row([("name", "Sara")]),
            row([("name", "")]),
            row([("name", "sara")]),
            row([("name", "Omar")]),
        ];
        let names = document_names(&rows, Some("name"));
        assert_eq!(names, vec!["Sara.pdf", "certificate_2.pdf", "sara_2.pdf", "Omar.pdf"]);

        let unnamed = document_names(&rows[..2], None);
        assert_eq!(unnamed, vec!["certificate_1.pdf", "certificate_2.pdf"]);
    }

    #[test]
    fn test_suffixed_names_never_collide() {
        let rows = vec![
            row([("name", "Sara")]),
            row([("name", "Sara")]),
            row([("name", "Sara_2")]),
            row([("name", "SARA")]),
        ];
        let names = document_names(&rows, Some("name"));
        assert_eq!(names, vec!["Sara.pdf", "Sara_2.pdf", "Sara_2_2.pdf", "SARA_3.pdf"]);

        let unique: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_default_output() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(
            default_output(OutputMode::Single, date),
            PathBuf::from("certificates_2026-03-09.pdf")
        );
        assert_eq!(
            default_output(OutputMode::PerRow, date),
            PathBuf::from("certificates_2026-03-09")
        );
    }

    #[tokio::test]
    async fn test_write_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("batch");
        let names = vec!["a.pdf".to_string(), "b.pdf".to_string()];
        let buffers = vec![b"%PDF-a".to_vec(), b"%PDF-b".to_vec()];

        let written = write_outputs(OutputMode::PerRow, &buffers, &names, &out)
            .await
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(out.join("b.pdf")).unwrap(), b"%PDF-b");
    }

    #[tokio::test]
    async fn test_write_single() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("all.pdf");

        write_outputs(OutputMode::Single, &[b"%PDF".to_vec()], &[], &out)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF");
    }
}

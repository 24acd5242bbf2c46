use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::model::InputFileEntry;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn input_file_entry(path: &Path, rows: usize) -> Result<InputFileEntry> {
    Ok(InputFileEntry {
        path: path.display().to_string(),
        rows,
        sha256: sha256_file(path)?,
    })
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

/// Reads one JSON value per non-blank line.
pub fn read_ndjson<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} of {}", index + 1, path.display())
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let row = serde_json::from_str(&line).with_context(|| {
            format!("failed to parse line {} of {}", index + 1, path.display())
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Rewrites `path` in full with one JSON object per line.
pub fn write_ndjson<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create ndjson file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for row in rows {
        serde_json::to_writer(&mut writer, row)
            .with_context(|| format!("failed to serialize row for {}", path.display()))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn ndjson_skips_blank_lines_and_reports_bad_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.ndjson");
        fs::write(&path, "{\"a\":1}\n\n{\"a\":2}\n").unwrap();

        let rows: Vec<Value> = read_ndjson(&path).unwrap();
        assert_eq!(rows, vec![json!({"a": 1}), json!({"a": 2})]);

        fs::write(&path, "{\"a\":1}\nnot json\n").unwrap();
        let err = read_ndjson::<Value>(&path).unwrap_err();
        assert!(format!("{err}").contains("line 2"));
    }

    #[test]
    fn write_ndjson_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.ndjson");

        write_ndjson(&path, &[json!({"id": "1"}), json!({"id": "2"})]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "{\"id\":\"1\"}\n{\"id\":\"2\"}\n");
    }
}

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::model::{CompletionRecord, Document, id_from_value};
use crate::util::read_ndjson;

const PROMPT_PREFIX: &str = "prompt_";
const COMPLETIONS_SUFFIX: &str = "_completions";

/// A generated file as stored: column names still carry the model and prompt number.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub name: String,
    pub rows: Vec<Map<String, Value>>,
}

impl RawTable {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            name: path.display().to_string(),
            rows: read_ndjson(path)?,
        })
    }

    /// Column names in first-seen order across all rows.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::<&str>::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key.as_str());
                }
            }
        }
        columns
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    /// Last row index kept (inclusive), counted from the top of the file.
    pub subset: Option<usize>,
    /// Left-joins `source` by id when the raw rows carry none.
    pub human: Option<&'a [Document]>,
}

#[derive(Debug)]
struct ColumnLayout<'a> {
    prompt_column: &'a str,
    prompt_number: u32,
    completions_column: &'a str,
    model: &'a str,
}

fn detect_layout<'a>(table: &str, columns: &[&'a str]) -> Result<ColumnLayout<'a>, PipelineError> {
    let prompt_column = single_column(table, columns, "prompt_*", |name| {
        name.starts_with(PROMPT_PREFIX)
    })?;
    let prompt_number = prompt_column[PROMPT_PREFIX.len()..]
        .parse::<u32>()
        .map_err(|_| {
            PipelineError::schema(
                table,
                format!("prompt column '{prompt_column}' has no trailing prompt number"),
            )
        })?;

    let completions_column = single_column(table, columns, "*_completions", |name| {
        name.ends_with(COMPLETIONS_SUFFIX)
    })?;
    let model = &completions_column[..completions_column.len() - COMPLETIONS_SUFFIX.len()];
    if model.is_empty() {
        return Err(PipelineError::schema(
            table,
            format!("completions column '{completions_column}' names no model"),
        ));
    }

    Ok(ColumnLayout {
        prompt_column,
        prompt_number,
        completions_column,
        model,
    })
}

fn single_column<'a>(
    table: &str,
    columns: &[&'a str],
    label: &str,
    predicate: impl Fn(&str) -> bool,
) -> Result<&'a str, PipelineError> {
    let matches = columns
        .iter()
        .copied()
        .filter(|name| predicate(name))
        .collect::<Vec<&str>>();

    match matches.as_slice() {
        [column] => Ok(*column),
        [] => Err(PipelineError::schema(table, format!("no {label} column found"))),
        many => Err(PipelineError::schema(
            table,
            format!("ambiguous {label} columns: {}", many.join(", ")),
        )),
    }
}

pub fn normalize(
    raw: &RawTable,
    options: &NormalizeOptions<'_>,
) -> Result<Vec<CompletionRecord>, PipelineError> {
    // A run over zero documents writes an empty file with no columns to detect.
    if raw.rows.is_empty() {
        return Ok(Vec::new());
    }

    let rows = match options.subset {
        Some(last_index) => &raw.rows[..raw.rows.len().min(last_index.saturating_add(1))],
        None => &raw.rows[..],
    };

    let columns = raw.columns();
    let layout = detect_layout(&raw.name, &columns)?;

    let human_sources = options.human.map(|docs| {
        docs.iter()
            .map(|doc| (doc.id.as_str(), doc.source.as_str()))
            .collect::<HashMap<&str, &str>>()
    });

    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let id = row.get("id").and_then(id_from_value).ok_or_else(|| {
            PipelineError::schema(&raw.name, format!("row {index} has no usable id"))
        })?;

        let prompt = match row.get(layout.prompt_column) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => {
                return Err(PipelineError::schema(
                    &raw.name,
                    format!("row {index} prompt is not text: {other}"),
                ));
            }
        };

        let completions = match row.get(layout.completions_column) {
            Some(Value::String(text)) => text.clone(),
            _ => {
                return Err(PipelineError::schema(
                    &raw.name,
                    format!("row {index} (id {id}) has no text in {}", layout.completions_column),
                ));
            }
        };

        let source = match row.get("source") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => human_sources
                .as_ref()
                .and_then(|sources| sources.get(id.as_str()))
                .map(|text| text.to_string()),
        };

        records.push(CompletionRecord {
            id,
            prompt,
            prompt_number: Some(layout.prompt_number),
            model: layout.model.to_string(),
            completions,
            source,
        });
    }

    Ok(records)
}

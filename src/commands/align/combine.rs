use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::model::{AlignedRecord, CompletionRecord, Document};

/// Which AI table decides the ids that human rows are kept for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Position in the caller's table list.
    Index(usize),
    /// First table produced by this model.
    Model(String),
    /// Ids present in every table.
    Intersection,
}

impl FromStr for ReferencePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("intersection") {
            return Ok(Self::Intersection);
        }

        match value.split_once(':') {
            Some(("index", index)) => Ok(Self::Index(index.trim().parse().map_err(|_| {
                anyhow::anyhow!("invalid reference index '{index}'")
            })?)),
            Some(("model", model)) if !model.trim().is_empty() => {
                Ok(Self::Model(model.trim().to_string()))
            }
            _ => bail!(
                "invalid reference policy '{value}'; expected index:<n>, model:<name> or intersection"
            ),
        }
    }
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "index:{index}"),
            Self::Model(model) => write!(f, "model:{model}"),
            Self::Intersection => write!(f, "intersection"),
        }
    }
}

fn reference_ids<'a>(
    ai_tables: &'a [Vec<CompletionRecord>],
    dataset: &str,
    policy: &ReferencePolicy,
) -> Result<HashSet<&'a str>, PipelineError> {
    let ids_of = |table: &'a Vec<CompletionRecord>| {
        table
            .iter()
            .map(|record| record.id.as_str())
            .collect::<HashSet<&str>>()
    };

    match policy {
        ReferencePolicy::Index(index) => ai_tables.get(*index).map(ids_of).ok_or_else(|| {
            PipelineError::alignment(
                dataset,
                format!(
                    "reference table index {index} out of range ({} AI tables)",
                    ai_tables.len()
                ),
            )
        }),
        ReferencePolicy::Model(model) => ai_tables
            .iter()
            .find(|table| table.iter().any(|record| &record.model == model))
            .map(ids_of)
            .ok_or_else(|| {
                PipelineError::alignment(
                    dataset,
                    format!("no AI table for reference model '{model}'"),
                )
            }),
        ReferencePolicy::Intersection => {
            let mut tables = ai_tables.iter();
            let first = tables.next().ok_or_else(|| {
                PipelineError::alignment(dataset, "no AI tables to intersect")
            })?;
            let mut ids = ids_of(first);
            for table in tables {
                let other = ids_of(table);
                ids.retain(|id| other.contains(id));
            }
            Ok(ids)
        }
    }
}

fn preview(ids: &[&str]) -> String {
    let shown = ids.iter().take(5).copied().collect::<Vec<&str>>().join(", ");
    if ids.len() > 5 {
        format!("{shown}, ... ({} total)", ids.len())
    } else {
        shown
    }
}

/// Human rows first (restricted to the reference ids), then every AI table in the order
/// given, all tagged with `dataset`.
pub fn align(
    ai_tables: &[Vec<CompletionRecord>],
    human: &[Document],
    dataset: &str,
    policy: &ReferencePolicy,
) -> Result<Vec<AlignedRecord>, PipelineError> {
    let mut human_ids = HashSet::with_capacity(human.len());
    for doc in human {
        if !human_ids.insert(doc.id.as_str()) {
            return Err(PipelineError::alignment(
                dataset,
                format!("human corpus repeats id '{}'", doc.id),
            ));
        }
    }

    let mut seen = HashSet::<(&str, &str)>::new();
    let mut orphans = Vec::<&str>::new();
    for record in ai_tables.iter().flatten() {
        if !seen.insert((record.id.as_str(), record.model.as_str())) {
            return Err(PipelineError::alignment(
                dataset,
                format!(
                    "id '{}' appears more than once for model '{}'; narrow the file selection",
                    record.id, record.model
                ),
            ));
        }
        if !human_ids.contains(record.id.as_str()) {
            orphans.push(record.id.as_str());
        }
    }
    if !orphans.is_empty() {
        return Err(PipelineError::alignment(
            dataset,
            format!("AI ids missing from the human corpus: {}", preview(&orphans)),
        ));
    }

    let reference = reference_ids(ai_tables, dataset, policy)?;
    let human_rows = human
        .iter()
        .filter(|doc| reference.contains(doc.id.as_str()))
        .map(CompletionRecord::human)
        .collect::<Vec<CompletionRecord>>();

    if human_rows.is_empty() {
        return Err(PipelineError::alignment(
            dataset,
            format!("no human rows match the {policy} reference ids"),
        ));
    }

    let uncovered = ai_tables
        .iter()
        .flatten()
        .filter(|record| !reference.contains(record.id.as_str()))
        .count();
    if uncovered > 0 {
        warn!(
            dataset = %dataset,
            rows = uncovered,
            policy = %policy,
            "AI rows outside the reference id set have no human counterpart in the aligned table"
        );
    }

    let ai_rows = ai_tables.iter().map(Vec::len).sum::<usize>();
    info!(
        dataset = %dataset,
        human_rows = human_rows.len(),
        ai_rows,
        tables = ai_tables.len(),
        "aligned dataset"
    );

    Ok(human_rows
        .into_iter()
        .chain(ai_tables.iter().flatten().cloned())
        .map(|record| AlignedRecord {
            record,
            dataset: dataset.to_string(),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct DatasetTables {
    pub dataset: String,
    pub ai_tables: Vec<Vec<CompletionRecord>>,
    pub human: Vec<Document>,
}

/// Aligns each dataset and concatenates them in the order given.
pub fn align_datasets(
    inputs: &[DatasetTables],
    policy: &ReferencePolicy,
) -> Result<Vec<AlignedRecord>, PipelineError> {
    let mut combined = Vec::new();
    for input in inputs {
        combined.extend(align(&input.ai_tables, &input.human, &input.dataset, policy)?);
    }
    Ok(combined)
}

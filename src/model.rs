use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::datasets::LengthPolicy;

/// One row of a human corpus file (`human_datasets/<dataset>/data.ndjson`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub source: String,
    #[serde(alias = "human_completion")]
    pub human_completions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptRecord {
    pub id: String,
    pub prompt: String,
    pub prompt_number: u32,
}

/// Canonical completion row shared by generated, normalized and human records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub prompt: Option<String>,
    pub prompt_number: Option<u32>,
    pub model: String,
    pub completions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CompletionRecord {
    pub fn human(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            prompt: None,
            prompt_number: None,
            model: HUMAN_MODEL.to_string(),
            completions: doc.human_completions.clone(),
            source: Some(doc.source.clone()),
        }
    }
}

pub const HUMAN_MODEL: &str = "human";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedRecord {
    #[serde(flatten)]
    pub record: CompletionRecord,
    pub dataset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFileEntry {
    pub path: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub dataset: String,
    pub model: String,
    pub backend_model: String,
    pub prompt_number: u32,
    pub length_policy: LengthPolicy,
    pub batch_size: usize,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub input: InputFileEntry,
    pub output_path: String,
    pub documents: usize,
    pub completed: usize,
    pub failed_ids: Vec<String>,
    pub below_min_length_ids: Vec<String>,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlignDatasetSummary {
    pub dataset: String,
    pub human_rows: usize,
    pub ai_rows: usize,
    pub inputs: Vec<InputFileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlignRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub models: Vec<String>,
    pub reference_policy: String,
    pub prompt_number: Option<u32>,
    pub temperature: Option<String>,
    pub subset: Option<usize>,
    pub output_path: String,
    pub total_rows: usize,
    pub datasets: Vec<AlignDatasetSummary>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiFileEntry {
    pub model: String,
    pub file_name: String,
    pub prompt_number: u32,
    pub temperature: Option<String>,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub ai_directory: String,
    pub dataset: String,
    pub file_count: usize,
    pub files: Vec<AiFileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetLengthSummary {
    pub dataset: String,
    pub documents: usize,
    pub min_doc_length: usize,
    pub max_doc_length: usize,
    pub mean_doc_length: f64,
    pub length_policy: LengthPolicy,
    pub below_min_tokens: usize,
    pub above_max_new_tokens: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LengthReport {
    pub manifest_version: u32,
    pub generated_at: String,
    pub datasets: Vec<DatasetLengthSummary>,
}

/// Corpus ids are strings in most files but plain integers in some exports.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("id must be a string or number: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_accepts_numeric_ids_and_singular_completion_field() {
        let raw = r#"{"id": 7, "source": "s", "human_completion": "h"}"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.id, "7");
        assert_eq!(doc.human_completions, "h");
    }

    #[test]
    fn aligned_record_serializes_flat() {
        let record = AlignedRecord {
            record: CompletionRecord {
                id: "1".to_string(),
                prompt: None,
                prompt_number: None,
                model: HUMAN_MODEL.to_string(),
                completions: "text".to_string(),
                source: None,
            },
            dataset: "mrpc".to_string(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["model"], "human");
        assert_eq!(value["dataset"], "mrpc");
        assert!(value.get("source").is_none());
    }
}

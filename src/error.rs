use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown dataset '{name}'; choose from {valid}")]
    UnknownDataset { name: String, valid: String },

    #[error("no prompt template {prompt_number} for dataset '{dataset}'; registered: {valid}")]
    UnknownPrompt {
        dataset: String,
        prompt_number: u32,
        valid: String,
    },

    #[error("schema error in {table}: {reason}")]
    Schema { table: String, reason: String },

    #[error("alignment failed for dataset '{dataset}': {reason}")]
    Alignment { dataset: String, reason: String },

    #[error("model '{model}' belongs to a gated family and needs a token file at {}", path.display())]
    MissingModelToken { model: String, path: PathBuf },

    #[error("generation failed for document '{id}': {reason}")]
    Generation { id: String, reason: String },
}

impl PipelineError {
    pub fn schema(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub fn alignment(dataset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Alignment {
            dataset: dataset.into(),
            reason: reason.into(),
        }
    }
}

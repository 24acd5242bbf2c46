use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::model::{CompletionRecord, PromptRecord};
use crate::util::write_ndjson;

#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub request: GenerationRequest,
    pub batch_size: usize,
    /// Tag failed documents and keep going instead of aborting the run.
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub records: Vec<CompletionRecord>,
    pub failed_ids: Vec<String>,
    pub below_min_length_ids: Vec<String>,
}

pub fn generate(
    prompts: &[PromptRecord],
    generator: &dyn TextGenerator,
    options: &GenerationOptions,
    sink: Option<&Path>,
) -> Result<GenerationOutcome> {
    let batch_size = options.batch_size.max(1);
    let model = generator.model_name().to_string();
    let total = prompts.len();
    let mut outcome = GenerationOutcome {
        records: Vec::with_capacity(total),
        ..GenerationOutcome::default()
    };

    for batch in prompts.chunks(batch_size) {
        let texts = batch
            .iter()
            .map(|record| record.prompt.as_str())
            .collect::<Vec<&str>>();

        let completions = match run_batch(generator, &texts, &options.request, batch) {
            Ok(completions) => completions.into_iter().map(Some).collect(),
            Err(err) if options.continue_on_error => {
                warn!(
                    error = %err,
                    size = batch.len(),
                    "batch failed; retrying documents one by one"
                );
                isolate_failures(generator, batch, &options.request, &mut outcome.failed_ids)
            }
            Err(err) => return Err(err.into()),
        };

        for (prompt, completion) in batch.iter().zip(completions) {
            // Failed documents are reported in `failed_ids` only.
            let text = match completion {
                Some(text) => {
                    if token_count(&text) < options.request.min_length {
                        outcome.below_min_length_ids.push(prompt.id.clone());
                    }
                    text
                }
                None => String::new(),
            };
            outcome.records.push(CompletionRecord {
                id: prompt.id.clone(),
                prompt: Some(prompt.prompt.clone()),
                prompt_number: Some(prompt.prompt_number),
                model: model.clone(),
                completions: text,
                source: None,
            });
        }

        info!(model = %model, processed = outcome.records.len(), total, "generation progress");
    }

    if !outcome.below_min_length_ids.is_empty() {
        warn!(
            count = outcome.below_min_length_ids.len(),
            min_length = options.request.min_length,
            ids = %outcome.below_min_length_ids.join(","),
            "completions shorter than the minimum length"
        );
    }
    if !outcome.failed_ids.is_empty() {
        warn!(
            count = outcome.failed_ids.len(),
            ids = %outcome.failed_ids.join(","),
            "documents failed generation and were stored with empty completions"
        );
    }

    if let Some(path) = sink {
        let rows = outcome
            .records
            .iter()
            .map(storage_row)
            .collect::<Result<Vec<_>, PipelineError>>()?;
        write_ndjson(path, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "wrote completions");
    }

    Ok(outcome)
}

fn run_batch(
    generator: &dyn TextGenerator,
    texts: &[&str],
    request: &GenerationRequest,
    batch: &[PromptRecord],
) -> Result<Vec<String>, PipelineError> {
    let batch_ids = || {
        batch
            .iter()
            .map(|record| record.id.as_str())
            .collect::<Vec<&str>>()
            .join(",")
    };

    let completions = generator
        .generate_batch(texts, request)
        .map_err(|err| PipelineError::Generation {
            id: batch_ids(),
            reason: format!("{err:#}"),
        })?;

    if completions.len() != texts.len() {
        return Err(PipelineError::Generation {
            id: batch_ids(),
            reason: format!(
                "model returned {} completions for {} prompts",
                completions.len(),
                texts.len()
            ),
        });
    }

    Ok(completions)
}

fn isolate_failures(
    generator: &dyn TextGenerator,
    batch: &[PromptRecord],
    request: &GenerationRequest,
    failed_ids: &mut Vec<String>,
) -> Vec<Option<String>> {
    batch
        .iter()
        .map(|record| {
            let single = std::slice::from_ref(record);
            match run_batch(generator, &[record.prompt.as_str()], request, single) {
                Ok(mut completions) => completions.pop(),
                Err(err) => {
                    warn!(id = %record.id, error = %err, "document failed generation");
                    failed_ids.push(record.id.clone());
                    None
                }
            }
        })
        .collect()
}

fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Column layout of generated files: `id`, `prompt_<n>`, `<model>_completions`.
pub fn storage_row(record: &CompletionRecord) -> Result<Map<String, Value>, PipelineError> {
    let prompt_number = record.prompt_number.ok_or_else(|| {
        PipelineError::schema(
            record.model.as_str(),
            format!("record {} has no prompt number", record.id),
        )
    })?;

    let mut row = Map::new();
    row.insert("id".to_string(), Value::String(record.id.clone()));
    row.insert(
        format!("prompt_{prompt_number}"),
        Value::String(record.prompt.clone().unwrap_or_default()),
    );
    row.insert(
        format!("{}_completions", record.model),
        Value::String(record.completions.clone()),
    );
    Ok(row)
}

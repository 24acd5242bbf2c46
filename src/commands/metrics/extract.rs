use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TextMetrics {
    pub doc_length: usize,
    pub n_tokens: usize,
    pub n_characters: usize,
    pub n_sentences: usize,
}

/// Maps raw text to descriptive statistics. Shared across worker threads.
pub trait MetricsExtractor: Sync {
    fn extract(&self, text: &str) -> TextMetrics;
}

/// Regex tokenizer: words (with inner apostrophes) and single punctuation marks.
pub struct DescriptiveExtractor {
    token_pattern: Regex,
    sentence_pattern: Regex,
}

impl DescriptiveExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            token_pattern: Regex::new(r"\w+(?:['’]\w+)*|[^\w\s]")
                .context("failed to compile token regex")?,
            sentence_pattern: Regex::new(r"[^.!?]+(?:[.!?]+|$)")
                .context("failed to compile sentence regex")?,
        })
    }
}

impl MetricsExtractor for DescriptiveExtractor {
    fn extract(&self, text: &str) -> TextMetrics {
        let mut metrics = TextMetrics::default();

        for token in self.token_pattern.find_iter(text) {
            metrics.doc_length += 1;
            let token = token.as_str();
            if token.chars().any(char::is_alphanumeric) {
                metrics.n_tokens += 1;
                metrics.n_characters += token.chars().count();
            }
        }

        metrics.n_sentences = self
            .sentence_pattern
            .find_iter(text)
            .filter(|sentence| sentence.as_str().chars().any(char::is_alphanumeric))
            .count();

        metrics
    }
}

#[derive(Debug, Clone)]
pub struct MetricsInput {
    pub id: String,
    pub model: String,
    pub prompt_number: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_number: Option<u32>,
    pub dataset: String,
    #[serde(flatten)]
    pub metrics: TextMetrics,
}

fn row_key(input: &MetricsInput) -> (&str, &str, Option<u32>) {
    (input.id.as_str(), input.model.as_str(), input.prompt_number)
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|cores| cores.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Runs `extractor` over `inputs` on a pool of `workers` threads. Results are matched
/// back to their input row by `(id, model, prompt_number)`.
pub fn extract_rows(
    inputs: &[MetricsInput],
    dataset: &str,
    extractor: &dyn MetricsExtractor,
    workers: usize,
) -> Result<Vec<MetricsRow>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("failed to build metrics worker pool")?;

    let computed = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| (row_key(input), extractor.extract(&input.text)))
            .collect::<Vec<_>>()
    });

    let mut by_key = HashMap::with_capacity(computed.len());
    for (key, metrics) in computed {
        if by_key.insert(key, metrics).is_some() {
            bail!(
                "duplicate metrics row for id '{}', model '{}', prompt {:?}",
                key.0,
                key.1,
                key.2
            );
        }
    }

    inputs
        .iter()
        .map(|input| {
            let metrics = by_key
                .remove(&row_key(input))
                .with_context(|| format!("missing metrics for id '{}'", input.id))?;
            Ok(MetricsRow {
                id: input.id.clone(),
                model: input.model.clone(),
                prompt_number: input.prompt_number,
                dataset: dataset.to_string(),
                metrics,
            })
        })
        .collect()
}

use std::cell::RefCell;
use std::path::PathBuf;

use anyhow::{Result, bail};

use super::engine::{GenerationOptions, generate, storage_row};
use super::run::default_output_path;
use crate::cli::GenerateArgs;
use crate::commands::align::{NormalizeOptions, RawTable, normalize};
use crate::error::PipelineError;
use crate::generator::{GenerationRequest, SamplingConfig, TextGenerator};
use crate::model::PromptRecord;

/// Echoes a tag per prompt and records how prompts were batched.
struct EchoGenerator {
    name: String,
    batches: RefCell<Vec<usize>>,
    fail_on: Option<String>,
}

impl EchoGenerator {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            batches: RefCell::new(Vec::new()),
            fail_on: None,
        }
    }

    fn failing_on(name: &str, marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::new(name)
        }
    }
}

impl TextGenerator for EchoGenerator {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn generate_batch(&self, prompts: &[&str], request: &GenerationRequest) -> Result<Vec<String>> {
        self.batches.borrow_mut().push(prompts.len());
        if let Some(marker) = &self.fail_on {
            if prompts.iter().any(|prompt| prompt.contains(marker.as_str())) {
                bail!("backend refused prompt");
            }
        }

        Ok(prompts
            .iter()
            .map(|prompt| {
                let words = vec!["word"; request.min_length].join(" ");
                format!("{words} <{prompt}>")
            })
            .collect())
    }
}

/// Returns fewer completions than prompts.
struct ShortGenerator;

impl TextGenerator for ShortGenerator {
    fn model_name(&self) -> &str {
        "short"
    }

    fn generate_batch(&self, _prompts: &[&str], _request: &GenerationRequest) -> Result<Vec<String>> {
        Ok(vec!["only one".to_string()])
    }
}

fn prompts(count: usize) -> Vec<PromptRecord> {
    (1..=count)
        .map(|index| PromptRecord {
            id: format!("doc{index}"),
            prompt: format!("continue the story: text {index}"),
            prompt_number: 1,
        })
        .collect()
}

fn options(batch_size: usize) -> GenerationOptions {
    GenerationOptions {
        request: GenerationRequest {
            min_length: 2,
            max_new_tokens: 16,
            sampling: None,
        },
        batch_size,
        continue_on_error: false,
    }
}

#[test]
fn generate_preserves_input_order_for_every_batch_size() {
    let input = prompts(5);

    for batch_size in [1, 2, input.len()] {
        let generator = EchoGenerator::new("beluga7b");
        let outcome = generate(&input, &generator, &options(batch_size), None).unwrap();

        let ids = outcome
            .records
            .iter()
            .map(|record| record.id.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(ids, vec!["doc1", "doc2", "doc3", "doc4", "doc5"]);
        for (record, prompt) in outcome.records.iter().zip(&input) {
            assert!(record.completions.ends_with(&format!("<{}>", prompt.prompt)));
            assert_eq!(record.model, "beluga7b");
        }
        assert!(outcome.failed_ids.is_empty());
    }
}

#[test]
fn generate_groups_prompts_by_batch_size() {
    let generator = EchoGenerator::new("beluga7b");
    generate(&prompts(5), &generator, &options(2), None).unwrap();
    assert_eq!(*generator.batches.borrow(), vec![2, 2, 1]);
}

#[test]
fn generate_aborts_on_first_failing_document_by_default() {
    let generator = EchoGenerator::failing_on("beluga7b", "text 2");
    let err = generate(&prompts(3), &generator, &options(1), None).unwrap_err();

    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Generation { id, .. }) => assert_eq!(id, "doc2"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn failed_run_leaves_no_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("out.ndjson");
    let generator = EchoGenerator::failing_on("beluga7b", "text 3");

    assert!(generate(&prompts(3), &generator, &options(1), Some(&sink)).is_err());
    assert!(!sink.exists());
}

#[test]
fn continue_on_error_isolates_failures_within_a_batch() {
    let generator = EchoGenerator::failing_on("beluga7b", "text 2");
    let mut opts = options(3);
    opts.continue_on_error = true;

    let outcome = generate(&prompts(3), &generator, &opts, None).unwrap();
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.failed_ids, vec!["doc2"]);
    assert!(outcome.records[1].completions.is_empty());
    assert!(outcome.records[0].completions.contains("text 1"));
    assert!(outcome.records[2].completions.contains("text 3"));
}

#[test]
fn failed_documents_are_not_counted_as_short_completions() {
    let generator = EchoGenerator::failing_on("beluga7b", "text 2");
    let mut opts = options(1);
    opts.continue_on_error = true;

    let outcome = generate(&prompts(3), &generator, &opts, None).unwrap();
    assert_eq!(outcome.failed_ids, vec!["doc2"]);
    assert!(outcome.below_min_length_ids.is_empty());
}

#[test]
fn empty_run_writes_a_file_the_normalizer_accepts() {
    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("beluga7b").join("stories_prompt_1.ndjson");
    let generator = EchoGenerator::new("beluga7b");

    let outcome = generate(&prompts(0), &generator, &options(2), Some(&sink)).unwrap();
    assert!(outcome.records.is_empty());
    assert!(sink.exists());

    let raw = RawTable::load(&sink).unwrap();
    let normalized = normalize(&raw, &NormalizeOptions::default()).unwrap();
    assert!(normalized.is_empty());
}

#[test]
fn mismatched_completion_count_is_a_generation_error() {
    let err = generate(&prompts(2), &ShortGenerator, &options(2), None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Generation { .. })
    ));
}

/// Returns an empty completion per prompt.
struct ShortGeneratorPerPrompt;

impl TextGenerator for ShortGeneratorPerPrompt {
    fn model_name(&self) -> &str {
        "terse"
    }

    fn generate_batch(&self, prompts: &[&str], _request: &GenerationRequest) -> Result<Vec<String>> {
        Ok(prompts.iter().map(|_| String::new()).collect())
    }
}

#[test]
fn empty_completions_fall_below_a_positive_min_length() {
    let mut opts = options(2);
    opts.request.min_length = 1;

    let outcome = generate(&prompts(3), &ShortGeneratorPerPrompt, &opts, None).unwrap();
    assert_eq!(outcome.below_min_length_ids, vec!["doc1", "doc2", "doc3"]);
}

#[test]
fn sink_round_trips_through_the_normalizer() {
    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("llama2_chat7b").join("stories_prompt_1.ndjson");
    let generator = EchoGenerator::new("llama2_chat7b");
    let mut opts = options(2);
    opts.request.sampling = Some(SamplingConfig {
        temperature: 1.0,
        seed: 129,
    });

    let outcome = generate(&prompts(3), &generator, &opts, Some(&sink)).unwrap();

    let raw = RawTable::load(&sink).unwrap();
    assert_eq!(
        raw.columns(),
        vec!["id", "prompt_1", "llama2_chat7b_completions"]
    );

    let normalized = normalize(&raw, &NormalizeOptions::default()).unwrap();
    assert_eq!(normalized, outcome.records);
}

#[test]
fn storage_row_requires_prompt_number() {
    let generator = EchoGenerator::new("beluga7b");
    let mut record = generate(&prompts(1), &generator, &options(1), None)
        .unwrap()
        .records
        .remove(0);
    assert!(storage_row(&record).is_ok());

    record.prompt_number = None;
    assert!(matches!(
        storage_row(&record),
        Err(PipelineError::Schema { .. })
    ));
}

fn generate_args(subset: Option<usize>, temperature: Option<f32>) -> GenerateArgs {
    GenerateArgs {
        data_root: PathBuf::from("datasets"),
        dataset: "mrpc".to_string(),
        model: "mistral7b".to_string(),
        backend_model: None,
        prompt_number: 2,
        subset,
        batch_size: 1,
        temperature,
        seed: 129,
        endpoint: "http://localhost:11434".to_string(),
        token_path: PathBuf::from("tokens/hf_token.txt"),
        output_path: None,
        continue_on_error: false,
    }
}

#[test]
fn default_output_path_follows_subset_and_temperature() {
    assert_eq!(
        default_output_path(&generate_args(Some(10), None)),
        PathBuf::from("datasets/ai_datasets/mistral7b/mrpc_prompt_2.ndjson")
    );
    assert_eq!(
        default_output_path(&generate_args(None, Some(1.5))),
        PathBuf::from("datasets/ai_datasets/ALL_DATA/mistral7b/mrpc_prompt_2_temp1.5.ndjson")
    );
    assert_eq!(
        default_output_path(&generate_args(None, Some(1.0))),
        PathBuf::from("datasets/ai_datasets/ALL_DATA/mistral7b/mrpc_prompt_2_temp1.ndjson")
    );
}

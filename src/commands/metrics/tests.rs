use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::extract::{
    DescriptiveExtractor, MetricsExtractor, MetricsInput, TextMetrics, extract_rows,
};
use super::run::{ai_metrics, human_metrics};
use crate::commands::align::Selector;
use crate::model::Document;
use crate::util::{read_ndjson, write_ndjson};

fn input(id: &str, model: &str, text: &str) -> MetricsInput {
    MetricsInput {
        id: id.to_string(),
        model: model.to_string(),
        prompt_number: None,
        text: text.to_string(),
    }
}

/// Reports the text length as every metric and counts calls.
struct LengthExtractor {
    calls: AtomicUsize,
}

impl MetricsExtractor for LengthExtractor {
    fn extract(&self, text: &str) -> TextMetrics {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let length = text.len();
        TextMetrics {
            doc_length: length,
            n_tokens: length,
            n_characters: length,
            n_sentences: length,
        }
    }
}

#[test]
fn descriptive_extractor_counts_tokens_punctuation_and_sentences() {
    let extractor = DescriptiveExtractor::new().unwrap();
    let metrics = extractor.extract("Hello, world! It's a test. Another one");

    assert_eq!(metrics.doc_length, 10);
    assert_eq!(metrics.n_tokens, 7);
    assert_eq!(metrics.n_characters, 29);
    assert_eq!(metrics.n_sentences, 3);
}

#[test]
fn descriptive_extractor_handles_empty_text() {
    let extractor = DescriptiveExtractor::new().unwrap();
    assert_eq!(extractor.extract("   "), TextMetrics::default());
}

#[test]
fn extract_rows_matches_results_to_inputs_regardless_of_worker_count() {
    let inputs = (0..40)
        .map(|index| input(&format!("doc{index}"), "beluga7b", &"x".repeat(index)))
        .collect::<Vec<MetricsInput>>();

    for workers in [1, 4] {
        let extractor = LengthExtractor {
            calls: AtomicUsize::new(0),
        };
        let rows = extract_rows(&inputs, "mrpc", &extractor, workers).unwrap();

        assert_eq!(extractor.calls.load(Ordering::SeqCst), inputs.len());
        assert_eq!(rows.len(), inputs.len());
        for (index, row) in rows.iter().enumerate() {
            assert_eq!(row.id, format!("doc{index}"));
            assert_eq!(row.metrics.doc_length, index);
            assert_eq!(row.dataset, "mrpc");
        }
    }
}

#[test]
fn extract_rows_keeps_same_id_apart_across_models() {
    let inputs = vec![
        input("1", "human", "short"),
        input("1", "beluga7b", "a longer text"),
    ];
    let extractor = LengthExtractor {
        calls: AtomicUsize::new(0),
    };

    let rows = extract_rows(&inputs, "mrpc", &extractor, 2).unwrap();
    assert_eq!(rows[0].metrics.doc_length, 5);
    assert_eq!(rows[1].metrics.doc_length, 13);
}

#[test]
fn extract_rows_rejects_duplicate_keys() {
    let inputs = vec![input("1", "human", "a"), input("1", "human", "b")];
    let extractor = LengthExtractor {
        calls: AtomicUsize::new(0),
    };

    let err = extract_rows(&inputs, "mrpc", &extractor, 1).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn human_metrics_writes_source_and_completion_tables() {
    let dir = tempfile::tempdir().unwrap();
    let human = vec![Document {
        id: "d1".to_string(),
        source: "One. Two.".to_string(),
        human_completions: "Three".to_string(),
    }];
    let extractor = DescriptiveExtractor::new().unwrap();
    let source_path = dir.path().join("mrpc_source.ndjson");
    let completions_path = dir.path().join("mrpc_completions.ndjson");

    let (source_rows, completion_rows) = human_metrics(
        &human,
        "mrpc",
        &extractor,
        1,
        &source_path,
        &completions_path,
    )
    .unwrap();

    assert_eq!(source_rows[0].metrics.n_sentences, 2);
    assert_eq!(completion_rows[0].metrics.n_tokens, 1);
    assert_eq!(completion_rows[0].model, "human");

    let written: Vec<serde_json::Value> = read_ndjson(&source_path).unwrap();
    assert_eq!(written[0]["id"], "d1");
    assert_eq!(written[0]["n_sentences"], 2);
    assert!(written[0].get("prompt_number").is_none());
}

#[test]
fn ai_metrics_skips_when_no_files_match() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = DescriptiveExtractor::new().unwrap();
    let output = dir.path().join("out.ndjson");

    let rows = ai_metrics(
        dir.path(),
        &["beluga7b".to_string()],
        "mrpc",
        &Selector::default(),
        &extractor,
        1,
        &output,
    )
    .unwrap();

    assert!(rows.is_none());
    assert!(!output.exists());
}

#[test]
fn ai_metrics_measures_normalized_completions() {
    let dir = tempfile::tempdir().unwrap();
    write_ndjson(
        &dir.path().join("beluga7b/mrpc_prompt_1_temp1.ndjson"),
        &[json!({"id": "m1", "prompt_1": "p", "beluga7b_completions": "Four words right here."})],
    )
    .unwrap();
    write_ndjson(
        &dir.path().join("mistral7b/mrpc_prompt_1_temp1.ndjson"),
        &[json!({"id": "m1", "prompt_1": "p", "mistral7b_completions": "Two words"})],
    )
    .unwrap();
    let extractor = DescriptiveExtractor::new().unwrap();
    let output = dir.path().join("metrics.ndjson");

    let rows = ai_metrics(
        dir.path(),
        &["beluga7b".to_string(), "mistral7b".to_string()],
        "mrpc",
        &Selector {
            prompt_number: None,
            temperature: Some("1".to_string()),
        },
        &extractor,
        2,
        &output,
    )
    .unwrap()
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].model, "beluga7b");
    assert_eq!(rows[0].metrics.n_tokens, 4);
    assert_eq!(rows[1].model, "mistral7b");
    assert_eq!(rows[1].metrics.n_tokens, 2);
    assert_eq!(rows[1].prompt_number, Some(1));
    assert!(output.exists());
}

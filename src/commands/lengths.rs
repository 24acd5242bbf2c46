use anyhow::{Result, bail};
use tracing::info;

use crate::cli::LengthsArgs;
use crate::commands::align::{human_corpus_path, load_human_corpus};
use crate::commands::metrics::extract::{DescriptiveExtractor, MetricsExtractor};
use crate::datasets::{self, DATASETS};
use crate::model::{DatasetLengthSummary, Document, LengthReport};
use crate::util::{now_utc_string, write_json_pretty};

pub fn run(args: LengthsArgs) -> Result<()> {
    let names = if args.datasets.is_empty() {
        DATASETS.iter().map(|name| name.to_string()).collect()
    } else {
        args.datasets.clone()
    };

    let extractor = DescriptiveExtractor::new()?;
    let mut summaries = Vec::with_capacity(names.len());
    for dataset in &names {
        let documents = load_human_corpus(&human_corpus_path(&args.data_root, dataset))?;
        let summary = summarize_lengths(dataset, &documents, &extractor)?;

        info!(
            dataset = %summary.dataset,
            min_doc_length = summary.min_doc_length,
            max_doc_length = summary.max_doc_length,
            mean_doc_length = summary.mean_doc_length,
            min_tokens = summary.length_policy.min_tokens,
            max_new_tokens = summary.length_policy.max_new_tokens,
            "human completion lengths"
        );
        summaries.push(summary);
    }

    let report = LengthReport {
        manifest_version: 1,
        generated_at: now_utc_string(),
        datasets: summaries,
    };
    let report_path = args
        .report_path
        .unwrap_or_else(|| args.data_root.join("manifests").join("length_report.json"));
    write_json_pretty(&report_path, &report)?;
    info!(path = %report_path.display(), "wrote length report");

    Ok(())
}

/// Compares human completion lengths with the generation bounds of the dataset.
pub fn summarize_lengths(
    dataset: &str,
    documents: &[Document],
    extractor: &dyn MetricsExtractor,
) -> Result<DatasetLengthSummary> {
    let policy = datasets::lookup(dataset)?;
    if documents.is_empty() {
        bail!("human corpus for '{dataset}' is empty");
    }

    let lengths = documents
        .iter()
        .map(|doc| extractor.extract(&doc.human_completions).doc_length)
        .collect::<Vec<usize>>();
    let total = lengths.iter().sum::<usize>();

    Ok(DatasetLengthSummary {
        dataset: dataset.to_string(),
        documents: lengths.len(),
        min_doc_length: lengths.iter().copied().min().unwrap_or(0),
        max_doc_length: lengths.iter().copied().max().unwrap_or(0),
        mean_doc_length: total as f64 / lengths.len() as f64,
        length_policy: policy,
        below_min_tokens: lengths
            .iter()
            .filter(|length| **length < policy.min_tokens)
            .count(),
        above_max_new_tokens: lengths
            .iter()
            .filter(|length| **length > policy.max_new_tokens)
            .count(),
    })
}

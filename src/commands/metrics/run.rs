use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::extract::{
    DescriptiveExtractor, MetricsExtractor, MetricsInput, MetricsRow, default_workers,
    extract_rows,
};
use crate::cli::MetricsArgs;
use crate::commands::align::{
    NormalizeOptions, RawTable, Selector, ai_root, human_corpus_path, load_human_corpus,
    normalize, resolve_ai_paths,
};
use crate::datasets;
use crate::model::{Document, HUMAN_MODEL};
use crate::util::write_ndjson;

pub fn run(args: MetricsArgs) -> Result<()> {
    datasets::ensure_known(&args.dataset)?;

    let workers = args.workers.unwrap_or_else(default_workers);
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.data_root.join("metrics"));
    let extractor = DescriptiveExtractor::new()?;

    info!(dataset = %args.dataset, workers, "starting metrics extraction");

    if !args.human_only {
        let ai_dir = args
            .ai_dir
            .clone()
            .unwrap_or_else(|| ai_root(&args.data_root));
        for temperature in &args.temperatures {
            let selector = Selector {
                prompt_number: args.prompt_number,
                temperature: Some(temperature.clone()),
            };
            let path = output_dir.join("ai_metrics").join(format!(
                "{}_completions_temp{temperature}.ndjson",
                args.dataset
            ));
            ai_metrics(
                &ai_dir,
                &args.models,
                &args.dataset,
                &selector,
                &extractor,
                workers,
                &path,
            )?;
        }
    }

    if !args.ai_only {
        let human = load_human_corpus(&human_corpus_path(&args.data_root, &args.dataset))?;
        let human_dir = output_dir.join("human_metrics");
        human_metrics(
            &human,
            &args.dataset,
            &extractor,
            workers,
            &human_dir.join(format!("{}_source.ndjson", args.dataset)),
            &human_dir.join(format!("{}_completions.ndjson", args.dataset)),
        )?;
    }

    info!(dataset = %args.dataset, "metrics extraction completed");
    Ok(())
}

pub fn ai_metrics(
    ai_dir: &Path,
    models: &[String],
    dataset: &str,
    selector: &Selector,
    extractor: &dyn MetricsExtractor,
    workers: usize,
    output_path: &Path,
) -> Result<Option<Vec<MetricsRow>>> {
    let paths = resolve_ai_paths(ai_dir, models, dataset, selector)?;
    if paths.is_empty() {
        warn!(dataset = %dataset, output = %output_path.display(), "skipping AI metrics");
        return Ok(None);
    }

    let mut inputs = Vec::new();
    for path in &paths {
        let raw = RawTable::load(path)?;
        let records = normalize(&raw, &NormalizeOptions::default())
            .with_context(|| format!("failed to normalize {}", path.display()))?;
        inputs.extend(records.into_iter().map(|record| MetricsInput {
            id: record.id,
            model: record.model,
            prompt_number: record.prompt_number,
            text: record.completions,
        }));
    }

    let rows = extract_rows(&inputs, dataset, extractor, workers)?;
    write_ndjson(output_path, &rows)?;
    info!(
        dataset = %dataset,
        files = paths.len(),
        rows = rows.len(),
        output = %output_path.display(),
        "wrote AI metrics"
    );

    Ok(Some(rows))
}

/// Source texts and human completions are measured and written separately.
pub fn human_metrics(
    human: &[Document],
    dataset: &str,
    extractor: &dyn MetricsExtractor,
    workers: usize,
    source_path: &Path,
    completions_path: &Path,
) -> Result<(Vec<MetricsRow>, Vec<MetricsRow>)> {
    let inputs_for = |text: fn(&Document) -> &str| {
        human
            .iter()
            .map(|doc| MetricsInput {
                id: doc.id.clone(),
                model: HUMAN_MODEL.to_string(),
                prompt_number: None,
                text: text(doc).to_string(),
            })
            .collect::<Vec<MetricsInput>>()
    };

    let source_rows = extract_rows(
        &inputs_for(|doc| doc.source.as_str()),
        dataset,
        extractor,
        workers,
    )?;
    let completion_rows = extract_rows(
        &inputs_for(|doc| doc.human_completions.as_str()),
        dataset,
        extractor,
        workers,
    )?;

    write_ndjson(source_path, &source_rows)?;
    write_ndjson(completions_path, &completion_rows)?;
    info!(
        dataset = %dataset,
        rows = source_rows.len(),
        source = %source_path.display(),
        completions = %completions_path.display(),
        "wrote human metrics"
    );

    Ok((source_rows, completion_rows))
}

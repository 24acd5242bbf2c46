use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::combine::{DatasetTables, ReferencePolicy, align_datasets};
use super::normalize::{NormalizeOptions, RawTable, normalize};
use super::resolve::{Selector, ai_root, human_corpus_path, load_human_corpus, resolve_ai_paths};
use crate::cli::{AlignArgs, SelectorArgs};
use crate::datasets;
use crate::model::{AlignDatasetSummary, AlignRunManifest, CompletionRecord, HUMAN_MODEL};
use crate::util::{
    input_file_entry, now_utc_string, utc_compact_string, write_json_pretty, write_ndjson,
};

impl From<&SelectorArgs> for Selector {
    fn from(args: &SelectorArgs) -> Self {
        Self {
            prompt_number: args.prompt_number,
            temperature: args.temperature.clone(),
        }
    }
}

pub fn run(args: AlignArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("align-{}", utc_compact_string(started_ts));
    let policy = args.reference.parse::<ReferencePolicy>()?;
    let selector = Selector::from(&args.selector);
    let ai_dir = args
        .ai_dir
        .clone()
        .unwrap_or_else(|| ai_root(&args.data_root));

    info!(
        run_id = %run_id,
        datasets = %args.datasets.join(","),
        models = %args.models.join(","),
        reference = %policy,
        "starting alignment"
    );

    let dataset_names = unique_datasets(&args.datasets);
    let mut warnings = Vec::new();
    let mut loaded = Vec::with_capacity(dataset_names.len());
    for dataset in &dataset_names {
        datasets::ensure_known(dataset)?;

        let (tables, paths) = load_dataset_tables(
            &args.data_root,
            &ai_dir,
            &args.models,
            dataset,
            &selector,
            args.subset,
        )?;
        if paths.is_empty() {
            warnings.push(format!("no AI files matched for dataset '{dataset}'"));
        }
        loaded.push((tables, paths));
    }

    let (inputs, path_sets): (Vec<DatasetTables>, Vec<Vec<PathBuf>>) =
        loaded.into_iter().unzip();
    let combined = align_datasets(&inputs, &policy)?;

    let mut summaries = Vec::with_capacity(inputs.len());
    for (tables, paths) in inputs.iter().zip(&path_sets) {
        let dataset_rows = combined
            .iter()
            .filter(|row| row.dataset == tables.dataset)
            .collect::<Vec<_>>();
        let human_rows = dataset_rows
            .iter()
            .filter(|row| row.record.model == HUMAN_MODEL)
            .count();

        let mut files = Vec::with_capacity(paths.len() + 1);
        let human_path = human_corpus_path(&args.data_root, &tables.dataset);
        files.push(input_file_entry(&human_path, tables.human.len())?);
        for (path, table) in paths.iter().zip(&tables.ai_tables) {
            files.push(input_file_entry(path, table.len())?);
        }

        summaries.push(AlignDatasetSummary {
            dataset: tables.dataset.clone(),
            human_rows,
            ai_rows: dataset_rows.len() - human_rows,
            inputs: files,
        });
    }

    let output_path = args.output_path.clone().unwrap_or_else(|| {
        args.data_root
            .join("aligned")
            .join(format!("aligned_{}.ndjson", utc_compact_string(started_ts)))
    });
    write_ndjson(&output_path, &combined)?;

    let manifest = AlignRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        generated_at: now_utc_string(),
        models: args.models.clone(),
        reference_policy: policy.to_string(),
        prompt_number: selector.prompt_number,
        temperature: selector.temperature.clone(),
        subset: args.subset,
        output_path: output_path.display().to_string(),
        total_rows: combined.len(),
        datasets: summaries,
        warnings,
    };
    let manifest_path = args
        .data_root
        .join("manifests")
        .join(format!("align_run_{}.json", utc_compact_string(started_ts)));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        rows = combined.len(),
        output = %output_path.display(),
        manifest = %manifest_path.display(),
        "alignment completed"
    );

    Ok(())
}

/// Drops repeated dataset names, keeping the first occurrence of each.
pub fn unique_datasets(datasets: &[String]) -> Vec<String> {
    let mut unique = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        if unique.contains(dataset) {
            warn!(dataset = %dataset, "dataset listed more than once; aligning it once");
            continue;
        }
        unique.push(dataset.clone());
    }
    unique
}

/// Resolves, loads and normalizes every AI file of one dataset next to its human corpus.
pub fn load_dataset_tables(
    data_root: &Path,
    ai_dir: &Path,
    models: &[String],
    dataset: &str,
    selector: &Selector,
    subset: Option<usize>,
) -> Result<(DatasetTables, Vec<PathBuf>)> {
    let human = load_human_corpus(&human_corpus_path(data_root, dataset))?;
    let paths = resolve_ai_paths(ai_dir, models, dataset, selector)?;

    let options = NormalizeOptions {
        subset,
        human: Some(&human),
    };
    let ai_tables = paths
        .iter()
        .map(|path| {
            let raw = RawTable::load(path)?;
            let table = normalize(&raw, &options)
                .with_context(|| format!("failed to normalize {}", path.display()))?;
            Ok(table)
        })
        .collect::<Result<Vec<Vec<CompletionRecord>>>>()?;

    Ok((
        DatasetTables {
            dataset: dataset.to_string(),
            ai_tables,
            human,
        },
        paths,
    ))
}

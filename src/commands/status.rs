use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::align::{ai_root, human_corpus_path, load_human_corpus};
use crate::datasets::DATASETS;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(data_root = %args.data_root.display(), "status requested");

    for dataset in DATASETS {
        let path = human_corpus_path(&args.data_root, dataset);
        if path.exists() {
            let documents = load_human_corpus(&path)?;
            info!(dataset, documents = documents.len(), path = %path.display(), "human corpus");
        } else {
            warn!(dataset, path = %path.display(), "human corpus missing");
        }
    }

    let ai_dir = ai_root(&args.data_root);
    if ai_dir.is_dir() {
        for (model, files) in list_model_dirs(&ai_dir)? {
            info!(model = %model, files, "AI model directory");
        }
    } else {
        warn!(path = %ai_dir.display(), "AI dataset directory missing");
    }

    let manifest_dir = args.data_root.join("manifests");
    if manifest_dir.is_dir() {
        for prefix in ["generate_run_", "align_run_", "ai_inventory_"] {
            let latest = latest_manifest(&manifest_dir, prefix)?;
            info!(
                kind = prefix.trim_end_matches('_'),
                latest = %latest.unwrap_or_default(),
                "manifest"
            );
        }
    } else {
        warn!(path = %manifest_dir.display(), "manifest directory missing");
    }

    Ok(())
}

/// Model subdirectories with the number of files each holds, sorted by name.
fn list_model_dirs(ai_dir: &Path) -> Result<Vec<(String, usize)>> {
    let mut models = Vec::new();
    let entries =
        fs::read_dir(ai_dir).with_context(|| format!("failed to read {}", ai_dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", ai_dir.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let files = fs::read_dir(&path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .count();
        models.push((entry.file_name().to_string_lossy().into_owned(), files));
    }

    models.sort();
    Ok(models)
}

/// Manifest names embed a compact UTC timestamp, so the greatest name is the newest.
fn latest_manifest(manifest_dir: &Path, prefix: &str) -> Result<Option<String>> {
    let latest = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(ToOwned::to_owned))
        .filter(|name| name.starts_with(prefix) && name.ends_with(".json"))
        .max();

    Ok(latest)
}

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::commands::align::{
    RawTable, Selector, ai_file_pattern, ai_root, parse_ai_file_name, resolve_ai_paths,
};
use crate::datasets;
use crate::model::{AiFileEntry, AiInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    datasets::ensure_known(&args.dataset)?;

    let ai_dir = args
        .ai_dir
        .clone()
        .unwrap_or_else(|| ai_root(&args.data_root));
    let manifest = build_manifest(&ai_dir, &args.models, &args.dataset)?;

    if args.dry_run {
        info!(
            file_count = manifest.file_count,
            dataset = %manifest.dataset,
            source = %manifest.ai_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.data_root
            .join("manifests")
            .join(format!("ai_inventory_{}.json", args.dataset))
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(file_count = manifest.file_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(
    ai_dir: &Path,
    models: &[String],
    dataset: &str,
) -> Result<AiInventoryManifest> {
    let pattern = ai_file_pattern()?;

    let mut files = Vec::new();
    for model in models {
        let paths = resolve_ai_paths(
            ai_dir,
            std::slice::from_ref(model),
            dataset,
            &Selector::default(),
        )?;

        for path in paths {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(ToOwned::to_owned)
                .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
            let parsed = parse_ai_file_name(&file_name, &pattern).with_context(|| {
                format!("filename does not match expected pattern: {file_name}")
            })?;

            let rows = RawTable::load(&path)?.rows.len();
            files.push(AiFileEntry {
                model: model.clone(),
                file_name,
                prompt_number: parsed.prompt_number,
                temperature: parsed.temperature,
                rows,
                sha256: sha256_file(&path)?,
            });
        }
    }

    if files.is_empty() {
        bail!("no AI files for dataset '{dataset}' in {}", ai_dir.display());
    }

    Ok(AiInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        ai_directory: ai_dir.display().to_string(),
        dataset: dataset.to_string(),
        file_count: files.len(),
        files,
    })
}

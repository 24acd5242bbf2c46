use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::info;

use super::engine::{GenerationOptions, generate};
use crate::cli::GenerateArgs;
use crate::commands::align::{ai_root, human_corpus_path, load_human_corpus};
use crate::datasets;
use crate::generator::{GenerationRequest, OllamaGenerator, SamplingConfig, load_model_token};
use crate::model::GenerationRunManifest;
use crate::prompts::build_prompt_records;
use crate::util::{input_file_entry, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: GenerateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let started = Instant::now();
    let run_id = format!("generate-{}", utc_compact_string(started_ts));

    if args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    let policy = datasets::lookup(&args.dataset)?;
    let human_path = human_corpus_path(&args.data_root, &args.dataset);
    let mut documents = load_human_corpus(&human_path)?;
    let corpus_rows = documents.len();
    if let Some(subset) = args.subset {
        documents.truncate(subset);
    }

    let prompts = build_prompt_records(&args.dataset, args.prompt_number, &documents)?;
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(&args));

    info!(
        run_id = %run_id,
        dataset = %args.dataset,
        model = %args.model,
        prompt_number = args.prompt_number,
        documents = prompts.len(),
        min_tokens = policy.min_tokens,
        max_new_tokens = policy.max_new_tokens,
        "starting generation"
    );

    let backend_model = args
        .backend_model
        .clone()
        .unwrap_or_else(|| args.model.clone());
    let token = load_model_token(&args.model, &args.token_path)?;
    let generator = OllamaGenerator::new(
        args.endpoint.as_str(),
        args.model.as_str(),
        backend_model.as_str(),
        token,
    )?;

    let sampling = args.temperature.map(|temperature| SamplingConfig {
        temperature,
        seed: args.seed,
    });
    let options = GenerationOptions {
        request: GenerationRequest {
            min_length: policy.min_tokens,
            max_new_tokens: policy.max_new_tokens,
            sampling,
        },
        batch_size: args.batch_size,
        continue_on_error: args.continue_on_error,
    };

    let outcome = generate(&prompts, &generator, &options, Some(&output_path))?;

    let manifest = GenerationRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: if outcome.failed_ids.is_empty() {
            "completed"
        } else {
            "completed-with-failures"
        }
        .to_string(),
        started_at,
        updated_at: now_utc_string(),
        dataset: args.dataset.clone(),
        model: args.model.clone(),
        backend_model,
        prompt_number: args.prompt_number,
        length_policy: policy,
        batch_size: args.batch_size,
        temperature: args.temperature,
        seed: sampling.map(|value| value.seed),
        input: input_file_entry(&human_path, corpus_rows)?,
        output_path: output_path.display().to_string(),
        documents: prompts.len(),
        completed: outcome.records.len() - outcome.failed_ids.len(),
        failed_ids: outcome.failed_ids,
        below_min_length_ids: outcome.below_min_length_ids,
        duration_ms: started.elapsed().as_millis(),
    };

    let manifest_path = args
        .data_root
        .join("manifests")
        .join(format!("generate_run_{}.json", utc_compact_string(started_ts)));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        output = %output_path.display(),
        manifest = %manifest_path.display(),
        completed = manifest.completed,
        failed = manifest.failed_ids.len(),
        "generation completed"
    );

    Ok(())
}

/// Subset runs land in `ai_datasets/<model>/`, full runs in `ai_datasets/ALL_DATA/<model>/`.
pub(crate) fn default_output_path(args: &GenerateArgs) -> PathBuf {
    let ai_dir = ai_root(&args.data_root);
    let model_dir = match args.subset {
        Some(_) => ai_dir.join(&args.model),
        None => ai_dir.join("ALL_DATA").join(&args.model),
    };

    let file_name = match args.temperature {
        Some(temperature) => format!(
            "{}_prompt_{}_temp{}.ndjson",
            args.dataset, args.prompt_number, temperature
        ),
        None => format!("{}_prompt_{}.ndjson", args.dataset, args.prompt_number),
    };

    model_dir.join(file_name)
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, warn};

use crate::model::Document;
use crate::util::read_ndjson;

pub fn human_root(data_root: &Path) -> PathBuf {
    data_root.join("human_datasets")
}

pub fn ai_root(data_root: &Path) -> PathBuf {
    data_root.join("ai_datasets")
}

pub fn human_corpus_path(data_root: &Path, dataset: &str) -> PathBuf {
    human_root(data_root).join(dataset).join("data.ndjson")
}

pub fn load_human_corpus(path: &Path) -> Result<Vec<Document>> {
    read_ndjson(path).with_context(|| format!("failed to load human corpus {}", path.display()))
}

/// Optional filters applied together with the dataset name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub prompt_number: Option<u32>,
    pub temperature: Option<String>,
}

impl Selector {
    pub fn matches(&self, file: &AiFileName) -> bool {
        if self
            .prompt_number
            .is_some_and(|wanted| wanted != file.prompt_number)
        {
            return false;
        }

        match (&self.temperature, &file.temperature) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(found)) => temperatures_equal(wanted, found),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiFileName {
    pub dataset: String,
    pub prompt_number: u32,
    pub temperature: Option<String>,
}

pub fn ai_file_pattern() -> Result<Regex> {
    Regex::new(r"^(.+?)_prompt_(\d+)(?:_temp(\d+(?:\.\d+)?))?\.ndjson$")
        .context("failed to compile AI file name regex")
}

pub fn parse_ai_file_name(file_name: &str, pattern: &Regex) -> Option<AiFileName> {
    let captures = pattern.captures(file_name)?;

    Some(AiFileName {
        dataset: captures.get(1)?.as_str().to_string(),
        prompt_number: captures.get(2)?.as_str().parse().ok()?,
        temperature: captures.get(3).map(|m| m.as_str().to_string()),
    })
}

fn temperatures_equal(wanted: &str, found: &str) -> bool {
    if wanted == found {
        return true;
    }

    match (wanted.parse::<f64>(), found.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() < 1e-9,
        _ => false,
    }
}

/// Lists AI files for `dataset` under `<ai_dir>/<model>/`, one model after another in the
/// order given, each model's files sorted by path.
pub fn resolve_ai_paths(
    ai_dir: &Path,
    models: &[String],
    dataset: &str,
    selector: &Selector,
) -> Result<Vec<PathBuf>> {
    let pattern = ai_file_pattern()?;
    let mut paths = Vec::new();

    for model in models {
        let model_dir = ai_dir.join(model);
        if !model_dir.is_dir() {
            warn!(model = %model, path = %model_dir.display(), "model directory missing");
            continue;
        }

        let mut model_paths = Vec::new();
        let entries = fs::read_dir(&model_dir)
            .with_context(|| format!("failed to read {}", model_dir.display()))?;

        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", model_dir.display()))?;
            let path = entry.path();

            if !entry
                .file_type()
                .with_context(|| format!("failed to inspect file type: {}", path.display()))?
                .is_file()
            {
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some(parsed) = parse_ai_file_name(file_name, &pattern) else {
                debug!(path = %path.display(), "skipping file with unrecognised name");
                continue;
            };

            if parsed.dataset == dataset && selector.matches(&parsed) {
                model_paths.push(path);
            }
        }

        model_paths.sort();
        paths.extend(model_paths);
    }

    if paths.is_empty() {
        warn!(
            dataset = %dataset,
            models = %models.join(","),
            prompt_number = ?selector.prompt_number,
            temperature = ?selector.temperature,
            "no AI files matched; check the model and selector arguments"
        );
    }

    Ok(paths)
}

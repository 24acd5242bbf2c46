use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_TOKEN_PATH: &str = "tokens/hf_token.txt";
pub const DEFAULT_SEED: u64 = 129;

const GATED_MODEL_MARKERS: [&str; 1] = ["llama2"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationRequest {
    pub min_length: usize,
    pub max_new_tokens: usize,
    /// `None` selects greedy decoding.
    pub sampling: Option<SamplingConfig>,
}

/// A loaded generative model. Constructed once per run and lent to the engine.
pub trait TextGenerator {
    fn model_name(&self) -> &str;

    /// Returns exactly one completion per prompt, in prompt order.
    fn generate_batch(&self, prompts: &[&str], request: &GenerationRequest) -> Result<Vec<String>>;
}

pub fn is_gated_model(model_name: &str) -> bool {
    GATED_MODEL_MARKERS
        .iter()
        .any(|marker| model_name.contains(marker))
}

/// Reads the access token for gated model families. Other models need none.
pub fn load_model_token(model_name: &str, token_path: &Path) -> Result<Option<String>> {
    if !is_gated_model(model_name) {
        return Ok(None);
    }

    if !token_path.exists() {
        return Err(PipelineError::MissingModelToken {
            model: model_name.to_string(),
            path: token_path.to_path_buf(),
        }
        .into());
    }

    let token = fs::read_to_string(token_path)
        .with_context(|| format!("failed to read token file {}", token_path.display()))?;
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(PipelineError::MissingModelToken {
            model: model_name.to_string(),
            path: token_path.to_path_buf(),
        }
        .into());
    }

    Ok(Some(token))
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

/// Greedy requests pin temperature 0 and top_k 1; sampled requests carry the seed.
fn request_options(request: &GenerationRequest) -> GenerateOptions {
    match request.sampling {
        Some(sampling) => GenerateOptions {
            num_predict: request.max_new_tokens,
            temperature: sampling.temperature,
            seed: Some(sampling.seed),
            top_k: None,
        },
        None => GenerateOptions {
            num_predict: request.max_new_tokens,
            temperature: 0.0,
            seed: None,
            top_k: Some(1),
        },
    }
}

/// Generator backed by an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model_name: String,
    backend_model: String,
    token: Option<String>,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model_name: impl Into<String>,
        backend_model: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        // No request timeout; a hung backend hangs the run.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_name: model_name.into(),
            backend_model: backend_model.into(),
            token,
        })
    }

    fn generate_one(&self, prompt: &str, request: &GenerationRequest) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateReq<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            options: GenerateOptions,
        }

        #[derive(Deserialize)]
        struct GenerateResp {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url);
        let mut builder = self.client.post(url).json(&GenerateReq {
            model: &self.backend_model,
            prompt,
            stream: false,
            options: request_options(request),
        });
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .context("failed to call generate endpoint")?
            .error_for_status()
            .context("generate endpoint returned non-success status")?
            .json::<GenerateResp>()
            .context("failed to decode generate response")?;

        Ok(response.response.trim().to_string())
    }
}

impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn generate_batch(&self, prompts: &[&str], request: &GenerationRequest) -> Result<Vec<String>> {
        prompts
            .iter()
            .map(|prompt| self.generate_one(prompt, request))
            .collect()
    }
}

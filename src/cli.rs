use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::generator::{DEFAULT_ENDPOINT, DEFAULT_SEED, DEFAULT_TOKEN_PATH};

#[derive(Parser, Debug)]
#[command(
    name = "genalign",
    version,
    about = "Generate AI completions for human corpora and align them for analysis"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Generate(GenerateArgs),
    Resolve(ResolveArgs),
    Align(AlignArgs),
    Metrics(MetricsArgs),
    Inventory(InventoryArgs),
    Lengths(LengthsArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,

    #[arg(short = 'd', long, default_value = "stories")]
    pub dataset: String,

    #[arg(short = 'm', long, default_value = "beluga7b")]
    pub model: String,

    /// Model tag sent to the backend; defaults to `--model`.
    #[arg(long)]
    pub backend_model: Option<String>,

    #[arg(short = 'p', long, default_value_t = 1)]
    pub prompt_number: u32,

    /// Only generate for the first N documents.
    #[arg(long)]
    pub subset: Option<usize>,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// Enables sampled decoding; greedy decoding when omitted.
    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, default_value = DEFAULT_TOKEN_PATH)]
    pub token_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SelectorArgs {
    #[arg(long)]
    pub prompt_number: Option<u32>,

    /// Temperature tag as written in file names, e.g. `1` or `1.5`.
    #[arg(long)]
    pub temperature: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub ai_dir: Option<PathBuf>,

    #[arg(short = 'd', long)]
    pub dataset: String,

    #[arg(long = "model", required = true)]
    pub models: Vec<String>,

    #[command(flatten)]
    pub selector: SelectorArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AlignArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub ai_dir: Option<PathBuf>,

    #[arg(long = "dataset", required = true)]
    pub datasets: Vec<String>,

    #[arg(long = "model", required = true)]
    pub models: Vec<String>,

    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Last row index kept from each AI file (inclusive).
    #[arg(long)]
    pub subset: Option<usize>,

    /// `index:<n>`, `model:<name>` or `intersection`.
    #[arg(long, default_value = "index:1")]
    pub reference: String,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MetricsArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub ai_dir: Option<PathBuf>,

    #[arg(short = 'd', long, default_value = "dailymail_cnn")]
    pub dataset: String,

    #[arg(
        long = "model",
        default_values_t = ["beluga7b".to_string(), "llama2_chat13b".to_string(), "mistral7b".to_string(), "llama2_chat7b".to_string()]
    )]
    pub models: Vec<String>,

    #[arg(long)]
    pub prompt_number: Option<u32>,

    #[arg(long = "temperature", default_values_t = ["1".to_string(), "1.5".to_string()])]
    pub temperatures: Vec<String>,

    #[arg(long, default_value_t = false, conflicts_with = "ai_only")]
    pub human_only: bool,

    #[arg(long, default_value_t = false)]
    pub ai_only: bool,

    /// Worker threads; defaults to one less than the available cores.
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub ai_dir: Option<PathBuf>,

    #[arg(short = 'd', long)]
    pub dataset: String,

    #[arg(long = "model", required = true)]
    pub models: Vec<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LengthsArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,

    #[arg(long = "dataset")]
    pub datasets: Vec<String>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "datasets")]
    pub data_root: PathBuf,
}

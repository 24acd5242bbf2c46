use anyhow::Result;
use tracing::info;

use crate::cli::ResolveArgs;
use crate::commands::align::{Selector, ai_root, human_corpus_path, resolve_ai_paths};
use crate::datasets;

pub fn run(args: ResolveArgs) -> Result<()> {
    datasets::ensure_known(&args.dataset)?;

    let ai_dir = args
        .ai_dir
        .clone()
        .unwrap_or_else(|| ai_root(&args.data_root));
    let selector = Selector::from(&args.selector);
    let paths = resolve_ai_paths(&ai_dir, &args.models, &args.dataset, &selector)?;

    info!(
        dataset = %args.dataset,
        human = %human_corpus_path(&args.data_root, &args.dataset).display(),
        files = paths.len(),
        "resolved AI files"
    );
    for path in &paths {
        println!("{}", path.display());
    }

    Ok(())
}

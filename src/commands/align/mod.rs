mod combine;
mod normalize;
mod resolve;
mod run;

pub use normalize::{NormalizeOptions, RawTable, normalize};
pub use resolve::{
    Selector, ai_file_pattern, ai_root, human_corpus_path, load_human_corpus, parse_ai_file_name,
    resolve_ai_paths,
};
pub use run::run;

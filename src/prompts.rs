use crate::datasets;
use crate::error::PipelineError;
use crate::model::{Document, PromptRecord};

const TEMPLATES: &[(&str, u32, &str)] = &[
    // summarization
    ("dailymail_cnn", 1, "summarize the main points of this article: "),
    ("dailymail_cnn", 2, "create a summary of the news article: "),
    ("dailymail_cnn", 3, "write a short summarised text of the news article: "),
    // continuation
    ("stories", 1, "continue the story: "),
    ("stories", 2, "write a small text based on this story: "),
    ("stories", 3, "complete the text: "),
    ("stories", 4, "complete the story: "),
    // paraphrase
    ("mrpc", 1, "paraphrase this text: "),
    ("mrpc", 2, "summarize this text: "),
    ("mrpc", 3, "summarize this: "),
    ("mrpc", 4, "create a summary of this: "),
    // dialogue response
    ("dailydialog", 1, "respond to the final sentence: "),
    ("dailydialog", 2, "continue this dialog: "),
];

pub fn template(dataset: &str, prompt_number: u32) -> Result<&'static str, PipelineError> {
    datasets::ensure_known(dataset)?;

    TEMPLATES
        .iter()
        .find(|(name, number, _)| *name == dataset && *number == prompt_number)
        .map(|(_, _, text)| *text)
        .ok_or_else(|| PipelineError::UnknownPrompt {
            dataset: dataset.to_string(),
            prompt_number,
            valid: prompt_numbers(dataset)
                .iter()
                .map(u32::to_string)
                .collect::<Vec<String>>()
                .join(", "),
        })
}

pub fn build(dataset: &str, prompt_number: u32, source: &str) -> Result<String, PipelineError> {
    let prefix = template(dataset, prompt_number)?;
    let mut prompt = String::with_capacity(prefix.len() + source.len());
    prompt.push_str(prefix);
    prompt.push_str(source);
    Ok(prompt)
}

pub fn prompt_numbers(dataset: &str) -> Vec<u32> {
    TEMPLATES
        .iter()
        .filter(|(name, _, _)| *name == dataset)
        .map(|(_, number, _)| *number)
        .collect()
}

pub fn build_prompt_records(
    dataset: &str,
    prompt_number: u32,
    documents: &[Document],
) -> Result<Vec<PromptRecord>, PipelineError> {
    documents
        .iter()
        .map(|doc| {
            Ok(PromptRecord {
                id: doc.id.clone(),
                prompt: build(dataset, prompt_number, &doc.source)?,
                prompt_number,
            })
        })
        .collect()
}

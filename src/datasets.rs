use serde::Serialize;

use crate::error::PipelineError;

pub const DATASETS: [&str; 4] = ["dailymail_cnn", "stories", "mrpc", "dailydialog"];

/// Token bounds handed to the generator for every document of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LengthPolicy {
    pub min_tokens: usize,
    pub max_new_tokens: usize,
}

const LENGTH_POLICIES: [(&str, LengthPolicy); 4] = [
    (
        "dailymail_cnn",
        LengthPolicy {
            min_tokens: 6,
            max_new_tokens: 433,
        },
    ),
    (
        "stories",
        LengthPolicy {
            min_tokens: 112,
            max_new_tokens: 1055,
        },
    ),
    (
        "mrpc",
        LengthPolicy {
            min_tokens: 8,
            max_new_tokens: 47,
        },
    ),
    (
        "dailydialog",
        LengthPolicy {
            min_tokens: 2,
            max_new_tokens: 220,
        },
    ),
];

pub fn lookup(dataset: &str) -> Result<LengthPolicy, PipelineError> {
    LENGTH_POLICIES
        .iter()
        .find(|(name, _)| *name == dataset)
        .map(|(_, policy)| *policy)
        .ok_or_else(|| unknown_dataset(dataset))
}

pub fn ensure_known(dataset: &str) -> Result<(), PipelineError> {
    lookup(dataset).map(|_| ())
}

fn unknown_dataset(dataset: &str) -> PipelineError {
    PipelineError::UnknownDataset {
        name: dataset.to_string(),
        valid: DATASETS.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_documented_bounds() {
        assert_eq!(
            lookup("dailymail_cnn").unwrap(),
            LengthPolicy {
                min_tokens: 6,
                max_new_tokens: 433
            }
        );
        assert_eq!(
            lookup("stories").unwrap(),
            LengthPolicy {
                min_tokens: 112,
                max_new_tokens: 1055
            }
        );
        assert_eq!(
            lookup("mrpc").unwrap(),
            LengthPolicy {
                min_tokens: 8,
                max_new_tokens: 47
            }
        );
        assert_eq!(
            lookup("dailydialog").unwrap(),
            LengthPolicy {
                min_tokens: 2,
                max_new_tokens: 220
            }
        );
    }

    #[test]
    fn lookup_rejects_unknown_dataset_and_lists_valid_names() {
        let err = lookup("wikipedia").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownDataset { .. }));

        let message = err.to_string();
        for name in DATASETS {
            assert!(message.contains(name), "{message} should mention {name}");
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(lookup("MRPC").is_err());
        assert!(lookup("").is_err());
    }
}

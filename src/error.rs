// Error taxonomy for the topic discovery pipeline.
//
// Every variant is fatal: fitting is deterministic given its inputs, so
// nothing here is retried. Label extraction failures are not errors at all;
// they degrade to a top-term label inside the labeler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopicError {
    /// Invalid parameter or parameter combination, detected before fitting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Nothing survived preprocessing.
    #[error("corpus is empty after preprocessing ({records} input records)")]
    EmptyCorpus { records: usize },

    /// Every term was filtered out while building the vocabulary.
    #[error(
        "vocabulary is empty: all terms of {documents} documents were filtered \
         (min_df={min_df}, max_df={max_df}, min_term_length={min_term_length})"
    )]
    EmptyVocabulary {
        documents: usize,
        min_df: usize,
        max_df: f64,
        min_term_length: usize,
    },
}

impl TopicError {
    /// True for both the empty-corpus and empty-vocabulary cases.
    pub fn is_empty_corpus(&self) -> bool {
        matches!(
            self,
            TopicError::EmptyCorpus { .. } | TopicError::EmptyVocabulary { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TopicError>;

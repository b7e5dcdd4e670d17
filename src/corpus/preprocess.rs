// Text normalization: raw headline records -> lowercase token streams.
//
// Cleaning lowercases, strips everything that is not an ASCII letter or
// whitespace (punctuation and digits alike), and collapses runs of
// whitespace. Any Unicode space, such as a non-breaking space, separates
// words. Records that are empty after cleaning are dropped, but every
// surviving document remembers its position in the input so callers can
// line results back up with the original corpus.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TopicError};

static NON_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z\s]").expect("static pattern is valid"));

/// A document that survived cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanDocument {
    /// Position of the record in the raw input
    pub source_index: usize,
    /// Cleaned text, tokens joined by single spaces
    pub text: String,
    pub tokens: Vec<String>,
}

/// The output of preprocessing a whole corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessedCorpus {
    /// Surviving documents in input order
    pub documents: Vec<CleanDocument>,
    /// Input positions of records that were empty after cleaning
    pub dropped: Vec<usize>,
    /// Number of raw records seen
    pub records: usize,
}

impl PreprocessedCorpus {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Token slices in document order, the input shape the vocabulary builder takes.
    pub fn token_lists(&self) -> Vec<&[String]> {
        self.documents.iter().map(|d| d.tokens.as_slice()).collect()
    }
}

/// Stateless text cleaner.
#[derive(Debug, Default, Clone, Copy)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a single record. May return an empty string.
    pub fn clean(&self, text: &str) -> String {
        // The pattern's \s is ASCII-only
        let lower: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        let letters = NON_LETTER.replace_all(&lower, "");
        letters.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Clean every record, dropping the ones that end up empty.
    ///
    /// Fails with `EmptyCorpus` when nothing survives, so an all-noise input
    /// can never turn into a model with zero documents.
    pub fn process<S: AsRef<str>>(&self, records: &[S]) -> Result<PreprocessedCorpus> {
        let mut documents = Vec::with_capacity(records.len());
        let mut dropped = Vec::new();

        for (source_index, record) in records.iter().enumerate() {
            let text = self.clean(record.as_ref());
            if text.is_empty() {
                dropped.push(source_index);
                continue;
            }
            let tokens = text.split(' ').map(str::to_string).collect();
            documents.push(CleanDocument {
                source_index,
                text,
                tokens,
            });
        }

        if documents.is_empty() {
            return Err(TopicError::EmptyCorpus {
                records: records.len(),
            });
        }

        info!(
            records = records.len(),
            documents = documents.len(),
            dropped = dropped.len(),
            "Preprocessed corpus"
        );

        Ok(PreprocessedCorpus {
            documents,
            dropped,
            records: records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_punctuation_and_digits() {
        let p = Preprocessor::new();
        assert_eq!(
            p.clean("  Stocks RALLY, after 2 rate-cuts!!  "),
            "stocks rally after ratecuts"
        );
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("fed\t\tsignals \n rate   cut"), "fed signals rate cut");
    }

    #[test]
    fn test_clean_splits_on_unicode_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("rate\u{a0}cut"), "rate cut");
        assert_eq!(p.clean("Fed\u{2003}signals\u{3000}cut"), "fed signals cut");
    }

    #[test]
    fn test_process_keeps_source_indices() {
        let p = Preprocessor::new();
        let records = ["Markets rally", "2024!!!", "", "Tech earnings beat"];
        let corpus = p.process(&records).unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.records, 4);
        assert_eq!(corpus.dropped, vec![1, 2]);
        assert_eq!(corpus.documents[0].source_index, 0);
        assert_eq!(corpus.documents[1].source_index, 3);
        assert_eq!(corpus.documents[1].tokens, vec!["tech", "earnings", "beat"]);
    }

    #[test]
    fn test_process_all_empty_fails() {
        let p = Preprocessor::new();
        let err = p.process(&["123", "...", "   "]).unwrap_err();
        assert!(matches!(err, TopicError::EmptyCorpus { records: 3 }));
    }
}

// Vocabulary and sparse document-term matrix construction.
//
// One pass over the token streams counts document frequencies, then terms
// are filtered by length, stop-word list and the [min_df, max_df * N]
// document frequency window. Surviving terms get dense indices in
// first-seen order, so the same corpus and thresholds always produce the
// same vocabulary. Both structures are frozen once built.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use stop_words::{get, LANGUAGE};
use tracing::info;

use crate::error::{Result, TopicError};

/// Filtering thresholds for vocabulary construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Minimum number of documents a term must appear in
    pub min_df: usize,
    /// Maximum fraction of documents a term may appear in (0, 1]
    pub max_df: f64,
    /// Terms shorter than this many characters are dropped
    pub min_term_length: usize,
    /// Drop English stop words before counting
    pub remove_stop_words: bool,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            min_df: 3,
            max_df: 0.7,
            min_term_length: 3,
            remove_stop_words: true,
        }
    }
}

impl VocabularyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(TopicError::Configuration(format!(
                "max_df must be in (0, 1], got {}",
                self.max_df
            )));
        }
        if self.min_term_length == 0 {
            return Err(TopicError::Configuration(
                "min_term_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Term <-> index mapping with per-term document frequencies.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: Vec<String>,
    index: HashMap<String, usize>,
    document_frequency: Vec<usize>,
    num_documents: usize,
    /// Terms dropped because they exceeded max_df
    too_common: BTreeSet<String>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn document_frequency(&self, index: usize) -> usize {
        self.document_frequency.get(index).copied().unwrap_or(0)
    }

    /// Number of documents the vocabulary was built from.
    pub fn num_documents(&self) -> usize {
        self.num_documents
    }

    /// Document frequency of every term as a fraction of the corpus,
    /// indexed by vocabulary position.
    pub fn document_frequency_fractions(&self) -> Vec<f64> {
        let n = self.num_documents.max(1) as f64;
        self.document_frequency
            .iter()
            .map(|&df| df as f64 / n)
            .collect()
    }

    /// Whether `term` was excluded for appearing in too many documents.
    pub fn is_too_common(&self, term: &str) -> bool {
        self.too_common.contains(term)
    }

    /// Terms excluded by max_df, sorted.
    pub fn too_common_terms(&self) -> impl Iterator<Item = &str> {
        self.too_common.iter().map(String::as_str)
    }
}

/// Sparse (documents x terms) count matrix in CSR layout.
#[derive(Debug, Clone)]
pub struct DocumentTermMatrix {
    counts: CsMat<u32>,
    total_tokens: u64,
}

impl DocumentTermMatrix {
    /// Build from per-document `(term, count)` lists. Zero counts are skipped.
    pub fn from_rows(rows: &[Vec<(usize, u32)>], num_terms: usize) -> Self {
        let mut tri = TriMat::new((rows.len(), num_terms));
        let mut total_tokens = 0u64;
        for (doc, row) in rows.iter().enumerate() {
            for &(term, count) in row {
                if count > 0 && term < num_terms {
                    tri.add_triplet(doc, term, count);
                    total_tokens += u64::from(count);
                }
            }
        }
        Self {
            counts: tri.to_csr(),
            total_tokens,
        }
    }

    pub fn num_documents(&self) -> usize {
        self.counts.rows()
    }

    pub fn num_terms(&self) -> usize {
        self.counts.cols()
    }

    /// True when there are no documents or no terms.
    pub fn is_empty(&self) -> bool {
        self.num_documents() == 0 || self.num_terms() == 0
    }

    /// Stored (document, term) entries.
    pub fn nnz(&self) -> usize {
        self.counts.nnz()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Non-zero `(term, count)` entries of one document, ascending by term.
    pub fn row(&self, doc: usize) -> Vec<(usize, u32)> {
        self.counts
            .outer_view(doc)
            .map(|row| row.iter().map(|(term, &count)| (term, count)).collect())
            .unwrap_or_default()
    }

    /// Number of in-vocabulary tokens in one document.
    pub fn document_length(&self, doc: usize) -> u64 {
        self.counts
            .outer_view(doc)
            .map(|row| row.data().iter().map(|&c| u64::from(c)).sum())
            .unwrap_or(0)
    }
}

/// Builds the vocabulary and the document-term matrix in one go.
pub struct VocabularyBuilder {
    config: VocabularyConfig,
    stop_words: HashSet<String>,
}

impl VocabularyBuilder {
    pub fn new(config: VocabularyConfig) -> Result<Self> {
        config.validate()?;
        let stop_words = if config.remove_stop_words {
            get(LANGUAGE::English).into_iter().collect()
        } else {
            HashSet::new()
        };
        Ok(Self { config, stop_words })
    }

    fn is_candidate(&self, token: &str) -> bool {
        token.chars().count() >= self.config.min_term_length && !self.stop_words.contains(token)
    }

    /// Build the frozen vocabulary and count matrix from cleaned token streams.
    ///
    /// Fails with `EmptyVocabulary` if the thresholds exclude every term.
    pub fn build<T: AsRef<[String]>>(
        &self,
        documents: &[T],
    ) -> Result<(Vocabulary, DocumentTermMatrix)> {
        let num_documents = documents.len();
        if num_documents == 0 {
            return Err(TopicError::EmptyCorpus { records: 0 });
        }

        // First-seen order of candidate terms, plus their document frequencies
        let mut first_seen: Vec<&str> = Vec::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in documents {
            let mut seen_here: HashSet<&str> = HashSet::new();
            for token in doc.as_ref() {
                let token = token.as_str();
                if !self.is_candidate(token) || !seen_here.insert(token) {
                    continue;
                }
                let df = doc_freq.entry(token).or_insert(0);
                if *df == 0 {
                    first_seen.push(token);
                }
                *df += 1;
            }
        }

        let max_df_count = self.config.max_df * num_documents as f64;
        let mut terms = Vec::new();
        let mut document_frequency = Vec::new();
        let mut too_common = BTreeSet::new();
        for term in first_seen {
            let df = doc_freq[term];
            if df as f64 > max_df_count {
                too_common.insert(term.to_string());
                continue;
            }
            if df < self.config.min_df {
                continue;
            }
            terms.push(term.to_string());
            document_frequency.push(df);
        }

        if terms.is_empty() {
            return Err(TopicError::EmptyVocabulary {
                documents: num_documents,
                min_df: self.config.min_df,
                max_df: self.config.max_df,
                min_term_length: self.config.min_term_length,
            });
        }

        let index: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let rows: Vec<Vec<(usize, u32)>> = documents
            .iter()
            .map(|doc| {
                let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
                for token in doc.as_ref() {
                    if let Some(&i) = index.get(token.as_str()) {
                        *counts.entry(i).or_insert(0) += 1;
                    }
                }
                counts.into_iter().collect()
            })
            .collect();

        let matrix = DocumentTermMatrix::from_rows(&rows, terms.len());

        info!(
            documents = num_documents,
            terms = terms.len(),
            too_common = too_common.len(),
            tokens = matrix.total_tokens(),
            nonzero = matrix.nnz(),
            "Built vocabulary"
        );

        let vocabulary = Vocabulary {
            terms,
            index,
            document_frequency,
            num_documents,
            too_common,
        };

        Ok((vocabulary, matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<Vec<String>> {
        texts
            .iter()
            .map(|t| t.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    fn builder(min_df: usize, max_df: f64, min_term_length: usize) -> VocabularyBuilder {
        VocabularyBuilder::new(VocabularyConfig {
            min_df,
            max_df,
            min_term_length,
            remove_stop_words: false,
        })
        .unwrap()
    }

    #[test]
    fn test_first_seen_order() {
        let corpus = docs(&["zeta alpha", "alpha mid zeta"]);
        let (vocab, _) = builder(1, 1.0, 1).build(&corpus).unwrap();
        assert_eq!(vocab.terms(), &["zeta", "alpha", "mid"]);
        assert_eq!(vocab.index_of("mid"), Some(2));
        assert_eq!(vocab.document_frequency(0), 2);
    }

    #[test]
    fn test_counts_in_matrix() {
        let corpus = docs(&["rate cut rate", "cut"]);
        let (vocab, dtm) = builder(1, 1.0, 1).build(&corpus).unwrap();
        let rate = vocab.index_of("rate").unwrap();
        let cut = vocab.index_of("cut").unwrap();
        assert_eq!(dtm.row(0), vec![(rate, 2), (cut, 1)]);
        assert_eq!(dtm.row(1), vec![(cut, 1)]);
        assert_eq!(dtm.total_tokens(), 4);
        assert_eq!(dtm.nnz(), 3);
        assert_eq!(dtm.document_length(0), 3);
    }

    #[test]
    fn test_document_frequency_window() {
        // "common" in 3/3 docs, "rare" in 1/3, "mid" in 2/3
        let corpus = docs(&["common mid rare", "common mid", "common"]);
        let (vocab, dtm) = builder(2, 0.7, 1).build(&corpus).unwrap();
        assert_eq!(vocab.terms(), &["mid"]);
        assert!(vocab.is_too_common("common"));
        assert!(!vocab.is_too_common("rare"));
        // Document 2 keeps its row, it is just empty
        assert_eq!(dtm.num_documents(), 3);
        assert!(dtm.row(2).is_empty());
    }

    #[test]
    fn test_min_term_length() {
        let corpus = docs(&["ai chip war", "ai chip"]);
        let (vocab, _) = builder(1, 1.0, 3).build(&corpus).unwrap();
        assert_eq!(vocab.terms(), &["chip", "war"]);
    }

    #[test]
    fn test_stop_words_removed() {
        let b = VocabularyBuilder::new(VocabularyConfig {
            min_df: 1,
            max_df: 1.0,
            min_term_length: 1,
            remove_stop_words: true,
        })
        .unwrap();
        let (vocab, _) = b.build(&docs(&["the stocks and the bonds"])).unwrap();
        assert!(vocab.index_of("the").is_none());
        assert!(vocab.index_of("and").is_none());
        assert!(vocab.index_of("stocks").is_some());
    }

    #[test]
    fn test_everything_filtered_fails() {
        let corpus = docs(&["one two", "three four"]);
        let err = builder(5, 1.0, 1).build(&corpus).unwrap_err();
        assert!(matches!(err, TopicError::EmptyVocabulary { min_df: 5, .. }));
        assert!(err.is_empty_corpus());
    }

    #[test]
    fn test_invalid_max_df_rejected() {
        let result = VocabularyBuilder::new(VocabularyConfig {
            max_df: 0.0,
            ..Default::default()
        });
        assert!(matches!(result, Err(TopicError::Configuration(_))));
    }
}

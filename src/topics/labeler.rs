// Topic labeling: top terms, exemplar documents and a short key-phrase label.
//
// The label is driven by exemplar text, not by Phi alone: the key phrase is
// extracted from the topic's highest-weight documents and can be a phrase
// that never made the top-term list. When the exemplars yield no usable
// candidate the label falls back to the topic's top term, so labeling never
// fails a run.

use std::collections::HashSet;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use stop_words::{get, LANGUAGE};
use tracing::{debug, info};

use super::keyphrase::{
    candidate_phrases, content_tokens, select_with_diversity, shortlist, CosineScorer, Scored,
    ScoringContext,
};
use super::model::TopicModel;
use super::traits::PhraseScorer;
use crate::corpus::preprocess::Preprocessor;
use crate::corpus::vocabulary::Vocabulary;
use crate::error::{Result, TopicError};

/// Labeling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Terms listed per topic
    pub top_terms: usize,
    /// Highest-weight documents whose text drives the label
    pub exemplars: usize,
    /// MMR trade-off: 0 is pure relevance, 1 is pure novelty
    pub diversity: f64,
    /// Most relevant candidates kept before the diversity step
    pub candidate_pool: usize,
    /// Exemplar texts kept for display
    pub examples: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            top_terms: 9,
            exemplars: 5,
            diversity: 0.3,
            candidate_pool: 20,
            examples: 3,
        }
    }
}

impl LabelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_terms == 0 || self.exemplars == 0 || self.candidate_pool == 0 {
            return Err(TopicError::Configuration(
                "top_terms, exemplars and candidate_pool must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.diversity) {
            return Err(TopicError::Configuration(format!(
                "diversity must be in [0, 1], got {}",
                self.diversity
            )));
        }
        Ok(())
    }
}

/// Where a topic's main label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    KeyPhrase,
    /// Key-phrase extraction produced nothing; the top Phi term was used
    TopTerm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermWeight {
    pub term: String,
    pub weight: f64,
}

/// Label and supporting evidence for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicLabel {
    pub topic: usize,
    pub label: String,
    pub source: LabelSource,
    /// Descending weight, ascending vocabulary index on ties
    pub top_terms: Vec<TermWeight>,
    /// Document rows, descending Theta weight, ascending row on ties
    pub exemplars: Vec<usize>,
    /// Text of the first few exemplars
    pub examples: Vec<String>,
}

/// Indices of the `n` largest values, descending, lower index first on ties.
pub fn top_indices(values: ArrayView1<'_, f64>, n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    order.truncate(n);
    order
}

pub struct TopicLabeler {
    config: LabelConfig,
    scorer: Box<dyn PhraseScorer>,
    stop_words: Vec<String>,
    stop_set: HashSet<String>,
    preprocessor: Preprocessor,
}

impl TopicLabeler {
    /// Labeler with the default cosine scorer.
    pub fn new(config: LabelConfig) -> Result<Self> {
        Self::with_scorer(config, Box::new(CosineScorer))
    }

    pub fn with_scorer(config: LabelConfig, scorer: Box<dyn PhraseScorer>) -> Result<Self> {
        config.validate()?;
        let stop_words: Vec<String> = get(LANGUAGE::English);
        let stop_set = stop_words.iter().cloned().collect();
        Ok(Self {
            config,
            scorer,
            stop_words,
            stop_set,
            preprocessor: Preprocessor::new(),
        })
    }

    /// Label every topic. `texts[d]` is the text of document row `d`; it is
    /// cleaned again here, so original records can be passed for display.
    pub fn label_topics<S: AsRef<str>>(
        &self,
        model: &TopicModel,
        vocabulary: &Vocabulary,
        texts: &[S],
    ) -> Result<Vec<TopicLabel>> {
        if texts.len() != model.num_documents() {
            return Err(TopicError::Configuration(format!(
                "{} texts supplied for a model of {} documents",
                texts.len(),
                model.num_documents()
            )));
        }
        if vocabulary.len() != model.num_terms() {
            return Err(TopicError::Configuration(format!(
                "vocabulary has {} terms but the model has {}",
                vocabulary.len(),
                model.num_terms()
            )));
        }

        let df_fractions = vocabulary.document_frequency_fractions();
        let labels: Vec<TopicLabel> = (0..model.num_topics())
            .map(|topic| self.label_topic(topic, model, vocabulary, &df_fractions, texts))
            .collect();

        let fallbacks = labels
            .iter()
            .filter(|l| l.source == LabelSource::TopTerm)
            .count();
        info!(
            topics = labels.len(),
            fallbacks,
            scorer = self.scorer.name(),
            "Labeled topics"
        );
        Ok(labels)
    }

    fn label_topic<S: AsRef<str>>(
        &self,
        topic: usize,
        model: &TopicModel,
        vocabulary: &Vocabulary,
        df_fractions: &[f64],
        texts: &[S],
    ) -> TopicLabel {
        let phi_row = model.topic_term().row(topic);
        let top_terms: Vec<TermWeight> = top_indices(phi_row, self.config.top_terms)
            .into_iter()
            .filter_map(|i| {
                vocabulary.term(i).map(|term| TermWeight {
                    term: term.to_string(),
                    weight: phi_row[i],
                })
            })
            .collect();

        let exemplars = top_indices(model.doc_topic().column(topic), self.config.exemplars);
        let examples = exemplars
            .iter()
            .take(self.config.examples)
            .map(|&d| texts[d].as_ref().to_string())
            .collect();

        let exemplar_tokens: Vec<Vec<String>> = exemplars
            .iter()
            .map(|&d| {
                let cleaned = self.preprocessor.clean(texts[d].as_ref());
                let tokens: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();
                content_tokens(&tokens, &self.stop_set)
            })
            .collect();

        let (label, source) = match self.extract_phrase(&exemplar_tokens, vocabulary, df_fractions) {
            Some(phrase) => (phrase, LabelSource::KeyPhrase),
            None => {
                let fallback = top_terms
                    .first()
                    .map(|t| t.term.clone())
                    .unwrap_or_else(|| format!("topic {topic}"));
                info!(topic, label = %fallback, "No key phrase found, using top term");
                (fallback, LabelSource::TopTerm)
            }
        };
        debug!(topic, label = %label, ?source, "Topic labeled");

        TopicLabel {
            topic,
            label,
            source,
            top_terms,
            exemplars,
            examples,
        }
    }

    fn extract_phrase(
        &self,
        exemplar_tokens: &[Vec<String>],
        vocabulary: &Vocabulary,
        df_fractions: &[f64],
    ) -> Option<String> {
        let phrases = candidate_phrases(exemplar_tokens);
        if phrases.is_empty() {
            return None;
        }
        let context =
            ScoringContext::from_documents(exemplar_tokens, vocabulary, &self.stop_words);
        let scores = self.scorer.score_all(&phrases, &context);
        let scored: Vec<Scored<String>> = phrases
            .into_iter()
            .zip(scores)
            .map(|(item, relevance)| Scored { item, relevance })
            .filter(|s| s.relevance > 0.0)
            .collect();
        let pool = shortlist(scored, self.config.candidate_pool);

        let redundancy = |phrase: &String| {
            phrase
                .split_whitespace()
                .map(|word| corpus_commonness(word, vocabulary, df_fractions))
                .fold(0.0, f64::max)
        };
        select_with_diversity(&pool, self.config.diversity, redundancy).map(|s| s.item.clone())
    }
}

/// Fraction of corpus documents containing `word`. Terms dropped for being
/// too common count as 1, unknown terms as 0.
fn corpus_commonness(word: &str, vocabulary: &Vocabulary, df_fractions: &[f64]) -> f64 {
    if vocabulary.is_too_common(word) {
        return 1.0;
    }
    vocabulary
        .index_of(word)
        .and_then(|i| df_fractions.get(i).copied())
        .unwrap_or(0.0)
}

// Key-phrase candidates, default relevance scoring and diversity-aware selection.
//
// Candidates are the 1- and 2-word phrases of each exemplar document after
// stop words and one-letter tokens are removed. Bigrams never span two
// exemplars. The scoring context turns the exemplar text into one weight per
// word, combining raw frequency with TF-IDF across the exemplars:
//
//   weight(w) = tf(w) / max_tf * (1 + tfidf(w) / max_tfidf)
//
// The default scorer is the cosine between the phrase's words and that weight
// vector. Selection is maximal marginal relevance, top-1:
//
//   mmr = (1 - diversity) * relevance - diversity * redundancy

use std::collections::{BTreeMap, HashSet};

use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};

use super::traits::PhraseScorer;
use crate::corpus::vocabulary::Vocabulary;

/// Shortest token allowed in a candidate phrase.
const MIN_PHRASE_TOKEN_LEN: usize = 2;

/// Drop stop words and one-letter tokens from a cleaned token stream.
pub fn content_tokens(tokens: &[String], stop_words: &HashSet<String>) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| t.chars().count() >= MIN_PHRASE_TOKEN_LEN && !stop_words.contains(t.as_str()))
        .cloned()
        .collect()
}

/// Unique unigrams and bigrams in first-seen order.
pub fn candidate_phrases(documents: &[Vec<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut phrases = Vec::new();
    for tokens in documents {
        for (i, token) in tokens.iter().enumerate() {
            if seen.insert(token.clone()) {
                phrases.push(token.clone());
            }
            if let Some(next) = tokens.get(i + 1) {
                let bigram = format!("{token} {next}");
                if seen.insert(bigram.clone()) {
                    phrases.push(bigram);
                }
            }
        }
    }
    phrases
}

/// Word weights of one topic's exemplar text.
///
/// Vocabulary terms get one slot each, addressed by vocabulary index.
/// Exemplar words the vocabulary filtered out (too short, too rare or too
/// common) live in a small ordered side table.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    vocabulary: &'a Vocabulary,
    weights: Vec<f64>,
    outside: BTreeMap<String, f64>,
    norm: f64,
}

impl<'a> ScoringContext<'a> {
    /// A context with no weighted words.
    pub fn empty(vocabulary: &'a Vocabulary) -> Self {
        Self {
            vocabulary,
            weights: vec![0.0; vocabulary.len()],
            outside: BTreeMap::new(),
            norm: 0.0,
        }
    }

    /// Build from the content tokens of each exemplar document.
    pub fn from_documents(
        documents: &[Vec<String>],
        vocabulary: &'a Vocabulary,
        stop_words: &[String],
    ) -> Self {
        let mut tf = vec![0usize; vocabulary.len()];
        let mut outside_tf: BTreeMap<&str, usize> = BTreeMap::new();
        for token in documents.iter().flatten() {
            match vocabulary.index_of(token) {
                Some(i) => tf[i] += 1,
                None => *outside_tf.entry(token.as_str()).or_insert(0) += 1,
            }
        }
        let distinct = tf.iter().filter(|&&c| c > 0).count() + outside_tf.len();
        if distinct == 0 {
            return Self::empty(vocabulary);
        }

        let texts: Vec<String> = documents
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| d.join(" "))
            .collect();
        let params = TfIdfParams::UnprocessedDocuments(&texts, stop_words, None);
        let mut tfidf = vec![0.0; vocabulary.len()];
        let mut outside_tfidf: BTreeMap<String, f64> = BTreeMap::new();
        for (word, score) in TfIdf::new(params).get_ranked_word_scores(distinct) {
            let score = f64::from(score).max(0.0);
            match vocabulary.index_of(&word) {
                Some(i) => tfidf[i] = score,
                None => {
                    outside_tfidf.insert(word, score);
                }
            }
        }

        let max_tf = tf
            .iter()
            .chain(outside_tf.values())
            .copied()
            .max()
            .unwrap_or(1) as f64;
        let max_tfidf = tfidf
            .iter()
            .chain(outside_tfidf.values())
            .copied()
            .fold(0.0, f64::max);
        let weigh = |count: usize, score: f64| {
            let distinctness = if max_tfidf > 0.0 { score / max_tfidf } else { 0.0 };
            count as f64 / max_tf * (1.0 + distinctness)
        };

        let weights: Vec<f64> = tf
            .iter()
            .zip(&tfidf)
            .map(|(&count, &score)| weigh(count, score))
            .collect();
        let outside: BTreeMap<String, f64> = outside_tf
            .into_iter()
            .map(|(word, count)| {
                let score = outside_tfidf.get(word).copied().unwrap_or(0.0);
                (word.to_string(), weigh(count, score))
            })
            .collect();
        let norm = weights
            .iter()
            .chain(outside.values())
            .map(|w| w * w)
            .sum::<f64>()
            .sqrt();

        Self {
            vocabulary,
            weights,
            outside,
            norm,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.norm <= 0.0
    }

    /// Weight of the vocabulary term at `index`, 0 when out of range.
    pub fn weight_at(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(0.0)
    }

    /// Weight of one word, 0 when absent.
    pub fn weight(&self, word: &str) -> f64 {
        match self.vocabulary.index_of(word) {
            Some(i) => self.weight_at(i),
            None => self.outside.get(word).copied().unwrap_or(0.0),
        }
    }

    /// Euclidean norm of the weight vector.
    pub fn norm(&self) -> f64 {
        self.norm
    }
}

/// Cosine similarity between a phrase's word set and the context weights.
#[derive(Debug, Default, Clone, Copy)]
pub struct CosineScorer;

impl PhraseScorer for CosineScorer {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn score(&self, phrase: &str, context: &ScoringContext<'_>) -> f64 {
        let words: HashSet<&str> = phrase.split_whitespace().collect();
        if words.is_empty() || context.norm() <= 0.0 {
            return 0.0;
        }
        let dot: f64 = words.iter().map(|w| context.weight(w)).sum();
        dot / ((words.len() as f64).sqrt() * context.norm())
    }
}

/// A candidate with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub relevance: f64,
}

/// Keep the `pool` most relevant candidates. Ties keep candidate order and
/// non-finite scores are dropped.
pub fn shortlist<T>(candidates: Vec<Scored<T>>, pool: usize) -> Vec<Scored<T>> {
    let mut kept: Vec<Scored<T>> = candidates
        .into_iter()
        .filter(|c| c.relevance.is_finite())
        .collect();
    // Stable sort, so equal relevance keeps first-seen order
    kept.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    kept.truncate(pool);
    kept
}

/// Top-1 maximal marginal relevance over already-scored candidates.
///
/// `redundancy` maps a candidate to [0, 1]; ties go to the earlier candidate.
pub fn select_with_diversity<T, R>(
    candidates: &[Scored<T>],
    diversity: f64,
    redundancy: R,
) -> Option<&Scored<T>>
where
    R: Fn(&T) -> f64,
{
    let mut best: Option<(&Scored<T>, f64)> = None;
    for candidate in candidates {
        if !candidate.relevance.is_finite() {
            continue;
        }
        let mmr = (1.0 - diversity) * candidate.relevance - diversity * redundancy(&candidate.item);
        match best {
            Some((_, top)) if mmr <= top => {}
            _ => best = Some((candidate, mmr)),
        }
    }
    best.map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::vocabulary::{VocabularyBuilder, VocabularyConfig};

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn vocabulary(docs: &[Vec<String>], min_df: usize) -> Vocabulary {
        let (vocab, _) = VocabularyBuilder::new(VocabularyConfig {
            min_df,
            max_df: 1.0,
            min_term_length: 1,
            remove_stop_words: false,
        })
        .unwrap()
        .build(docs)
        .unwrap();
        vocab
    }

    #[test]
    fn test_candidates_stay_within_documents() {
        let docs = vec![tokens("rate cut"), tokens("fed rate")];
        let phrases = candidate_phrases(&docs);
        assert_eq!(phrases, vec!["rate", "rate cut", "cut", "fed", "fed rate"]);
        assert!(!phrases.contains(&"cut fed".to_string()));
    }

    #[test]
    fn test_content_tokens_filters_short_and_stop_words() {
        let stop: HashSet<String> = ["the".to_string()].into_iter().collect();
        assert_eq!(
            content_tokens(&tokens("the a storm hits"), &stop),
            vec!["storm", "hits"]
        );
    }

    #[test]
    fn test_frequent_word_scores_higher() {
        let docs = vec![tokens("storm coast"), tokens("storm flood"), tokens("storm")];
        let vocab = vocabulary(&docs, 1);
        let ctx = ScoringContext::from_documents(&docs, &vocab, &[]);
        let scorer = CosineScorer;
        assert!(scorer.score("storm", &ctx) > scorer.score("coast", &ctx));
        assert_eq!(scorer.score("unrelated", &ctx), 0.0);
    }

    #[test]
    fn test_weights_indexed_by_vocabulary_position() {
        let docs = vec![tokens("storm coast"), tokens("storm flood"), tokens("storm")];
        // min_df 2 keeps only "storm"; the other exemplar words still count
        let vocab = vocabulary(&docs, 2);
        assert_eq!(vocab.terms(), &["storm"]);
        let ctx = ScoringContext::from_documents(&docs, &vocab, &[]);
        let storm = vocab.index_of("storm").unwrap();
        assert_eq!(ctx.weight_at(storm), ctx.weight("storm"));
        assert!(ctx.weight_at(storm) > 0.0);
        assert!(ctx.weight("coast") > 0.0);
        assert!(ctx.weight("storm") > ctx.weight("coast"));
        assert_eq!(ctx.weight_at(7), 0.0);
    }

    #[test]
    fn test_empty_context_scores_zero() {
        let vocab = vocabulary(&[tokens("storm")], 1);
        let ctx = ScoringContext::from_documents(&[], &vocab, &[]);
        assert!(ctx.is_empty());
        assert_eq!(CosineScorer.score("storm", &ctx), 0.0);
    }

    #[test]
    fn test_diversity_penalizes_redundant_candidates() {
        let candidates = vec![
            Scored { item: "common", relevance: 0.9 },
            Scored { item: "specific", relevance: 0.8 },
        ];
        let redundancy = |w: &&str| if *w == "common" { 1.0 } else { 0.0 };

        let relevant_only = select_with_diversity(&candidates, 0.0, redundancy).unwrap();
        assert_eq!(relevant_only.item, "common");

        let diverse = select_with_diversity(&candidates, 0.3, redundancy).unwrap();
        assert_eq!(diverse.item, "specific");
    }

    #[test]
    fn test_selection_ties_go_to_first() {
        let candidates = vec![
            Scored { item: 1, relevance: 0.5 },
            Scored { item: 2, relevance: 0.5 },
        ];
        let chosen = select_with_diversity(&candidates, 0.3, |_| 0.0).unwrap();
        assert_eq!(chosen.item, 1);
        assert!(select_with_diversity::<i32, _>(&[], 0.3, |_| 0.0).is_none());
    }

    #[test]
    fn test_shortlist_keeps_order_on_ties() {
        let candidates = vec![
            Scored { item: "a", relevance: 0.2 },
            Scored { item: "b", relevance: f64::NAN },
            Scored { item: "c", relevance: 0.7 },
            Scored { item: "d", relevance: 0.2 },
        ];
        let kept = shortlist(candidates, 2);
        let items: Vec<&str> = kept.iter().map(|s| s.item).collect();
        assert_eq!(items, vec!["c", "a"]);
    }
}

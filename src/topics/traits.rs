// Phrase scorer trait, the swap-ready abstraction for topic labeling.
//
// The labeler generates candidate phrases from a topic's exemplar text and
// asks a scorer how relevant each one is to that text. The default
// implementation is a weighted bag-of-words cosine (see `keyphrase.rs`), but
// an embeddings-based scorer could be dropped in later without touching the
// candidate generation or the diversity-aware selection.

use super::keyphrase::ScoringContext;

/// Trait for scoring a candidate phrase against the text it was drawn from.
pub trait PhraseScorer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Relevance of `phrase` (space-separated words) to `context`.
    /// Higher is more relevant; non-finite scores drop the candidate.
    fn score(&self, phrase: &str, context: &ScoringContext<'_>) -> f64;

    /// Score multiple phrases, returning results in the same order.
    fn score_all(&self, phrases: &[String], context: &ScoringContext<'_>) -> Vec<f64> {
        phrases.iter().map(|p| self.score(p, context)).collect()
    }
}

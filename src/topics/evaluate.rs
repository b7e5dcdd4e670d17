// Model quality: log-likelihood of the observed counts and perplexity.
//
// LL = sum over documents d and terms t of n_dt * ln(sum_k theta_dk * phi_kt)
// Perplexity = exp(-LL / total tokens). Lower perplexity is better.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::model::TopicModel;
use crate::corpus::vocabulary::DocumentTermMatrix;

/// Log-likelihood of the counts under the mixture theta x phi.
///
/// Predicted probabilities are clamped to the smallest positive float so a
/// zero never turns the sum into negative infinity.
pub fn log_likelihood(dtm: &DocumentTermMatrix, theta: &Array2<f64>, phi: &Array2<f64>) -> f64 {
    let mut total = 0.0;
    for doc in 0..dtm.num_documents() {
        let weights = theta.row(doc);
        for (term, count) in dtm.row(doc) {
            let p: f64 = weights
                .iter()
                .zip(phi.column(term))
                .map(|(w, b)| w * b)
                .sum();
            total += f64::from(count) * p.max(f64::MIN_POSITIVE).ln();
        }
    }
    total
}

/// `exp(-ll / tokens)`; infinite when there are no tokens.
pub fn perplexity(log_likelihood: f64, total_tokens: u64) -> f64 {
    if total_tokens == 0 {
        return f64::INFINITY;
    }
    (-log_likelihood / total_tokens as f64).exp()
}

/// Evaluation summary of a fitted model on a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub log_likelihood: f64,
    pub perplexity: f64,
    pub total_tokens: u64,
    /// Mean Theta weight per topic, sums to 1
    pub topic_prevalence: Vec<f64>,
}

/// Scores a model against the counts it was fitted on.
#[derive(Debug, Default, Clone, Copy)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, model: &TopicModel, dtm: &DocumentTermMatrix) -> Evaluation {
        let ll = log_likelihood(dtm, model.doc_topic(), model.topic_term());
        let total_tokens = dtm.total_tokens();
        let topic_prevalence = model.topic_prevalence();
        Evaluation {
            log_likelihood: ll,
            perplexity: perplexity(ll, total_tokens),
            total_tokens,
            topic_prevalence,
        }
    }
}

// Latent Dirichlet Allocation fitted by mini-batch (online) variational Bayes.
//
// Each pass shuffles the documents with the seeded RNG, cuts them into
// batches, and for every batch:
//   1. estimates each document's topic responsibilities with the global
//      topic-term statistics held fixed (parallel, see `inference.rs`),
//   2. reduces the batch into one accumulator,
//   3. blends it into lambda with weight (offset + t)^-decay, so later
//      batches refine rather than overwrite earlier ones.
// At the end of a pass Theta and Phi are recomputed over the whole corpus
// and scored. Fitting stops on convergence of the per-token log-likelihood,
// at the pass cap, at the wall-clock cap or when interrupted. Whichever
// stops it, the model returned is the best pass seen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::evaluate;
use super::inference::{
    infer_batch, infer_doc_topics, normalize_rows, BatchAccumulator, GlobalTopicTerms,
    LocalOptions,
};
use crate::corpus::vocabulary::DocumentTermMatrix;
use crate::error::{Result, TopicError};

/// LDA model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdaConfig {
    /// Number of topics (k)
    pub num_topics: usize,
    /// Document-topic prior; `None` means 1/k
    pub alpha: Option<f64>,
    /// Topic-term prior; `None` means 1/k
    pub eta: Option<f64>,
    /// Maximum passes over the corpus
    pub max_iter: usize,
    /// Documents per mini-batch
    pub batch_size: usize,
    /// Forgetting rate kappa in (0.5, 1]
    pub learning_decay: f64,
    /// Delay tau_0 that downweights early batches
    pub learning_offset: f64,
    /// Cap on local (per-document) iterations
    pub max_doc_update_iter: usize,
    /// Local convergence threshold on mean absolute gamma change
    pub mean_change_tol: f64,
    /// Stop when the per-token log-likelihood changes less than this between passes
    pub tolerance: f64,
    /// Seed for initialization and batch order; `None` is non-reproducible
    pub random_seed: Option<u64>,
    /// Wall-clock budget, checked between passes
    #[serde(default)]
    pub max_duration: Option<Duration>,
}

impl Default for LdaConfig {
    fn default() -> Self {
        Self {
            num_topics: 10,
            alpha: None,
            eta: None,
            max_iter: 20,
            batch_size: 128,
            learning_decay: 0.7,
            learning_offset: 10.0,
            max_doc_update_iter: 100,
            mean_change_tol: 1e-3,
            tolerance: 1e-4,
            random_seed: None,
            max_duration: None,
        }
    }
}

impl LdaConfig {
    pub fn new(num_topics: usize) -> Self {
        Self {
            num_topics,
            ..Default::default()
        }
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn eta(mut self, eta: f64) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn max_iter(mut self, passes: usize) -> Self {
        self.max_iter = passes;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    pub fn doc_topic_prior(&self) -> f64 {
        self.alpha
            .unwrap_or_else(|| 1.0 / self.num_topics.max(1) as f64)
    }

    pub fn topic_word_prior(&self) -> f64 {
        self.eta.unwrap_or_else(|| 1.0 / self.num_topics.max(1) as f64)
    }

    /// Check parameters that do not depend on the corpus.
    pub fn validate(&self) -> Result<()> {
        if self.num_topics == 0 {
            return Err(TopicError::Configuration(
                "number of topics must be positive".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(TopicError::Configuration(
                "max_iter must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TopicError::Configuration(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.doc_topic_prior() <= 0.0 || self.topic_word_prior() <= 0.0 {
            return Err(TopicError::Configuration(
                "Dirichlet priors must be positive".to_string(),
            ));
        }
        if !(self.learning_decay > 0.5 && self.learning_decay <= 1.0) {
            return Err(TopicError::Configuration(format!(
                "learning_decay must be in (0.5, 1], got {}",
                self.learning_decay
            )));
        }
        if self.learning_offset < 0.0 {
            return Err(TopicError::Configuration(
                "learning_offset must be non-negative".to_string(),
            ));
        }
        if !(self.tolerance >= 0.0) || !(self.mean_change_tol > 0.0) {
            return Err(TopicError::Configuration(
                "tolerances must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared stop flag, checked by the fitting loop between passes.
#[derive(Debug, Clone, Default)]
pub struct FitControl {
    stop: Arc<AtomicBool>,
}

impl FitControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Why fitting ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitOutcome {
    Converged,
    MaxPasses,
    TimeLimit,
    Interrupted,
}

/// Progress notification sent after every pass.
#[derive(Debug, Clone, Copy)]
pub struct PassReport {
    /// 1-based pass number
    pub pass: usize,
    pub log_likelihood: f64,
}

/// A fitted model: Theta (documents x topics) and Phi (topics x terms).
#[derive(Debug, Clone)]
pub struct TopicModel {
    theta: Array2<f64>,
    phi: Array2<f64>,
    passes: usize,
    best_pass: usize,
    log_likelihood_history: Vec<f64>,
    outcome: FitOutcome,
}

impl TopicModel {
    /// Wrap externally computed distributions. Rows of both are normalized.
    pub fn from_distributions(theta: Array2<f64>, phi: Array2<f64>) -> Result<Self> {
        if theta.ncols() != phi.nrows() {
            return Err(TopicError::Configuration(format!(
                "theta has {} topics but phi has {}",
                theta.ncols(),
                phi.nrows()
            )));
        }
        if theta.iter().chain(phi.iter()).any(|v| !(*v >= 0.0)) {
            return Err(TopicError::Configuration(
                "distributions must be non-negative".to_string(),
            ));
        }
        Ok(Self {
            theta: normalize_rows(&theta),
            phi: normalize_rows(&phi),
            passes: 0,
            best_pass: 0,
            log_likelihood_history: Vec::new(),
            outcome: FitOutcome::Converged,
        })
    }

    pub fn num_topics(&self) -> usize {
        self.phi.nrows()
    }

    pub fn num_documents(&self) -> usize {
        self.theta.nrows()
    }

    pub fn num_terms(&self) -> usize {
        self.phi.ncols()
    }

    /// Theta: per-document topic distribution, rows sum to 1.
    pub fn doc_topic(&self) -> &Array2<f64> {
        &self.theta
    }

    /// Phi: per-topic term distribution, rows sum to 1.
    pub fn topic_term(&self) -> &Array2<f64> {
        &self.phi
    }

    /// Passes actually run.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Pass whose snapshot this model holds.
    pub fn best_pass(&self) -> usize {
        self.best_pass
    }

    pub fn log_likelihood_history(&self) -> &[f64] {
        &self.log_likelihood_history
    }

    pub fn outcome(&self) -> FitOutcome {
        self.outcome
    }

    /// Mean of each topic's weight across documents.
    pub fn topic_prevalence(&self) -> Vec<f64> {
        self.theta
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_default()
    }
}

struct Snapshot {
    theta: Array2<f64>,
    phi: Array2<f64>,
    log_likelihood: f64,
    pass: usize,
}

/// Mini-batch variational Bayes LDA.
pub struct OnlineLda {
    config: LdaConfig,
}

impl OnlineLda {
    pub fn new(config: LdaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Fit with no interruption and no progress callback.
    pub fn fit(&self, dtm: &DocumentTermMatrix) -> Result<TopicModel> {
        self.fit_with(dtm, &FitControl::new(), |_| {})
    }

    /// Fit the model over the whole corpus.
    ///
    /// `control` and the wall-clock cap are honored between passes only.
    pub fn fit_with<F>(
        &self,
        dtm: &DocumentTermMatrix,
        control: &FitControl,
        mut on_pass: F,
    ) -> Result<TopicModel>
    where
        F: FnMut(PassReport),
    {
        let config = &self.config;
        let (n_docs, n_terms) = (dtm.num_documents(), dtm.num_terms());
        if dtm.is_empty() {
            return Err(TopicError::Configuration(format!(
                "document-term matrix is empty ({n_docs} documents x {n_terms} terms)"
            )));
        }
        let k = config.num_topics;
        if k > n_docs {
            return Err(TopicError::Configuration(format!(
                "{k} topics requested but the corpus has only {n_docs} documents"
            )));
        }

        let eta = config.topic_word_prior();
        let local = LocalOptions {
            alpha: config.doc_topic_prior(),
            max_iter: config.max_doc_update_iter,
            mean_change_tol: config.mean_change_tol,
        };
        let total_tokens = dtm.total_tokens().max(1) as f64;

        let mut rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let lambda = Array2::from_shape_fn((k, n_terms), |_| rng.random_range(0.9..1.1));
        let mut global = GlobalTopicTerms::new(lambda);

        info!(
            documents = n_docs,
            terms = n_terms,
            topics = k,
            passes = config.max_iter,
            batch_size = config.batch_size,
            "Fitting topic model"
        );

        let started = Instant::now();
        let mut order: Vec<usize> = (0..n_docs).collect();
        let mut batch_updates = 0usize;
        let mut history = Vec::with_capacity(config.max_iter);
        let mut best: Option<Snapshot> = None;
        let mut outcome = FitOutcome::MaxPasses;

        for pass in 1..=config.max_iter {
            order.shuffle(&mut rng);

            for batch in order.chunks(config.batch_size) {
                let estimates = infer_batch(batch, dtm, &global, &local);

                let mut accumulator = BatchAccumulator::new(k, n_terms);
                for estimate in &estimates {
                    accumulator.absorb(estimate);
                }

                // Counted from 1, so a zero offset still gives a finite weight
                batch_updates += 1;
                let weight =
                    (config.learning_offset + batch_updates as f64).powf(-config.learning_decay);
                let doc_ratio = n_docs as f64 / accumulator.documents() as f64;
                global.blend(&accumulator, weight, doc_ratio, eta);
            }

            let theta = infer_doc_topics(dtm, &global, &local);
            let phi = global.topic_term_distribution();
            let log_likelihood = evaluate::log_likelihood(dtm, &theta, &phi);
            history.push(log_likelihood);
            debug!(pass, log_likelihood, "Pass complete");
            on_pass(PassReport {
                pass,
                log_likelihood,
            });

            let improved = best
                .as_ref()
                .map_or(true, |b| log_likelihood > b.log_likelihood);
            if improved {
                best = Some(Snapshot {
                    theta,
                    phi,
                    log_likelihood,
                    pass,
                });
            }

            if let [.., previous, current] = history.as_slice() {
                if (current - previous).abs() / total_tokens < config.tolerance {
                    outcome = FitOutcome::Converged;
                    break;
                }
            }
            if pass == config.max_iter {
                break;
            }
            if control.is_stop_requested() {
                warn!(pass, "Fit interrupted, keeping best pass so far");
                outcome = FitOutcome::Interrupted;
                break;
            }
            if let Some(limit) = config.max_duration {
                if started.elapsed() >= limit {
                    warn!(pass, ?limit, "Fit time limit reached, keeping best pass so far");
                    outcome = FitOutcome::TimeLimit;
                    break;
                }
            }
        }

        let passes = history.len();
        let snapshot = match best {
            Some(snapshot) => snapshot,
            None => {
                // max_iter >= 1 always runs one pass; this only guards the type
                let theta = infer_doc_topics(dtm, &global, &local);
                let phi = global.topic_term_distribution();
                let log_likelihood = evaluate::log_likelihood(dtm, &theta, &phi);
                Snapshot {
                    theta,
                    phi,
                    log_likelihood,
                    pass: 0,
                }
            }
        };

        info!(
            passes,
            best_pass = snapshot.pass,
            log_likelihood = snapshot.log_likelihood,
            ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Topic model fitted"
        );

        Ok(TopicModel {
            theta: snapshot.theta,
            phi: snapshot.phi,
            passes,
            best_pass: snapshot.pass,
            log_likelihood_history: history,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_matrix() -> DocumentTermMatrix {
        DocumentTermMatrix::from_rows(
            &[
                vec![(0, 3), (1, 2), (2, 2)],
                vec![(0, 2), (1, 3), (2, 1)],
                vec![(0, 1), (1, 2), (2, 3)],
                vec![(3, 3), (4, 2), (5, 2)],
                vec![(3, 2), (4, 3), (5, 1)],
                vec![(3, 1), (4, 2), (5, 3)],
            ],
            6,
        )
    }

    #[test]
    fn test_zero_topics_rejected() {
        let result = OnlineLda::new(LdaConfig::new(0));
        assert!(matches!(result, Err(TopicError::Configuration(_))));
    }

    #[test]
    fn test_more_topics_than_documents_rejected() {
        let lda = OnlineLda::new(LdaConfig::new(7).random_seed(1)).unwrap();
        let err = lda.fit(&two_block_matrix()).unwrap_err();
        assert!(matches!(err, TopicError::Configuration(_)));
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let dtm = DocumentTermMatrix::from_rows(&[], 4);
        let lda = OnlineLda::new(LdaConfig::new(1)).unwrap();
        assert!(matches!(lda.fit(&dtm), Err(TopicError::Configuration(_))));
    }

    #[test]
    fn test_history_matches_passes() {
        let lda = OnlineLda::new(LdaConfig::new(2).max_iter(5).tolerance(0.0).random_seed(3))
            .unwrap();
        let mut seen = Vec::new();
        let model = lda
            .fit_with(&two_block_matrix(), &FitControl::new(), |r| seen.push(r.pass))
            .unwrap();
        assert_eq!(model.passes(), 5);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(model.log_likelihood_history().len(), 5);
        assert_eq!(model.outcome(), FitOutcome::MaxPasses);
    }

    #[test]
    fn test_stop_request_ends_after_current_pass() {
        let lda = OnlineLda::new(LdaConfig::new(2).max_iter(50).tolerance(0.0).random_seed(3))
            .unwrap();
        let control = FitControl::new();
        let stopper = control.clone();
        let model = lda
            .fit_with(&two_block_matrix(), &control, |r| {
                if r.pass == 2 {
                    stopper.request_stop();
                }
            })
            .unwrap();
        assert_eq!(model.passes(), 2);
        assert_eq!(model.outcome(), FitOutcome::Interrupted);
        assert_eq!(model.num_documents(), 6);
    }

    #[test]
    fn test_zero_time_limit_returns_model() {
        let lda = OnlineLda::new(
            LdaConfig::new(2)
                .max_iter(50)
                .tolerance(0.0)
                .random_seed(3)
                .max_duration(Duration::ZERO),
        )
        .unwrap();
        let model = lda.fit(&two_block_matrix()).unwrap();
        assert_eq!(model.passes(), 1);
        assert_eq!(model.outcome(), FitOutcome::TimeLimit);
    }

    #[test]
    fn test_zero_learning_offset_keeps_theta_normalized() {
        let mut config = LdaConfig::new(2).random_seed(1);
        config.learning_offset = 0.0;
        let lda = OnlineLda::new(config).unwrap();
        let dtm = DocumentTermMatrix::from_rows(
            &[vec![(0, 2), (1, 1)], vec![(1, 3)], vec![(2, 2), (0, 1)]],
            3,
        );
        let model = lda.fit(&dtm).unwrap();
        for row in model.doc_topic().outer_iter() {
            assert!(row.iter().all(|p| p.is_finite()), "theta row {row}");
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        for row in model.topic_term().outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_topic_prevalence_sums_to_one() {
        let lda = OnlineLda::new(LdaConfig::new(2).random_seed(9)).unwrap();
        let model = lda.fit(&two_block_matrix()).unwrap();
        let weights = model.topic_prevalence();
        assert_eq!(weights.len(), 2);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

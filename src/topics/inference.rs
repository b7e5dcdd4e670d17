// Variational inference building blocks for mini-batch LDA.
//
// The fitting loop in `model.rs` is an explicit loop over immutable batch
// snapshots. For each batch, the local step below estimates every
// document's topic responsibilities independently (on the rayon pool), and
// a `BatchAccumulator` sums their sufficient statistics in document order.
// That sum is the only point where per-document work meets shared state.

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use statrs::function::gamma::digamma;

use crate::corpus::vocabulary::DocumentTermMatrix;

/// Guards the responsibility normalizer against division by zero.
const EPS: f64 = f64::EPSILON;

/// Settings for the per-document update.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalOptions {
    /// Symmetric Dirichlet prior over topics
    pub alpha: f64,
    /// Cap on inner fixed-point iterations per document
    pub max_iter: usize,
    /// Stop iterating once the mean absolute change of gamma drops below this
    pub mean_change_tol: f64,
}

/// Global topic-term pseudo-counts (lambda) and their cached
/// `exp(E[log beta])`, which every local step reads.
#[derive(Debug, Clone)]
pub(crate) struct GlobalTopicTerms {
    lambda: Array2<f64>,
    exp_elog_beta: Array2<f64>,
}

impl GlobalTopicTerms {
    pub fn new(lambda: Array2<f64>) -> Self {
        let exp_elog_beta = exp_dirichlet_expectation(&lambda);
        Self {
            lambda,
            exp_elog_beta,
        }
    }

    /// Blend one batch into the global statistics:
    /// `lambda = (1 - w) * lambda + w * (eta + doc_ratio * sstats)`
    pub fn blend(&mut self, batch: &BatchAccumulator, weight: f64, doc_ratio: f64, eta: f64) {
        // The accumulator holds cnt / phinorm * exp(E[log theta]); completing
        // the expectation multiplies in the exp(E[log beta]) the batch saw.
        let sstats = &batch.sstats * &self.exp_elog_beta;
        self.lambda.zip_mut_with(&sstats, |l, &s| {
            *l = (1.0 - weight) * *l + weight * (eta + doc_ratio * s);
        });
        self.exp_elog_beta = exp_dirichlet_expectation(&self.lambda);
    }

    /// Rows of lambda normalized to probability distributions (Phi).
    pub fn topic_term_distribution(&self) -> Array2<f64> {
        normalize_rows(&self.lambda)
    }
}

/// Result of the local step for one document.
#[derive(Debug, Clone)]
pub(crate) struct LocalEstimate {
    /// Variational Dirichlet parameters over topics
    pub gamma: Vec<f64>,
    /// Terms of the document, ascending
    pub terms: Vec<usize>,
    /// Per-topic contributions to the terms, row-major `topics x terms.len()`
    pub stats: Vec<f64>,
}

/// Sums local estimates of one batch.
#[derive(Debug, Clone)]
pub(crate) struct BatchAccumulator {
    sstats: Array2<f64>,
    documents: usize,
}

impl BatchAccumulator {
    pub fn new(num_topics: usize, num_terms: usize) -> Self {
        Self {
            sstats: Array2::zeros((num_topics, num_terms)),
            documents: 0,
        }
    }

    pub fn absorb(&mut self, estimate: &LocalEstimate) {
        let width = estimate.terms.len();
        for (topic, mut row) in self.sstats.axis_iter_mut(Axis(0)).enumerate() {
            let contrib = &estimate.stats[topic * width..(topic + 1) * width];
            for (&term, &value) in estimate.terms.iter().zip(contrib) {
                row[term] += value;
            }
        }
        self.documents += 1;
    }

    pub fn documents(&self) -> usize {
        self.documents
    }
}

/// Local step: estimate one document's topic responsibilities with the
/// global statistics held fixed.
pub(crate) fn estimate_document(
    row: &[(usize, u32)],
    global: &GlobalTopicTerms,
    options: &LocalOptions,
    with_stats: bool,
) -> LocalEstimate {
    let k = global.exp_elog_beta.nrows();
    let terms: Vec<usize> = row.iter().map(|&(t, _)| t).collect();

    if terms.is_empty() {
        // No evidence: the posterior is the prior
        return LocalEstimate {
            gamma: vec![options.alpha; k],
            terms,
            stats: Vec::new(),
        };
    }

    let counts: Vec<f64> = row.iter().map(|&(_, c)| f64::from(c)).collect();
    let width = terms.len();

    // exp(E[log beta]) restricted to this document's terms, topics x width
    let mut beta_d = Vec::with_capacity(k * width);
    for topic in 0..k {
        for &term in &terms {
            beta_d.push(global.exp_elog_beta[[topic, term]]);
        }
    }

    let mut gamma = vec![1.0; k];
    let mut exp_elog_theta = exp_dirichlet_expectation_1d(&gamma);
    let mut phinorm = vec![0.0; width];

    for _ in 0..options.max_iter {
        let last = gamma.clone();
        fill_phinorm(&mut phinorm, &exp_elog_theta, &beta_d, width);

        for topic in 0..k {
            let beta_row = &beta_d[topic * width..(topic + 1) * width];
            let dot: f64 = counts
                .iter()
                .zip(&phinorm)
                .zip(beta_row)
                .map(|((c, n), b)| c / n * b)
                .sum();
            gamma[topic] = exp_elog_theta[topic] * dot + options.alpha;
        }
        exp_elog_theta = exp_dirichlet_expectation_1d(&gamma);

        let change = mean_abs_change(&last, &gamma);
        if change < options.mean_change_tol {
            break;
        }
    }

    let stats = if with_stats {
        fill_phinorm(&mut phinorm, &exp_elog_theta, &beta_d, width);
        let mut stats = Vec::with_capacity(k * width);
        for &theta in &exp_elog_theta {
            for (c, n) in counts.iter().zip(&phinorm) {
                stats.push(theta * c / n);
            }
        }
        stats
    } else {
        Vec::new()
    };

    LocalEstimate {
        gamma,
        terms,
        stats,
    }
}

fn fill_phinorm(phinorm: &mut [f64], exp_elog_theta: &[f64], beta_d: &[f64], width: usize) {
    for (j, slot) in phinorm.iter_mut().enumerate() {
        *slot = exp_elog_theta
            .iter()
            .enumerate()
            .map(|(topic, theta)| theta * beta_d[topic * width + j])
            .sum::<f64>()
            + EPS;
    }
}

/// Run the local step for each document of a batch in parallel. The output
/// order matches `docs`.
pub(crate) fn infer_batch(
    docs: &[usize],
    dtm: &DocumentTermMatrix,
    global: &GlobalTopicTerms,
    options: &LocalOptions,
) -> Vec<LocalEstimate> {
    docs.par_iter()
        .map(|&doc| estimate_document(&dtm.row(doc), global, options, true))
        .collect()
}

/// Document-topic distribution (Theta) of every document under fixed
/// global statistics.
pub(crate) fn infer_doc_topics(
    dtm: &DocumentTermMatrix,
    global: &GlobalTopicTerms,
    options: &LocalOptions,
) -> Array2<f64> {
    let k = global.exp_elog_beta.nrows();
    let n = dtm.num_documents();
    let gammas: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|doc| estimate_document(&dtm.row(doc), global, options, false).gamma)
        .collect();

    let mut theta = Array2::zeros((n, k));
    for (mut row, gamma) in theta.axis_iter_mut(Axis(0)).zip(&gammas) {
        let total: f64 = gamma.iter().sum();
        for (slot, g) in row.iter_mut().zip(gamma) {
            *slot = g / total;
        }
    }
    theta
}

/// Normalize each row to sum to 1. All-zero rows become uniform.
pub(crate) fn normalize_rows(matrix: &Array2<f64>) -> Array2<f64> {
    let mut out = matrix.clone();
    let width = out.ncols().max(1) as f64;
    for mut row in out.axis_iter_mut(Axis(0)) {
        let total: f64 = row.sum();
        if total > 0.0 {
            row.mapv_inplace(|v| v / total);
        } else {
            row.fill(1.0 / width);
        }
    }
    out
}

fn mean_abs_change(a: &[f64], b: &[f64]) -> f64 {
    let total: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
    total / a.len().max(1) as f64
}

/// `exp(psi(x_i) - psi(sum(x)))` for one Dirichlet parameter vector.
fn exp_dirichlet_expectation_1d(alpha: &[f64]) -> Vec<f64> {
    let psi_total = digamma(alpha.iter().sum());
    alpha.iter().map(|&a| (digamma(a) - psi_total).exp()).collect()
}

/// Row-wise `exp(E[log X])` for a matrix of Dirichlet parameters.
fn exp_dirichlet_expectation(params: &Array2<f64>) -> Array2<f64> {
    let mut out = params.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let psi_total = digamma(row.sum());
        row.mapv_inplace(|a| (digamma(a) - psi_total).exp());
    }
    out
}

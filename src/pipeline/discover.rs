// Topic discovery pipeline: raw headlines in, labeled and grouped topics out.
//
// Stages run strictly in sequence and each consumes only the previous
// stage's output:
//   records -> Preprocessor -> VocabularyBuilder -> OnlineLda
//           -> {TopicLabeler, Evaluator} -> TopicAssigner -> TopicReport
// The vocabulary and count matrix are shared read-only by every stage after
// they are built; Theta and Phi belong to the fitted model.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::corpus::preprocess::{PreprocessedCorpus, Preprocessor};
use crate::corpus::vocabulary::{DocumentTermMatrix, Vocabulary, VocabularyBuilder, VocabularyConfig};
use crate::error::Result;
use crate::topics::assign::TopicAssigner;
use crate::topics::evaluate::Evaluator;
use crate::topics::labeler::TopicLabeler;
use crate::topics::model::{FitControl, OnlineLda, TopicModel};
use crate::topics::report::{DocumentTopic, FitSummary, TopicReport};

/// Everything a discovery run produced.
pub struct Discovery {
    pub corpus: PreprocessedCorpus,
    pub vocabulary: Vocabulary,
    pub matrix: DocumentTermMatrix,
    pub model: TopicModel,
    pub report: TopicReport,
}

/// Run the full pipeline over raw records.
///
/// `show_progress` draws a bar over fitting passes; pass `false` in tests
/// and when output is piped.
pub fn run<S: AsRef<str>>(
    records: &[S],
    config: &PipelineConfig,
    control: &FitControl,
    show_progress: bool,
) -> Result<Discovery> {
    config.validate()?;

    let corpus = Preprocessor::new().process(records)?;
    let builder = VocabularyBuilder::new(config.vocabulary.clone())?;
    let (vocabulary, matrix) = builder.build(&corpus.token_lists())?;

    let lda = OnlineLda::new(config.lda.clone())?;
    let pb = if show_progress {
        let pb = ProgressBar::new(config.lda.max_iter as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Fitting [{bar:30}] {pos}/{len} passes {msg}")
                .expect("static progress template is valid"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };
    let model = lda.fit_with(&matrix, control, |report| {
        pb.set_position(report.pass as u64);
        pb.set_message(format!("ll {:.1}", report.log_likelihood));
    })?;
    pb.finish_and_clear();

    // Labels and display use the original record text, not the cleaned form
    let texts: Vec<&str> = corpus
        .documents
        .iter()
        .map(|d| records[d.source_index].as_ref())
        .collect();

    let labels = TopicLabeler::new(config.labels.clone())?.label_topics(&model, &vocabulary, &texts)?;
    let evaluation = Evaluator::new().evaluate(&model, &matrix);

    let assigner = TopicAssigner::new();
    let assignments = assigner.assign(&model);
    let groups = assigner.group_by_label(&assignments, &labels);

    let documents = assignments
        .iter()
        .map(|a| DocumentTopic {
            source_index: corpus.documents[a.document].source_index,
            text: texts[a.document].to_string(),
            topic: a.topic,
            label: labels[a.topic].label.clone(),
            probability: a.probability,
        })
        .collect();

    info!(
        documents = corpus.len(),
        topics = labels.len(),
        groups = groups.len(),
        perplexity = evaluation.perplexity,
        "Discovery complete"
    );

    let report = TopicReport {
        generated_at: Utc::now(),
        records: corpus.records,
        dropped: corpus.dropped.clone(),
        vocabulary_size: vocabulary.len(),
        topics: labels,
        documents,
        groups,
        evaluation,
        fit: FitSummary {
            passes: model.passes(),
            best_pass: model.best_pass(),
            outcome: model.outcome(),
            log_likelihood_history: model.log_likelihood_history().to_vec(),
        },
    };

    Ok(Discovery {
        corpus,
        vocabulary,
        matrix,
        model,
        report,
    })
}

/// Vocabulary diagnostics for tuning the frequency thresholds.
#[derive(Debug, Clone, Serialize)]
pub struct VocabularyStats {
    pub records: usize,
    pub documents: usize,
    pub dropped: Vec<usize>,
    pub terms: usize,
    pub tokens: u64,
    /// Documents with no in-vocabulary term
    pub empty_rows: usize,
    pub too_common: Vec<String>,
    /// Highest document frequencies, descending, first-seen order on ties
    pub top_terms: Vec<(String, usize)>,
}

/// Preprocess and build the vocabulary only.
pub fn vocabulary_stats<S: AsRef<str>>(
    records: &[S],
    config: &VocabularyConfig,
    top: usize,
) -> Result<VocabularyStats> {
    let corpus = Preprocessor::new().process(records)?;
    let (vocabulary, matrix) = VocabularyBuilder::new(config.clone())?.build(&corpus.token_lists())?;

    let mut ranked: Vec<(String, usize)> = vocabulary
        .terms()
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), vocabulary.document_frequency(i)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top);

    let empty_rows = (0..matrix.num_documents())
        .filter(|&d| matrix.document_length(d) == 0)
        .count();

    Ok(VocabularyStats {
        records: corpus.records,
        documents: corpus.len(),
        dropped: corpus.dropped,
        terms: vocabulary.len(),
        tokens: matrix.total_tokens(),
        empty_rows,
        too_common: vocabulary.too_common_terms().map(str::to_string).collect(),
        top_terms: ranked,
    })
}

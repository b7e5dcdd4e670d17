// TopicReport: everything a run produces, in one serializable structure.
//
// Per topic: id, main label, ordered top terms and exemplars. Per document:
// original text, assigned label and probability. Aggregate: average topic
// weight, log-likelihood and perplexity, plus how the fit ended.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::assign::LabelGroup;
use super::evaluate::Evaluation;
use super::labeler::TopicLabel;
use super::model::FitOutcome;

/// A document's place in the result, keyed back to the raw input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTopic {
    /// Position of the record in the raw input
    pub source_index: usize,
    pub text: String,
    pub topic: usize,
    pub label: String,
    pub probability: f64,
}

/// How fitting went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub passes: usize,
    pub best_pass: usize,
    pub outcome: FitOutcome,
    pub log_likelihood_history: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicReport {
    pub generated_at: DateTime<Utc>,
    pub records: usize,
    /// Input positions of records that were empty after cleaning
    pub dropped: Vec<usize>,
    pub vocabulary_size: usize,
    pub topics: Vec<TopicLabel>,
    pub documents: Vec<DocumentTopic>,
    pub groups: Vec<LabelGroup>,
    pub evaluation: Evaluation,
    pub fit: FitSummary,
}

impl TopicReport {
    /// Label of a topic id, if present.
    pub fn label_of(&self, topic: usize) -> Option<&str> {
        self.topics
            .iter()
            .find(|t| t.topic == topic)
            .map(|t| t.label.as_str())
    }

    /// Display average topic weight as a bar chart in the terminal.
    pub fn display_distribution(&self) {
        println!(
            "\n{}",
            format!(
                "=== Topic Distribution ({} headlines) ===",
                self.documents.len()
            )
            .bold()
        );
        println!();

        let bar_width: usize = 20;
        let max_weight = self
            .evaluation
            .topic_prevalence
            .iter()
            .copied()
            .fold(0.0, f64::max);

        for (topic, &weight) in self.evaluation.topic_prevalence.iter().enumerate() {
            // Scale to the heaviest topic so small k still shows contrast
            let scaled = if max_weight > 0.0 { weight / max_weight } else { 0.0 };
            let filled = (scaled * bar_width as f64).round() as usize;
            let empty = bar_width.saturating_sub(filled);
            let bar = format!("[{}{}]", "=".repeat(filled), " ".repeat(empty));

            let colored_bar = if weight >= 0.25 {
                bar.bright_green()
            } else if weight >= 0.10 {
                bar.bright_yellow()
            } else {
                bar.bright_blue()
            };

            let label = self.label_of(topic).unwrap_or("?");
            println!(
                "  {:>2}. {:<30} {} {:.3}",
                topic,
                crate::output::truncate_chars(label, 27).bold(),
                colored_bar,
                weight
            );
        }
        println!();
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("failed to write report to {}: {e}", path.display()))?;
        Ok(())
    }
}

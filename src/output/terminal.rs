// Colored terminal output for discovered topics and diagnostics.
//
// The main.rs command handlers delegate here. The topic distribution bar
// chart lives on TopicReport itself.

use colored::Colorize;

use super::truncate_chars;
use crate::pipeline::discover::VocabularyStats;
use crate::topics::labeler::LabelSource;
use crate::topics::model::FitOutcome;
use crate::topics::report::TopicReport;

/// Display every topic: label, top keywords and example headlines.
pub fn display_topics(report: &TopicReport) {
    println!(
        "\n{}",
        format!("=== Topics ({} found) ===", report.topics.len()).bold()
    );

    for topic in &report.topics {
        let marker = match topic.source {
            LabelSource::KeyPhrase => "".normal(),
            LabelSource::TopTerm => " (top term)".dimmed(),
        };
        println!(
            "\n  Topic {}: {}{}",
            topic.topic,
            topic.label.to_uppercase().bright_cyan().bold(),
            marker
        );

        let keywords: Vec<&str> = topic.top_terms.iter().map(|t| t.term.as_str()).collect();
        println!("    Top keywords: {}", keywords.join(", ").dimmed());

        println!("    Example headlines:");
        for example in &topic.examples {
            println!("      - {}", truncate_chars(example, 100));
        }
    }
    println!();
}

/// Display headlines grouped by label, at most `per_group` each.
pub fn display_groups(report: &TopicReport, per_group: usize) {
    println!("{}", "=== Headlines by Topic ===".bold());

    for group in &report.groups {
        println!(
            "\n  {} {}",
            group.label.to_uppercase().bold(),
            format!("({} headlines)", group.assignments.len()).dimmed()
        );
        for assignment in group.assignments.iter().take(per_group) {
            let text = report
                .documents
                .get(assignment.document)
                .map(|d| d.text.as_str())
                .unwrap_or("");
            println!(
                "    {}  {}",
                colorize_probability(assignment.probability),
                truncate_chars(text, 90)
            );
        }
    }
    println!();
}

/// Display log-likelihood, perplexity and how fitting ended.
pub fn display_evaluation(report: &TopicReport) {
    let eval = &report.evaluation;
    let fit = &report.fit;

    println!("{}", "=== Model Evaluation ===".bold());
    println!("  Perplexity:     {:.2}", eval.perplexity);
    println!("  Log-likelihood: {:.2}", eval.log_likelihood);
    println!("  Tokens:         {}", eval.total_tokens);
    println!(
        "  Fit:            {} passes (best {}), {}",
        fit.passes,
        fit.best_pass,
        describe_outcome(fit.outcome)
    );
    if !report.dropped.is_empty() {
        println!(
            "  {} {} of {} records were empty after cleaning",
            "~".yellow(),
            report.dropped.len(),
            report.records
        );
    }
    println!();
}

/// Display vocabulary diagnostics.
pub fn display_vocabulary(stats: &VocabularyStats) {
    println!("\n{}", "=== Vocabulary ===".bold());
    println!(
        "  Records: {}   Documents: {}   Dropped: {}",
        stats.records,
        stats.documents,
        stats.dropped.len()
    );
    println!(
        "  Terms: {}   Tokens: {}   Documents without terms: {}",
        stats.terms, stats.tokens, stats.empty_rows
    );

    if !stats.too_common.is_empty() {
        println!(
            "  Too common (above max_df): {}",
            stats.too_common.join(", ").yellow()
        );
    }

    println!("\n  {:<24} {:>6}", "Term".dimmed(), "DF".dimmed());
    println!("  {}", "-".repeat(31).dimmed());
    for (term, df) in &stats.top_terms {
        println!("  {:<24} {:>6}", truncate_chars(term, 24), df);
    }
    println!();
}

fn describe_outcome(outcome: FitOutcome) -> colored::ColoredString {
    match outcome {
        FitOutcome::Converged => "converged".green(),
        FitOutcome::MaxPasses => "pass limit reached".yellow(),
        FitOutcome::TimeLimit => "time limit reached".yellow(),
        FitOutcome::Interrupted => "interrupted".red(),
    }
}

fn colorize_probability(p: f64) -> colored::ColoredString {
    let text = format!("{p:.3}");
    if p >= 0.75 {
        text.green()
    } else if p >= 0.5 {
        text.yellow()
    } else {
        text.normal()
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use headline_topics::config::Config;
use headline_topics::output::terminal;
use headline_topics::pipeline::discover;
use headline_topics::topics::model::FitControl;

/// Headline topic discovery.
///
/// Fits an LDA topic model over a file of headlines (one per line), labels
/// each topic with a key phrase, and groups the headlines by topic.
#[derive(Parser)]
#[command(name = "headline-topics", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover topics and group headlines by label
    Discover {
        /// Input file, one headline per line
        input: PathBuf,

        #[command(flatten)]
        vocab: VocabArgs,

        /// Number of topics
        #[arg(short = 'k', long)]
        topics: Option<usize>,

        /// Maximum passes over the corpus
        #[arg(long)]
        max_iter: Option<usize>,

        /// Convergence tolerance on per-token log-likelihood change
        #[arg(long)]
        tolerance: Option<f64>,

        /// Random seed for reproducible fits
        #[arg(long)]
        seed: Option<u64>,

        /// Stop fitting after this many seconds and keep the best pass
        #[arg(long)]
        max_seconds: Option<u64>,

        /// Top terms listed per topic
        #[arg(long)]
        top_terms: Option<usize>,

        /// Exemplar headlines used for labeling
        #[arg(long)]
        exemplars: Option<usize>,

        /// Headlines shown per group (default: 5)
        #[arg(long, default_value = "5")]
        show: usize,

        /// Also write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Show vocabulary statistics for tuning the frequency thresholds
    Vocab {
        /// Input file, one headline per line
        input: PathBuf,

        #[command(flatten)]
        vocab: VocabArgs,

        /// Number of terms listed (default: 20)
        #[arg(long, default_value = "20")]
        top: usize,
    },
}

#[derive(Args)]
struct VocabArgs {
    /// Minimum number of headlines a term must appear in
    #[arg(long)]
    min_df: Option<usize>,

    /// Maximum fraction of headlines a term may appear in
    #[arg(long)]
    max_df: Option<f64>,

    /// Minimum term length in characters
    #[arg(long)]
    min_term_length: Option<usize>,

    /// Keep English stop words
    #[arg(long)]
    keep_stop_words: bool,
}

impl VocabArgs {
    fn apply(&self, config: &mut Config) {
        let vocab = &mut config.pipeline.vocabulary;
        if let Some(v) = self.min_df {
            vocab.min_df = v;
        }
        if let Some(v) = self.max_df {
            vocab.max_df = v;
        }
        if let Some(v) = self.min_term_length {
            vocab.min_term_length = v;
        }
        if self.keep_stop_words {
            vocab.remove_stop_words = false;
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("headline_topics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            input,
            vocab,
            topics,
            max_iter,
            tolerance,
            seed,
            max_seconds,
            top_terms,
            exemplars,
            show,
            json,
            quiet,
        } => {
            let mut config = Config::load()?;
            vocab.apply(&mut config);
            let lda = &mut config.pipeline.lda;
            if let Some(k) = topics {
                lda.num_topics = k;
            }
            if let Some(v) = max_iter {
                lda.max_iter = v;
            }
            if let Some(v) = tolerance {
                lda.tolerance = v;
            }
            if let Some(v) = seed {
                lda.random_seed = Some(v);
            }
            if let Some(secs) = max_seconds {
                lda.max_duration = Some(Duration::from_secs(secs));
            }
            let labels = &mut config.pipeline.labels;
            if let Some(v) = top_terms {
                labels.top_terms = v;
            }
            if let Some(v) = exemplars {
                labels.exemplars = v;
            }

            let records = read_records(&input)?;
            println!(
                "Discovering {} topics in {} headlines...",
                config.pipeline.lda.num_topics,
                records.len()
            );

            let discovery =
                discover::run(&records, &config.pipeline, &FitControl::new(), !quiet)?;
            let report = &discovery.report;

            terminal::display_topics(report);
            report.display_distribution();
            terminal::display_groups(report, show);
            terminal::display_evaluation(report);

            if let Some(path) = json.or(config.report_path) {
                report.write_json(&path)?;
                info!(path = %path.display(), "Report written");
                println!("{} {}", "Report saved to".dimmed(), path.display());
            }
        }

        Commands::Vocab { input, vocab, top } => {
            let mut config = Config::load()?;
            vocab.apply(&mut config);

            let records = read_records(&input)?;
            let stats = discover::vocabulary_stats(&records, &config.pipeline.vocabulary, top)?;
            terminal::display_vocabulary(&stats);
        }
    }

    Ok(())
}

/// One record per line. Blank lines are kept so indices match line numbers.
fn read_records(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read headlines from {}", path.display()))?;
    Ok(content.lines().map(str::to_string).collect())
}

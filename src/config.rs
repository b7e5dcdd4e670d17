use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::corpus::vocabulary::VocabularyConfig;
use crate::topics::labeler::LabelConfig;
use crate::topics::model::LdaConfig;

/// Parameters of every pipeline stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub vocabulary: VocabularyConfig,
    pub lda: LdaConfig,
    pub labels: LabelConfig,
}

impl PipelineConfig {
    /// Validate the parameters that can be checked without a corpus.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.vocabulary.validate()?;
        self.lda.validate()?;
        self.labels.validate()
    }
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded at startup via dotenvy. Every variable is
/// optional; unset ones keep the stage defaults, and CLI flags are applied
/// on top by the binary.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    /// Where to write the JSON report (TOPICS_REPORT_PATH)
    pub report_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let pipeline = &mut config.pipeline;

        if let Some(v) = parse(&lookup, "TOPICS_MIN_DF")? {
            pipeline.vocabulary.min_df = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_MAX_DF")? {
            pipeline.vocabulary.max_df = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_MIN_TERM_LENGTH")? {
            pipeline.vocabulary.min_term_length = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_STOP_WORDS")? {
            pipeline.vocabulary.remove_stop_words = v;
        }

        if let Some(v) = parse(&lookup, "TOPICS_NUM_TOPICS")? {
            pipeline.lda.num_topics = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_ALPHA")? {
            pipeline.lda.alpha = Some(v);
        }
        if let Some(v) = parse(&lookup, "TOPICS_ETA")? {
            pipeline.lda.eta = Some(v);
        }
        if let Some(v) = parse(&lookup, "TOPICS_MAX_ITER")? {
            pipeline.lda.max_iter = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_BATCH_SIZE")? {
            pipeline.lda.batch_size = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_TOLERANCE")? {
            pipeline.lda.tolerance = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_SEED")? {
            pipeline.lda.random_seed = Some(v);
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "TOPICS_MAX_SECONDS")? {
            pipeline.lda.max_duration = Some(Duration::from_secs(secs));
        }

        if let Some(v) = parse(&lookup, "TOPICS_TOP_TERMS")? {
            pipeline.labels.top_terms = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_EXEMPLARS")? {
            pipeline.labels.exemplars = v;
        }
        if let Some(v) = parse(&lookup, "TOPICS_DIVERSITY")? {
            pipeline.labels.diversity = v;
        }

        config.report_path = lookup("TOPICS_REPORT_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

/// Parse an optional variable. Empty values count as unset.
fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.pipeline.vocabulary.min_df, 3);
        assert_eq!(config.pipeline.lda.max_iter, 20);
        assert_eq!(config.pipeline.labels.top_terms, 9);
        assert!(config.pipeline.lda.random_seed.is_none());
        assert!(config.report_path.is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let config = from_pairs(&[
            ("TOPICS_NUM_TOPICS", "4"),
            ("TOPICS_MAX_DF", "0.9"),
            ("TOPICS_SEED", "42"),
            ("TOPICS_MAX_SECONDS", "30"),
            ("TOPICS_REPORT_PATH", "out.json"),
        ])
        .unwrap();
        assert_eq!(config.pipeline.lda.num_topics, 4);
        assert_eq!(config.pipeline.vocabulary.max_df, 0.9);
        assert_eq!(config.pipeline.lda.random_seed, Some(42));
        assert_eq!(config.pipeline.lda.max_duration, Some(Duration::from_secs(30)));
        assert_eq!(config.report_path, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = from_pairs(&[("TOPICS_MIN_DF", "three")]).unwrap_err();
        assert!(err.to_string().contains("TOPICS_MIN_DF"));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = from_pairs(&[("TOPICS_NUM_TOPICS", "  ")]).unwrap();
        assert_eq!(config.pipeline.lda.num_topics, 10);
    }
}

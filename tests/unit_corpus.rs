// Unit tests for preprocessing and vocabulary construction working together.

use headline_topics::corpus::preprocess::Preprocessor;
use headline_topics::corpus::vocabulary::{VocabularyBuilder, VocabularyConfig};
use headline_topics::error::TopicError;

fn lenient() -> VocabularyConfig {
    VocabularyConfig {
        min_df: 1,
        max_df: 1.0,
        min_term_length: 3,
        remove_stop_words: false,
    }
}

// ============================================================
// Preprocessor
// ============================================================

#[test]
fn noise_only_records_are_dropped_with_indices() {
    let records = vec![
        "Fed signals rate cut".to_string(),
        "!!! 2024 ???".to_string(),
        "Tech earnings beat expectations".to_string(),
    ];
    let corpus = Preprocessor::new().process(&records).unwrap();
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.dropped, vec![1]);
    assert_eq!(corpus.documents[1].source_index, 2);
    assert_eq!(corpus.documents[1].text, "tech earnings beat expectations");
}

#[test]
fn all_empty_corpus_is_an_error() {
    let err = Preprocessor::new().process(&["", "42", "--"]).unwrap_err();
    assert!(matches!(err, TopicError::EmptyCorpus { records: 3 }));
    assert!(err.is_empty_corpus());
}

#[test]
fn unicode_letters_are_stripped_not_panicking() {
    let p = Preprocessor::new();
    assert_eq!(p.clean("Café owners protest"), "caf owners protest");
}

// ============================================================
// Vocabulary over preprocessed headlines
// ============================================================

#[test]
fn vocabulary_indices_follow_first_appearance() {
    let corpus = Preprocessor::new()
        .process(&["Stocks rally", "Markets rally on stocks"])
        .unwrap();
    let (vocab, dtm) = VocabularyBuilder::new(lenient())
        .unwrap()
        .build(&corpus.token_lists())
        .unwrap();

    assert_eq!(vocab.terms(), &["stocks", "rally", "markets"]);
    assert_eq!(dtm.num_documents(), 2);
    assert_eq!(dtm.num_terms(), 3);
    assert_eq!(dtm.row(1), vec![(0, 1), (1, 1), (2, 1)]);
}

#[test]
fn df_fractions_are_indexed_by_term() {
    let corpus = Preprocessor::new()
        .process(&["storm coast", "storm inland", "budget vote", "budget talks"])
        .unwrap();
    let (vocab, _) = VocabularyBuilder::new(lenient())
        .unwrap()
        .build(&corpus.token_lists())
        .unwrap();
    let fractions = vocab.document_frequency_fractions();
    let storm = vocab.index_of("storm").unwrap();
    let coast = vocab.index_of("coast").unwrap();
    assert_eq!(fractions.len(), vocab.len());
    assert!((fractions[storm] - 0.5).abs() < 1e-12);
    assert!((fractions[coast] - 0.25).abs() < 1e-12);
}

#[test]
fn high_min_df_empties_vocabulary() {
    let corpus = Preprocessor::new()
        .process(&["stocks rally", "fed signals", "tech earnings"])
        .unwrap();
    let config = VocabularyConfig {
        min_df: 4,
        ..lenient()
    };
    let err = VocabularyBuilder::new(config)
        .unwrap()
        .build(&corpus.token_lists())
        .unwrap_err();
    assert!(matches!(err, TopicError::EmptyVocabulary { documents: 3, .. }));
}

#[test]
fn default_config_matches_headline_defaults() {
    let config = VocabularyConfig::default();
    assert_eq!(config.min_df, 3);
    assert!((config.max_df - 0.7).abs() < 1e-12);
    assert_eq!(config.min_term_length, 3);
    assert!(config.remove_stop_words);
}

// Corpus preparation: text cleaning, vocabulary and count matrix.

pub mod preprocess;
pub mod vocabulary;

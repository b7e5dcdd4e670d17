// Topic modelling: LDA fitting, labeling, assignment and evaluation.

pub mod assign;
pub mod evaluate;
mod inference;
pub mod keyphrase;
pub mod labeler;
pub mod model;
pub mod report;
pub mod traits;

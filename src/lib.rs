// Headline topic discovery
//
// This is the library root. Each module corresponds to a stage (or a group
// of stages) of the discovery pipeline.

pub mod config;
pub mod corpus;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod topics;

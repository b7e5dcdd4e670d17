// Pipeline orchestration.

pub mod discover;

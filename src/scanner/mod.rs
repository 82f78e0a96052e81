//! File scanner: walker, pattern registry, classifier, risk scoring, secure deletion.

pub mod classifier;
pub mod deletion;
pub mod patterns;
pub mod scoring;
pub mod walker;

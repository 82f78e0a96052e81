//! Core types: errors, configuration, filesystem paths.

pub mod config;
pub mod errors;
pub mod paths;

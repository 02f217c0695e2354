//! Business logic behind the command layer.

pub mod dashboard;
pub mod scoring;

//! eqgrade-core: Equation-aware answer grading.
//!
//! This crate defines the data model, error taxonomy, capability traits and
//! every stage of the grading pipeline: extraction, normalization, equation
//! matching, substitution, semantic similarity, fusion and feedback.

pub mod engine;
pub mod error;
pub mod extractor;
pub mod feedback;
pub mod fusion;
pub mod matcher;
pub mod model;
pub mod normalizer;
pub mod report;
pub mod similarity;
pub mod store;
pub mod substitution;
pub mod traits;

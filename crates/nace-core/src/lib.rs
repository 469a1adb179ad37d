//! # NACE Core
//!
//! Pure, synchronous logic for the NACE classifier: the taxonomy data
//! model, the document parser, the cardinality validator, the section
//! segmenter, and retrieval score merging.
//!
//! This crate contains no tokio, sqlx, network, or filesystem I/O. Every
//! function takes text or records already in memory and returns a
//! self-contained result.

pub mod models;
pub mod parser;
pub mod retrieval;
pub mod segment;
pub mod validate;

pub use models::{Activity, Ancestor, ClassificationRecord, Segment};
pub use parser::parse;
pub use segment::segment;
pub use validate::{validate, ValidationReport};

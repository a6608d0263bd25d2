//! Report module - processing reports and run summaries

pub mod processing_report;
pub mod summary;

pub use processing_report::*;
pub use summary::*;

//! Dropwatch: Student Dropout Feature Pipeline
//!
//! A library for turning course grades, per-cycle enrollment records, cycle
//! summaries and admission records into a fixed-schema feature matrix with a
//! time-shifted dropout label, then scoring it against a frozen model.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;

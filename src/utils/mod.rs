//! Utilities - terminal styling and progress helpers

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;

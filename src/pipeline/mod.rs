//! Pipeline module - turns the raw administrative tables into a scored panel
//!
//! Stages run in a fixed order: clean → grades → reconcile → encode → label →
//! align → score. See [`runner`] for the end-to-end entry points.

pub mod align;
pub mod artifacts;
pub mod cleaning;
pub mod columns;
pub mod cycle;
pub mod encoding;
pub mod error;
pub mod grades;
pub mod issues;
pub mod label;
pub mod loader;
pub mod reconcile;
pub mod records;
pub mod runner;
pub mod scoring;
pub mod vocabulary;

pub use align::*;
pub use artifacts::*;
pub use cleaning::*;
pub use cycle::*;
pub use encoding::*;
pub use error::*;
pub use grades::*;
pub use issues::*;
pub use label::*;
pub use loader::*;
pub use reconcile::*;
pub use records::*;
pub use runner::*;
pub use scoring::*;
pub use vocabulary::*;

//! Common utilities for weft crates.
//!
//! - [`debug`] - Per-module logging controlled via the `DEBUG` environment variable
//! - [`source`] - Mapping parse positions back to lines and columns

pub mod debug;
pub mod source;

pub use debug::{create_logger, forced_logger, Logger};
pub use source::{SourceLoc, SourceModule};

//! Drift analysis engine.
//!
//! This module contains the pure comparison core: the diff engine that
//! compares one expected resource against its observed state, and the
//! data-driven classifier that assigns severity and category to each
//! mismatch.

mod classifier;
mod diff;

pub use classifier::{Classification, Classifier, MismatchKind};
pub use diff::DiffEngine;

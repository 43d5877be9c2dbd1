//! Utility functions for switchyard.
//!
//! - [`text`]: String helpers (identifier checks, "did you mean" suggestions).

pub mod text;

//! # switchyard-core
//!
//! Core types, settings, and error types for switchyard. This crate has no
//! routing logic and provides the foundation for the other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and result aliases
//! - [`settings`] - Engine settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - Text helpers (identifier checks, name suggestions)

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{
    PatternError, RoutingError, RoutingResult, UrlGenerationError, UrlGenerationErrorKind,
};
pub use settings::{DefaultUrlOptions, Settings, SETTINGS};

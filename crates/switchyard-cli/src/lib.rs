//! # switchyard-cli
//!
//! Management commands for inspecting and exercising a switchyard route file.
//!
//! This crate provides:
//!
//! - **Management commands** - A framework for defining and registering CLI commands
//!   ([`command`]), plus the built-in commands (`routes`, `recognize`, `generate`, `check`)
//! - **The `switchyard` binary** - Loads settings, sets up logging, and dispatches
//!
//! Every command reads the route file named by the global `--routes` option.
//!
//! ## Quick Start
//!
//! ```rust
//! use switchyard_cli::command::CommandRegistry;
//! use switchyard_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert_eq!(names, vec!["check", "generate", "recognize", "routes"]);
//! ```

// Allowed clippy lints:
// - module_name_repetitions: re-exports make module-prefixed names redundant
// - unused_async: command handlers keep one async signature
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;

pub use command::{load_route_set, CommandRegistry, ManagementCommand};

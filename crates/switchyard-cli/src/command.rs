//! Management command framework for switchyard.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI commands
//! and [`CommandRegistry`] for registering and dispatching them.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use switchyard_cli::command::{load_route_set, ManagementCommand};
//! use switchyard_core::{RoutingError, Settings};
//!
//! struct CountCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for CountCommand {
//!     fn name(&self) -> &str { "count" }
//!     fn help(&self) -> &str { "Print the number of routes" }
//!
//!     async fn handle(
//!         &self,
//!         matches: &clap::ArgMatches,
//!         settings: &Settings,
//!     ) -> Result<(), RoutingError> {
//!         let set = load_route_set(matches, settings)?;
//!         println!("{}", set.load().len());
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use switchyard_core::{RoutingError, RoutingResult, Settings};
use switchyard_http::routing::{RouteEntry, RouteFile, RouteSet};

/// The route file read when `--routes` is not given.
pub const DEFAULT_ROUTES_FILE: &str = "routes.toml";

/// A management command that can be registered and invoked through the CLI.
///
/// Implementations define a name, help text, optional arguments, and an async
/// handler. All commands must be `Send + Sync`.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    ///
    /// The global `--routes` and `--settings` options are visible in `matches`.
    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), RoutingError>;
}

/// Returns the route file path given on the command line.
pub fn routes_path(matches: &clap::ArgMatches) -> &str {
    matches
        .get_one::<String>("routes")
        .map_or(DEFAULT_ROUTES_FILE, String::as_str)
}

/// Reads the route file named by `--routes` into declaration entries.
///
/// # Errors
///
/// Returns [`RoutingError::Configuration`] when the file cannot be read or parsed.
pub fn load_entries(matches: &clap::ArgMatches) -> RoutingResult<Vec<RouteEntry>> {
    let path = routes_path(matches);
    tracing::debug!(path, "Loading route file");
    RouteFile::from_file(path)?.into_entries()
}

/// Reads the route file named by `--routes` and draws it.
///
/// # Errors
///
/// Returns a loading error or the first build-time error of the declarations.
pub fn load_route_set(matches: &clap::ArgMatches, settings: &Settings) -> RoutingResult<RouteSet> {
    RouteSet::draw(load_entries(matches)?, settings.clone())
}

/// A registry of management commands.
///
/// Commands are registered by name and can be looked up, listed, or executed.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a management command.
    ///
    /// If a command with the same name already exists, it is replaced.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns a reference to the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(|cmd| &**cmd)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds a top-level clap `Command` containing all registered subcommands.
    ///
    /// The `--routes` and `--settings` options are global, so they may appear
    /// before or after the subcommand name.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("switchyard")
            .about("Inspect and exercise a switchyard route file")
            .subcommand_required(true)
            .arg(
                clap::Arg::new("routes")
                    .long("routes")
                    .short('r')
                    .global(true)
                    .default_value(DEFAULT_ROUTES_FILE)
                    .help("Route file to load (TOML, or JSON by extension)"),
            )
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .global(true)
                    .help("Settings file (TOML, or JSON by extension)"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap wants &'static str names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            let subcmd = cmd.add_arguments(subcmd);
            app = app.subcommand(subcmd);
        }

        app
    }

    /// Executes the command identified by the given argument matches.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Configuration`] for a missing or unknown
    /// subcommand, or whatever the command's handler returns.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), RoutingError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            RoutingError::Configuration("No subcommand specified".to_string())
        })?;

        let cmd = self
            .get(name)
            .ok_or_else(|| RoutingError::Configuration(format!("Unknown command: {name}")))?;

        cmd.handle(sub_matches, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TestCommand {
        cmd_name: String,
    }

    impl TestCommand {
        fn new(name: &str) -> Self {
            Self {
                cmd_name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl ManagementCommand for TestCommand {
        fn name(&self) -> &str {
            &self.cmd_name
        }

        fn help(&self) -> &'static str {
            "A test command"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                clap::Arg::new("verbose")
                    .long("verbose")
                    .action(clap::ArgAction::SetTrue),
            )
        }

        async fn handle(
            &self,
            _matches: &clap::ArgMatches,
            _settings: &Settings,
        ) -> Result<(), RoutingError> {
            Ok(())
        }
    }

    struct LoadCommand;

    #[async_trait]
    impl ManagementCommand for LoadCommand {
        fn name(&self) -> &'static str {
            "load"
        }

        fn help(&self) -> &'static str {
            "Draws the route file"
        }

        async fn handle(
            &self,
            matches: &clap::ArgMatches,
            settings: &Settings,
        ) -> Result<(), RoutingError> {
            load_route_set(matches, settings).map(|_| ())
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CommandRegistry::default();
        registry.register(Box::new(TestCommand::new("test")));
        assert_eq!(registry.len(), 1);

        let cmd = registry.get("test").unwrap();
        assert_eq!(cmd.name(), "test");
        assert_eq!(cmd.help(), "A test command");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_list_commands_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("zebra")));
        registry.register(Box::new(TestCommand::new("alpha")));
        registry.register(Box::new(TestCommand::new("alpha")));

        assert_eq!(registry.list_commands(), vec!["alpha", "zebra"]);
    }

    #[test]
    fn test_global_routes_option() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(TestCommand::new("test")));

        let matches = registry
            .build_cli()
            .try_get_matches_from(["switchyard", "test", "--verbose", "--routes", "app.toml"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "test");
        assert!(sub.get_flag("verbose"));
        assert_eq!(routes_path(sub), "app.toml");

        let matches = registry
            .build_cli()
            .try_get_matches_from(["switchyard", "test"])
            .unwrap();
        assert_eq!(routes_path(matches.subcommand().unwrap().1), DEFAULT_ROUTES_FILE);
    }

    #[test]
    fn test_subcommand_required() {
        let registry = CommandRegistry::new();
        assert!(registry.build_cli().try_get_matches_from(["switchyard"]).is_err());
    }

    #[tokio::test]
    async fn test_execute_loads_route_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[[routes]]\npath = \"/up\"\nto = \"health#show\"").unwrap();

        let mut registry = CommandRegistry::new();
        registry.register(Box::new(LoadCommand));
        let path = file.path().to_str().unwrap();
        let matches = registry
            .build_cli()
            .try_get_matches_from(["switchyard", "--routes", path, "load"])
            .unwrap();

        assert!(registry.execute(&matches, &Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_missing_route_file() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(LoadCommand));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["switchyard", "load", "--routes", "/nonexistent/routes.toml"])
            .unwrap();

        let err = registry
            .execute(&matches, &Settings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }
}

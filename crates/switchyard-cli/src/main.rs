//! The `switchyard` binary.

use anyhow::Context;
use switchyard_cli::command::CommandRegistry;
use switchyard_cli::commands::register_builtin_commands;
use switchyard_core::logging::setup_logging;
use switchyard_core::{settings_loader, Settings, SETTINGS};

fn load_settings(path: Option<&String>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(settings_loader::from_env());
    };
    settings_loader::load_file_with_env(path)
        .with_context(|| format!("loading settings from {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);

    let matches = registry.build_cli().get_matches();
    let settings = load_settings(matches.get_one::<String>("settings"))?;

    setup_logging(&settings);
    SETTINGS.configure(settings.clone());

    registry.execute(&matches, &settings).await?;
    Ok(())
}

//! Reading [`Settings`] from a settings file and the environment.
//!
//! A settings document only lists what it changes; everything else keeps its
//! default. TOML and JSON documents are both accepted and the format is picked
//! from the file extension (`.json` is JSON, anything else is TOML).
//!
//! `SWITCHYARD_*` environment variables are applied last:
//!
//! | Variable | Setting |
//! |---|---|
//! | `SWITCHYARD_DEBUG` | `debug` |
//! | `SWITCHYARD_LOG_LEVEL` | `log_level` |
//! | `SWITCHYARD_TLD_LENGTH` | `tld_length` |
//! | `SWITCHYARD_APPEND_FORMAT` | `append_format` |
//! | `SWITCHYARD_OPTIMIZE_GENERATION` | `optimize_generation` |
//! | `SWITCHYARD_DEFAULT_HOST` | `default_url_options.host` |
//! | `SWITCHYARD_DEFAULT_PROTOCOL` | `default_url_options.protocol` |
//! | `SWITCHYARD_DEFAULT_PORT` | `default_url_options.port` |
//!
//! ```rust,no_run
//! use switchyard_core::settings_loader;
//!
//! let settings = settings_loader::load_file_with_env("config/switchyard.toml").unwrap();
//! ```

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::RoutingError;
use crate::settings::Settings;

/// The syntax of a settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    /// `.toml` and extensionless files.
    Toml,
    /// `.json` files.
    Json,
}

impl SettingsFormat {
    /// Picks the format from a file extension.
    pub fn for_path(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Self::Json
        } else {
            Self::Toml
        }
    }

    fn parse(self, source: &str) -> Result<Value, RoutingError> {
        match self {
            Self::Toml => toml::from_str::<toml::Value>(source)
                .map(toml_to_json)
                .map_err(|e| RoutingError::Configuration(format!("Invalid TOML settings: {e}"))),
            Self::Json => serde_json::from_str(source)
                .map_err(|e| RoutingError::Configuration(format!("Invalid JSON settings: {e}"))),
        }
    }
}

/// Parses a settings document, layering it over the defaults.
///
/// # Errors
///
/// Returns [`RoutingError::Configuration`] for malformed documents and for
/// values of the wrong type.
pub fn parse(source: &str, format: SettingsFormat) -> Result<Settings, RoutingError> {
    let mut document = serde_json::to_value(Settings::default())
        .map_err(|e| RoutingError::Configuration(e.to_string()))?;
    overlay(&mut document, format.parse(source)?);
    serde_json::from_value(document)
        .map_err(|e| RoutingError::Configuration(format!("Invalid settings value: {e}")))
}

/// Reads and parses a settings file.
///
/// # Errors
///
/// Returns [`RoutingError::Configuration`] if the file cannot be read or parsed.
pub fn load_file(path: impl AsRef<Path>) -> Result<Settings, RoutingError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| {
        RoutingError::Configuration(format!("Cannot read settings file '{}': {e}", path.display()))
    })?;
    parse(&source, SettingsFormat::for_path(path))
}

/// Reads a settings file, then applies the environment.
///
/// # Errors
///
/// Same as [`load_file`].
pub fn load_file_with_env(path: impl AsRef<Path>) -> Result<Settings, RoutingError> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Default settings with the environment applied.
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies every `SWITCHYARD_*` variable that is set.
///
/// A value that does not parse leaves the setting unchanged and logs a warning.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_vars(settings, |name| std::env::var(name).ok());
}

type Apply = fn(&mut Settings, String) -> bool;

const ENV_VARS: &[(&str, Apply)] = &[
    ("SWITCHYARD_DEBUG", |s: &mut Settings, v: String| set_flag(&mut s.debug, &v)),
    ("SWITCHYARD_LOG_LEVEL", |s: &mut Settings, v: String| {
        s.log_level = v;
        true
    }),
    ("SWITCHYARD_TLD_LENGTH", |s: &mut Settings, v: String| {
        v.parse::<usize>().map(|n| s.tld_length = n).is_ok()
    }),
    ("SWITCHYARD_APPEND_FORMAT", |s: &mut Settings, v: String| {
        set_flag(&mut s.append_format, &v)
    }),
    ("SWITCHYARD_OPTIMIZE_GENERATION", |s: &mut Settings, v: String| {
        set_flag(&mut s.optimize_generation, &v)
    }),
    ("SWITCHYARD_DEFAULT_HOST", |s: &mut Settings, v: String| {
        s.default_url_options.host = Some(v).filter(|h| !h.is_empty());
        true
    }),
    ("SWITCHYARD_DEFAULT_PROTOCOL", |s: &mut Settings, v: String| {
        s.default_url_options.protocol = Some(v).filter(|p| !p.is_empty());
        true
    }),
    ("SWITCHYARD_DEFAULT_PORT", |s: &mut Settings, v: String| {
        v.parse::<u16>().map(|p| s.default_url_options.port = Some(p)).is_ok()
    }),
];

fn apply_vars(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    for &(name, apply) in ENV_VARS {
        let Some(value) = lookup(name) else { continue };
        if !apply(settings, value.clone()) {
            tracing::warn!(variable = name, value = %value, "ignoring unparseable setting");
        }
    }
}

fn set_flag(slot: &mut bool, value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        _ => return false,
    }
    true
}

/// Writes `layer` into `base`, descending into tables present in both.
fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                overlay(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, layer) => *slot = layer,
    }
}

/// Converts a TOML value into the equivalent JSON value.
///
/// Datetimes become strings.
pub fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => items.into_iter().map(toml_to_json).collect(),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

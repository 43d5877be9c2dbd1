//! Settings system for switchyard.
//!
//! This module provides the [`Settings`] struct, which holds engine-wide
//! configuration, and [`LazySettings`], a globally-accessible, lazily-initialized
//! settings instance.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Ambient options used when generating full URLs.
///
/// These are the lowest-precedence source of host/protocol/port information:
/// explicit generation options override them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultUrlOptions {
    /// The host to link to (e.g. `example.com`).
    pub host: Option<String>,
    /// The protocol (e.g. `http` or `https`). Defaults to `http` when unset.
    pub protocol: Option<String>,
    /// An explicit port. Standard ports are omitted from generated URLs.
    pub port: Option<u16>,
    /// A path prefix prepended to every generated path.
    pub script_name: Option<String>,
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use switchyard_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.tld_length, 1);
/// assert!(settings.optimize_generation);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled (affects log formatting).
    pub debug: bool,

    // ── Recognition ──────────────────────────────────────────────────

    /// Number of labels in the top-level domain, used to split hosts into
    /// subdomain and domain (1 for `example.com`, 2 for `example.co.uk`).
    pub tld_length: usize,
    /// Whether routes get an implicit optional `(.:format)` suffix.
    pub append_format: bool,
    /// Name of the response header that signals "try another handler".
    pub cascade_header: String,

    // ── Generation ───────────────────────────────────────────────────

    /// Ambient URL options for generation.
    pub default_url_options: DefaultUrlOptions,
    /// Whether positional generation may use the precomputed template.
    pub optimize_generation: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level (e.g. "info", "debug", "warn").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            tld_length: 1,
            append_format: true,
            cascade_header: "x-cascade".to_string(),
            default_url_options: DefaultUrlOptions::default(),
            optimize_generation: true,
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
///
/// # Panics
///
/// [`get`](LazySettings::get) panics if settings have not been configured.
/// [`configure`](LazySettings::configure) panics if called more than once.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns the configured settings, if any.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
///
/// Call `SETTINGS.configure(settings)` once at application startup, then
/// access settings via `SETTINGS.get()` anywhere.
pub static SETTINGS: LazySettings = LazySettings::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.tld_length, 1);
        assert!(s.append_format);
        assert_eq!(s.cascade_header, "x-cascade");
        assert!(s.optimize_generation);
        assert_eq!(s.log_level, "info");
        assert!(s.default_url_options.host.is_none());
        assert!(s.extra.is_empty());
    }

    #[test]
    fn test_settings_roundtrip_through_json() {
        let mut s = Settings::default();
        s.default_url_options.host = Some("example.com".to_string());
        s.default_url_options.port = Some(8080);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["default_url_options"]["host"], "example.com");
        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back.default_url_options, s.default_url_options);
    }

    #[test]
    fn test_lazy_settings_configure_and_get() {
        let lazy = LazySettings::new();
        assert!(!lazy.is_configured());
        assert!(lazy.try_get().is_none());

        let mut settings = Settings::default();
        settings.debug = false;
        settings.tld_length = 2;

        lazy.configure(settings);
        assert!(lazy.is_configured());
        assert!(!lazy.get().debug);
        assert_eq!(lazy.get().tld_length, 2);
    }

    #[test]
    #[should_panic(expected = "already been configured")]
    fn test_lazy_settings_double_configure_panics() {
        let lazy = LazySettings::new();
        lazy.configure(Settings::default());
        lazy.configure(Settings::default());
    }

    #[test]
    #[should_panic(expected = "not been configured")]
    fn test_lazy_settings_get_before_configure_panics() {
        let lazy = LazySettings::new();
        let _ = lazy.get();
    }
}

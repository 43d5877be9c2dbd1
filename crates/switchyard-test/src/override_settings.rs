//! Per-thread settings for tests.
//!
//! [`override_settings`] runs a closure with some routing settings changed and
//! puts the previous settings back afterwards, also when the closure panics.
//! Overrides nest: an inner override starts from whatever the outer one set.
//! [`draw_routes`](crate::draw_routes) draws with [`current_settings`].
//!
//! ```
//! use switchyard_test::override_settings::{current_settings, override_settings, SettingsOverride};
//!
//! override_settings(SettingsOverride::new().tld_length(2), || {
//!     assert_eq!(current_settings().tld_length, 2);
//! });
//! assert_eq!(current_settings().tld_length, 1);
//! ```

use std::cell::RefCell;

use switchyard_core::settings::Settings;

thread_local! {
    static ACTIVE: RefCell<Option<Settings>> = const { RefCell::new(None) };
}

/// The routing settings a test changes.
///
/// Fields left unset keep the value of the enclosing settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverride {
    tld_length: Option<usize>,
    append_format: Option<bool>,
    optimize_generation: Option<bool>,
    cascade_header: Option<String>,
    default_host: Option<String>,
    default_protocol: Option<String>,
    default_port: Option<u16>,
}

impl SettingsOverride {
    /// An override that changes nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels in the top-level domain.
    #[must_use]
    pub const fn tld_length(mut self, labels: usize) -> Self {
        self.tld_length = Some(labels);
        self
    }

    /// Whether drawn routes get the `(.:format)` suffix.
    #[must_use]
    pub const fn append_format(mut self, append: bool) -> Self {
        self.append_format = Some(append);
        self
    }

    #[must_use]
    pub const fn optimize_generation(mut self, optimize: bool) -> Self {
        self.optimize_generation = Some(optimize);
        self
    }

    #[must_use]
    pub fn cascade_header(mut self, header: &str) -> Self {
        self.cascade_header = Some(header.to_string());
        self
    }

    /// Host used for full URLs when the call gives none.
    #[must_use]
    pub fn default_host(mut self, host: &str) -> Self {
        self.default_host = Some(host.to_string());
        self
    }

    #[must_use]
    pub fn default_protocol(mut self, protocol: &str) -> Self {
        self.default_protocol = Some(protocol.to_string());
        self
    }

    #[must_use]
    pub const fn default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    /// Applies the override on top of `base`.
    pub fn apply(self, mut base: Settings) -> Settings {
        if let Some(labels) = self.tld_length {
            base.tld_length = labels;
        }
        if let Some(append) = self.append_format {
            base.append_format = append;
        }
        if let Some(optimize) = self.optimize_generation {
            base.optimize_generation = optimize;
        }
        if let Some(header) = self.cascade_header {
            base.cascade_header = header;
        }
        let url = &mut base.default_url_options;
        url.host = self.default_host.or(url.host.take());
        url.protocol = self.default_protocol.or(url.protocol.take());
        url.port = self.default_port.or(url.port);
        base
    }
}

/// Runs `f` with `overrides` applied to the current settings.
pub fn override_settings<F, R>(overrides: SettingsOverride, f: F) -> R
where
    F: FnOnce() -> R,
{
    struct Restore(Option<Settings>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            ACTIVE.with(|active| *active.borrow_mut() = previous);
        }
    }

    let next = overrides.apply(current_settings());
    let _restore = Restore(ACTIVE.with(|active| active.replace(Some(next))));
    f()
}

/// The settings in effect on this thread, or the defaults.
pub fn current_settings() -> Settings {
    ACTIVE.with(|active| active.borrow().clone().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_outside_an_override() {
        assert_eq!(current_settings().tld_length, Settings::default().tld_length);
        assert!(current_settings().append_format);
    }

    #[test]
    fn test_generation_settings() {
        let overrides = SettingsOverride::new()
            .default_host("example.com")
            .default_protocol("https")
            .default_port(8443)
            .optimize_generation(false)
            .append_format(false);
        override_settings(overrides, || {
            let s = current_settings();
            assert_eq!(s.default_url_options.host.as_deref(), Some("example.com"));
            assert_eq!(s.default_url_options.protocol.as_deref(), Some("https"));
            assert_eq!(s.default_url_options.port, Some(8443));
            assert!(!s.optimize_generation);
            assert!(!s.append_format);
        });
        assert!(current_settings().default_url_options.host.is_none());
    }

    #[test]
    fn test_inner_override_layers_on_outer() {
        override_settings(SettingsOverride::new().tld_length(2).default_host("a.test"), || {
            override_settings(SettingsOverride::new().cascade_header("x-pass"), || {
                let s = current_settings();
                assert_eq!(s.tld_length, 2);
                assert_eq!(s.default_url_options.host.as_deref(), Some("a.test"));
                assert_eq!(s.cascade_header, "x-pass");
            });
            assert_eq!(current_settings().cascade_header, "x-cascade");
        });
        assert_eq!(current_settings().tld_length, 1);
    }

    #[test]
    fn test_restored_after_panic() {
        let outcome = std::panic::catch_unwind(|| {
            override_settings(SettingsOverride::new().tld_length(3), || panic!("boom"));
        });
        assert!(outcome.is_err());
        assert_eq!(current_settings().tld_length, 1);
    }

    #[test]
    fn test_returns_closure_value() {
        let labels = override_settings(SettingsOverride::new().tld_length(2), || {
            current_settings().tld_length
        });
        assert_eq!(labels, 2);
    }
}

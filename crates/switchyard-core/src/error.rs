//! Core error types for switchyard.
//!
//! Errors fall into three groups that surface at different times:
//!
//! - **Build-time** errors ([`RoutingError::Pattern`], [`RoutingError::ConstraintConfig`],
//!   [`RoutingError::ImproperlyConfigured`]) are raised while a route table is drawn.
//! - **Match-time** request errors ([`RoutingError::BadRequest`]) are raised when an
//!   incoming path cannot be decoded. Ordinary non-matches are *not* errors.
//! - **Generation-time** errors ([`RoutingError::UrlGeneration`],
//!   [`RoutingError::UnfilteredParameters`]) are raised while building a URL.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors raised while compiling a path pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// An optional group was opened but never closed, or closed without being opened.
    #[error("unbalanced parentheses in pattern '{0}'")]
    UnbalancedGroup(String),

    /// A `:` or `*` was not followed by a parameter name.
    #[error("missing parameter name after '{marker}' in pattern '{pattern}'")]
    EmptyParameterName {
        /// The pattern being compiled.
        pattern: String,
        /// The marker character (`:` or `*`).
        marker: char,
    },

    /// More than one glob segment appears in the pattern.
    #[error("pattern '{0}' contains more than one glob segment")]
    MultipleGlobs(String),

    /// A required capture follows the glob segment.
    #[error("parameter '{name}' follows the glob segment in pattern '{pattern}'")]
    CaptureAfterGlob {
        /// The pattern being compiled.
        pattern: String,
        /// The offending parameter.
        name: String,
    },

    /// A parameter name collides with a reserved generation option.
    #[error("parameter name '{name}' in pattern '{pattern}' is reserved")]
    ReservedName {
        /// The pattern being compiled.
        pattern: String,
        /// The reserved name.
        name: String,
    },

    /// A segment requirement was given for a name the pattern does not contain.
    #[error("requirement given for '{name}' but pattern '{pattern}' has no such segment")]
    UnknownRequirement {
        /// The pattern being compiled.
        pattern: String,
        /// The requirement key.
        name: String,
    },

    /// A requirement regex is invalid or uses anchors.
    #[error("invalid requirement for '{name}': {reason}")]
    InvalidRequirement {
        /// The requirement key.
        name: String,
        /// Why the regex was rejected.
        reason: String,
    },
}

/// The kind of failure behind a [`UrlGenerationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlGenerationErrorKind {
    /// No route is registered under the requested name.
    UnknownRoute,
    /// One or more required keys had no value.
    MissingKeys,
    /// One or more values were rejected by the route's requirements.
    RejectedValues,
    /// No unnamed route accepts the given parameters.
    NoRouteMatches,
    /// A full URL was requested but no host is known.
    MissingHost,
}

/// A URL generation failure with the full context of the attempt.
///
/// Carries the attempted parameters (sorted), the missing or rejected keys, and a
/// suggested route name when the requested one does not exist. The [`Display`]
/// implementation renders a readable message; callers needing another format can
/// build one from the fields.
///
/// [`Display`]: fmt::Display
///
/// # Examples
///
/// ```
/// use switchyard_core::error::{UrlGenerationError, UrlGenerationErrorKind};
///
/// let err = UrlGenerationError::new(UrlGenerationErrorKind::MissingKeys)
///     .with_route("project")
///     .with_param("controller", "projects")
///     .with_missing(vec!["id".to_string()]);
/// assert_eq!(err.missing_keys, vec!["id"]);
/// assert!(err.to_string().contains("missing required keys: [id]"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlGenerationError {
    /// What went wrong.
    pub kind: UrlGenerationErrorKind,
    /// The route name that was requested, if any.
    pub route_name: Option<String>,
    /// Every parameter that took part in the attempt.
    pub params: BTreeMap<String, String>,
    /// Required keys without a value.
    pub missing_keys: Vec<String>,
    /// Keys whose values failed a requirement.
    pub rejected_keys: Vec<String>,
    /// A likely-intended route name.
    pub suggestion: Option<String>,
}

impl UrlGenerationError {
    /// Creates an empty error of the given kind.
    pub const fn new(kind: UrlGenerationErrorKind) -> Self {
        Self {
            kind,
            route_name: None,
            params: BTreeMap::new(),
            missing_keys: Vec::new(),
            rejected_keys: Vec::new(),
            suggestion: None,
        }
    }

    /// Sets the requested route name.
    #[must_use]
    pub fn with_route(mut self, name: impl Into<String>) -> Self {
        self.route_name = Some(name.into());
        self
    }

    /// Adds one attempted parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replaces the attempted parameters.
    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Sets the missing keys.
    #[must_use]
    pub fn with_missing(mut self, keys: Vec<String>) -> Self {
        self.missing_keys = keys;
        self
    }

    /// Sets the rejected keys.
    #[must_use]
    pub fn with_rejected(mut self, keys: Vec<String>) -> Self {
        self.rejected_keys = keys;
        self
    }

    /// Sets the suggested route name.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

impl fmt::Display for UrlGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            UrlGenerationErrorKind::MissingHost => {
                return write!(
                    f,
                    "Missing host to link to! Provide a host option or set default_url_options.host"
                );
            }
            UrlGenerationErrorKind::UnknownRoute => {
                write!(
                    f,
                    "No route named '{}'",
                    self.route_name.as_deref().unwrap_or_default()
                )?;
            }
            _ => {
                write!(f, "No route matches {{")?;
                for (i, (key, value)) in self.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value:?}")?;
                }
                write!(f, "}}")?;
                if let Some(name) = &self.route_name {
                    write!(f, " for route '{name}'")?;
                }
            }
        }
        if !self.missing_keys.is_empty() {
            write!(f, ", missing required keys: [{}]", self.missing_keys.join(", "))?;
        }
        if !self.rejected_keys.is_empty() {
            write!(
                f,
                ", possible unmatched constraints: [{}]",
                self.rejected_keys.join(", ")
            )?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nDid you mean? {suggestion}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UrlGenerationError {}

/// The primary error type for switchyard.
///
/// Each variant maps to an HTTP status code via [`RoutingError::status_code`], so a
/// transport layer can turn any of them into a response.
#[derive(Error, Debug)]
pub enum RoutingError {
    // ── Build time ───────────────────────────────────────────────────

    /// A path pattern could not be compiled.
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// A constraint value has a shape the evaluator does not support.
    #[error("Unsupported constraint: {0}")]
    ConstraintConfig(String),

    /// The route declarations are inconsistent (bad names, missing endpoints, ...).
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Match time ───────────────────────────────────────────────────

    /// The request path is not valid percent-encoded UTF-8.
    #[error("Bad request: {0}")]
    BadRequest(String),

    // ── Generation time ──────────────────────────────────────────────

    /// A URL could not be generated.
    #[error("{0}")]
    UrlGeneration(UrlGenerationError),

    /// An unpermitted parameter source was passed to URL generation.
    #[error("Attempting to generate a URL from non-sanitized request parameters: [{}]", .0.join(", "))]
    UnfilteredParameters(Vec<String>),

    // ── Configuration ────────────────────────────────────────────────

    /// A settings or route file could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UrlGenerationError> for RoutingError {
    fn from(err: UrlGenerationError) -> Self {
        Self::UrlGeneration(err)
    }
}

impl RoutingError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `UnfilteredParameters` -> 400
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::UnfilteredParameters(_) => 400,
            Self::Pattern(_)
            | Self::ConstraintConfig(_)
            | Self::ImproperlyConfigured(_)
            | Self::UrlGeneration(_)
            | Self::Configuration(_)
            | Self::Io(_) => 500,
        }
    }

    /// Returns `true` for errors raised while drawing a route table.
    pub const fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::Pattern(_) | Self::ConstraintConfig(_) | Self::ImproperlyConfigured(_)
        )
    }

    /// Returns the generation error, if this is one.
    pub const fn as_url_generation(&self) -> Option<&UrlGenerationError> {
        match self {
            Self::UrlGeneration(err) => Some(err),
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, RoutingError>`.
pub type RoutingResult<T> = Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_generation_error_display_missing_keys() {
        let err = UrlGenerationError::new(UrlGenerationErrorKind::MissingKeys)
            .with_route("project")
            .with_param("controller", "projects")
            .with_param("action", "show")
            .with_missing(vec!["id".to_string()]);
        let msg = err.to_string();
        assert_eq!(
            msg,
            "No route matches {action: \"show\", controller: \"projects\"} for route 'project', \
             missing required keys: [id]"
        );
    }

    #[test]
    fn test_url_generation_error_display_unknown_route_with_suggestion() {
        let err = UrlGenerationError::new(UrlGenerationErrorKind::UnknownRoute)
            .with_route("projct")
            .with_suggestion(Some("project".to_string()));
        let msg = err.to_string();
        assert!(msg.starts_with("No route named 'projct'"));
        assert!(msg.ends_with("Did you mean? project"));
    }

    #[test]
    fn test_url_generation_error_display_rejected() {
        let err = UrlGenerationError::new(UrlGenerationErrorKind::RejectedValues)
            .with_param("id", "abc")
            .with_rejected(vec!["id".to_string()]);
        assert!(err
            .to_string()
            .contains("possible unmatched constraints: [id]"));
    }

    #[test]
    fn test_missing_host_display() {
        let err = UrlGenerationError::new(UrlGenerationErrorKind::MissingHost);
        assert!(err.to_string().starts_with("Missing host to link to!"));
    }

    #[test]
    fn test_routing_error_status_codes() {
        assert_eq!(RoutingError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(
            RoutingError::UnfilteredParameters(vec!["id".into()]).status_code(),
            400
        );
        assert_eq!(RoutingError::ConstraintConfig("x".into()).status_code(), 500);
        assert_eq!(
            RoutingError::Pattern(PatternError::MultipleGlobs("/*a/*b".into())).status_code(),
            500
        );
        assert_eq!(
            RoutingError::UrlGeneration(UrlGenerationError::new(
                UrlGenerationErrorKind::MissingKeys
            ))
            .status_code(),
            500
        );
    }

    #[test]
    fn test_build_error_classification() {
        assert!(RoutingError::ImproperlyConfigured("x".into()).is_build_error());
        assert!(RoutingError::ConstraintConfig("x".into()).is_build_error());
        assert!(!RoutingError::BadRequest("x".into()).is_build_error());
    }

    #[test]
    fn test_unfiltered_parameters_display() {
        let err = RoutingError::UnfilteredParameters(vec!["id".into(), "name".into()]);
        assert_eq!(
            err.to_string(),
            "Attempting to generate a URL from non-sanitized request parameters: [id, name]"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: RoutingError = io_err.into();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("file missing"));
    }
}

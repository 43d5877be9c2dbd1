//! Declarative route files.
//!
//! A route file lists routes and nested scopes in TOML or JSON:
//!
//! ```toml
//! [[routes]]
//! path = "/projects/:id"
//! to = "projects#show"
//! name = "project"
//! constraints = { id = { regex = "[0-9]+" } }
//!
//! [[routes]]
//! path = "/admin"
//! module = "admin"
//! name_prefix = "admin"
//!
//!   [[routes.routes]]
//!   method = "get|post"
//!   path = "reports"
//!   to = "reports#index"
//!   name = "reports"
//! ```
//!
//! An entry with a `routes` list is a scope; anything else is a route.
//! Constraint values use the shapes of
//! [`Constraint::from_value`](super::constraints::Constraint::from_value).
//! Constraint keys are applied in sorted order.

use std::collections::BTreeMap;
use std::path::Path;

use http::Method;
use serde::Deserialize;
use serde_json::Value;

use switchyard_core::settings_loader::toml_to_json;
use switchyard_core::{RoutingError, RoutingResult};

use super::constraints::Constraint;
use super::redirect::Redirect;
use super::route::{FormatOption, RouteDeclaration, Verbs};
use super::scope::ScopeFrame;
use super::table::RouteEntry;

/// A parsed route file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteFile {
    /// Top-level entries, in precedence order.
    #[serde(default)]
    pub routes: Vec<EntrySpec>,
}

/// One entry of a route file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    /// A nested block.
    Scope(ScopeSpec),
    /// A single route.
    Route(RouteSpec),
}

/// A scope block.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeSpec {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub shallow_path: Option<String>,
    #[serde(default)]
    pub shallow_prefix: Option<String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, Value>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    pub format: Option<FormatOption>,
    #[serde(default)]
    pub only: Option<Vec<String>>,
    #[serde(default)]
    pub except: Option<Vec<String>>,
    pub routes: Vec<EntrySpec>,
}

/// A redirect target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectSpec {
    pub to: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub host: Option<String>,
}

/// A route.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    pub path: String,
    /// `get`, `get|post`, or `any`. Defaults to `get`.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Mounts the handle at a path prefix instead of declaring a route.
    #[serde(default)]
    pub mount: Option<String>,
    #[serde(default)]
    pub redirect: Option<RedirectSpec>,
    #[serde(default)]
    pub constraints: BTreeMap<String, Value>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    pub format: Option<FormatOption>,
    #[serde(default)]
    pub shallow: bool,
}

impl RouteFile {
    /// Parses a TOML route file.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Configuration`] on syntax or shape errors.
    pub fn from_toml_str(source: &str) -> RoutingResult<Self> {
        let value: toml::Value = toml::from_str(source)
            .map_err(|e| RoutingError::Configuration(format!("Failed to parse TOML: {e}")))?;
        serde_json::from_value(toml_to_json(value)).map_err(|e| {
            RoutingError::Configuration(format!("Invalid route file: {e}"))
        })
    }

    /// Parses a JSON route file.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Configuration`] on syntax or shape errors.
    pub fn from_json_str(source: &str) -> RoutingResult<Self> {
        serde_json::from_str(source)
            .map_err(|e| RoutingError::Configuration(format!("Invalid route file: {e}")))
    }

    /// Reads a route file, as JSON when the extension is `.json` and as TOML otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Configuration`] when the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> RoutingResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RoutingError::Configuration(format!(
                "Failed to read route file '{}': {e}",
                path.display()
            ))
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Converts the file into declaration entries.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::ConstraintConfig`] for unsupported constraint
    /// shapes and [`RoutingError::Configuration`] for unknown methods.
    pub fn into_entries(self) -> RoutingResult<Vec<RouteEntry>> {
        self.routes.into_iter().map(EntrySpec::into_entry).collect()
    }
}

impl EntrySpec {
    fn into_entry(self) -> RoutingResult<RouteEntry> {
        match self {
            Self::Scope(scope) => scope.into_entry(),
            Self::Route(route) => route.into_declaration().map(RouteEntry::Route),
        }
    }
}

impl ScopeSpec {
    fn into_entry(self) -> RoutingResult<RouteEntry> {
        let mut frame = ScopeFrame::new();
        if let Some(path) = self.path {
            frame = frame.path(path);
        }
        if let Some(prefix) = self.name_prefix {
            frame = frame.name_prefix(prefix);
        }
        if let Some(module) = self.module {
            frame = frame.module(module);
        }
        if let Some(path) = self.shallow_path {
            frame = frame.shallow_path(path);
        }
        if let Some(prefix) = self.shallow_prefix {
            frame = frame.shallow_prefix(prefix);
        }
        for (key, value) in &self.constraints {
            frame = frame.constraint(key.clone(), Constraint::from_value(key, value)?);
        }
        for (key, value) in self.defaults {
            frame = frame.default_param(key, value);
        }
        if let Some(format) = self.format {
            frame = frame.format(format);
        }
        if let Some(only) = self.only {
            frame = frame.only(only);
        }
        if let Some(except) = self.except {
            frame = frame.except(except);
        }

        let entries = self
            .routes
            .into_iter()
            .map(EntrySpec::into_entry)
            .collect::<RoutingResult<Vec<_>>>()?;
        Ok(RouteEntry::scope(frame, entries))
    }
}

impl RouteSpec {
    fn into_declaration(self) -> RoutingResult<RouteDeclaration> {
        let mut decl = match self.mount {
            Some(handle) => RouteDeclaration::mount(self.path, handle),
            None => RouteDeclaration::new(parse_verbs(self.method.as_deref())?, self.path),
        };
        if let Some(to) = self.to {
            decl = decl.to(to);
        }
        if let Some(controller) = self.controller {
            decl = decl.controller(controller);
        }
        if let Some(action) = self.action {
            decl = decl.action(action);
        }
        if let Some(name) = self.name {
            decl = decl.name(name);
        }
        if let Some(redirect) = self.redirect {
            let mut target = Redirect::to(redirect.to);
            if let Some(status) = redirect.status {
                target = target.status(status);
            }
            if let Some(host) = redirect.host {
                target = target.host(host);
            }
            decl = decl.redirect(target);
        }
        for (key, value) in &self.constraints {
            decl = decl.constraint(key.clone(), Constraint::from_value(key, value)?);
        }
        for (key, value) in self.defaults {
            decl = decl.default_param(key, value);
        }
        if let Some(format) = self.format {
            decl = decl.format(format);
        }
        if self.shallow {
            decl = decl.shallow();
        }
        Ok(decl)
    }
}

/// Parses `get`, `GET|POST`, or `any`.
fn parse_verbs(method: Option<&str>) -> RoutingResult<Verbs> {
    let Some(method) = method else {
        return Ok(Verbs::Only(vec![Method::GET]));
    };
    if method.eq_ignore_ascii_case("any") || method == "*" {
        return Ok(Verbs::Any);
    }
    method
        .split('|')
        .map(|m| {
            Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| RoutingError::Configuration(format!("Invalid HTTP method '{m}'")))
        })
        .collect::<RoutingResult<Vec<_>>>()
        .map(Verbs::Only)
}

//! Declaration scopes.
//!
//! A [`Scope`] is an immutable set of inherited defaults. Entering a nested
//! block derives a new scope from its parent with [`Scope::nest`]; leaving the
//! block simply drops it.
//!
//! Composition rules:
//!
//! - path prefixes and shallow paths concatenate;
//! - name prefixes and shallow prefixes join with `_`;
//! - module prefixes join with `/`;
//! - constraints and defaults merge key-wise, inner keys winning;
//! - the format option and the `only`/`except` filter of the inner frame replace
//!   the inherited ones outright.

use std::collections::{BTreeMap, BTreeSet};

use super::constraints::Constraint;
use super::route::FormatOption;

/// An action allow/deny filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFilter {
    /// Only these actions are declared.
    Only(BTreeSet<String>),
    /// Every action except these is declared.
    Except(BTreeSet<String>),
}

impl ActionFilter {
    /// Creates an `only` filter.
    pub fn only<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(actions.into_iter().map(Into::into).collect())
    }

    /// Creates an `except` filter.
    pub fn except<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Except(actions.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if the action passes the filter.
    pub fn permits(&self, action: &str) -> bool {
        match self {
            Self::Only(set) => set.contains(action),
            Self::Except(set) => !set.contains(action),
        }
    }
}

/// Local overrides for one nested block.
#[derive(Debug, Clone, Default)]
pub struct ScopeFrame {
    path: Option<String>,
    name_prefix: Option<String>,
    module: Option<String>,
    constraints: Vec<(String, Constraint)>,
    defaults: BTreeMap<String, String>,
    shallow_path: Option<String>,
    shallow_prefix: Option<String>,
    format: Option<FormatOption>,
    action_filter: Option<ActionFilter>,
}

impl ScopeFrame {
    /// Creates an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path prefix.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds a route name prefix.
    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Adds a controller module prefix.
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.constraints.push((key.into(), constraint.into()));
        self
    }

    /// Adds a default parameter value.
    #[must_use]
    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Adds a shallow path prefix.
    #[must_use]
    pub fn shallow_path(mut self, path: impl Into<String>) -> Self {
        self.shallow_path = Some(path.into());
        self
    }

    /// Adds a shallow name prefix.
    #[must_use]
    pub fn shallow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shallow_prefix = Some(prefix.into());
        self
    }

    /// Sets the format option for routes in the block.
    #[must_use]
    pub const fn format(mut self, format: FormatOption) -> Self {
        self.format = Some(format);
        self
    }

    /// Restricts declared actions to the given ones.
    #[must_use]
    pub fn only<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action_filter = Some(ActionFilter::only(actions));
        self
    }

    /// Excludes the given actions.
    #[must_use]
    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action_filter = Some(ActionFilter::except(actions));
        self
    }
}

/// The effective defaults at one point of a route declaration.
///
/// # Examples
///
/// ```
/// use switchyard_http::routing::scope::{Scope, ScopeFrame};
///
/// let admin = Scope::root().nest(ScopeFrame::new().path("/admin").name_prefix("admin").module("admin"));
/// let reports = admin.nest(ScopeFrame::new().path("reports").only(["index"]));
///
/// assert_eq!(reports.path(), "/admin/reports");
/// assert_eq!(reports.qualify_name("list").as_deref(), Some("admin_list"));
/// assert_eq!(reports.qualify_controller("stats"), "admin/stats");
/// assert!(reports.permits("index"));
/// assert!(!reports.permits("show"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scope {
    path: String,
    name_prefix: Option<String>,
    module: Option<String>,
    constraints: Vec<(String, Constraint)>,
    defaults: BTreeMap<String, String>,
    shallow_path: String,
    shallow_prefix: Option<String>,
    format: Option<FormatOption>,
    action_filter: Option<ActionFilter>,
}

impl Scope {
    /// Returns the top-level scope.
    pub fn root() -> Self {
        Self::default()
    }

    /// Derives a nested scope.
    #[must_use]
    pub fn nest(&self, frame: ScopeFrame) -> Self {
        let mut constraints = self.constraints.clone();
        for (key, constraint) in frame.constraints {
            if let Some(slot) = constraints.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = constraint;
            } else {
                constraints.push((key, constraint));
            }
        }

        let mut defaults = self.defaults.clone();
        defaults.extend(frame.defaults);

        Self {
            path: join_path(&self.path, frame.path.as_deref()),
            name_prefix: join_with(self.name_prefix.as_deref(), frame.name_prefix.as_deref(), "_"),
            module: join_with(self.module.as_deref(), frame.module.as_deref(), "/"),
            constraints,
            defaults,
            shallow_path: join_path(&self.shallow_path, frame.shallow_path.as_deref()),
            shallow_prefix: join_with(
                self.shallow_prefix.as_deref(),
                frame.shallow_prefix.as_deref(),
                "_",
            ),
            format: frame.format.or(self.format),
            action_filter: frame.action_filter.or_else(|| self.action_filter.clone()),
        }
    }

    /// Returns the accumulated path prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the accumulated shallow path prefix.
    pub fn shallow_path(&self) -> &str {
        &self.shallow_path
    }

    /// Returns the accumulated controller module, if any.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Returns the merged constraints, outermost declaration order.
    pub fn constraints(&self) -> &[(String, Constraint)] {
        &self.constraints
    }

    /// Returns the merged defaults.
    pub const fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    /// Returns the format option, if one was set.
    pub const fn format(&self) -> Option<FormatOption> {
        self.format
    }

    /// Returns the effective action filter.
    pub const fn action_filter(&self) -> Option<&ActionFilter> {
        self.action_filter.as_ref()
    }

    /// Returns `true` if the action passes the effective filter.
    pub fn permits(&self, action: &str) -> bool {
        self.action_filter
            .as_ref()
            .map_or(true, |filter| filter.permits(action))
    }

    /// Prefixes a route name with the scope's name prefix.
    pub fn qualify_name(&self, name: &str) -> Option<String> {
        join_with(self.name_prefix.as_deref(), Some(name), "_")
    }

    /// Prefixes a route name with the scope's shallow prefix.
    pub fn qualify_shallow_name(&self, name: &str) -> Option<String> {
        join_with(self.shallow_prefix.as_deref(), Some(name), "_")
    }

    /// Prefixes a controller with the scope's module.
    pub fn qualify_controller(&self, controller: &str) -> String {
        join_with(self.module.as_deref(), Some(controller), "/").unwrap_or_default()
    }
}

fn join_path(outer: &str, inner: Option<&str>) -> String {
    match inner {
        None => outer.to_string(),
        Some(inner) => {
            let inner = inner.trim_matches('/');
            if inner.is_empty() {
                outer.to_string()
            } else {
                format!("{}/{inner}", outer.trim_end_matches('/'))
            }
        }
    }
}

fn join_with(outer: Option<&str>, inner: Option<&str>, sep: &str) -> Option<String> {
    match (outer.filter(|s| !s.is_empty()), inner.filter(|s| !s.is_empty())) {
        (Some(o), Some(i)) => Some(format!("{o}{sep}{i}")),
        (Some(o), None) => Some(o.to_string()),
        (None, Some(i)) => Some(i.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_scope_is_empty() {
        let scope = Scope::root();
        assert_eq!(scope.path(), "");
        assert!(scope.module().is_none());
        assert!(scope.permits("anything"));
        assert_eq!(scope.qualify_name("posts").as_deref(), Some("posts"));
        assert_eq!(scope.qualify_controller("posts"), "posts");
    }

    #[test]
    fn test_paths_concatenate() {
        let scope = Scope::root()
            .nest(ScopeFrame::new().path("/api/"))
            .nest(ScopeFrame::new().path("v1"))
            .nest(ScopeFrame::new().path("/"));
        assert_eq!(scope.path(), "/api/v1");
    }

    #[test]
    fn test_prefixes_join() {
        let scope = Scope::root()
            .nest(ScopeFrame::new().name_prefix("admin").module("admin"))
            .nest(ScopeFrame::new().name_prefix("billing").module("billing"));
        assert_eq!(scope.qualify_name("invoices").as_deref(), Some("admin_billing_invoices"));
        assert_eq!(scope.qualify_controller("invoices"), "admin/billing/invoices");
    }

    #[test]
    fn test_inner_filter_replaces_outer() {
        let outer = Scope::root().nest(ScopeFrame::new().only(["index", "show"]));
        assert!(outer.permits("show"));
        assert!(!outer.permits("destroy"));

        let inner = outer.nest(ScopeFrame::new().except(["index"]));
        assert!(!inner.permits("index"));
        assert!(inner.permits("destroy"));

        let inherited = inner.nest(ScopeFrame::new().path("x"));
        assert_eq!(inherited.action_filter(), inner.action_filter());
    }

    #[test]
    fn test_constraints_merge_inner_wins() {
        let scope = Scope::root()
            .nest(
                ScopeFrame::new()
                    .constraint("subdomain", "api")
                    .constraint("format", "json"),
            )
            .nest(ScopeFrame::new().constraint("format", "xml"));
        let constraints = scope.constraints();
        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].0, "subdomain");
        assert!(matches!(constraints[1].1, Constraint::Literal(ref f) if f == "xml"));
    }

    #[test]
    fn test_defaults_merge() {
        let scope = Scope::root()
            .nest(ScopeFrame::new().default_param("locale", "en").default_param("format", "html"))
            .nest(ScopeFrame::new().default_param("format", "json"));
        assert_eq!(scope.defaults()["locale"], "en");
        assert_eq!(scope.defaults()["format"], "json");
    }

    #[test]
    fn test_shallow_prefixes() {
        let scope = Scope::root()
            .nest(ScopeFrame::new().path("/blog").shallow_path("/b").shallow_prefix("b"))
            .nest(ScopeFrame::new().path("/posts/:post_id"));
        assert_eq!(scope.path(), "/blog/posts/:post_id");
        assert_eq!(scope.shallow_path(), "/b");
        assert_eq!(scope.qualify_shallow_name("comment").as_deref(), Some("b_comment"));
    }

    #[test]
    fn test_format_override() {
        let outer = Scope::root().nest(ScopeFrame::new().format(FormatOption::Disabled));
        assert_eq!(outer.format(), Some(FormatOption::Disabled));
        let inner = outer.nest(ScopeFrame::new().format(FormatOption::Required));
        assert_eq!(inner.format(), Some(FormatOption::Required));
    }
}

//! Route declarations and compiled routes.
//!
//! A [`RouteDeclaration`] is the primitive "add a route" operation: a path
//! pattern, a verb set, constraints, defaults, an optional name, and an
//! endpoint. [`RouteDeclaration::build`] resolves it against the enclosing
//! [`Scope`] into an immutable [`Route`], or fails with a build-time error.
//!
//! # Examples
//!
//! ```
//! use switchyard_core::Settings;
//! use switchyard_http::routing::route::RouteDeclaration;
//! use switchyard_http::routing::scope::Scope;
//!
//! let route = RouteDeclaration::get("/projects/:id")
//!     .to("projects#show")
//!     .name("project")
//!     .build(&Scope::root(), &Settings::default(), 0)
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(route.path(), "/projects/:id(.:format)");
//! assert_eq!(route.name(), Some("project"));
//! assert_eq!(route.endpoint().to_string(), "projects#show");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use http::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};

use switchyard_core::utils::text::is_identifier;
use switchyard_core::{RoutingError, RoutingResult, Settings};

use super::constraints::{BoundConstraint, Constraint, ConstraintTarget, RequestAttribute};
use super::pattern::{normalize_declared_path, CompileOptions, PathPattern, TemplatePart};
use super::redirect::Redirect;
use super::scope::Scope;
use crate::request::RouteRequest;

static CONTROLLER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[a-z0-9_][a-z0-9_/]*\z").expect("valid regex"));

/// How a route treats the `format` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatOption {
    /// Append an optional `(.:format)` suffix.
    #[default]
    Optional,
    /// Append a required `.:format` suffix.
    Required,
    /// Append nothing.
    Disabled,
}

/// The verbs a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verbs {
    /// Every method.
    Any,
    /// Only the listed methods. `HEAD` also matches a `GET` route.
    Only(Vec<Method>),
}

impl Verbs {
    /// Returns `true` if the method is accepted.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(methods) => {
                methods.contains(method) || (*method == Method::HEAD && methods.contains(&Method::GET))
            }
        }
    }

    /// Returns `true` if some method is accepted by both verb sets.
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Only(a), Self::Only(b)) => a.iter().any(|m| b.contains(m)),
        }
    }

    /// Returns the accepted methods, or an empty list for [`Verbs::Any`].
    pub fn methods(&self) -> &[Method] {
        match self {
            Self::Any => &[],
            Self::Only(methods) => methods,
        }
    }
}

impl fmt::Display for Verbs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Only(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join("|"))
            }
        }
    }
}

/// What a matched route hands to dispatch.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// A controller action, `controller#action`.
    Action {
        /// The controller, module prefix included.
        controller: String,
        /// The action.
        action: String,
    },
    /// The controller and/or action come from the matched params.
    Dynamic,
    /// An opaque handle, e.g. a mounted application.
    Handle(String),
    /// A redirect answered by the router itself.
    Redirect(Redirect),
}

impl Endpoint {
    /// Resolves the handle for a set of matched params.
    pub fn handle_for(&self, params: &HashMap<String, String>) -> String {
        match self {
            Self::Dynamic => format!(
                "{}#{}",
                params.get("controller").map_or("", String::as_str),
                params.get("action").map_or("", String::as_str)
            ),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action { controller, action } => write!(f, "{controller}#{action}"),
            Self::Dynamic => f.write_str(":controller#:action"),
            Self::Handle(handle) => f.write_str(handle),
            Self::Redirect(r) => match r.template() {
                Some(t) => write!(f, "redirect({}, {t})", r.status_code().as_u16()),
                None => write!(f, "redirect({})", r.status_code().as_u16()),
            },
        }
    }
}

/// The declaration of one route.
#[derive(Debug, Clone)]
pub struct RouteDeclaration {
    path: String,
    verbs: Verbs,
    to: Option<String>,
    controller: Option<String>,
    action: Option<String>,
    handle: Option<String>,
    redirect: Option<Redirect>,
    name: Option<String>,
    constraints: Vec<(String, Constraint)>,
    requirements: Vec<(String, String)>,
    request_constraints: Vec<Constraint>,
    defaults: BTreeMap<String, String>,
    format: Option<FormatOption>,
    anchored: bool,
    shallow: bool,
}

impl RouteDeclaration {
    /// Declares a route for the given verbs.
    pub fn new(verbs: Verbs, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            verbs,
            to: None,
            controller: None,
            action: None,
            handle: None,
            redirect: None,
            name: None,
            constraints: Vec::new(),
            requirements: Vec::new(),
            request_constraints: Vec::new(),
            defaults: BTreeMap::new(),
            format: None,
            anchored: true,
            shallow: false,
        }
    }

    /// Declares a `GET` route.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Verbs::Only(vec![Method::GET]), path)
    }

    /// Declares a `POST` route.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Verbs::Only(vec![Method::POST]), path)
    }

    /// Declares a `PUT` route.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Verbs::Only(vec![Method::PUT]), path)
    }

    /// Declares a `PATCH` route.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Verbs::Only(vec![Method::PATCH]), path)
    }

    /// Declares a `DELETE` route.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Verbs::Only(vec![Method::DELETE]), path)
    }

    /// Declares a route answering every verb.
    pub fn any(path: impl Into<String>) -> Self {
        Self::new(Verbs::Any, path)
    }

    /// Declares a route for several verbs.
    pub fn verbs(methods: impl IntoIterator<Item = Method>, path: impl Into<String>) -> Self {
        Self::new(Verbs::Only(methods.into_iter().collect()), path)
    }

    /// Mounts an opaque handle at a path prefix, for every verb.
    ///
    /// The route matches the prefix at a segment boundary and reports the rest
    /// of the path in the match.
    pub fn mount(path: impl Into<String>, handle: impl Into<String>) -> Self {
        let mut decl = Self::new(Verbs::Any, path);
        decl.handle = Some(handle.into());
        decl.anchored = false;
        decl.format = Some(FormatOption::Disabled);
        decl
    }

    /// Declares the `GET /` route named `root`.
    pub fn root() -> Self {
        let mut decl = Self::get("/");
        decl.name = Some("root".to_string());
        decl.format = Some(FormatOption::Disabled);
        decl
    }

    /// Sets the endpoint as `controller#action`.
    #[must_use]
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.to = Some(target.into());
        self
    }

    /// Sets the controller.
    #[must_use]
    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Sets an opaque endpoint handle.
    #[must_use]
    pub fn handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Answers the route with a redirect.
    #[must_use]
    pub fn redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Names the route. The scope's name prefix is prepended on build.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a keyed constraint.
    ///
    /// Keys naming a path segment constrain that segment; `host`, `subdomain`,
    /// `domain`, `port`, `protocol`, `scheme`, `method`, and `ip` constrain the
    /// request; any other key is read from the request attributes, then from the
    /// matched params.
    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.constraints.push((key.into(), constraint.into()));
        self
    }

    /// Sets the regex a path segment must match. The segment must exist.
    #[must_use]
    pub fn requirement(mut self, name: impl Into<String>, regex: impl Into<String>) -> Self {
        self.requirements.push((name.into(), regex.into()));
        self
    }

    /// Adds an unkeyed constraint over the whole request. It must be a predicate.
    #[must_use]
    pub fn request_constraint(mut self, constraint: impl Into<Constraint>) -> Self {
        self.request_constraints.push(constraint.into());
        self
    }

    /// Adds a default parameter value.
    #[must_use]
    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Sets the format option, overriding the scope and settings.
    #[must_use]
    pub const fn format(mut self, format: FormatOption) -> Self {
        self.format = Some(format);
        self
    }

    /// Uses the scope's shallow path and shallow name prefix.
    #[must_use]
    pub const fn shallow(mut self) -> Self {
        self.shallow = true;
        self
    }

    /// Returns the declared path, before scoping.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn target_parts(&self) -> (Option<String>, Option<String>) {
        match self.to.as_deref() {
            Some(to) => match to.split_once('#') {
                Some((c, a)) => (
                    Some(c.to_string()).filter(|c| !c.is_empty()),
                    Some(a.to_string()).filter(|a| !a.is_empty()),
                ),
                None => (Some(to.to_string()).filter(|c| !c.is_empty()), self.action.clone()),
            },
            None => (self.controller.clone(), self.action.clone()),
        }
    }

    /// Resolves the declaration into a route.
    ///
    /// Returns `Ok(None)` when the scope's `only`/`except` filter excludes the
    /// declared action.
    ///
    /// # Errors
    ///
    /// Returns a build-time error for malformed patterns, invalid names, missing
    /// or invalid controllers and actions, keys containing `:`, and unsupported
    /// constraint shapes.
    pub fn build(
        self,
        scope: &Scope,
        settings: &Settings,
        precedence: usize,
    ) -> RoutingResult<Option<Route>> {
        let (controller, action) = self.target_parts();

        if let Some(action) = &action {
            if !scope.permits(action) {
                tracing::warn!(path = %self.path, action = %action, "skipping route excluded by only/except");
                return Ok(None);
            }
        }

        let path = self.scoped_path(scope, settings);
        let names = PathPattern::parse_names(&path)?;

        let name = match &self.name {
            Some(local) => {
                let qualified = if self.shallow {
                    scope.qualify_shallow_name(local)
                } else {
                    scope.qualify_name(local)
                }
                .unwrap_or_default();
                if !is_identifier(&qualified) {
                    return Err(RoutingError::ImproperlyConfigured(format!(
                        "Invalid route name: '{qualified}'"
                    )));
                }
                Some(qualified)
            }
            None => None,
        };

        let mut defaults = scope.defaults().clone();
        defaults.extend(self.defaults.clone());

        let endpoint = if let Some(redirect) = self.redirect.clone() {
            Endpoint::Redirect(redirect)
        } else if let Some(handle) = self.handle.clone() {
            Endpoint::Handle(handle)
        } else {
            resolve_action(scope, controller, action, &names, &mut defaults)?
        };

        // Scope constraints on keys this route neither captures nor reads from
        // the request do not apply to it.
        let mut constraints: Vec<(String, Constraint)> = scope
            .constraints()
            .iter()
            .filter(|(key, constraint)| {
                names.contains(key)
                    || RequestAttribute::from_key(key).is_some()
                    || constraint.segment_regex().is_none()
            })
            .cloned()
            .collect();
        for (key, constraint) in &self.constraints {
            if let Some(slot) = constraints.iter_mut().find(|(k, _)| k == key) {
                slot.1 = constraint.clone();
            } else {
                constraints.push((key.clone(), constraint.clone()));
            }
        }

        for key in constraints
            .iter()
            .map(|(k, _)| k)
            .chain(defaults.keys())
            .chain(self.requirements.iter().map(|(k, _)| k))
        {
            if key.contains(':') {
                return Err(RoutingError::ImproperlyConfigured(format!(
                    "Route option keys cannot contain ':' (got {key:?})"
                )));
            }
        }

        let mut options = CompileOptions::new();
        if !self.anchored {
            options = options.unanchored();
        }
        for (segment, regex) in &self.requirements {
            options = options.requirement(segment.clone(), regex.clone());
        }

        let mut bound = Vec::new();
        for (key, constraint) in constraints {
            let is_segment = names.contains(&key);
            match constraint.segment_regex() {
                Some(regex) if is_segment => options = options.requirement(key, regex),
                _ => bound.push(BoundConstraint::bind(&key, constraint, &names)),
            }
        }
        for constraint in self.request_constraints {
            match constraint {
                Constraint::Predicate(p) => bound.push(BoundConstraint::route(p)),
                other => {
                    return Err(RoutingError::ConstraintConfig(format!(
                        "constraint {} must respond to a predicate or matches capability",
                        other.describe()
                    )))
                }
            }
        }

        let pattern = PathPattern::compile(&path, &options)?;

        let optimizable = pattern.optional_groups_are_parameterized()
            && !pattern.optional_groups_repeat_required_names()
            && !bound
                .iter()
                .any(|c| matches!(c.target(), ConstraintTarget::Segment(_)));
        let template = optimizable.then(|| pattern.required_template());

        Ok(Some(Route {
            name,
            verbs: self.verbs,
            pattern,
            constraints: bound,
            defaults,
            endpoint,
            precedence,
            template,
        }))
    }

    fn scoped_path(&self, scope: &Scope, settings: &Settings) -> String {
        let prefix = if self.shallow {
            scope.shallow_path()
        } else {
            scope.path()
        };
        let mut raw = format!("{prefix}/{}", self.path.trim_start_matches('/'));

        let format = self.format.or_else(|| scope.format()).unwrap_or(if settings.append_format {
            FormatOption::Optional
        } else {
            FormatOption::Disabled
        });

        match format {
            FormatOption::Optional => {
                if !(raw.ends_with('/') || raw.ends_with(".:format") || raw.ends_with("(.:format)")) {
                    raw.push_str("(.:format)");
                }
            }
            FormatOption::Required => {
                if !raw.contains(":format") {
                    raw.push_str(".:format");
                }
            }
            FormatOption::Disabled => {}
        }
        normalize_declared_path(&raw)
    }
}

fn resolve_action(
    scope: &Scope,
    controller: Option<String>,
    action: Option<String>,
    names: &[String],
    defaults: &mut BTreeMap<String, String>,
) -> RoutingResult<Endpoint> {
    let has_controller_segment = names.iter().any(|n| n == "controller");
    let has_action_segment = names.iter().any(|n| n == "action");

    let controller = match controller {
        Some(c) => {
            validate_controller(&c)?;
            Some(scope.qualify_controller(&c))
        }
        None if has_controller_segment => None,
        None => match defaults.get("controller") {
            Some(c) => Some(c.clone()),
            None => {
                return Err(RoutingError::ImproperlyConfigured(
                    "Missing :controller key on routes definition, please check your routes."
                        .to_string(),
                ))
            }
        },
    };

    let action = match action {
        Some(a) => Some(a),
        None if has_action_segment => None,
        None => match defaults.get("action") {
            Some(a) => Some(a.clone()),
            None => {
                return Err(RoutingError::ImproperlyConfigured(
                    "Missing :action key on routes definition, please check your routes."
                        .to_string(),
                ))
            }
        },
    };

    if let Some(c) = &controller {
        defaults.insert("controller".to_string(), c.clone());
    }
    if let Some(a) = &action {
        defaults.insert("action".to_string(), a.clone());
    }

    Ok(match (controller, action) {
        (Some(controller), Some(action)) if !has_controller_segment && !has_action_segment => {
            Endpoint::Action { controller, action }
        }
        _ => Endpoint::Dynamic,
    })
}

fn validate_controller(controller: &str) -> RoutingResult<()> {
    if controller.starts_with('/') {
        return Err(RoutingError::ImproperlyConfigured(format!(
            "controller name should not start with a slash: '{controller}'"
        )));
    }
    if !CONTROLLER_NAME.is_match(controller) {
        return Err(RoutingError::ImproperlyConfigured(format!(
            "'{controller}' is not a supported controller name. This can lead to potential routing problems."
        )));
    }
    Ok(())
}

/// One row of a route listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescription {
    /// The route name, or empty.
    pub name: String,
    /// The verbs, e.g. `GET|POST`.
    pub verbs: String,
    /// The compiled path pattern.
    pub path: String,
    /// The endpoint.
    pub endpoint: String,
    /// Constraints that are not part of the path regex.
    pub constraints: Vec<String>,
}

/// An immutable, compiled route.
#[derive(Debug)]
pub struct Route {
    name: Option<String>,
    verbs: Verbs,
    pattern: PathPattern,
    constraints: Vec<BoundConstraint>,
    defaults: BTreeMap<String, String>,
    endpoint: Endpoint,
    precedence: usize,
    template: Option<Vec<TemplatePart>>,
}

impl Route {
    /// Returns the route name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the accepted verbs.
    pub const fn verbs(&self) -> &Verbs {
        &self.verbs
    }

    /// Returns the compiled pattern.
    pub const fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the pattern source.
    pub fn path(&self) -> &str {
        self.pattern.source()
    }

    /// Returns the constraints checked after the path matched.
    pub fn constraints(&self) -> &[BoundConstraint] {
        &self.constraints
    }

    /// Returns the default params, controller and action included.
    pub const fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    /// Returns the endpoint.
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the declaration index.
    pub const fn precedence(&self) -> usize {
        self.precedence
    }

    /// Returns `true` if the route must match the whole path.
    pub const fn is_anchored(&self) -> bool {
        self.pattern.is_anchored()
    }

    /// Returns the required-parameter template when optimized generation applies.
    pub fn template(&self) -> Option<&[TemplatePart]> {
        self.template.as_deref()
    }

    /// Returns the distinct required parameter names, in order.
    pub fn required_keys(&self) -> Vec<String> {
        let mut keys = self.pattern.required_names();
        let mut seen = Vec::with_capacity(keys.len());
        keys.retain(|k| {
            if seen.contains(k) {
                false
            } else {
                seen.push(k.clone());
                true
            }
        });
        keys
    }

    /// Returns `true` if the route accepts the method.
    pub fn verb_matches(&self, method: &Method) -> bool {
        self.verbs.matches(method)
    }

    /// Evaluates the constraints in declaration order, stopping at the first failure.
    ///
    /// Returns the key (or `<predicate>`) of the failing constraint.
    pub fn check_constraints(
        &self,
        params: &HashMap<String, String>,
        request: &RouteRequest,
        tld_length: usize,
    ) -> Result<(), String> {
        for constraint in &self.constraints {
            if !constraint.check(params, request, tld_length) {
                return Err(constraint.key().unwrap_or("<predicate>").to_string());
            }
        }
        Ok(())
    }

    /// Merges captured params over the route defaults.
    pub fn params_for(&self, captured: HashMap<String, String>) -> HashMap<String, String> {
        let mut params: HashMap<String, String> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        params.extend(captured);
        params
    }

    /// Returns a listing row.
    pub fn describe(&self) -> RouteDescription {
        RouteDescription {
            name: self.name.clone().unwrap_or_default(),
            verbs: self.verbs.to_string(),
            path: self.path().to_string(),
            endpoint: self.endpoint.to_string(),
            constraints: self
                .constraints
                .iter()
                .map(|c| format!("{}: {}", c.key().unwrap_or("*"), c.constraint().describe()))
                .collect(),
        }
    }
}

//! URL generation from route names and params.
//!
//! [`UrlGenerator`] looks a route up by name (or, for unnamed targets, by
//! matching non-path defaults such as controller and action), merges params,
//! checks requirements, and fills the pattern.
//!
//! Param precedence for path segments is: explicit params, then route
//! defaults, then the current request's params ("recall") for required keys.
//!
//! Two code paths produce the path:
//!
//! - the **optimized** path fills the route's precomputed required template;
//!   it applies when the route has no segment constraint beyond a regex and no
//!   optional param was supplied;
//! - the **general** path walks the whole pattern tree, deciding for each
//!   optional group whether it is included.
//!
//! Both produce the same output for the same input.

use std::collections::{BTreeMap, HashMap};

use switchyard_core::logging::generation_span;
use switchyard_core::utils::text::suggest;
use switchyard_core::{
    DefaultUrlOptions, RoutingError, RoutingResult, Settings, UrlGenerationError,
    UrlGenerationErrorKind,
};

use super::escape::{escape_fragment, escape_path, escape_segment};
use super::pattern::{PathPattern, TemplatePart, RESERVED_NAMES};
use super::route::Route;
use super::table::RouteTable;

/// Which route to generate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateTarget<'a> {
    /// The route with this name.
    Named(&'a str),
    /// The first route whose non-path defaults agree with the params.
    Unnamed,
}

impl<'a> From<&'a str> for GenerateTarget<'a> {
    fn from(name: &'a str) -> Self {
        Self::Named(name)
    }
}

impl<'a> From<Option<&'a str>> for GenerateTarget<'a> {
    fn from(name: Option<&'a str>) -> Self {
        name.map_or(Self::Unnamed, Self::Named)
    }
}

/// Params taken from a request, which must be permitted before use.
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    values: HashMap<String, String>,
    permitted: bool,
}

impl RequestParameters {
    /// Wraps unfiltered request params.
    pub const fn new(values: HashMap<String, String>) -> Self {
        Self {
            values,
            permitted: false,
        }
    }

    /// Marks every param as permitted.
    #[must_use]
    pub fn permit_all(mut self) -> Self {
        self.permitted = true;
        self
    }

    /// Keeps only the given keys and marks the rest as permitted.
    #[must_use]
    pub fn permit(mut self, keys: &[&str]) -> Self {
        self.values.retain(|k, _| keys.contains(&k.as_str()));
        self.permitted = true;
        self
    }

    /// Returns `true` once permitted.
    pub const fn is_permitted(&self) -> bool {
        self.permitted
    }

    /// Returns the params.
    pub const fn values(&self) -> &HashMap<String, String> {
        &self.values
    }
}

/// Where generation params come from.
#[derive(Debug, Clone)]
pub enum ParamSource {
    /// Values bound to the route's required params in declared order, or to
    /// every param when there are more values than required params. A name
    /// that appears twice keeps the last value bound to it.
    Positional(Vec<String>),
    /// Named values.
    Keyed(HashMap<String, String>),
    /// Request params; rejected unless permitted.
    Request(RequestParameters),
}

impl ParamSource {
    /// Builds a keyed source from pairs.
    pub fn keyed<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Keyed(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Builds a positional source.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }
}

impl From<HashMap<String, String>> for ParamSource {
    fn from(values: HashMap<String, String>) -> Self {
        Self::Keyed(values)
    }
}

/// Per-call generation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlOptions {
    /// Return only the path, without protocol and host.
    pub only_path: bool,
    /// Host to link to; overrides the ambient default.
    pub host: Option<String>,
    /// Protocol, with or without `://`.
    pub protocol: Option<String>,
    /// Port; standard ports are omitted.
    pub port: Option<u16>,
    /// Fragment appended after `#`.
    pub anchor: Option<String>,
    /// Path prefix; overrides the ambient default.
    pub script_name: Option<String>,
    /// Append a trailing `/` to the path.
    pub trailing_slash: bool,
}

impl UrlOptions {
    /// Options for a path-only URL.
    pub fn path_only() -> Self {
        Self {
            only_path: true,
            ..Self::default()
        }
    }
}

/// Generates URLs from a route table.
#[derive(Debug, Clone, Copy)]
pub struct UrlGenerator<'a> {
    table: &'a RouteTable,
    defaults: &'a DefaultUrlOptions,
    optimize: bool,
    recall: Option<&'a HashMap<String, String>>,
}

impl<'a> UrlGenerator<'a> {
    /// Creates a generator using the settings' ambient URL options.
    pub const fn new(table: &'a RouteTable, settings: &'a Settings) -> Self {
        Self {
            table,
            defaults: &settings.default_url_options,
            optimize: settings.optimize_generation,
            recall: None,
        }
    }

    /// Uses the current request's params to fill required keys.
    #[must_use]
    pub const fn with_recall(mut self, recall: &'a HashMap<String, String>) -> Self {
        self.recall = Some(recall);
        self
    }

    /// Enables or disables the optimized code path.
    #[must_use]
    pub const fn optimized(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Generates a path.
    ///
    /// # Errors
    ///
    /// See [`url_for`](Self::url_for).
    pub fn path_for<'t>(
        &self,
        target: impl Into<GenerateTarget<'t>>,
        source: &ParamSource,
    ) -> RoutingResult<String> {
        self.url_for(target, source, &UrlOptions::path_only())
    }

    /// Generates a URL.
    ///
    /// # Errors
    ///
    /// - [`RoutingError::UnfilteredParameters`] for unpermitted request params;
    /// - [`RoutingError::UrlGeneration`] for an unknown route name, missing
    ///   required keys, values rejected by requirements, no matching unnamed
    ///   route, or a missing host for a full URL.
    pub fn url_for<'t>(
        &self,
        target: impl Into<GenerateTarget<'t>>,
        source: &ParamSource,
        options: &UrlOptions,
    ) -> RoutingResult<String> {
        let target = target.into();
        let span = generation_span(match target {
            GenerateTarget::Named(name) => Some(name),
            GenerateTarget::Unnamed => None,
        });
        let _guard = span.enter();

        if let ParamSource::Request(params) = source {
            if !params.is_permitted() {
                let mut keys: Vec<String> = params.values().keys().cloned().collect();
                keys.sort();
                return Err(RoutingError::UnfilteredParameters(keys));
            }
        }

        let (route, explicit) = match target {
            GenerateTarget::Named(name) => {
                let route = self.table.route(name).ok_or_else(|| {
                    UrlGenerationError::new(UrlGenerationErrorKind::UnknownRoute)
                        .with_route(name)
                        .with_suggestion(suggest(name, self.table.names()))
                })?;
                (&**route, bind(route, source))
            }
            GenerateTarget::Unnamed => {
                let (ParamSource::Keyed(_) | ParamSource::Request(_)) = source else {
                    return Err(UrlGenerationError::new(UrlGenerationErrorKind::NoRouteMatches).into());
                };
                let explicit = bind_keyed(source);
                let route = self.find_unnamed(&explicit).ok_or_else(|| {
                    UrlGenerationError::new(UrlGenerationErrorKind::NoRouteMatches)
                        .with_params(sorted(&explicit))
                })?;
                (route, explicit)
            }
        };

        let path = self.generate_path(route, &explicit)?;
        tracing::debug!(path = %path, "generated");
        self.finish(route, &explicit, path, options)
    }

    fn find_unnamed(&self, explicit: &HashMap<String, String>) -> Option<&'a Route> {
        self.table.routes().iter().map(|route| route.as_ref()).find(|route| {
            if !route.is_anchored() {
                return false;
            }
            let names = route.pattern().names();
            let defaults_agree = route
                .defaults()
                .iter()
                .filter(|(k, _)| !names.contains(*k))
                .all(|(k, v)| self.lookup(explicit, k) == Some(v.as_str()));
            let requirements_pass = names.iter().all(|name| {
                match (self.lookup(explicit, name), route.pattern().requirement(name)) {
                    (Some(value), Some(regex)) => regex.is_match(value),
                    _ => true,
                }
            });
            defaults_agree
                && requirements_pass
                && route.required_keys().iter().all(|k| {
                    explicit.contains_key(k)
                        || route.defaults().contains_key(k)
                        || self.recall.is_some_and(|r| r.contains_key(k))
                })
        })
    }

    fn lookup<'m>(&'m self, explicit: &'m HashMap<String, String>, key: &str) -> Option<&'m str> {
        explicit
            .get(key)
            .or_else(|| self.recall.and_then(|r| r.get(key)))
            .map(String::as_str)
    }

    /// Produces the escaped path for a route.
    fn generate_path(
        &self,
        route: &Route,
        explicit: &HashMap<String, String>,
    ) -> RoutingResult<String> {
        let pattern = route.pattern();
        let values = merged_values(route, explicit, self.recall);

        let rejected: Vec<String> = pattern
            .names()
            .into_iter()
            .filter(|name| {
                match (values.get(name), pattern.requirement(name)) {
                    (Some(value), Some(regex)) => !regex.is_match(value),
                    _ => false,
                }
            })
            .collect();
        if !rejected.is_empty() {
            return Err(self.error(route, &values, UrlGenerationErrorKind::RejectedValues)
                .with_rejected(rejected)
                .into());
        }

        let include = |name: &str| {
            explicit
                .get(name)
                .is_some_and(|v| route.defaults().get(name) != Some(v))
        };

        let optional_supplied = pattern.optional_names().iter().any(|n| include(n.as_str()));
        let result = match route.template() {
            Some(template) if self.optimize && !optional_supplied => {
                fill_template(template, &values)
            }
            _ => pattern.generate(&values, include).map(|g| g.path),
        };

        result.map_err(|missing| {
            self.error(route, &values, UrlGenerationErrorKind::MissingKeys)
                .with_missing(missing)
                .into()
        })
    }

    fn error(
        &self,
        route: &Route,
        values: &HashMap<String, String>,
        kind: UrlGenerationErrorKind,
    ) -> UrlGenerationError {
        let error = UrlGenerationError::new(kind).with_params(sorted(values));
        match route.name() {
            Some(name) => error.with_route(name),
            None => error,
        }
    }

    fn finish(
        &self,
        route: &Route,
        explicit: &HashMap<String, String>,
        path: String,
        options: &UrlOptions,
    ) -> RoutingResult<String> {
        let script_name = options
            .script_name
            .as_deref()
            .or(self.defaults.script_name.as_deref())
            .unwrap_or("")
            .trim_end_matches('/');

        let mut url = format!("{script_name}{path}");
        if options.trailing_slash && !url.ends_with('/') {
            url.push('/');
        }

        let query = query_string(route.pattern(), route, explicit);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        if let Some(anchor) = &options.anchor {
            url.push('#');
            url.push_str(&escape_fragment(anchor));
        }

        if options.only_path {
            return Ok(url);
        }

        let Some(host) = options.host.as_deref().or(self.defaults.host.as_deref()) else {
            return Err(UrlGenerationError::new(UrlGenerationErrorKind::MissingHost).into());
        };

        let protocol = options
            .protocol
            .as_deref()
            .or(self.defaults.protocol.as_deref())
            .unwrap_or("http");
        let scheme = protocol.trim_end_matches("://").trim_end_matches(':');
        let port = options
            .port
            .or(self.defaults.port)
            .filter(|p| !is_standard_port(scheme, *p))
            .map(|p| format!(":{p}"))
            .unwrap_or_default();

        Ok(format!("{scheme}://{host}{port}{url}"))
    }
}

/// Turns the source into explicit params, binding positional values to names.
fn bind(route: &Route, source: &ParamSource) -> HashMap<String, String> {
    match source {
        ParamSource::Positional(values) => {
            let required = route.pattern().required_names();
            let names = if values.len() > required.len() {
                route.pattern().names()
            } else {
                required
            };
            let mut bound = HashMap::new();
            for (name, value) in names.iter().zip(values) {
                bound.insert(name.clone(), value.clone());
            }
            bound
        }
        ParamSource::Keyed(_) | ParamSource::Request(_) => bind_keyed(source),
    }
}

fn bind_keyed(source: &ParamSource) -> HashMap<String, String> {
    match source {
        ParamSource::Keyed(values) => values.clone(),
        ParamSource::Request(params) => params.values().clone(),
        ParamSource::Positional(_) => HashMap::new(),
    }
}

/// Explicit params, then route defaults, then recall for required keys.
///
/// Empty values are dropped, so an empty required segment is reported missing.
fn merged_values(
    route: &Route,
    explicit: &HashMap<String, String>,
    recall: Option<&HashMap<String, String>>,
) -> HashMap<String, String> {
    let mut values = explicit.clone();
    for (key, value) in route.defaults() {
        values.entry(key.clone()).or_insert_with(|| value.clone());
    }
    if let Some(recall) = recall {
        for key in route.required_keys() {
            if let Some(value) = recall.get(&key) {
                values.entry(key).or_insert_with(|| value.clone());
            }
        }
    }
    values.retain(|_, value| !value.is_empty());
    values
}

fn fill_template(template: &[TemplatePart], values: &HashMap<String, String>) -> Result<String, Vec<String>> {
    let mut out = String::new();
    let mut missing = Vec::new();
    for part in template {
        match part {
            TemplatePart::Text(text) => out.push_str(text),
            TemplatePart::Param { name, glob } => match values.get(name) {
                Some(value) if *glob => out.push_str(&escape_path(value)),
                Some(value) => out.push_str(&escape_segment(value)),
                None => missing.push(name.clone()),
            },
        }
    }
    if missing.is_empty() {
        Ok(out)
    } else {
        missing.sort();
        missing.dedup();
        Err(missing)
    }
}

/// Explicit params that are neither path params, route defaults, nor options.
fn query_string(pattern: &PathPattern, route: &Route, explicit: &HashMap<String, String>) -> String {
    let names = pattern.names();
    let mut extra: Vec<(&String, &String)> = explicit
        .iter()
        .filter(|(k, _)| {
            !names.contains(*k)
                && !route.defaults().contains_key(*k)
                && !RESERVED_NAMES.contains(&k.as_str())
        })
        .collect();
    if extra.is_empty() {
        return String::new();
    }
    extra.sort();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(extra)
        .finish()
}

fn sorted(values: &HashMap<String, String>) -> BTreeMap<String, String> {
    values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn is_standard_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

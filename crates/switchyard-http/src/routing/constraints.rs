//! Constraint shapes and their evaluation.
//!
//! A [`Constraint`] is resolved once, when a route is declared, into one of a
//! fixed set of shapes. Evaluation is then a single `match` on the shape with no
//! further inspection of the value that was supplied.
//!
//! | Shape | Passes when |
//! |-------|-------------|
//! | [`Constraint::Literal`] | the value equals the literal |
//! | [`Constraint::Regex`] | the value is present and the whole value matches |
//! | [`Constraint::Set`] | the value equals one member |
//! | [`Constraint::Presence`]`(true)` | the value is present and non-empty |
//! | [`Constraint::Presence`]`(false)` | the value is absent or empty |
//! | [`Constraint::Predicate`] | the predicate returns `true` |
//!
//! Keys are bound to a [`ConstraintTarget`] when the route is built: a path
//! segment, a request attribute such as `host` or `port`, or an entry of the
//! request's attribute bag.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use switchyard_core::{RoutingError, RoutingResult};

use crate::request::RouteRequest;

/// An object that decides whether a request is acceptable for a route.
pub trait RequestMatcher: Send + Sync {
    /// Returns `true` if the request satisfies this matcher.
    fn matches(&self, request: &RouteRequest) -> bool;
}

type RequestFn = dyn Fn(&RouteRequest) -> bool + Send + Sync;
type ParamsFn = dyn Fn(&HashMap<String, String>, &RouteRequest) -> bool + Send + Sync;

/// A user-supplied predicate.
///
/// Predicates may carry side effects through whatever state they capture; the
/// route table calls each one at most once per match attempt, in declaration order.
#[derive(Clone)]
pub enum Predicate {
    /// Called with the request only.
    Request(Arc<RequestFn>),
    /// Called with the candidate's params and the request.
    Params(Arc<ParamsFn>),
    /// An object exposing [`RequestMatcher::matches`].
    Matcher(Arc<dyn RequestMatcher>),
}

impl Predicate {
    /// Invokes the predicate.
    pub fn call(&self, params: &HashMap<String, String>, request: &RouteRequest) -> bool {
        match self {
            Self::Request(f) => f(request),
            Self::Params(f) => f(params, request),
            Self::Matcher(m) => m.matches(request),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(_) => f.write_str("Predicate::Request(..)"),
            Self::Params(_) => f.write_str("Predicate::Params(..)"),
            Self::Matcher(_) => f.write_str("Predicate::Matcher(..)"),
        }
    }
}

/// A regex constraint, kept with its source for describing routes.
#[derive(Debug, Clone)]
pub struct RegexConstraint {
    source: String,
    anchored: Regex,
}

impl RegexConstraint {
    /// Returns the regex source as declared.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the whole value matches.
    pub fn is_match(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

/// One constraint value.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Equality with a literal.
    Literal(String),
    /// Whole-value regex match.
    Regex(RegexConstraint),
    /// Membership in a finite set of literals.
    Set(Vec<String>),
    /// `true`: the value must be present and non-empty. `false`: it must not be.
    Presence(bool),
    /// A user-supplied predicate.
    Predicate(Predicate),
}

impl Constraint {
    /// Creates a literal constraint.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a regex constraint. The regex must not carry its own anchors.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::ImproperlyConfigured`] for anchored regexes and
    /// [`RoutingError::ConstraintConfig`] for regexes that fail to compile.
    pub fn regex(source: &str) -> RoutingResult<Self> {
        if source.starts_with('^')
            || source.starts_with("\\A")
            || (source.ends_with('$') && !source.ends_with("\\$"))
            || source.ends_with("\\z")
            || source.ends_with("\\Z")
        {
            return Err(RoutingError::ImproperlyConfigured(format!(
                "Regexp anchor characters are not allowed in routing requirements: {source:?}"
            )));
        }
        let anchored = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| RoutingError::ConstraintConfig(format!("invalid regex {source:?}: {e}")))?;
        Ok(Self::Regex(RegexConstraint {
            source: source.to_string(),
            anchored,
        }))
    }

    /// Creates a set constraint.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(values.into_iter().map(Into::into).collect())
    }

    /// Creates a presence constraint.
    pub const fn present(required: bool) -> Self {
        Self::Presence(required)
    }

    /// Creates a predicate called with the request.
    pub fn request_fn<F>(f: F) -> Self
    where
        F: Fn(&RouteRequest) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate::Request(Arc::new(f)))
    }

    /// Creates a predicate called with the candidate's params and the request.
    pub fn params_fn<F>(f: F) -> Self
    where
        F: Fn(&HashMap<String, String>, &RouteRequest) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate::Params(Arc::new(f)))
    }

    /// Wraps a [`RequestMatcher`].
    pub fn matcher(m: impl RequestMatcher + 'static) -> Self {
        Self::Predicate(Predicate::Matcher(Arc::new(m)))
    }

    /// Converts a declarative value into a constraint.
    ///
    /// | Value | Shape |
    /// |-------|-------|
    /// | string | literal |
    /// | integer | literal |
    /// | boolean | presence |
    /// | array of strings or integers | set |
    /// | `{ "regex": "..." }` | regex |
    ///
    /// # Errors
    ///
    /// Any other shape is a [`RoutingError::ConstraintConfig`] error.
    pub fn from_value(key: &str, value: &Value) -> RoutingResult<Self> {
        match value {
            Value::String(s) => Ok(Self::Literal(s.clone())),
            Value::Bool(b) => Ok(Self::Presence(*b)),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Self::Literal(n.to_string())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
                    other => Err(unsupported(key, other)),
                })
                .collect::<RoutingResult<Vec<_>>>()
                .map(Self::Set),
            Value::Object(map) if map.len() == 1 => match map.get("regex") {
                Some(Value::String(src)) => Self::regex(src),
                _ => Err(unsupported(key, value)),
            },
            other => Err(unsupported(key, other)),
        }
    }

    /// Returns the segment regex equivalent of this constraint, if it has one.
    pub fn segment_regex(&self) -> Option<String> {
        match self {
            Self::Literal(s) => Some(regex::escape(s)),
            Self::Regex(r) => Some(r.source.clone()),
            Self::Set(values) => Some(
                values
                    .iter()
                    .map(|v| regex::escape(v))
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            Self::Presence(_) | Self::Predicate(_) => None,
        }
    }

    /// Returns `true` for predicate constraints.
    pub const fn is_predicate(&self) -> bool {
        matches!(self, Self::Predicate(_))
    }

    /// Evaluates the constraint against a value.
    pub fn evaluate(
        &self,
        value: Option<&str>,
        params: &HashMap<String, String>,
        request: &RouteRequest,
    ) -> bool {
        match self {
            Self::Literal(expected) => value == Some(expected.as_str()),
            Self::Regex(r) => value.is_some_and(|v| r.is_match(v)),
            Self::Set(values) => value.is_some_and(|v| values.iter().any(|s| s == v)),
            Self::Presence(true) => value.is_some_and(|v| !v.is_empty()),
            Self::Presence(false) => !value.is_some_and(|v| !v.is_empty()),
            Self::Predicate(p) => p.call(params, request),
        }
    }

    /// Returns a short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(s) => format!("{s:?}"),
            Self::Regex(r) => format!("/{}/", r.source),
            Self::Set(values) => format!("{values:?}"),
            Self::Presence(b) => b.to_string(),
            Self::Predicate(_) => "<predicate>".to_string(),
        }
    }
}

fn unsupported(key: &str, value: &Value) -> RoutingError {
    RoutingError::ConstraintConfig(format!(
        "constraint {key:?} must be a string, integer, boolean, array, or {{ regex = \"...\" }}, got {value}"
    ))
}

impl From<&str> for Constraint {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for Constraint {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<u16> for Constraint {
    fn from(value: u16) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<bool> for Constraint {
    fn from(value: bool) -> Self {
        Self::Presence(value)
    }
}

impl From<Vec<&str>> for Constraint {
    fn from(values: Vec<&str>) -> Self {
        Self::one_of(values)
    }
}

impl From<Vec<String>> for Constraint {
    fn from(values: Vec<String>) -> Self {
        Self::Set(values)
    }
}

impl From<Predicate> for Constraint {
    fn from(p: Predicate) -> Self {
        Self::Predicate(p)
    }
}

/// Request attributes that constraint keys can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAttribute {
    /// The host name.
    Host,
    /// The subdomain labels.
    Subdomain,
    /// The registrable domain.
    Domain,
    /// The port, defaulted by scheme.
    Port,
    /// The protocol, `http://` or `https://`.
    Protocol,
    /// The bare scheme.
    Scheme,
    /// The HTTP method.
    Method,
    /// The client address.
    Ip,
}

impl RequestAttribute {
    /// Maps a constraint key to a request attribute.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "host" => Self::Host,
            "subdomain" => Self::Subdomain,
            "domain" => Self::Domain,
            "port" => Self::Port,
            "protocol" => Self::Protocol,
            "scheme" => Self::Scheme,
            "method" | "request_method" => Self::Method,
            "ip" | "remote_ip" => Self::Ip,
            _ => return None,
        })
    }

    /// Reads the attribute from a request.
    pub fn value(self, request: &RouteRequest, tld_length: usize) -> Option<String> {
        match self {
            Self::Host => Some(request.host().to_string()),
            Self::Subdomain => Some(request.subdomain(tld_length)),
            Self::Domain => request.domain(tld_length),
            Self::Port => Some(request.port().to_string()),
            Self::Protocol => Some(request.protocol()),
            Self::Scheme => Some(request.scheme().to_string()),
            Self::Method => Some(request.method().as_str().to_string()),
            Self::Ip => request.remote_ip().map(str::to_string),
        }
    }
}

/// Where a constraint reads its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintTarget {
    /// A path segment of the route's pattern.
    Segment(String),
    /// A request attribute.
    Request(RequestAttribute),
    /// The request attribute bag, falling back to the candidate's params.
    Attribute(String),
    /// No value: an unkeyed predicate over the whole request.
    Route,
}

/// A constraint bound to the value it checks.
#[derive(Debug, Clone)]
pub struct BoundConstraint {
    key: Option<String>,
    target: ConstraintTarget,
    constraint: Constraint,
}

impl BoundConstraint {
    /// Binds a keyed constraint, given the segment names of the route.
    ///
    /// Literal `protocol` constraints without `://` are completed, so `https`
    /// matches a request whose protocol is `https://`.
    pub fn bind(key: &str, constraint: Constraint, segments: &[String]) -> Self {
        let target = if segments.iter().any(|s| s == key) {
            ConstraintTarget::Segment(key.to_string())
        } else if let Some(attr) = RequestAttribute::from_key(key) {
            ConstraintTarget::Request(attr)
        } else {
            ConstraintTarget::Attribute(key.to_string())
        };

        let constraint = if target == ConstraintTarget::Request(RequestAttribute::Protocol) {
            normalize_protocol(constraint)
        } else {
            constraint
        };

        Self {
            key: Some(key.to_string()),
            target,
            constraint,
        }
    }

    /// Binds an unkeyed, route-level predicate.
    pub const fn route(predicate: Predicate) -> Self {
        Self {
            key: None,
            target: ConstraintTarget::Route,
            constraint: Constraint::Predicate(predicate),
        }
    }

    /// Returns the constraint key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the target.
    pub const fn target(&self) -> &ConstraintTarget {
        &self.target
    }

    /// Returns the constraint.
    pub const fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Evaluates the constraint for one candidate.
    pub fn check(
        &self,
        params: &HashMap<String, String>,
        request: &RouteRequest,
        tld_length: usize,
    ) -> bool {
        let value: Option<String> = match &self.target {
            ConstraintTarget::Segment(name) => params.get(name).cloned(),
            ConstraintTarget::Request(attr) => attr.value(request, tld_length),
            ConstraintTarget::Attribute(key) => request
                .attribute(key)
                .map(str::to_string)
                .or_else(|| params.get(key).cloned()),
            ConstraintTarget::Route => None,
        };
        self.constraint.evaluate(value.as_deref(), params, request)
    }
}

fn normalize_protocol(constraint: Constraint) -> Constraint {
    let complete = |p: String| {
        if p.ends_with("://") {
            p
        } else {
            format!("{}://", p.trim_end_matches(':'))
        }
    };
    match constraint {
        Constraint::Literal(p) => Constraint::Literal(complete(p)),
        Constraint::Set(values) => Constraint::Set(values.into_iter().map(complete).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn req() -> RouteRequest {
        RouteRequest::builder()
            .host("admin.example.com:8080")
            .remote_ip("192.168.1.5")
            .attribute("user_agent", "iPhone")
            .build()
    }

    fn no_params() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_literal() {
        let c = Constraint::from("xml");
        assert!(c.evaluate(Some("xml"), &no_params(), &req()));
        assert!(!c.evaluate(Some("json"), &no_params(), &req()));
        assert!(!c.evaluate(None, &no_params(), &req()));
    }

    #[test]
    fn test_regex_is_whole_value() {
        let c = Constraint::regex("[0-9]+").unwrap();
        assert!(c.evaluate(Some("123"), &no_params(), &req()));
        assert!(!c.evaluate(Some("123abc"), &no_params(), &req()));
        assert!(!c.evaluate(None, &no_params(), &req()));
    }

    #[test]
    fn test_regex_rejects_anchors() {
        assert!(matches!(
            Constraint::regex("^admin"),
            Err(RoutingError::ImproperlyConfigured(_))
        ));
        assert!(matches!(
            Constraint::regex("(unclosed"),
            Err(RoutingError::ConstraintConfig(_))
        ));
    }

    #[test]
    fn test_set() {
        let c = Constraint::from(vec!["GET", "POST"]);
        assert!(c.evaluate(Some("POST"), &no_params(), &req()));
        assert!(!c.evaluate(Some("PUT"), &no_params(), &req()));
    }

    #[test]
    fn test_presence() {
        let present = Constraint::from(true);
        assert!(present.evaluate(Some("admin"), &no_params(), &req()));
        assert!(!present.evaluate(Some(""), &no_params(), &req()));
        assert!(!present.evaluate(None, &no_params(), &req()));

        let absent = Constraint::from(false);
        assert!(absent.evaluate(None, &no_params(), &req()));
        assert!(absent.evaluate(Some(""), &no_params(), &req()));
        assert!(!absent.evaluate(Some("admin"), &no_params(), &req()));
    }

    #[test]
    fn test_predicates() {
        let by_request = Constraint::request_fn(|r| r.attribute("user_agent") == Some("iPhone"));
        assert!(by_request.evaluate(None, &no_params(), &req()));

        let by_params = Constraint::params_fn(|p, _| p.get("id").is_some_and(|id| id == "1"));
        let mut params = HashMap::new();
        params.insert("id".to_string(), "1".to_string());
        assert!(by_params.evaluate(None, &params, &req()));
        assert!(!by_params.evaluate(None, &no_params(), &req()));
    }

    struct LocalOnly;

    impl RequestMatcher for LocalOnly {
        fn matches(&self, request: &RouteRequest) -> bool {
            request.remote_ip().is_some_and(|ip| ip.starts_with("192.168."))
        }
    }

    #[test]
    fn test_matcher_object() {
        let c = Constraint::matcher(LocalOnly);
        assert!(c.evaluate(None, &no_params(), &req()));
        assert!(c.is_predicate());
        assert_eq!(c.describe(), "<predicate>");
    }

    #[test]
    fn test_predicate_side_effects_visible() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let c = Constraint::request_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert!(c.evaluate(None, &no_params(), &req()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_value_shapes() {
        assert!(matches!(
            Constraint::from_value("format", &serde_json::json!("xml")).unwrap(),
            Constraint::Literal(ref s) if s == "xml"
        ));
        assert!(matches!(
            Constraint::from_value("port", &serde_json::json!(8080)).unwrap(),
            Constraint::Literal(ref s) if s == "8080"
        ));
        assert!(matches!(
            Constraint::from_value("subdomain", &serde_json::json!(true)).unwrap(),
            Constraint::Presence(true)
        ));
        assert!(matches!(
            Constraint::from_value("format", &serde_json::json!(["xml", "json"])).unwrap(),
            Constraint::Set(ref v) if v.len() == 2
        ));
        let regex = Constraint::from_value("id", &serde_json::json!({"regex": "[0-9]+"})).unwrap();
        assert_eq!(regex.segment_regex().as_deref(), Some("[0-9]+"));
    }

    #[test]
    fn test_from_value_rejects_unsupported() {
        for bad in [
            serde_json::json!(1.5),
            serde_json::json!(null),
            serde_json::json!({"pattern": "x"}),
            serde_json::json!([["nested"]]),
        ] {
            assert!(matches!(
                Constraint::from_value("k", &bad),
                Err(RoutingError::ConstraintConfig(_))
            ));
        }
    }

    #[test]
    fn test_segment_regex() {
        assert_eq!(Constraint::from("a.b").segment_regex().as_deref(), Some(r"a\.b"));
        assert_eq!(
            Constraint::from(vec!["x", "y"]).segment_regex().as_deref(),
            Some("x|y")
        );
        assert!(Constraint::from(true).segment_regex().is_none());
    }

    #[test]
    fn test_bind_targets() {
        let segments = vec!["id".to_string()];
        let id = BoundConstraint::bind("id", Constraint::from("1"), &segments);
        assert_eq!(id.target(), &ConstraintTarget::Segment("id".to_string()));

        let port = BoundConstraint::bind("port", Constraint::from(8080u16), &segments);
        assert_eq!(port.target(), &ConstraintTarget::Request(RequestAttribute::Port));
        assert!(port.check(&no_params(), &req(), 1));

        let agent = BoundConstraint::bind("user_agent", Constraint::from("iPhone"), &segments);
        assert_eq!(agent.target(), &ConstraintTarget::Attribute("user_agent".to_string()));
        assert!(agent.check(&no_params(), &req(), 1));
    }

    #[test]
    fn test_bind_request_attributes() {
        let sub = BoundConstraint::bind("subdomain", Constraint::from("admin"), &[]);
        assert!(sub.check(&no_params(), &req(), 1));
        let domain = BoundConstraint::bind("domain", Constraint::from("example.com"), &[]);
        assert!(domain.check(&no_params(), &req(), 1));
        let ip = BoundConstraint::bind("ip", Constraint::regex(r"192\.168\.1\.\d+").unwrap(), &[]);
        assert!(ip.check(&no_params(), &req(), 1));
        let method = BoundConstraint::bind("method", Constraint::from("GET"), &[]);
        assert!(method.check(&no_params(), &req(), 1));
    }

    #[test]
    fn test_protocol_normalized() {
        let protocol = BoundConstraint::bind("protocol", Constraint::from("http"), &[]);
        assert!(matches!(protocol.constraint(), Constraint::Literal(ref p) if p == "http://"));
        assert!(protocol.check(&no_params(), &req(), 1));
    }

    #[test]
    fn test_attribute_falls_back_to_params() {
        let format = BoundConstraint::bind("format", Constraint::from("json"), &[]);
        let mut params = HashMap::new();
        params.insert("format".to_string(), "json".to_string());
        assert!(format.check(&params, &req(), 1));
        assert!(!format.check(&no_params(), &req(), 1));
    }
}

//! The route table.
//!
//! [`RouteTable::draw`] walks a tree of [`RouteEntry`] values, threading the
//! scope stack through nested blocks, and produces an ordered, immutable list
//! of routes plus a name index. [`RouteTable::recognize`] tries routes in
//! declaration order and returns the first one whose verb, path, and
//! constraints all accept the request.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use switchyard_core::logging::recognition_span;
use switchyard_core::{RoutingError, RoutingResult, Settings};

use super::escape::{normalize_path, unescape};
use super::route::{Route, RouteDeclaration};
use super::scope::{Scope, ScopeFrame};
use crate::request::RouteRequest;

/// An entry in a route declaration tree.
#[derive(Debug, Clone)]
pub enum RouteEntry {
    /// A single route.
    Route(RouteDeclaration),
    /// A nested block with its own scope frame.
    Scope {
        /// Overrides applied to every entry in the block.
        frame: ScopeFrame,
        /// The entries of the block.
        entries: Vec<RouteEntry>,
    },
}

impl From<RouteDeclaration> for RouteEntry {
    fn from(decl: RouteDeclaration) -> Self {
        Self::Route(decl)
    }
}

impl RouteEntry {
    /// Creates a nested block.
    pub fn scope(frame: ScopeFrame, entries: impl IntoIterator<Item = Self>) -> Self {
        Self::Scope {
            frame,
            entries: entries.into_iter().collect(),
        }
    }
}

/// A successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route.
    pub route: Arc<Route>,
    /// Captured path params merged over the route defaults.
    pub params: HashMap<String, String>,
    /// The unmatched rest of the path, for mounted routes.
    pub remaining_path: String,
}

impl RouteMatch {
    /// Returns the endpoint handle for dispatch.
    pub fn endpoint_handle(&self) -> String {
        self.route.endpoint().handle_for(&self.params)
    }

    /// Returns a param.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// The outcome of recognizing a request.
#[derive(Debug, Clone)]
pub enum MatchResult {
    /// A route accepted the request.
    Matched(RouteMatch),
    /// Some route's path matched but its verb or constraints rejected the request.
    PathOnly {
        /// Methods of the path-matching routes that were rejected by verb.
        allowed: Vec<Method>,
    },
    /// No route's path matched.
    NoMatch,
}

impl MatchResult {
    /// Returns `true` for [`MatchResult::Matched`].
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Returns the match, if any.
    pub fn into_match(self) -> Option<RouteMatch> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }
}

enum Attempt {
    Matched(RouteMatch),
    WrongVerb,
    Rejected,
    Miss,
}

/// An ordered, immutable collection of routes with a name index.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    named: HashMap<String, usize>,
    tld_length: usize,
}

impl RouteTable {
    /// Returns an empty table.
    pub fn empty(settings: &Settings) -> Self {
        Self {
            tld_length: settings.tld_length,
            ..Self::default()
        }
    }

    /// Builds a table from a declaration tree.
    ///
    /// # Errors
    ///
    /// Fails with the first build-time error: a malformed pattern, an invalid
    /// or duplicate name, a missing or invalid controller, an unsupported
    /// constraint, or two unconstrained root routes sharing a verb.
    pub fn draw(entries: Vec<RouteEntry>, settings: &Settings) -> RoutingResult<Self> {
        let mut table = Self::empty(settings);
        table.draw_scope(entries, &Scope::root(), settings)?;
        tracing::debug!(routes = table.routes.len(), named = table.named.len(), "route table drawn");
        Ok(table)
    }

    fn draw_scope(
        &mut self,
        entries: Vec<RouteEntry>,
        scope: &Scope,
        settings: &Settings,
    ) -> RoutingResult<()> {
        for entry in entries {
            match entry {
                RouteEntry::Route(decl) => {
                    if let Some(route) = decl.build(scope, settings, self.routes.len())? {
                        self.add(route)?;
                    }
                }
                RouteEntry::Scope { frame, entries } => {
                    let nested = scope.nest(frame);
                    self.draw_scope(entries, &nested, settings)?;
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, route: Route) -> RoutingResult<()> {
        if let Some(name) = route.name() {
            if self.named.contains_key(name) {
                return Err(RoutingError::ImproperlyConfigured(format!(
                    "Invalid route name, already in use: '{name}'"
                )));
            }
        }

        if is_unconstrained_root(&route) {
            if let Some(existing) = self
                .routes
                .iter()
                .find(|r| is_unconstrained_root(r) && r.verbs().overlaps(route.verbs()))
            {
                return Err(RoutingError::ImproperlyConfigured(format!(
                    "Multiple unconstrained root routes: {} and {}",
                    existing.endpoint(),
                    route.endpoint()
                )));
            }
        }

        tracing::debug!(
            name = route.name().unwrap_or(""),
            verbs = %route.verbs(),
            path = route.path(),
            endpoint = %route.endpoint(),
            "route added"
        );

        if let Some(name) = route.name() {
            self.named.insert(name.to_string(), self.routes.len());
        }
        self.routes.push(Arc::new(route));
        Ok(())
    }

    /// Returns the routes in precedence order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Returns the route with the given name.
    pub fn route(&self, name: &str) -> Option<&Arc<Route>> {
        self.named.get(name).map(|&i| &self.routes[i])
    }

    /// Returns the route names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the TLD length used for `subdomain` and `domain` constraints.
    pub const fn tld_length(&self) -> usize {
        self.tld_length
    }

    /// Recognizes a request.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::BadRequest`] when the path's percent-encoding
    /// does not decode to UTF-8. Not matching is not an error.
    pub fn recognize(&self, request: &RouteRequest) -> RoutingResult<MatchResult> {
        let span = recognition_span(request.method().as_str(), request.path());
        let _guard = span.enter();

        let path = checked_path(request)?;
        let mut allowed: Vec<Method> = Vec::new();
        let mut path_matched = false;

        for route in &self.routes {
            match self.attempt(route, request, &path) {
                Attempt::Matched(m) => {
                    tracing::debug!(route = route.name().unwrap_or(""), path = route.path(), "matched");
                    return Ok(MatchResult::Matched(m));
                }
                Attempt::WrongVerb => {
                    path_matched = true;
                    for method in route.verbs().methods() {
                        if !allowed.contains(method) {
                            allowed.push(method.clone());
                        }
                    }
                }
                Attempt::Rejected => path_matched = true,
                Attempt::Miss => {}
            }
        }

        if path_matched {
            allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            tracing::debug!(?allowed, "path matched but no route accepted the request");
            Ok(MatchResult::PathOnly { allowed })
        } else {
            tracing::debug!("no route matched");
            Ok(MatchResult::NoMatch)
        }
    }

    /// Returns every route accepting the request, in precedence order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::BadRequest`] for undecodable paths.
    pub fn find_routes(&self, request: &RouteRequest) -> RoutingResult<Vec<RouteMatch>> {
        let path = checked_path(request)?;
        Ok(self
            .routes
            .iter()
            .filter_map(|route| match self.attempt(route, request, &path) {
                Attempt::Matched(m) => Some(m),
                _ => None,
            })
            .collect())
    }

    fn attempt(&self, route: &Arc<Route>, request: &RouteRequest, path: &str) -> Attempt {
        let verb_ok = route.verb_matches(request.method());

        let Some((captured, remaining)) = route.pattern().match_path(path) else {
            return Attempt::Miss;
        };

        if !verb_ok {
            tracing::trace!(path = route.path(), verbs = %route.verbs(), "rejected by verb");
            return Attempt::WrongVerb;
        }

        let params = route.params_for(captured);
        if let Err(key) = route.check_constraints(&params, request, self.tld_length) {
            tracing::trace!(path = route.path(), constraint = %key, "rejected by constraint");
            return Attempt::Rejected;
        }

        Attempt::Matched(RouteMatch {
            route: Arc::clone(route),
            params,
            remaining_path: remaining,
        })
    }
}

fn is_unconstrained_root(route: &Route) -> bool {
    route.path() == "/" && route.is_anchored() && route.constraints().is_empty()
}

fn checked_path(request: &RouteRequest) -> RoutingResult<String> {
    let path = normalize_path(request.path());
    unescape(&path).map_err(|_| {
        RoutingError::BadRequest(format!("Invalid encoding in request path: {}", request.path()))
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::constraints::Constraint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn get(path: &str) -> RouteRequest {
        RouteRequest::builder().path(path).build()
    }

    fn table(entries: Vec<RouteEntry>) -> RouteTable {
        RouteTable::draw(entries, &Settings::default()).unwrap()
    }

    #[test]
    fn test_recognize_project() {
        let t = table(vec![RouteDeclaration::get("/projects/:id(.:format)")
            .to("projects#show")
            .name("project")
            .into()]);
        let m = t.recognize(&get("/projects/1")).unwrap().into_match().unwrap();
        assert_eq!(m.params.len(), 3);
        assert_eq!(m.param("controller"), Some("projects"));
        assert_eq!(m.param("action"), Some("show"));
        assert_eq!(m.param("id"), Some("1"));
        assert_eq!(m.endpoint_handle(), "projects#show");
    }

    #[test]
    fn test_first_declared_wins() {
        let t = table(vec![
            RouteDeclaration::get("/posts/:id").to("posts#show").into(),
            RouteDeclaration::get("/posts/:slug")
                .to("posts#by_slug")
                .constraint("slug", Constraint::regex("[a-z0-9]+").unwrap())
                .into(),
        ]);
        let m = t.recognize(&get("/posts/abc")).unwrap().into_match().unwrap();
        assert_eq!(m.param("action"), Some("show"));
    }

    #[test]
    fn test_path_only_reports_allowed_methods() {
        let t = table(vec![
            RouteDeclaration::post("/posts").to("posts#create").into(),
            RouteDeclaration::put("/posts").to("posts#replace").into(),
        ]);
        match t.recognize(&get("/posts")).unwrap() {
            MatchResult::PathOnly { allowed } => {
                assert_eq!(allowed, vec![Method::POST, Method::PUT]);
            }
            other => panic!("expected PathOnly, got {other:?}"),
        }
        assert!(matches!(t.recognize(&get("/other")).unwrap(), MatchResult::NoMatch));
    }

    #[test]
    fn test_path_only_on_constraint_rejection() {
        let t = table(vec![RouteDeclaration::get("/admin")
            .to("admin#index")
            .constraint("subdomain", "admin")
            .into()]);
        assert!(matches!(
            t.recognize(&get("/admin")).unwrap(),
            MatchResult::PathOnly { ref allowed } if allowed.is_empty()
        ));
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let t = table(vec![RouteDeclaration::get("/x").to("x#show").into()]);
        let request = RouteRequest::builder().method(Method::HEAD).path("/x").build();
        assert!(t.recognize(&request).unwrap().is_matched());
    }

    #[test]
    fn test_bad_request_on_invalid_utf8() {
        let t = table(vec![RouteDeclaration::get("/:id").to("x#show").into()]);
        let err = t.recognize(&get("/%E2%28%A1")).unwrap_err();
        assert!(matches!(err, RoutingError::BadRequest(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_path_is_normalized() {
        let t = table(vec![RouteDeclaration::get("/posts").to("posts#index").into()]);
        assert!(t.recognize(&get("//posts/")).unwrap().is_matched());
    }

    #[test]
    fn test_duplicate_names() {
        let err = RouteTable::draw(
            vec![
                RouteDeclaration::get("/a").to("a#show").name("thing").into(),
                RouteDeclaration::get("/b").to("b#show").name("thing").into(),
            ],
            &Settings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[test]
    fn test_conflicting_roots() {
        let err = RouteTable::draw(
            vec![
                RouteDeclaration::root().to("pages#home").into(),
                RouteDeclaration::get("/").to("pages#other").into(),
            ],
            &Settings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::ImproperlyConfigured(_)));

        let ok = RouteTable::draw(
            vec![
                RouteDeclaration::root().to("pages#home").into(),
                RouteDeclaration::post("/").to("pages#create").into(),
            ],
            &Settings::default(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_scoped_entries() {
        let t = table(vec![RouteEntry::scope(
            ScopeFrame::new().path("/admin").name_prefix("admin").module("admin"),
            vec![
                RouteDeclaration::get("/posts").to("posts#index").name("posts").into(),
                RouteEntry::scope(
                    ScopeFrame::new().only(["index"]),
                    vec![
                        RouteDeclaration::get("/users").to("users#index").name("users").into(),
                        RouteDeclaration::get("/users/:id").to("users#show").name("user").into(),
                    ],
                ),
            ],
        )]);
        assert_eq!(t.len(), 2);
        assert!(t.route("admin_posts").is_some());
        assert!(t.route("admin_users").is_some());
        assert!(t.route("admin_user").is_none());
        let m = t.recognize(&get("/admin/posts")).unwrap().into_match().unwrap();
        assert_eq!(m.param("controller"), Some("admin/posts"));
    }

    #[test]
    fn test_mount_reports_remaining_path() {
        let t = table(vec![RouteDeclaration::mount("/api", "api_app").into()]);
        let request = RouteRequest::builder().method(Method::DELETE).path("/api/v1/users").build();
        let m = t.recognize(&request).unwrap().into_match().unwrap();
        assert_eq!(m.remaining_path, "/v1/users");
        assert_eq!(m.endpoint_handle(), "api_app");
        assert!(!t.recognize(&get("/apis")).unwrap().is_matched());
    }

    #[test]
    fn test_predicates_run_once_per_attempt_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&calls);
        let t = table(vec![
            RouteDeclaration::get("/dashboard")
                .to("dashboard#beta")
                .request_constraint(Constraint::request_fn(move |_| {
                    first.fetch_add(1, Ordering::SeqCst);
                    false
                }))
                .into(),
            RouteDeclaration::get("/dashboard").to("dashboard#show").into(),
        ]);
        let m = t.recognize(&get("/dashboard")).unwrap().into_match().unwrap();
        assert_eq!(m.param("action"), Some("show"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_find_routes_returns_all_candidates() {
        let t = table(vec![
            RouteDeclaration::get("/a").to("a#one").into(),
            RouteDeclaration::any("/a").to("a#two").into(),
            RouteDeclaration::post("/a").to("a#three").into(),
        ]);
        let found = t.find_routes(&get("/a")).unwrap();
        let actions: Vec<_> = found.iter().filter_map(|m| m.param("action")).collect();
        assert_eq!(actions, vec!["one", "two"]);
    }
}

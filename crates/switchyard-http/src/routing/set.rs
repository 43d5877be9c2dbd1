//! The live route set.
//!
//! A [`RouteSet`] owns the current [`RouteTable`] behind an [`ArcSwap`]. Drawing
//! builds a complete table off to the side and swaps a single pointer, so
//! readers always see either the old table or the new one. Every operation
//! loads one snapshot and uses it to the end.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::{header, HeaderValue, Response, StatusCode};

use switchyard_core::{RoutingError, RoutingResult, Settings};

use super::generator::{GenerateTarget, ParamSource, UrlGenerator, UrlOptions};
use super::route::Endpoint;
use super::table::{MatchResult, RouteEntry, RouteMatch, RouteTable};
use crate::request::RouteRequest;

/// Value of the cascade header meaning "try the next candidate".
pub const CASCADE_PASS: &str = "pass";

/// The route table currently in service, with atomic reload.
pub struct RouteSet {
    table: ArcSwap<RouteTable>,
    settings: Settings,
}

impl std::fmt::Debug for RouteSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSet")
            .field("routes", &self.table.load().len())
            .finish_non_exhaustive()
    }
}

impl RouteSet {
    /// Creates a set with no routes.
    pub fn new(settings: Settings) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::empty(&settings)),
            settings,
        }
    }

    /// Creates a set from declarations.
    ///
    /// # Errors
    ///
    /// Returns the build-time error of the first invalid declaration.
    pub fn draw(entries: Vec<RouteEntry>, settings: Settings) -> RoutingResult<Self> {
        let table = RouteTable::draw(entries, &settings)?;
        Ok(Self {
            table: ArcSwap::from_pointee(table),
            settings,
        })
    }

    /// Replaces every route.
    ///
    /// The new table is built completely before it is swapped in; on error the
    /// current table stays in service.
    ///
    /// # Errors
    ///
    /// Returns the build-time error of the first invalid declaration.
    pub fn reload(&self, entries: Vec<RouteEntry>) -> RoutingResult<()> {
        match RouteTable::draw(entries, &self.settings) {
            Ok(table) => {
                let count = table.len();
                self.table.store(Arc::new(table));
                tracing::info!(routes = count, "route table reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to reload routes: {}. Keeping current table.", e);
                Err(e)
            }
        }
    }

    /// Returns a consistent snapshot of the current table.
    pub fn load(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Returns the settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Recognizes a request against the current table.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::BadRequest`] for undecodable paths.
    pub fn recognize(&self, request: &RouteRequest) -> RoutingResult<MatchResult> {
        self.table.load().recognize(request)
    }

    /// Returns every route accepting the request, in precedence order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::BadRequest`] for undecodable paths.
    pub fn find_routes(&self, request: &RouteRequest) -> RoutingResult<Vec<RouteMatch>> {
        self.table.load().find_routes(request)
    }

    /// Generates a URL against the current table.
    ///
    /// # Errors
    ///
    /// See [`UrlGenerator::url_for`].
    pub fn url_for<'t>(
        &self,
        target: impl Into<GenerateTarget<'t>>,
        source: &ParamSource,
        options: &UrlOptions,
    ) -> RoutingResult<String> {
        let table = self.table.load();
        UrlGenerator::new(&table, &self.settings).url_for(target, source, options)
    }

    /// Generates a path against the current table.
    ///
    /// # Errors
    ///
    /// See [`UrlGenerator::url_for`].
    pub fn path_for<'t>(
        &self,
        target: impl Into<GenerateTarget<'t>>,
        source: &ParamSource,
    ) -> RoutingResult<String> {
        self.url_for(target, source, &UrlOptions::path_only())
    }

    /// Generates a URL while handling `current`, whose params fill required keys
    /// that are not supplied otherwise.
    ///
    /// # Errors
    ///
    /// See [`UrlGenerator::url_for`].
    pub fn url_for_within<'t>(
        &self,
        current: &HashMap<String, String>,
        target: impl Into<GenerateTarget<'t>>,
        source: &ParamSource,
        options: &UrlOptions,
    ) -> RoutingResult<String> {
        let table = self.table.load();
        UrlGenerator::new(&table, &self.settings)
            .with_recall(current)
            .url_for(target, source, options)
    }

    /// Dispatches a request through the candidate routes.
    ///
    /// Candidates are tried in precedence order. Redirect endpoints answer
    /// directly; other endpoints are passed to `handler`. A response carrying
    /// the cascade header set to `pass` hands the request to the next candidate.
    /// When no candidate answers, the result is a `404` with the cascade header
    /// set, and an undecodable path yields a `400`.
    pub fn serve<F>(&self, request: &RouteRequest, mut handler: F) -> Response<String>
    where
        F: FnMut(&RouteMatch) -> Response<String>,
    {
        let candidates = match self.find_routes(request) {
            Ok(candidates) => candidates,
            Err(e @ RoutingError::BadRequest(_)) => {
                tracing::warn!(path = request.path(), "{}", e);
                return plain(StatusCode::BAD_REQUEST, e.to_string());
            }
            Err(e) => {
                tracing::error!("{}", e);
                return plain(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        };

        for candidate in &candidates {
            let response = match candidate.route.endpoint() {
                Endpoint::Redirect(redirect) => redirect.response(&candidate.params, request),
                _ => handler(candidate),
            };
            if !self.is_pass(&response) {
                return response;
            }
            tracing::trace!(path = candidate.route.path(), "handler passed");
        }

        let mut response = plain(StatusCode::NOT_FOUND, "Not Found".to_string());
        if let Ok(name) = header::HeaderName::from_bytes(self.settings.cascade_header.as_bytes()) {
            response
                .headers_mut()
                .insert(name, HeaderValue::from_static(CASCADE_PASS));
        }
        response
    }

    fn is_pass(&self, response: &Response<String>) -> bool {
        response
            .headers()
            .get(self.settings.cascade_header.as_str())
            .is_some_and(|v| v == CASCADE_PASS)
    }
}

fn plain(status: StatusCode, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::redirect::Redirect;
    use crate::routing::route::RouteDeclaration;

    fn entries() -> Vec<RouteEntry> {
        vec![
            RouteDeclaration::get("/projects/:id")
                .to("projects#show")
                .name("project")
                .into(),
            RouteDeclaration::get("/projects/:id")
                .to("legacy#show")
                .into(),
            RouteDeclaration::get("/old/:id")
                .redirect(Redirect::to("/projects/%{id}"))
                .into(),
        ]
    }

    fn request(path: &str) -> RouteRequest {
        RouteRequest::builder().path(path).host("example.com").build()
    }

    fn pass() -> Response<String> {
        let mut response = Response::new(String::new());
        response
            .headers_mut()
            .insert("x-cascade", HeaderValue::from_static("pass"));
        response
    }

    #[test]
    fn test_serve_first_candidate() {
        let set = RouteSet::draw(entries(), Settings::default()).unwrap();
        let response = set.serve(&request("/projects/1"), |m| Response::new(m.endpoint_handle()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "projects#show");
    }

    #[test]
    fn test_serve_cascades_on_pass() {
        let set = RouteSet::draw(entries(), Settings::default()).unwrap();
        let mut seen = Vec::new();
        let response = set.serve(&request("/projects/1"), |m| {
            seen.push(m.endpoint_handle());
            if m.param("controller") == Some("projects") {
                pass()
            } else {
                Response::new("legacy".to_string())
            }
        });
        assert_eq!(response.body(), "legacy");
        assert_eq!(seen, vec!["projects#show", "legacy#show"]);
    }

    #[test]
    fn test_serve_not_found_sets_cascade() {
        let set = RouteSet::draw(entries(), Settings::default()).unwrap();
        let response = set.serve(&request("/projects/1"), |_| pass());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("x-cascade").unwrap(), "pass");

        let response = set.serve(&request("/nothing"), |_| Response::new(String::new()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_serve_redirect() {
        let set = RouteSet::draw(entries(), Settings::default()).unwrap();
        let response = set.serve(&request("/old/7"), |_| panic!("handler called"));
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://example.com/projects/7"
        );
    }

    #[test]
    fn test_serve_bad_request() {
        let set = RouteSet::draw(entries(), Settings::default()).unwrap();
        let response = set.serve(&request("/projects/%E0%A4%A"), |_| Response::new(String::new()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_reload_swaps_table() {
        let set = RouteSet::new(Settings::default());
        assert!(set.load().is_empty());

        let before = set.load();
        set.reload(entries()).unwrap();
        assert!(before.is_empty());
        assert_eq!(set.load().len(), 3);
        assert_eq!(
            set.path_for("project", &ParamSource::keyed([("id", "2")])).unwrap(),
            "/projects/2"
        );
    }

    #[test]
    fn test_failed_reload_keeps_table() {
        let set = RouteSet::draw(entries(), Settings::default()).unwrap();
        let bad = vec![
            RouteDeclaration::get("/a").to("a#a").name("dup").into(),
            RouteDeclaration::get("/b").to("b#b").name("dup").into(),
        ];
        assert!(set.reload(bad).is_err());
        assert_eq!(set.load().len(), 3);
        assert!(set.recognize(&request("/projects/1")).unwrap().is_matched());
    }

    #[test]
    fn test_url_for_within_recalls_params() {
        let set = RouteSet::draw(
            vec![RouteDeclaration::get("/users/:user_id/posts/:id")
                .to("posts#show")
                .name("user_post")
                .into()],
            Settings::default(),
        )
        .unwrap();
        let current = HashMap::from([("user_id".to_string(), "3".to_string())]);
        let path = set
            .url_for_within(
                &current,
                "user_post",
                &ParamSource::keyed([("id", "9")]),
                &UrlOptions::path_only(),
            )
            .unwrap();
        assert_eq!(path, "/users/3/posts/9");
    }
}

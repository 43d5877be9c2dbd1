//! # switchyard
//!
//! A bidirectional HTTP route engine. Routes are declared once, drawn into an
//! immutable table, and that table both recognizes incoming requests and
//! generates URLs.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `switchyard` to get everything, or on individual crates for finer-grained
//! control.
//!
//! ```
//! use switchyard::prelude::*;
//!
//! let routes = RouteSet::draw(
//!     vec![RouteDeclaration::get("/projects/:id").to("projects#show").name("project").into()],
//!     Settings::default(),
//! )
//! .unwrap();
//!
//! let request = RouteRequest::from_url(Method::GET, "/projects/7");
//! let matched = routes.recognize(&request).unwrap().into_match().unwrap();
//! assert_eq!(matched.param("id"), Some("7"));
//!
//! let path = routes
//!     .path_for("project", &ParamSource::keyed([("id", "7")]))
//!     .unwrap();
//! assert_eq!(path, "/projects/7");
//! ```

/// Settings, errors, and logging.
pub use switchyard_core as core;

/// Route declaration, recognition, and URL generation.
#[cfg(feature = "http")]
pub use switchyard_http as routing;

/// Management commands (CLI).
#[cfg(feature = "cli")]
pub use switchyard_cli as cli;

/// Request factory and routing assertions for tests.
#[cfg(feature = "testing")]
pub use switchyard_test as test;

/// Third-party crates that appear in the public API.
pub use http;
pub use serde_json;
pub use tracing;

/// The types most programs need.
pub mod prelude {
    pub use http::Method;
    pub use switchyard_core::{RoutingError, RoutingResult, Settings};

    #[cfg(feature = "http")]
    pub use switchyard_http::routing::{
        Constraint, FormatOption, GenerateTarget, MatchResult, ParamSource, Redirect,
        RouteDeclaration, RouteEntry, RouteSet, ScopeFrame, UrlOptions,
    };
    #[cfg(feature = "http")]
    pub use switchyard_http::RouteRequest;
}

#[cfg(all(test, feature = "http"))]
mod tests {
    use super::prelude::*;
    use switchyard_test::{assert_recognizes, assert_routing, draw_routes};

    #[test]
    fn test_prelude_round_trip() {
        let routes = draw_routes(vec![
            RouteDeclaration::get("/articles/:slug")
                .to("articles#show")
                .name("article")
                .into(),
        ]);
        assert_routing(
            &routes,
            "/articles/hello",
            &[("controller", "articles"), ("action", "show"), ("slug", "hello")],
        );
        assert_recognizes(
            &routes,
            &[
                ("controller", "articles"),
                ("action", "show"),
                ("slug", "hello"),
                ("format", "json"),
            ],
            Method::GET,
            "/articles/hello.json",
        );
    }

    #[test]
    fn test_reexported_crates() {
        let routes = draw_routes(vec![
            RouteDeclaration::get("/articles/:slug").to("articles#show").into(),
        ]);
        let listing: Vec<_> = routes.load().routes().iter().map(|r| r.describe()).collect();
        let json = crate::serde_json::to_value(&listing).unwrap();
        assert_eq!(json[0]["path"], "/articles/:slug(.:format)");
        assert_eq!(crate::http::Method::GET, Method::GET);
        crate::tracing::debug!(routes = listing.len(), "described");
    }
}

//! Route declaration, recognition, and URL generation.
//!
//! - [`pattern`]: compiles path patterns (`/posts/:id(.:format)`, `/files/*path`)
//! - [`constraints`]: segment, request, and predicate constraints
//! - [`scope`]: the scope stack threaded through nested declarations
//! - [`route`]: route declarations and compiled routes
//! - [`table`]: the ordered route table and recognition
//! - [`generator`]: URL generation by name or by defaults
//! - [`redirect`]: redirect endpoints
//! - [`set`]: the live, reloadable route set with cascade dispatch
//! - [`file`]: TOML and JSON route files
//! - [`escape`]: path normalization and percent-escaping
//!
//! # Examples
//!
//! ```
//! use switchyard_core::Settings;
//! use switchyard_http::routing::{ParamSource, RouteDeclaration, RouteSet};
//! use switchyard_http::RouteRequest;
//!
//! let routes = RouteSet::draw(
//!     vec![RouteDeclaration::get("/projects/:id")
//!         .to("projects#show")
//!         .name("project")
//!         .into()],
//!     Settings::default(),
//! )
//! .unwrap();
//!
//! // Recognition
//! let request = RouteRequest::builder().path("/projects/1.xml").build();
//! let m = routes.recognize(&request).unwrap().into_match().unwrap();
//! assert_eq!(m.endpoint_handle(), "projects#show");
//! assert_eq!(m.param("id"), Some("1"));
//! assert_eq!(m.param("format"), Some("xml"));
//!
//! // Generation
//! let path = routes
//!     .path_for("project", &ParamSource::keyed([("id", "1"), ("format", "xml")]))
//!     .unwrap();
//! assert_eq!(path, "/projects/1.xml");
//! ```

pub mod constraints;
pub mod escape;
pub mod file;
pub mod generator;
pub mod pattern;
pub mod redirect;
pub mod route;
pub mod scope;
pub mod set;
pub mod table;

pub use constraints::{Constraint, Predicate, RequestAttribute, RequestMatcher};
pub use file::RouteFile;
pub use generator::{GenerateTarget, ParamSource, RequestParameters, UrlGenerator, UrlOptions};
pub use pattern::{CompileOptions, PathPattern};
pub use redirect::Redirect;
pub use route::{Endpoint, FormatOption, Route, RouteDeclaration, RouteDescription, Verbs};
pub use scope::{Scope, ScopeFrame};
pub use set::RouteSet;
pub use table::{MatchResult, RouteEntry, RouteMatch, RouteTable};

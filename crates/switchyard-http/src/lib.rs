//! # switchyard-http
//!
//! The routing engine: a request descriptor and the [`routing`] module, which
//! compiles route declarations into a table, recognizes requests against it, and
//! generates URLs from route names.
//!
//! ## Modules
//!
//! - [`request`] - The request descriptor consulted during recognition
//! - [`routing`] - Patterns, constraints, scopes, the route table, and generation

pub mod request;
pub mod routing;

pub use request::{RouteRequest, RouteRequestBuilder};
pub use routing::{MatchResult, RouteDeclaration, RouteEntry, RouteMatch, RouteSet, RouteTable};

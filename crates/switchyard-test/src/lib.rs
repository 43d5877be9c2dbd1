//! # switchyard-test
//!
//! Testing utilities for switchyard. Provides a request factory for building
//! request descriptors, thread-local settings overrides, and assertions that
//! check recognition and generation of a route set in both directions.
//!
//! ## Modules
//!
//! - [`request_factory`] - Build [`RouteRequest`](switchyard_http::RouteRequest) values
//! - [`override_settings`] - Temporarily swap settings within a closure
//! - [`assertions`] - `assert_recognizes`, `assert_generates`, `assert_routing`

pub mod assertions;
pub mod override_settings;
pub mod request_factory;

pub use assertions::{
    assert_generates, assert_recognizes, assert_redirects, assert_routing, assert_status,
    draw_routes,
};
pub use override_settings::{current_settings, override_settings, SettingsOverride};
pub use request_factory::RequestFactory;

//! Routing assertions.
//!
//! Each assertion panics with a message that shows what was expected and what
//! the route set actually did.

use std::collections::HashMap;

use http::{header, Method, Response};
use switchyard_http::routing::{GenerateTarget, MatchResult, ParamSource, RouteEntry, RouteSet};

use crate::override_settings::current_settings;
use crate::request_factory::RequestFactory;

/// Draws a route set with the active settings.
///
/// # Panics
///
/// Panics if the declarations do not build.
pub fn draw_routes(entries: Vec<RouteEntry>) -> RouteSet {
    RouteSet::draw(entries, current_settings())
        .unwrap_or_else(|e| panic!("Failed to draw routes: {e}"))
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn sorted(map: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut pairs: Vec<_> = map.iter().collect();
    pairs.sort();
    pairs
}

/// Asserts that `method target` is recognized with exactly the expected params.
///
/// `target` is a path (with optional query) or a full URL.
///
/// # Panics
///
/// Panics if the request does not match, or matches with different params.
pub fn assert_recognizes(set: &RouteSet, expected: &[(&str, &str)], method: Method, target: &str) {
    let request = RequestFactory::new().request(method.clone(), target);
    let result = set
        .recognize(&request)
        .unwrap_or_else(|e| panic!("{method} {target} was rejected: {e}"));

    let actual = match result {
        MatchResult::Matched(m) => m.params,
        MatchResult::PathOnly { allowed } => panic!(
            "{method} {target} matched a path but no route accepted it (allowed: {allowed:?})"
        ),
        MatchResult::NoMatch => panic!("No route matches {method} {target}"),
    };

    let expected = to_map(expected);
    assert_eq!(
        sorted(&actual),
        sorted(&expected),
        "{method} {target} recognized with different params"
    );
}

/// Asserts that generating for `target` with `params` yields `expected_path`.
///
/// # Panics
///
/// Panics if generation fails or produces a different path.
pub fn assert_generates<'t>(
    set: &RouteSet,
    expected_path: &str,
    target: impl Into<GenerateTarget<'t>>,
    params: &[(&str, &str)],
) {
    let target = target.into();
    let path = set
        .path_for(target, &ParamSource::Keyed(to_map(params)))
        .unwrap_or_else(|e| panic!("Failed to generate {target:?}: {e}"));
    assert_eq!(path, expected_path, "Generated path for {target:?} differs");
}

/// Asserts that `GET path` recognizes to `params` and that `params` generate `path`.
///
/// Generation selects the route by its defaults, so `params` should name the
/// controller and action.
///
/// # Panics
///
/// Panics if either direction fails.
pub fn assert_routing(set: &RouteSet, path: &str, params: &[(&str, &str)]) {
    assert_recognizes(set, params, Method::GET, path);
    assert_generates(set, path, GenerateTarget::Unnamed, params);
}

/// Asserts that the response is a redirect (3xx) to the expected URL.
///
/// # Panics
///
/// Panics if the response is not a redirect or the URL does not match.
pub fn assert_redirects(response: &Response<String>, expected_url: &str) {
    let status = response.status();
    assert!(status.is_redirection(), "Expected a redirect (3xx), got {status}");

    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| panic!("Redirect response missing Location header"));

    assert_eq!(
        location, expected_url,
        "Expected redirect to '{expected_url}', got '{location}'"
    );
}

/// Asserts that the response status code matches the expected value.
///
/// # Panics
///
/// Panics if the status code does not match.
pub fn assert_status(response: &Response<String>, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {expected}, got {}",
        response.status()
    );
}

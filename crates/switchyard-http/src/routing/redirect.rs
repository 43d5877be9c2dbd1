//! Redirect endpoints.
//!
//! A [`Redirect`] answers a matched route with a `Location` header instead of
//! dispatching to a handler. The target is either a template interpolating path
//! parameters with `%{name}`, or a closure over the params and the request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{header, Response, StatusCode};

use super::escape::escape_path;
use crate::request::RouteRequest;

type TargetFn = dyn Fn(&HashMap<String, String>, &RouteRequest) -> String + Send + Sync;

#[derive(Clone)]
enum Target {
    Template(String),
    Computed(Arc<TargetFn>),
}

/// A redirect endpoint.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use switchyard_http::routing::redirect::Redirect;
/// use switchyard_http::RouteRequest;
///
/// let redirect = Redirect::to("/%{name}%{rest}");
/// let request = RouteRequest::builder().host("stores.example.com").build();
/// let params = HashMap::from([
///     ("name".to_string(), "iernest".to_string()),
///     ("rest".to_string(), "/products".to_string()),
/// ]);
///
/// assert_eq!(
///     redirect.location(&params, &request),
///     "http://stores.example.com/iernest/products"
/// );
/// ```
#[derive(Clone)]
pub struct Redirect {
    target: Target,
    status: StatusCode,
    host: Option<String>,
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Redirect");
        match &self.target {
            Target::Template(t) => s.field("to", t),
            Target::Computed(_) => s.field("to", &"<closure>"),
        };
        s.field("status", &self.status.as_u16())
            .field("host", &self.host)
            .finish()
    }
}

impl Redirect {
    /// Redirects to a template; `%{name}` is replaced with the `name` param.
    pub fn to(template: impl Into<String>) -> Self {
        Self {
            target: Target::Template(template.into()),
            status: StatusCode::MOVED_PERMANENTLY,
            host: None,
        }
    }

    /// Redirects to a location computed from the params and the request.
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&HashMap<String, String>, &RouteRequest) -> String + Send + Sync + 'static,
    {
        Self {
            target: Target::Computed(Arc::new(f)),
            status: StatusCode::MOVED_PERMANENTLY,
            host: None,
        }
    }

    /// Sets the response status. Values outside the 3xx range are ignored.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        if let Ok(code) = StatusCode::from_u16(status) {
            if code.is_redirection() {
                self.status = code;
            }
        }
        self
    }

    /// Overrides the host of relative targets.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Returns the configured status.
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Returns the template, for describing routes.
    pub fn template(&self) -> Option<&str> {
        match &self.target {
            Target::Template(t) => Some(t),
            Target::Computed(_) => None,
        }
    }

    /// Computes the absolute location for a matched request.
    pub fn location(&self, params: &HashMap<String, String>, request: &RouteRequest) -> String {
        let target = match &self.target {
            Target::Template(template) => interpolate(template, params),
            Target::Computed(f) => f(params, request),
        };

        if target.contains("://") || target.starts_with("//") {
            return target;
        }

        let host = self.host.as_deref().unwrap_or_else(|| request.host());
        let port = request
            .optional_port()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        let path = if target.starts_with('/') {
            target
        } else {
            format!("/{target}")
        };
        format!("{}{host}{port}{path}", request.protocol())
    }

    /// Builds the redirect response.
    pub fn response(
        &self,
        params: &HashMap<String, String>,
        request: &RouteRequest,
    ) -> Response<String> {
        let location = self.location(params, request);
        let body = format!("<html><body>You are being <a href=\"{location}\">redirected</a>.</body></html>");
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        if let Ok(value) = header::HeaderValue::from_str(&location) {
            response.headers_mut().insert(header::LOCATION, value);
        }
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/html; charset=utf-8"),
        );
        response
    }
}

/// Replaces every `%{name}` with the path-escaped value of `name` (empty when absent).
fn interpolate(template: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            let name = &after[..end];
            if let Some(value) = params.get(name) {
                out.push_str(&escape_path(value));
            }
            rest = &after[end + 1..];
        } else {
            out.push_str(&rest[start..]);
            rest = "";
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_interpolate() {
        let p = params(&[("name", "iernest"), ("rest", "/products")]);
        assert_eq!(interpolate("/%{name}%{rest}", &p), "/iernest/products");
        assert_eq!(interpolate("/%{missing}/x", &p), "//x");
        assert_eq!(interpolate("/100%{", &p), "/100%{");
    }

    #[test]
    fn test_interpolate_escapes_values() {
        let p = params(&[("q", "a b")]);
        assert_eq!(interpolate("/search/%{q}", &p), "/search/a%20b");
    }

    #[test]
    fn test_location_keeps_non_standard_port() {
        let request = RouteRequest::builder().host("example.com:3000").build();
        let redirect = Redirect::to("/new");
        assert_eq!(redirect.location(&HashMap::new(), &request), "http://example.com:3000/new");
    }

    #[test]
    fn test_location_host_override_and_absolute() {
        let request = RouteRequest::builder().host("example.com").scheme("https").build();
        let redirect = Redirect::to("/x").host("other.example.com");
        assert_eq!(redirect.location(&HashMap::new(), &request), "https://other.example.com/x");

        let absolute = Redirect::to("http://elsewhere.test/%{id}");
        assert_eq!(
            absolute.location(&params(&[("id", "1")]), &request),
            "http://elsewhere.test/1"
        );
    }

    #[test]
    fn test_closure_target() {
        let redirect = Redirect::with(|p, _| format!("/users/{}", p["id"].to_uppercase()));
        let request = RouteRequest::builder().host("example.com").build();
        assert_eq!(
            redirect.location(&params(&[("id", "ab")]), &request),
            "http://example.com/users/AB"
        );
        assert!(redirect.template().is_none());
    }

    #[test]
    fn test_status() {
        assert_eq!(Redirect::to("/").status(302).status_code(), StatusCode::FOUND);
        assert_eq!(
            Redirect::to("/").status(200).status_code(),
            StatusCode::MOVED_PERMANENTLY
        );
    }

    #[test]
    fn test_response() {
        let request = RouteRequest::builder().host("example.com").build();
        let response = Redirect::to("/there").response(&HashMap::new(), &request);
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://example.com/there"
        );
        assert!(response.body().contains("redirected"));
    }
}

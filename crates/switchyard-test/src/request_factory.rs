//! Request factory for building [`RouteRequest`] values in tests.
//!
//! [`RequestFactory`] builds request descriptors with a default host, scheme,
//! and headers, so tests only spell out what they care about.
//!
//! ## Example
//!
//! ```
//! use switchyard_test::request_factory::RequestFactory;
//!
//! let factory = RequestFactory::new();
//! let request = factory.get("/articles/1?page=2");
//! assert_eq!(request.method(), &http::Method::GET);
//! assert_eq!(request.path(), "/articles/1");
//! assert_eq!(request.query_string(), "page=2");
//! assert_eq!(request.host(), "testserver");
//! ```

use std::collections::HashMap;

use http::Method;
use switchyard_http::RouteRequest;

/// A factory for building [`RouteRequest`] values.
pub struct RequestFactory {
    host: String,
    scheme: String,
    /// Default headers applied to every request.
    default_headers: HashMap<String, String>,
    /// Default attributes applied to every request.
    default_attributes: HashMap<String, String>,
}

impl Default for RequestFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestFactory {
    /// Creates a factory for `http://testserver`.
    pub fn new() -> Self {
        Self {
            host: "testserver".to_string(),
            scheme: "http".to_string(),
            default_headers: HashMap::new(),
            default_attributes: HashMap::new(),
        }
    }

    /// Sets the host (with an optional `:port`) of every request.
    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Builds `https` requests.
    #[must_use]
    pub fn secure(mut self) -> Self {
        self.scheme = "https".to_string();
        self
    }

    /// Adds a default header that will be included in all requests.
    #[must_use]
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Adds a request attribute, as consulted by custom constraint keys.
    #[must_use]
    pub fn with_default_attribute(mut self, key: &str, value: &str) -> Self {
        self.default_attributes
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Builds a GET request.
    pub fn get(&self, target: &str) -> RouteRequest {
        self.request(Method::GET, target)
    }

    /// Builds a POST request.
    pub fn post(&self, target: &str) -> RouteRequest {
        self.request(Method::POST, target)
    }

    /// Builds a PUT request.
    pub fn put(&self, target: &str) -> RouteRequest {
        self.request(Method::PUT, target)
    }

    /// Builds a PATCH request.
    pub fn patch(&self, target: &str) -> RouteRequest {
        self.request(Method::PATCH, target)
    }

    /// Builds a DELETE request.
    pub fn delete(&self, target: &str) -> RouteRequest {
        self.request(Method::DELETE, target)
    }

    /// Builds a HEAD request.
    pub fn head(&self, target: &str) -> RouteRequest {
        self.request(Method::HEAD, target)
    }

    /// Builds an OPTIONS request.
    pub fn options(&self, target: &str) -> RouteRequest {
        self.request(Method::OPTIONS, target)
    }

    /// Builds a request for a path (with optional query) or a full URL.
    ///
    /// A full URL's scheme, host, and port replace the factory defaults.
    pub fn request(&self, method: Method, target: &str) -> RouteRequest {
        let mut request = if target.contains("://") {
            RouteRequest::from_url(method, target)
        } else {
            let (path, query) = target.split_once('?').unwrap_or((target, ""));
            let mut builder = RouteRequest::builder()
                .method(method)
                .scheme(&self.scheme)
                .host(&self.host)
                .path(path)
                .query_string(query);
            for (name, value) in &self.default_headers {
                builder = builder.header(name, value);
            }
            builder.build()
        };

        request
            .attributes_mut()
            .extend(self.default_attributes.clone());
        request
    }
}

//! Request descriptor consumed by route recognition.
//!
//! [`RouteRequest`] carries only what the router looks at: the method, the raw
//! path, the query string, host, port, scheme, headers, the client address, and
//! an extensible bag of request-derived attributes consulted by constraints.

use std::collections::HashMap;

use http::{HeaderMap, Method};

/// A request as seen by the router.
///
/// # Examples
///
/// ```
/// use switchyard_http::RouteRequest;
///
/// let request = RouteRequest::builder()
///     .method(http::Method::GET)
///     .path("/projects/1")
///     .host("api.example.com")
///     .build();
///
/// assert_eq!(request.method(), &http::Method::GET);
/// assert_eq!(request.subdomain(1), "api");
/// assert_eq!(request.domain(1).as_deref(), Some("example.com"));
/// assert_eq!(request.port(), 80);
/// ```
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: Method,
    path: String,
    query_string: String,
    host: String,
    port: Option<u16>,
    scheme: String,
    headers: HeaderMap,
    remote_ip: Option<String>,
    attributes: HashMap<String, String>,
}

impl RouteRequest {
    /// Creates a new [`RouteRequestBuilder`].
    pub fn builder() -> RouteRequestBuilder {
        RouteRequestBuilder::default()
    }

    /// Creates a request from `http` request parts.
    ///
    /// The host and port come from the URI authority when present, otherwise
    /// from the `Host` header. The scheme comes from the URI, then from
    /// `X-Forwarded-Proto`, and defaults to `http`.
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        let uri = &parts.uri;
        let headers = parts.headers.clone();

        let (host, port) = match uri.authority() {
            Some(authority) => (authority.host().to_string(), authority.port_u16()),
            None => headers
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
                .map_or_else(|| ("localhost".to_string(), None), split_host_port),
        };

        let scheme = uri.scheme_str().map_or_else(
            || {
                if headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.eq_ignore_ascii_case("https"))
                {
                    "https".to_string()
                } else {
                    "http".to_string()
                }
            },
            str::to_ascii_lowercase,
        );

        let remote_ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());

        Self {
            method: parts.method.clone(),
            path: uri.path().to_string(),
            query_string: uri.query().unwrap_or("").to_string(),
            host,
            port,
            scheme,
            headers,
            remote_ip,
            attributes: HashMap::new(),
        }
    }

    /// Creates a request from a method and an absolute or path-only URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use switchyard_http::RouteRequest;
    ///
    /// let request = RouteRequest::from_url(http::Method::GET, "http://example.com:8080/integer?x=1");
    /// assert_eq!(request.host(), "example.com");
    /// assert_eq!(request.port(), 8080);
    /// assert_eq!(request.path(), "/integer");
    /// assert_eq!(request.query_string(), "x=1");
    /// ```
    pub fn from_url(method: Method, target: &str) -> Self {
        let builder = Self::builder().method(method);
        match url::Url::parse(target) {
            Ok(parsed) if parsed.has_host() => {
                let mut builder = builder
                    .scheme(parsed.scheme())
                    .host(parsed.host_str().unwrap_or("localhost"))
                    .path(parsed.path())
                    .query_string(parsed.query().unwrap_or(""));
                if let Some(port) = parsed.port() {
                    builder = builder.port(port);
                }
                builder.build()
            }
            _ => {
                let (path, query) = target.split_once('?').unwrap_or((target, ""));
                builder.path(path).query_string(query).build()
            }
        }
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw (still percent-encoded) request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string (without the leading `?`).
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// Returns the host name, without port.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, defaulting to 443 for `https` and 80 otherwise.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.standard_port())
    }

    /// Returns the port only if it differs from the scheme's standard port.
    pub fn optional_port(&self) -> Option<u16> {
        let port = self.port();
        (port != self.standard_port()).then_some(port)
    }

    /// Returns the standard port for the request scheme.
    pub fn standard_port(&self) -> u16 {
        if self.is_secure() {
            443
        } else {
            80
        }
    }

    /// Returns the URL scheme (`"http"` or `"https"`).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the protocol as used by constraints and URL generation, e.g. `http://`.
    pub fn protocol(&self) -> String {
        format!("{}://", self.scheme)
    }

    /// Returns `true` if the request uses HTTPS.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// Returns the host with a non-standard port appended.
    pub fn host_with_port(&self) -> String {
        match self.optional_port() {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }

    /// Returns the domain: the last `tld_length + 1` labels of the host.
    ///
    /// Returns `None` for IP addresses and for hosts with too few labels.
    pub fn domain(&self, tld_length: usize) -> Option<String> {
        if self.host_is_ip() {
            return None;
        }
        let labels: Vec<&str> = self.host.split('.').collect();
        if labels.len() <= tld_length {
            return None;
        }
        Some(labels[labels.len() - (tld_length + 1)..].join("."))
    }

    /// Returns the subdomain labels before the domain, joined with `.`.
    ///
    /// Empty when the host has no subdomain or is an IP address.
    pub fn subdomain(&self, tld_length: usize) -> String {
        if self.host_is_ip() {
            return String::new();
        }
        let labels: Vec<&str> = self.host.split('.').collect();
        let keep = tld_length + 1;
        if labels.len() <= keep {
            return String::new();
        }
        labels[..labels.len() - keep].join(".")
    }

    fn host_is_ip(&self) -> bool {
        self.host.parse::<std::net::IpAddr>().is_ok()
            || self
                .host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<std::net::Ipv6Addr>()
                .is_ok()
    }

    /// Returns the client address, if known.
    pub fn remote_ip(&self) -> Option<&str> {
        self.remote_ip.as_deref()
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a request attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns all request attributes.
    pub const fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Returns a mutable reference to the attribute bag.
    ///
    /// Predicate constraints may record state here for later handlers.
    pub fn attributes_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.attributes
    }

    /// Returns the full URL of this request.
    pub fn url(&self) -> String {
        let mut url = format!("{}{}{}", self.protocol(), self.host_with_port(), self.path);
        if !self.query_string.is_empty() {
            url.push('?');
            url.push_str(&self.query_string);
        }
        url
    }
}

fn split_host_port(value: &str) -> (String, Option<u16>) {
    if let Some(rest) = value.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (format!("[{host}]"), port);
        }
    }
    match value.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (value.to_string(), None),
        },
        None => (value.to_string(), None),
    }
}

/// Builder for [`RouteRequest`].
#[derive(Debug)]
pub struct RouteRequestBuilder {
    method: Method,
    path: String,
    query_string: String,
    host: String,
    port: Option<u16>,
    scheme: String,
    headers: HeaderMap,
    remote_ip: Option<String>,
    attributes: HashMap<String, String>,
}

impl Default for RouteRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            query_string: String::new(),
            host: "localhost".to_string(),
            port: None,
            scheme: "http".to_string(),
            headers: HeaderMap::new(),
            remote_ip: None,
            attributes: HashMap::new(),
        }
    }
}

impl RouteRequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Sets the query string (without leading `?`).
    #[must_use]
    pub fn query_string(mut self, qs: &str) -> Self {
        self.query_string = qs.to_string();
        self
    }

    /// Sets the host. A `host:port` value also sets the port.
    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        let (host, port) = split_host_port(host);
        self.host = host;
        if port.is_some() {
            self.port = port;
        }
        self
    }

    /// Sets an explicit port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the scheme (`http` or `https`). A trailing `://` is accepted.
    #[must_use]
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.trim_end_matches("://").to_ascii_lowercase();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn remote_ip(mut self, ip: &str) -> Self {
        self.remote_ip = Some(ip.to_string());
        self
    }

    /// Adds a request attribute.
    #[must_use]
    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Builds the [`RouteRequest`].
    pub fn build(self) -> RouteRequest {
        RouteRequest {
            method: self.method,
            path: self.path,
            query_string: self.query_string,
            host: self.host,
            port: self.port,
            scheme: self.scheme,
            headers: self.headers,
            remote_ip: self.remote_ip,
            attributes: self.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let request = RouteRequest::builder().build();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/");
        assert_eq!(request.host(), "localhost");
        assert_eq!(request.scheme(), "http");
        assert_eq!(request.port(), 80);
        assert!(request.optional_port().is_none());
        assert!(request.attributes().is_empty());
    }

    #[test]
    fn test_port_defaults_by_scheme() {
        let request = RouteRequest::builder().scheme("https").build();
        assert_eq!(request.port(), 443);
        assert!(request.is_secure());
        assert_eq!(request.protocol(), "https://");
    }

    #[test]
    fn test_host_with_port() {
        let request = RouteRequest::builder().host("example.com:8080").build();
        assert_eq!(request.host(), "example.com");
        assert_eq!(request.port(), 8080);
        assert_eq!(request.host_with_port(), "example.com:8080");

        let standard = RouteRequest::builder().host("example.com").port(80).build();
        assert_eq!(standard.host_with_port(), "example.com");
    }

    #[test]
    fn test_subdomain_and_domain() {
        let request = RouteRequest::builder().host("a.b.example.com").build();
        assert_eq!(request.subdomain(1), "a.b");
        assert_eq!(request.domain(1).as_deref(), Some("example.com"));

        let uk = RouteRequest::builder().host("www.example.co.uk").build();
        assert_eq!(uk.subdomain(2), "www");
        assert_eq!(uk.domain(2).as_deref(), Some("example.co.uk"));

        let bare = RouteRequest::builder().host("example.com").build();
        assert_eq!(bare.subdomain(1), "");
    }

    #[test]
    fn test_ip_host_has_no_domain() {
        let request = RouteRequest::builder().host("127.0.0.1").build();
        assert_eq!(request.subdomain(1), "");
        assert!(request.domain(1).is_none());
    }

    #[test]
    fn test_from_url_absolute() {
        let request = RouteRequest::from_url(Method::POST, "https://shop.example.com/cart?item=1");
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.scheme(), "https");
        assert_eq!(request.host(), "shop.example.com");
        assert_eq!(request.port(), 443);
        assert_eq!(request.path(), "/cart");
        assert_eq!(request.query_string(), "item=1");
    }

    #[test]
    fn test_from_url_path_only() {
        let request = RouteRequest::from_url(Method::GET, "/search?q=rust");
        assert_eq!(request.path(), "/search");
        assert_eq!(request.query_string(), "q=rust");
        assert_eq!(request.host(), "localhost");
    }

    #[test]
    fn test_from_parts_uses_host_header_and_forwarded_proto() {
        let (parts, ()) = http::Request::builder()
            .method(Method::GET)
            .uri("/integer")
            .header("host", "example.com:8080")
            .header("x-forwarded-proto", "https")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(())
            .unwrap()
            .into_parts();
        let request = RouteRequest::from_parts(&parts);
        assert_eq!(request.host(), "example.com");
        assert_eq!(request.port(), 8080);
        assert_eq!(request.scheme(), "https");
        assert_eq!(request.remote_ip(), Some("10.0.0.1"));
        assert_eq!(request.path(), "/integer");
    }

    #[test]
    fn test_attributes() {
        let mut request = RouteRequest::builder().attribute("user_agent", "iPhone").build();
        assert_eq!(request.attribute("user_agent"), Some("iPhone"));
        request
            .attributes_mut()
            .insert("flash".to_string(), "hi".to_string());
        assert_eq!(request.attribute("flash"), Some("hi"));
    }

    #[test]
    fn test_url() {
        let request = RouteRequest::builder()
            .host("example.com:3000")
            .path("/a")
            .query_string("b=1")
            .build();
        assert_eq!(request.url(), "http://example.com:3000/a?b=1");
    }
}

//! Path normalization and percent-escaping.
//!
//! Dynamic segment values are escaped as a single path segment (so `/`, `?`, `#`
//! and spaces are encoded), glob values are escaped as a path (slashes survive),
//! and fragments keep `/` and `?`.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside one path segment.
///
/// Everything outside `A-Z a-z 0-9 - . _ ~ ! $ & ' ( ) * + , ; = : @` is encoded.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Characters escaped in a multi-segment path.
const PATH: &AsciiSet = &SEGMENT.remove(b'/');

/// Characters escaped in a URL fragment.
const FRAGMENT: &AsciiSet = &PATH.remove(b'?');

/// Escapes a value for use as a single path segment.
///
/// # Examples
///
/// ```
/// use switchyard_http::routing::escape::escape_segment;
///
/// assert_eq!(escape_segment("a b/c?d"), "a%20b%2Fc%3Fd");
/// assert_eq!(escape_segment("café"), "caf%C3%A9");
/// ```
pub fn escape_segment(value: &str) -> Cow<'_, str> {
    utf8_percent_encode(value, SEGMENT).into()
}

/// Escapes a value for use as a path, leaving `/` untouched.
///
/// # Examples
///
/// ```
/// use switchyard_http::routing::escape::escape_path;
///
/// assert_eq!(escape_path("docs/read me.md"), "docs/read%20me.md");
/// ```
pub fn escape_path(value: &str) -> Cow<'_, str> {
    utf8_percent_encode(value, PATH).into()
}

/// Escapes a value for use as a URL fragment.
pub fn escape_fragment(value: &str) -> Cow<'_, str> {
    utf8_percent_encode(value, FRAGMENT).into()
}

/// Percent-decodes a value, failing when the decoded bytes are not UTF-8.
pub fn unescape(value: &str) -> Result<String, std::str::Utf8Error> {
    percent_decode_str(value).decode_utf8().map(Cow::into_owned)
}

/// Normalizes a request or route path.
///
/// Ensures a leading `/`, squeezes repeated slashes, drops a trailing `/` (or an
/// encoded trailing `%2F`) unless the path is the root, and upper-cases the hex
/// digits of percent escapes.
///
/// # Examples
///
/// ```
/// use switchyard_http::routing::escape::normalize_path;
///
/// assert_eq!(normalize_path("projects//1/"), "/projects/1");
/// assert_eq!(normalize_path(""), "/");
/// assert_eq!(normalize_path("/a%2fb"), "/a%2Fb");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut squeezed = String::with_capacity(path.len() + 1);
    squeezed.push('/');
    for c in path.chars() {
        if c == '/' && squeezed.ends_with('/') {
            continue;
        }
        squeezed.push(c);
    }

    let mut out = upcase_escapes(&squeezed);
    if out != "/" {
        if out.ends_with('/') {
            out.pop();
        } else if out.ends_with("%2F") {
            out.truncate(out.len() - 3);
        }
    }
    out
}

fn upcase_escapes(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push('%');
            out.push(char::from(bytes[i + 1].to_ascii_uppercase()));
            out.push(char::from(bytes[i + 2].to_ascii_uppercase()));
            i += 3;
        } else {
            let ch = path[i..].chars().next().unwrap_or_default();
            out.push(ch);
            i += ch.len_utf8().max(1);
        }
    }
    out
}

//! Path pattern compilation, matching, and generation.
//!
//! A pattern such as `/projects/:id(.:format)` is parsed into an arena of
//! [`Segment`] nodes. The same tree drives both directions:
//!
//! - **matching**: the tree is assembled into one anchored regex with a capture
//!   group per dynamic or glob segment, and optional groups become `(?:...)?`;
//! - **generation**: the tree is walked, emitting literals, escaping values, and
//!   dropping optional groups whose parameters were not supplied.
//!
//! # Grammar
//!
//! | Syntax | Meaning | Default match |
//! |--------|---------|---------------|
//! | `text` | literal | exact |
//! | `:name` | dynamic segment | `[^/.?]+` |
//! | `*name` | glob | `.+` (`.+?` when a `format` capture exists) |
//! | `( ... )` | optional group, may nest | |

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fmt::Write as _;

use regex::Regex;

use switchyard_core::PatternError;

use super::escape::{escape_path, escape_segment, unescape};

/// Index of a node in a pattern's arena.
pub type NodeId = usize;

/// Default regex for a dynamic segment.
pub const DEFAULT_DYNAMIC: &str = "[^/.?]+";
/// Default regex for a glob segment.
pub const DEFAULT_GLOB: &str = ".+";
/// Default regex for a glob segment followed by a format capture.
pub const DEFAULT_GLOB_LAZY: &str = ".+?";

/// Parameter names that would be ambiguous with URL generation options.
pub const RESERVED_NAMES: &[&str] = &[
    "only_path",
    "anchor",
    "params",
    "script_name",
    "trailing_slash",
    "host",
    "protocol",
    "port",
];

/// A capturing segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// The parameter name.
    pub name: String,
    /// The regex source used to match this segment (unanchored).
    pub regex: String,
    /// Whether the regex came from an explicit requirement.
    pub explicit: bool,
}

/// One node of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, separators included.
    Literal(String),
    /// `:name`, one segment, escaped on generation.
    Dynamic(Capture),
    /// `*name`, one or more characters including `/`, kept unescaped on generation.
    Glob(Capture),
    /// `( ... )`, an independently omittable sub-sequence.
    Optional(Vec<NodeId>),
}

/// Options controlling pattern compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    requirements: BTreeMap<String, String>,
    anchored: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileOptions {
    /// Creates anchored options with no requirements.
    pub const fn new() -> Self {
        Self {
            requirements: BTreeMap::new(),
            anchored: true,
        }
    }

    /// Sets the regex a named segment must match.
    #[must_use]
    pub fn requirement(mut self, name: impl Into<String>, regex: impl Into<String>) -> Self {
        self.requirements.insert(name.into(), regex.into());
        self
    }

    /// Matches a path prefix ending at a segment boundary instead of the whole path.
    #[must_use]
    pub const fn unanchored(mut self) -> Self {
        self.anchored = false;
        self
    }
}

/// One piece of the precomputed template used by optimized generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text.
    Text(String),
    /// A required parameter, by position in [`PathPattern::required_names`].
    Param {
        /// The parameter name.
        name: String,
        /// Whether the value is a glob (slashes kept).
        glob: bool,
    },
}

/// The output of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// The escaped path.
    pub path: String,
    /// The parameter names that were placed in the path.
    pub used: Vec<String>,
}

/// A compiled path pattern.
pub struct PathPattern {
    source: String,
    nodes: Vec<Segment>,
    root: Vec<NodeId>,
    regex: Regex,
    /// `(name, capture group index)` in left-to-right order.
    slots: Vec<(String, usize)>,
    requirements: HashMap<String, Regex>,
    anchored: bool,
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .field("anchored", &self.anchored)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PathPattern {
    /// Compiles a pattern string.
    ///
    /// # Examples
    ///
    /// ```
    /// use switchyard_http::routing::pattern::{CompileOptions, PathPattern};
    ///
    /// let pattern = PathPattern::compile("/projects/:id(.:format)", &CompileOptions::new()).unwrap();
    /// let (params, _) = pattern.match_path("/projects/1.xml").unwrap();
    /// assert_eq!(params["id"], "1");
    /// assert_eq!(params["format"], "xml");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] for unbalanced groups, missing names, more than
    /// one glob, a required capture after the glob, reserved names, requirements
    /// for absent segments, and invalid or anchored requirement regexes.
    pub fn compile(source: &str, options: &CompileOptions) -> Result<Self, PatternError> {
        let mut parser = Parser::new(source);
        let root = parser.parse_sequence(0)?;
        if parser.pos < source.len() {
            return Err(PatternError::UnbalancedGroup(source.to_string()));
        }
        let mut nodes = parser.nodes;

        validate_structure(source, &nodes, &root)?;

        let names = collect_names(&nodes, &root);
        for key in options.requirements.keys() {
            if !names.iter().any(|n| n == key) {
                return Err(PatternError::UnknownRequirement {
                    pattern: source.to_string(),
                    name: key.clone(),
                });
            }
        }

        let mut requirements = HashMap::new();
        for (name, src) in &options.requirements {
            check_requirement(name, src)?;
            let anchored = Regex::new(&format!("^(?:{src})$")).map_err(|e| {
                PatternError::InvalidRequirement {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            requirements.insert(name.clone(), anchored);
        }

        let lazy_glob = names.iter().any(|n| n == "format");
        for node in &mut nodes {
            if let Segment::Dynamic(capture) | Segment::Glob(capture) = node {
                if let Some(src) = options.requirements.get(&capture.name) {
                    capture.regex.clone_from(src);
                    capture.explicit = true;
                }
            }
            if let Segment::Glob(capture) = node {
                if !capture.explicit && lazy_glob {
                    capture.regex = DEFAULT_GLOB_LAZY.to_string();
                }
            }
        }

        let mut body = String::from("^");
        let mut slots = Vec::new();
        let mut group = 1;
        assemble(&nodes, &root, &mut body, &mut slots, &mut group)?;
        if options.anchored {
            body.push('$');
        }
        let regex = Regex::new(&body).map_err(|e| PatternError::InvalidRequirement {
            name: String::new(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: source.to_string(),
            nodes,
            root,
            regex,
            slots,
            requirements,
            anchored: options.anchored,
        })
    }

    /// Parses a pattern and returns its parameter names without compiling it.
    ///
    /// # Errors
    ///
    /// Returns the same structural errors as [`compile`](Self::compile).
    pub fn parse_names(source: &str) -> Result<Vec<String>, PatternError> {
        let mut parser = Parser::new(source);
        let root = parser.parse_sequence(0)?;
        validate_structure(source, &parser.nodes, &root)?;
        Ok(collect_names(&parser.nodes, &root))
    }

    /// Returns the pattern source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the compiled matching regex.
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Returns `true` if the pattern must match the whole path.
    pub const fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Returns the node arena.
    pub fn nodes(&self) -> &[Segment] {
        &self.nodes
    }

    /// Returns the top-level node sequence.
    pub fn root(&self) -> &[NodeId] {
        &self.root
    }

    /// Returns every parameter name, in order, without duplicates.
    pub fn names(&self) -> Vec<String> {
        collect_names(&self.nodes, &self.root)
    }

    /// Returns the parameter names outside optional groups, in order, including repeats.
    pub fn required_names(&self) -> Vec<String> {
        self.root
            .iter()
            .filter_map(|&id| match &self.nodes[id] {
                Segment::Dynamic(c) | Segment::Glob(c) => Some(c.name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the parameter names that only appear inside optional groups.
    pub fn optional_names(&self) -> Vec<String> {
        let required = self.required_names();
        self.names()
            .into_iter()
            .filter(|n| !required.contains(n))
            .collect()
    }

    /// Returns `true` if an optional group captures a name the required part
    /// also captures, as in `/:id(/x/:id)`.
    pub fn optional_groups_repeat_required_names(&self) -> bool {
        let required = self.required_names();
        let mut repeats = false;
        walk_captures(&self.nodes, &self.root, false, &mut |capture, _, optional| {
            repeats |= optional && required.contains(&capture.name);
        });
        repeats
    }

    /// Returns `true` if the pattern contains a glob segment.
    pub fn has_glob(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, Segment::Glob(_)))
    }

    /// Returns the anchored requirement regex for a parameter, if one was given.
    pub fn requirement(&self, name: &str) -> Option<&Regex> {
        self.requirements.get(name)
    }

    /// Attempts to match the given (normalized, still percent-encoded) path.
    ///
    /// Returns `Some((params, remaining_path))` on success. Captured values are
    /// percent-decoded. A parameter captured more than once must capture the
    /// same value every time, otherwise the path does not match. For anchored
    /// patterns `remaining_path` is always empty; unanchored patterns only match
    /// when the remainder is empty or starts at a `/`.
    pub fn match_path(&self, path: &str) -> Option<(HashMap<String, String>, String)> {
        let captures = self.regex.captures(path)?;
        let full_match = captures.get(0)?;

        let remaining = &path[full_match.end()..];
        if !self.anchored && !remaining.is_empty() && !remaining.starts_with('/') {
            return None;
        }

        let mut params = HashMap::new();
        for (name, index) in &self.slots {
            let Some(m) = captures.get(*index) else {
                continue;
            };
            let value = unescape(m.as_str()).ok()?;
            match params.get(name) {
                Some(existing) if *existing != value => return None,
                Some(_) => {}
                None => {
                    params.insert(name.clone(), value);
                }
            }
        }

        Some((params, remaining.to_string()))
    }

    /// Attempts a full match of the path (no remaining portion allowed).
    pub fn full_match(&self, path: &str) -> Option<HashMap<String, String>> {
        let (params, remaining) = self.match_path(path)?;
        remaining.is_empty().then_some(params)
    }

    /// Fills the pattern with values.
    ///
    /// Required captures take their value from `values`. A capture directly
    /// inside an optional group is emitted only when `include(name)` is true and
    /// a value exists; if any of a group's direct captures is not emitted, the
    /// group and everything nested in it is dropped.
    ///
    /// # Errors
    ///
    /// Returns the sorted, de-duplicated list of required names without a value.
    pub fn generate<F>(
        &self,
        values: &HashMap<String, String>,
        include: F,
    ) -> Result<Generated, Vec<String>>
    where
        F: Fn(&str) -> bool,
    {
        let mut out = String::new();
        let mut used = Vec::new();
        let mut missing = Vec::new();
        self.emit(&self.root, values, &include, &mut out, &mut used, &mut missing);

        if missing.is_empty() {
            Ok(Generated { path: out, used })
        } else {
            missing.sort();
            missing.dedup();
            Err(missing)
        }
    }

    fn emit<F>(
        &self,
        ids: &[NodeId],
        values: &HashMap<String, String>,
        include: &F,
        out: &mut String,
        used: &mut Vec<String>,
        missing: &mut Vec<String>,
    ) where
        F: Fn(&str) -> bool,
    {
        for &id in ids {
            match &self.nodes[id] {
                Segment::Literal(text) => out.push_str(text),
                Segment::Dynamic(c) | Segment::Glob(c) => match values.get(&c.name) {
                    Some(value) => {
                        if matches!(self.nodes[id], Segment::Glob(_)) {
                            out.push_str(&escape_path(value));
                        } else {
                            out.push_str(&escape_segment(value));
                        }
                        if !used.contains(&c.name) {
                            used.push(c.name.clone());
                        }
                    }
                    None => missing.push(c.name.clone()),
                },
                Segment::Optional(children) => {
                    if self.includable(children, values, include) {
                        self.emit(children, values, include, out, used, missing);
                    }
                }
            }
        }
    }

    fn includable<F>(&self, children: &[NodeId], values: &HashMap<String, String>, include: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        let mut direct = 0;
        let mut nested = Vec::new();
        for &id in children {
            match &self.nodes[id] {
                Segment::Dynamic(c) | Segment::Glob(c) => {
                    if !include(&c.name) || !values.contains_key(&c.name) {
                        return false;
                    }
                    direct += 1;
                }
                Segment::Optional(grandchildren) => nested.push(grandchildren),
                Segment::Literal(_) => {}
            }
        }

        if direct > 0 || nested.is_empty() {
            return true;
        }
        nested
            .into_iter()
            .any(|grandchildren| self.includable(grandchildren, values, include))
    }

    /// Returns `true` if every optional group has a capture of its own.
    ///
    /// Such groups are all omitted when none of their params is supplied, which
    /// is what [`required_template`](Self::required_template) assumes.
    pub fn optional_groups_are_parameterized(&self) -> bool {
        self.nodes.iter().all(|node| match node {
            Segment::Optional(children) => children.iter().any(|&id| {
                matches!(self.nodes[id], Segment::Dynamic(_) | Segment::Glob(_))
            }),
            _ => true,
        })
    }

    /// Returns the template of the pattern with every optional group removed.
    ///
    /// Used by optimized generation, which only ever fills required parameters.
    pub fn required_template(&self) -> Vec<TemplatePart> {
        let mut parts: Vec<TemplatePart> = Vec::new();
        for &id in &self.root {
            match &self.nodes[id] {
                Segment::Literal(text) => {
                    if let Some(TemplatePart::Text(prev)) = parts.last_mut() {
                        prev.push_str(text);
                    } else {
                        parts.push(TemplatePart::Text(text.clone()));
                    }
                }
                Segment::Dynamic(c) => parts.push(TemplatePart::Param {
                    name: c.name.clone(),
                    glob: false,
                }),
                Segment::Glob(c) => parts.push(TemplatePart::Param {
                    name: c.name.clone(),
                    glob: true,
                }),
                Segment::Optional(_) => {}
            }
        }
        parts
    }
}

/// Normalizes a declared route path.
///
/// Applies [`normalize_path`](super::escape::normalize_path), then moves slashes
/// that precede optional groups inside them (`/(` becomes `(/`), so an omitted
/// group also omits its separator. A path made only of optional groups keeps a
/// leading `/` so it still generates the root.
///
/// # Examples
///
/// ```
/// use switchyard_http::routing::pattern::normalize_declared_path;
///
/// assert_eq!(normalize_declared_path("posts/(:page)"), "/posts(/:page)");
/// assert_eq!(normalize_declared_path("(:locale)"), "/(:locale)");
/// assert_eq!(normalize_declared_path("/(/:locale)(/:platform)"), "/(:locale)(/:platform)");
/// ```
pub fn normalize_declared_path(path: &str) -> String {
    let normalized = super::escape::normalize_path(path);

    // "/(" and "/((" become "(/" and "((/", swallowing a slash that follows.
    let mut out = String::with_capacity(normalized.len());
    let chars: Vec<char> = normalized.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'(') {
            let mut j = i + 1;
            while chars.get(j) == Some(&'(') {
                out.push('(');
                j += 1;
            }
            out.push('/');
            if chars.get(j) == Some(&'/') {
                j += 1;
            }
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    if out.starts_with('(') && all_optional_captures(&out) {
        let groups = out.chars().take_while(|c| *c == '(').count();
        if out[groups..].starts_with('/') {
            let mut fixed = String::from("/");
            fixed.push_str(&out[..groups]);
            fixed.push_str(&out[groups + 1..]);
            return fixed;
        }
    }
    if out.is_empty() {
        return "/".to_string();
    }
    out
}

/// Returns `true` if the path is a run of optional groups whose first group is
/// just a capture and whose later groups each start with `/:`.
fn all_optional_captures(path: &str) -> bool {
    let mut rest = path;
    let mut first = true;
    while !rest.is_empty() {
        let opens = rest.chars().take_while(|c| *c == '(').count();
        if opens == 0 {
            return false;
        }
        let after = &rest[opens..];
        let Some(close) = after.find(')') else {
            return false;
        };
        let inner = &after[..close];
        let ok = if first {
            !inner.is_empty()
        } else {
            inner.starts_with("/:")
        };
        if !ok {
            return false;
        }
        first = false;
        rest = after[close..].trim_start_matches(')');
    }
    true
}

// ============================================================
// Parsing
// ============================================================

struct Parser<'a> {
    source: &'a str,
    pos: usize,
    nodes: Vec<Segment>,
}

impl<'a> Parser<'a> {
    const fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            nodes: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn push(&mut self, segment: Segment) -> NodeId {
        self.nodes.push(segment);
        self.nodes.len() - 1
    }

    fn parse_sequence(&mut self, depth: usize) -> Result<Vec<NodeId>, PatternError> {
        let mut ids = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.peek() {
            match c {
                '(' | ')' | ':' | '*' => {
                    if !literal.is_empty() {
                        ids.push(self.push(Segment::Literal(std::mem::take(&mut literal))));
                    }
                }
                _ => {}
            }

            match c {
                '(' => {
                    self.pos += 1;
                    let children = self.parse_sequence(depth + 1)?;
                    if self.peek() != Some(')') {
                        return Err(PatternError::UnbalancedGroup(self.source.to_string()));
                    }
                    self.pos += 1;
                    ids.push(self.push(Segment::Optional(children)));
                }
                ')' => {
                    if depth == 0 {
                        return Err(PatternError::UnbalancedGroup(self.source.to_string()));
                    }
                    return Ok(ids);
                }
                ':' | '*' => {
                    self.pos += 1;
                    let name = self.parse_name();
                    if name.is_empty() {
                        return Err(PatternError::EmptyParameterName {
                            pattern: self.source.to_string(),
                            marker: c,
                        });
                    }
                    let segment = if c == ':' {
                        Segment::Dynamic(Capture {
                            name,
                            regex: DEFAULT_DYNAMIC.to_string(),
                            explicit: false,
                        })
                    } else {
                        Segment::Glob(Capture {
                            name,
                            regex: DEFAULT_GLOB.to_string(),
                            explicit: false,
                        })
                    };
                    ids.push(self.push(segment));
                }
                _ => {
                    literal.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }

        if !literal.is_empty() {
            ids.push(self.push(Segment::Literal(literal)));
        }
        Ok(ids)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }
}

// ============================================================
// Validation and assembly
// ============================================================

fn collect_names(nodes: &[Segment], ids: &[NodeId]) -> Vec<String> {
    let mut names = Vec::new();
    walk_captures(nodes, ids, false, &mut |capture, _, _| {
        if !names.contains(&capture.name) {
            names.push(capture.name.clone());
        }
    });
    names
}

/// Visits every capture in order with `(capture, is_glob, inside_optional)`.
fn walk_captures<F>(nodes: &[Segment], ids: &[NodeId], optional: bool, f: &mut F)
where
    F: FnMut(&Capture, bool, bool),
{
    for &id in ids {
        match &nodes[id] {
            Segment::Dynamic(c) => f(c, false, optional),
            Segment::Glob(c) => f(c, true, optional),
            Segment::Optional(children) => walk_captures(nodes, children, true, f),
            Segment::Literal(_) => {}
        }
    }
}

fn validate_structure(source: &str, nodes: &[Segment], root: &[NodeId]) -> Result<(), PatternError> {
    let mut globs = 0;
    let mut after_glob: Option<String> = None;
    let mut reserved: Option<String> = None;

    walk_captures(nodes, root, false, &mut |capture, is_glob, optional| {
        if RESERVED_NAMES.contains(&capture.name.as_str()) && reserved.is_none() {
            reserved = Some(capture.name.clone());
        }
        if globs > 0 && !optional && after_glob.is_none() {
            after_glob = Some(capture.name.clone());
        }
        if is_glob {
            globs += 1;
        }
    });

    if let Some(name) = reserved {
        return Err(PatternError::ReservedName {
            pattern: source.to_string(),
            name,
        });
    }
    if globs > 1 {
        return Err(PatternError::MultipleGlobs(source.to_string()));
    }
    if let Some(name) = after_glob {
        return Err(PatternError::CaptureAfterGlob {
            pattern: source.to_string(),
            name,
        });
    }
    Ok(())
}

/// Rejects requirement regexes that carry their own anchors.
fn check_requirement(name: &str, src: &str) -> Result<(), PatternError> {
    let anchored_start = src.starts_with('^') || src.starts_with("\\A");
    let anchored_end = (src.ends_with('$') && !src.ends_with("\\$"))
        || src.ends_with("\\z")
        || src.ends_with("\\Z");
    if anchored_start || anchored_end {
        return Err(PatternError::InvalidRequirement {
            name: name.to_string(),
            reason: "regexp anchor characters are not allowed in routing requirements"
                .to_string(),
        });
    }
    Ok(())
}

fn assemble(
    nodes: &[Segment],
    ids: &[NodeId],
    out: &mut String,
    slots: &mut Vec<(String, usize)>,
    group: &mut usize,
) -> Result<(), PatternError> {
    for &id in ids {
        match &nodes[id] {
            Segment::Literal(text) => out.push_str(&regex::escape(text)),
            Segment::Dynamic(c) | Segment::Glob(c) => {
                let inner = Regex::new(&c.regex).map_err(|e| PatternError::InvalidRequirement {
                    name: c.name.clone(),
                    reason: e.to_string(),
                })?;
                write!(out, "({})", c.regex).ok();
                slots.push((c.name.clone(), *group));
                *group += inner.captures_len();
            }
            Segment::Optional(children) => {
                out.push_str("(?:");
                assemble(nodes, children, out, slots, group)?;
                out.push_str(")?");
            }
        }
    }
    Ok(())
}

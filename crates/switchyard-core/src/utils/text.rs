//! String utility functions.
//!
//! Helpers for validating identifier-like names and for suggesting the closest
//! known name when a lookup misses.

/// Returns `true` if `s` is a valid identifier: a leading ASCII letter or
/// underscore followed by ASCII letters, digits, or underscores.
///
/// # Examples
///
/// ```
/// use switchyard_core::utils::text::is_identifier;
///
/// assert!(is_identifier("project"));
/// assert!(is_identifier("_admin_posts"));
/// assert!(!is_identifier("1st"));
/// assert!(!is_identifier("new project"));
/// assert!(!is_identifier(""));
/// ```
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Computes the Levenshtein edit distance between two strings.
///
/// # Examples
///
/// ```
/// use switchyard_core::utils::text::edit_distance;
///
/// assert_eq!(edit_distance("kitten", "sitting"), 3);
/// assert_eq!(edit_distance("", "abc"), 3);
/// ```
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggests the candidate closest to `target`.
///
/// A candidate qualifies when its edit distance is at most a third of the
/// target's length (rounded up), or when one name is a prefix of the other.
/// Among qualifying candidates the smallest distance wins; ties keep the
/// earliest candidate.
///
/// # Examples
///
/// ```
/// use switchyard_core::utils::text::suggest;
///
/// let names = ["projects", "project", "new_project"];
/// assert_eq!(suggest("projcet", names.iter().copied()), Some("project".to_string()));
/// assert_eq!(suggest("zzz", names.iter().copied()), None);
/// ```
pub fn suggest<'a>(target: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    if target.is_empty() {
        return None;
    }
    let threshold = target.chars().count().div_ceil(3);

    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let distance = edit_distance(target, candidate);
        let prefix_related = candidate.starts_with(target) || target.starts_with(candidate);
        if distance > threshold && !prefix_related {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, name)| name.to_string())
}

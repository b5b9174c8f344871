//! Substring and tag matching over learnings.

use super::models::Learning;

/// Returns true when `learning` matches `query`, optionally restricted to
/// learnings carrying one of `tags`.
///
/// The query matches case-insensitively as a substring of either the text
/// or any tag, so `"auth"` finds a learning tagged `authentication` and
/// `"jwt"` finds one tagged `jwt-validation`. When `tags` is given, the
/// learning's tags must also intersect it (case-insensitive).
pub fn matches(learning: &Learning, query: &str, tags: Option<&[String]>) -> bool {
    let query = query.to_lowercase();

    let query_hit = learning.text.to_lowercase().contains(&query)
        || learning
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&query));

    if !query_hit {
        return false;
    }

    match tags {
        Some(wanted) if !wanted.is_empty() => learning
            .tags
            .iter()
            .any(|tag| wanted.iter().any(|w| w.eq_ignore_ascii_case(tag))),
        _ => true,
    }
}

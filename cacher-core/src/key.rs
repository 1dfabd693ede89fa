//! Key addressing.
//!
//! A logical key lives in a namespace formed by an optional group. The
//! backend only ever sees the addressed key; callers only ever see the
//! logical one.

/// Build the backend key for `key` within `group`.
///
/// ```
/// use cacher_core::addressed_key;
///
/// assert_eq!(addressed_key(Some("apple:"), "42"), "apple:42");
/// assert_eq!(addressed_key(None, "42"), "42");
/// ```
pub fn addressed_key(group: Option<&str>, key: &str) -> String {
    match group {
        Some(group) => format!("{}{}", group, key),
        None => key.to_string(),
    }
}

/// Address every key in `keys`, keeping the logical key alongside.
///
/// Returns `(logical, addressed)` pairs in input order.
pub fn addressed_keys<S: AsRef<str>>(group: Option<&str>, keys: &[S]) -> Vec<(String, String)> {
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            (key.to_string(), addressed_key(group, key))
        })
        .collect()
}

/// Normalize a configured group: an empty prefix is the same as no group.
pub fn normalize_group(group: Option<&str>) -> Option<&str> {
    group.filter(|g| !g.is_empty())
}

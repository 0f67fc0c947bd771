//! Slash-separated node paths.
//!
//! Paths are stored normalized: no leading or trailing `/`, and the root
//! group is the empty string.

/// Strip leading/trailing separators and collapse empty segments.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` is written relative to the root (`/grp/dim`).
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Parent group of a normalized path. The root has no parent.
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(head, _)| head))
}

/// Last segment of a normalized path.
pub fn leaf(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, tail)| tail)
}

/// Join a group path and a child name.
pub fn join(group: &str, name: &str) -> String {
    if group.is_empty() {
        name.to_string()
    } else {
        format!("{group}/{name}")
    }
}

/// Every proper ancestor of `path`, outermost first, root excluded.
///
/// `ancestors("a/b/c")` yields `["a", "a/b"]`.
pub fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/').map(|(i, _)| &path[..i]).collect()
}

/// Split a path-qualified attribute key into (owner path, attribute name).
///
/// The split happens at the last `/`; a key without one belongs to the root.
pub fn split_attr_key(key: &str) -> (String, &str) {
    match key.rsplit_once('/') {
        Some((owner, name)) => (normalize(owner), name),
        None => (String::new(), key),
    }
}

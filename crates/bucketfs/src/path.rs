//! Namespace path helpers.
//!
//! Namespace paths are cleaned absolute strings: they start with `/`,
//! contain no empty, `.` or `..` segments, and never end with `/` except
//! for the root itself. Object keys are the same strings without the
//! leading `/`.

/// The namespace root.
pub const ROOT: &str = "/";

/// Clean `path` into namespace form.
///
/// Relative paths are taken relative to the root and `..` never climbs
/// above it.
pub fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent of a cleaned path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => Some(ROOT),
    }
}

/// Last segment of a cleaned path; `/` for the root.
pub fn base_name(path: &str) -> &str {
    if path == ROOT {
        return ROOT;
    }
    path.rsplit('/').next().unwrap_or(path)
}

/// Object key for a namespace path.
pub fn object_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Returns true if `path` is `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Ancestors of a cleaned path, nearest first, ending with the root.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent(path), |p| parent(*p))
}

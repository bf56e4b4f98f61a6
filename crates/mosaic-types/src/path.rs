//! Virtual path helpers.
//!
//! Every path that crosses a component boundary is in *clean* form: a single
//! leading `/`, no trailing slash, no empty, `.` or `..` segments. Root is
//! `/`. Scope matching is boundary aware: `/a` covers `/a` and `/a/b`,
//! never `/ab`.

use thiserror::Error;

/// Path error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Request path tried to climb out of its base with `..`.
    #[error("relative path not allowed: {0}")]
    RelativePath(String),
}

/// Normalize a path into clean form.
///
/// Backslashes are treated as separators and `..` never climbs above root.
pub fn clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
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
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Boundary-aware prefix check on already clean paths.
fn covers(parent: &str, child: &str) -> bool {
    if parent == "/" || parent == child {
        return true;
    }
    child
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// True if `child` equals `parent` or lies beneath it.
pub fn is_sub_path(parent: &str, child: &str) -> bool {
    covers(&clean_path(parent), &clean_path(child))
}

/// True if `child` lies strictly beneath `parent`.
pub fn is_strict_sub_path(parent: &str, child: &str) -> bool {
    let parent = clean_path(parent);
    let child = clean_path(child);
    parent != child && covers(&parent, &child)
}

/// Compare two paths after cleaning.
pub fn path_equal(a: &str, b: &str) -> bool {
    clean_path(a) == clean_path(b)
}

/// Split `whole` relative to its strict ancestor `base` into the first
/// segment below `base` and whatever remains after it.
///
/// `split_selector("/gh/x/v1/a.zip", "/gh/x")` is `("v1", "a.zip")`.
pub fn split_selector(whole: &str, base: &str) -> Option<(String, String)> {
    let whole = clean_path(whole);
    let base = clean_path(base);
    if whole == base || !covers(&base, &whole) {
        return None;
    }
    let rest = if base == "/" {
        &whole[1..]
    } else {
        &whole[base.len() + 1..]
    };
    let (segment, remainder) = rest.split_once('/').unwrap_or((rest, ""));
    Some((segment.to_string(), remainder.to_string()))
}

/// The first segment of `whole` below its strict ancestor `base`.
pub fn next_segment(whole: &str, base: &str) -> Option<String> {
    split_selector(whole, base).map(|(segment, _)| segment)
}

/// Parent directory of a path; root is its own parent.
pub fn parent_path(path: &str) -> String {
    let path = clean_path(path);
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

/// Last segment of a path; root yields `/`.
pub fn base_name(path: &str) -> String {
    let path = clean_path(path);
    if path == "/" {
        return path;
    }
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Join a child name onto a directory.
pub fn join_path(dir: &str, name: &str) -> String {
    clean_path(&format!("{dir}/{name}"))
}

/// Join a user-supplied request path onto a base path.
///
/// Any `..` segment in the request is refused outright rather than
/// resolved, so a request can never address something outside `base`.
pub fn join_base(base: &str, request: &str) -> Result<String, PathError> {
    if request.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathError::RelativePath(request.to_string()));
    }
    Ok(clean_path(&format!("{}/{}", clean_path(base), request)))
}

/// Rewrite `path` when it equals or lies beneath `old`.
///
/// Exact matches become `new`; descendants keep their tail spliced onto
/// `new`. Unrelated paths yield `None`.
pub fn rewrite_prefix(path: &str, old: &str, new: &str) -> Option<String> {
    let path = clean_path(path);
    let old = clean_path(old);
    let new = clean_path(new);
    if path == old {
        return Some(new);
    }
    if old == "/" {
        return Some(clean_path(&format!("{new}{path}")));
    }
    let tail = path.strip_prefix(old.as_str())?;
    if !tail.starts_with('/') {
        return None;
    }
    Some(clean_path(&format!("{new}{tail}")))
}

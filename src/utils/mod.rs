//! Path helpers for the slash-separated node namespace.

use crate::Error;
use crate::Result;

/// Strip the last path segment, yielding the parent path.
///
/// Returns `None` for the root path and for top-level nodes whose parent is
/// the root itself (the root always exists and is never created).
pub fn parent_path(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    if idx == 0 {
        return None;
    }
    Some(&path[..idx])
}

/// Reject paths the coordination service would refuse: empty, relative, or
/// carrying a trailing slash.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(Error::Protocol(format!("invalid path: {path:?}")));
    }
    if path.len() > 1 && path.ends_with('/') {
        return Err(Error::Protocol(format!("path must not end with '/': {path:?}")));
    }
    Ok(())
}

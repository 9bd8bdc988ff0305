//! Path Sanitizer
//!
//! Path cleaning and glob-allow-list containment used by the permission
//! policy's path rule (§4.2 step 2) and by tools that take file paths.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** T-PathSafety: a path's permission outcome depends only
//!   on its lexically cleaned form, never on a live filesystem lookup.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathSanitizerError {
    #[error("path too long: {0}")]
    PathTooLong(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Lexically clean a path: resolve `.`/`..` components without touching the
/// filesystem. A `..` that would climb above the path's own root is kept
/// (not silently dropped) so the result still starts with `..` — that is
/// the signal the caller uses to recognise an escape attempt, matching
/// T-PathSafety's requirement that `allow("./src/**")` vs.
/// `"./src/../../../etc/passwd"` yields `Deny`.
pub fn clean_path(path: &str) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(Component::ParentDir),
            },
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

/// Strip a pattern's trailing `/**` or `**` glob suffix, returning the
/// literal base directory it stands for.
fn glob_base(pattern: &str) -> Option<PathBuf> {
    let trimmed = pattern.strip_prefix("./").unwrap_or(pattern);
    let base = trimmed.strip_suffix("/**").or_else(|| trimmed.strip_suffix("**"))?;
    let base = base.strip_suffix('/').unwrap_or(base);
    Some(clean_path(base))
}

/// Does `base` contain `candidate` as itself or a descendant? Plain
/// `starts_with` is insufficient: it would let an allow-listed `src` match
/// the sibling directory `srcfoo`. The fix is a boundary check — the byte
/// immediately after the matched prefix must be a path separator or the
/// end of the string.
fn contains(base: &Path, candidate: &Path) -> bool {
    if candidate == base {
        return true;
    }
    let base_str = base.to_string_lossy();
    let candidate_str = candidate.to_string_lossy();
    if !candidate_str.starts_with(base_str.as_ref()) {
        return false;
    }
    if base_str.is_empty() {
        return true;
    }
    match candidate_str.as_bytes().get(base_str.len()) {
        None => true,
        Some(&b) => b == b'/' || b == b'\\',
    }
}

/// Is `candidate` contained in at least one entry of `allowed`, after
/// lexically cleaning both the candidate and each glob/literal entry?
/// Used by `PermissionPolicy` (§4.2 step 2).
pub fn path_allowed(candidate: &str, allowed: &[String]) -> bool {
    let cleaned = clean_path(candidate);
    if cleaned.components().next() == Some(Component::ParentDir) {
        // Escaped above its own root — never allowed, regardless of list.
        return false;
    }
    allowed.iter().any(|pattern| match glob_base(pattern) {
        Some(base) => contains(&base, &cleaned),
        None => {
            // No trailing glob suffix: treat the whole pattern as a glob
            // over path components (supports mid-path `*`), falling back
            // to exact-or-descendant containment when the pattern has no
            // wildcard at all.
            let pattern_clean = clean_path(pattern.strip_prefix("./").unwrap_or(pattern));
            if pattern.contains('*') {
                glob::Pattern::new(pattern)
                    .map(|p| p.matches_path(&cleaned))
                    .unwrap_or(false)
            } else {
                contains(&pattern_clean, &cleaned)
            }
        }
    })
}

/// Lightweight, allocation-cheap traversal check used before a full clean
/// (e.g. to reject a `..`-bearing argument with a clear message instead of
/// silently normalising it away).
pub fn validate(path: &str, max_len: usize) -> Result<(), PathSanitizerError> {
    if path.len() > max_len {
        return Err(PathSanitizerError::PathTooLong(path.to_string()));
    }
    if path.contains('\0') {
        return Err(PathSanitizerError::InvalidPath("path contains null byte".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_resolves_parent_dir_against_prior_component() {
        assert_eq!(clean_path("./src/../lib/x.rs"), PathBuf::from("lib/x.rs"));
    }

    #[test]
    fn clean_path_preserves_escape_above_root() {
        let cleaned = clean_path("./src/../../../etc/passwd");
        assert_eq!(cleaned.components().next(), Some(Component::ParentDir));
    }

    #[test]
    fn path_safety_escape_beats_allow_list() {
        assert!(!path_allowed("./src/../../../etc/passwd", &["./src/**".to_string()]));
    }

    #[test]
    fn path_safety_prefix_does_not_match_sibling_directory() {
        assert!(!path_allowed("srcfoo/bar.go", &["src".to_string()]));
    }

    #[test]
    fn path_safety_glob_matches_descendant() {
        assert!(path_allowed("./src/domain/tool.rs", &["./src/**".to_string()]));
    }

    #[test]
    fn path_safety_exact_base_is_contained() {
        assert!(path_allowed("src", &["src".to_string()]));
    }

    #[test]
    fn validate_rejects_null_bytes() {
        assert!(validate("a\0b", 4096).is_err());
    }

    #[test]
    fn validate_rejects_too_long() {
        assert!(validate("abcdef", 3).is_err());
    }
}

//! Ref naming and branch-name validation.
//!
//! Two reserved names exist in the refs namespace: `HEAD`, whose value is the
//! full ref name of the checked-out branch, and `branch/<name>` entries whose
//! values are commit hashes. A detached HEAD is not supported.

use crate::error::{StoreError, StoreResult};

/// The ref holding the current branch pointer.
pub const HEAD_REF: &str = "HEAD";

/// Namespace prefix for branch refs.
pub const BRANCH_PREFIX: &str = "branch/";

/// Full ref name for a branch (e.g. `branch/main`).
pub fn branch_ref(name: &str) -> String {
    format!("{BRANCH_PREFIX}{name}")
}

/// Extract the branch name from a full branch ref, or `None` if the value is
/// not under the branch namespace.
pub fn branch_name(ref_name: &str) -> Option<&str> {
    ref_name.strip_prefix(BRANCH_PREFIX)
}

/// Characters that are forbidden anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Validate a branch name, returning `Ok(())` if valid.
///
/// Follows git-style naming conventions to prevent ambiguity in the refs
/// namespace.
///
/// # Examples
///
/// ```
/// use quilt_store::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/auth").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| {
        Err(StoreError::InvalidBranchName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return invalid("branch name must not be empty");
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(StoreError::InvalidBranchName {
            name: name.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }
    if name.contains("..") {
        return invalid("must not contain '..'");
    }
    if name.starts_with('.') || name.ends_with('.') {
        return invalid("must not start or end with '.'");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return invalid("must not start or end with '/'");
    }
    if name.ends_with(".lock") {
        return invalid("must not end with '.lock'");
    }
    if name.contains("//") {
        return invalid("must not contain consecutive slashes '//'");
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return invalid("path components must not start with '.'");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_ref_naming() {
        assert_eq!(branch_ref("main"), "branch/main");
        assert_eq!(branch_name("branch/main"), Some("main"));
        assert_eq!(branch_name("HEAD"), None);
    }

    #[test]
    fn valid_simple_names() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("develop").is_ok());
        assert!(validate_branch_name("my-branch").is_ok());
        assert!(validate_branch_name("v1.0").is_ok());
        assert!(validate_branch_name("feature/auth").is_ok());
    }

    #[test]
    fn reject_empty_name() {
        assert!(validate_branch_name("").is_err());
    }

    #[test]
    fn reject_double_dot() {
        assert!(validate_branch_name("bad..name").is_err());
    }

    #[test]
    fn reject_whitespace() {
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("has\ttab").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for name in ["a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b"] {
            assert!(validate_branch_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn reject_boundary_dots_and_slashes() {
        assert!(validate_branch_name(".hidden").is_err());
        assert!(validate_branch_name("trailing.").is_err());
        assert!(validate_branch_name("/leading").is_err());
        assert!(validate_branch_name("trailing/").is_err());
        assert!(validate_branch_name("a//b").is_err());
        assert!(validate_branch_name("feature/.hidden").is_err());
    }

    #[test]
    fn reject_lock_suffix() {
        assert!(validate_branch_name("main.lock").is_err());
    }
}

//! Path sandbox validation.
//!
//! [`validate`] turns a caller-influenced relative path into an absolute path
//! that is guaranteed to sit under `base`, or fails with `InvalidPath`. It
//! runs on every access and is never cached: a directory can be swapped for a
//! symlink between two calls.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{KnowledgeError, Result};

/// Longest relative path accepted, in bytes.
pub const MAX_PATH_LEN: usize = 1024;

/// Validate `relative` against `base` and return the contained absolute path.
///
/// Textual checks always run. Symlinks are resolved for every component that
/// exists on disk, ancestors included, so a link inside the sandbox pointing
/// outward is rejected even when the final target does not exist yet.
pub fn validate(base: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = normalize(relative)?;

    let root = std::fs::canonicalize(base)
        .map_err(|e| KnowledgeError::fs("resolve the storage root", e))?;
    let target = root.join(&normalized);

    let mut current = root.clone();
    for component in normalized.components() {
        current.push(component);
        let meta = match std::fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            // Everything below a missing component is missing too.
            Err(e) if e.kind() == ErrorKind::NotFound => break,
            Err(e) => return Err(KnowledgeError::fs("inspect a path component", e)),
        };
        if meta.file_type().is_symlink() {
            let resolved = std::fs::canonicalize(&current)
                .map_err(|_| KnowledgeError::invalid_path("dangling symlink"))?;
            if !resolved.starts_with(&root) {
                return Err(KnowledgeError::invalid_path(
                    "symlink points outside the storage root",
                ));
            }
        }
    }

    if let Ok(resolved) = std::fs::canonicalize(&target) {
        if !resolved.starts_with(&root) {
            return Err(KnowledgeError::invalid_path("access denied"));
        }
    }

    Ok(target)
}

/// Textual checks plus component normalization. `.` segments are dropped;
/// any `..` segment is rejected outright.
fn normalize(relative: &str) -> Result<PathBuf> {
    if relative.trim().is_empty() {
        return Err(KnowledgeError::invalid_path("path cannot be empty"));
    }
    if relative.len() > MAX_PATH_LEN {
        return Err(KnowledgeError::invalid_path("path is too long"));
    }
    if relative.contains('\0') {
        return Err(KnowledgeError::invalid_path("path contains a NUL byte"));
    }
    if relative.contains('\\') {
        return Err(KnowledgeError::invalid_path("backslashes are not allowed"));
    }
    if relative.as_bytes().get(1) == Some(&b':') {
        return Err(KnowledgeError::invalid_path("drive letters are not allowed"));
    }
    if relative.starts_with('/') || Path::new(relative).is_absolute() {
        return Err(KnowledgeError::invalid_path("absolute paths are not allowed"));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(KnowledgeError::invalid_path("path traversal is not allowed"))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(KnowledgeError::invalid_path("absolute paths are not allowed"))
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(KnowledgeError::invalid_path("path resolves to the root itself"));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assert_invalid(base: &Path, input: &str) {
        match validate(base, input) {
            Err(KnowledgeError::InvalidPath { .. }) => {}
            other => panic!("expected InvalidPath for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn rejects_traversal_and_absolute_inputs() {
        let tmp = TempDir::new().unwrap();
        for input in [
            "../../etc/passwd",
            "projects/../../outside",
            "/etc/passwd",
            "C:\\Windows\\system32",
            "C:/Windows",
            "projects\\x",
            "a\0b",
            "",
            "   ",
            ".",
            "./",
        ] {
            assert_invalid(tmp.path(), input);
        }
    }

    #[test]
    fn rejects_overlong_paths() {
        let tmp = TempDir::new().unwrap();
        let long = "a/".repeat(MAX_PATH_LEN / 2 + 1);
        assert_invalid(tmp.path(), &long);
    }

    #[test]
    fn accepts_nonexistent_targets_inside_root() {
        let tmp = TempDir::new().unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        let path = validate(tmp.path(), "projects/demo/knowledge/new.md").unwrap();
        assert_eq!(path, root.join("projects/demo/knowledge/new.md"));
    }

    #[test]
    fn strips_current_dir_segments() {
        let tmp = TempDir::new().unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        let path = validate(tmp.path(), "./projects/./demo").unwrap();
        assert_eq!(path, root.join("projects/demo"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escaping_root() {
        let outside = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("escape")).unwrap();

        assert_invalid(tmp.path(), "escape/secret.txt");
        // Missing target under an outward-pointing ancestor is still rejected.
        assert_invalid(tmp.path(), "escape/not-yet-created.md");
    }

    #[cfg(unix)]
    #[test]
    fn accepts_symlink_staying_inside_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("real")).unwrap();
        std::fs::write(tmp.path().join("real/file.md"), "x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("alias")).unwrap();

        assert!(validate(tmp.path(), "alias/file.md").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", tmp.path().join("dangling")).unwrap();
        assert_invalid(tmp.path(), "dangling");
    }
}

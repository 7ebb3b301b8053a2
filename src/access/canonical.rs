use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Resolve a requested path to its absolute, traversal-free, symlink-resolved form.
///
/// Relative input is taken relative to `base`. Components are walked left to right:
/// every existing prefix is kept fully resolved, so a `..` always pops a real parent
/// directory and never a symlink name. Components past the deepest existing directory
/// are appended lexically, which lets a request for a missing file still resolve (and
/// later fail with not-found instead of an authorization error). Dangling symlinks and
/// symlink loops are unresolvable.
pub fn canonicalize(raw: &str, base: &Path) -> AppResult<PathBuf> {
    if raw.trim().is_empty() {
        return Err(AppError::user("malformed_path", "empty path"));
    }
    if raw.contains('\0') {
        return Err(AppError::user("malformed_path", "path contains NUL"));
    }
    let requested = Path::new(raw);
    let joined = if requested.is_absolute() { requested.to_path_buf() } else { base.join(requested) };
    if !joined.is_absolute() {
        return Err(AppError::user("malformed_path", format!("cannot make '{}' absolute", raw)));
    }

    let mut out = PathBuf::new();
    // Components appended below the deepest existing directory; nothing under them is looked up on disk
    let mut missing = 0usize;
    for comp in joined.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
                missing = missing.saturating_sub(1);
            }
            Component::Normal(name) => {
                out.push(name);
                if missing > 0 {
                    missing += 1;
                    continue;
                }
                match fs::symlink_metadata(&out) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        out = fs::canonicalize(&out).map_err(|e| {
                            AppError::user("unresolvable_path", format!("cannot resolve symlink {}: {}", out.display(), e))
                        })?;
                    }
                    Ok(_) => {}
                    Err(_) => missing = 1,
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_segments_are_removed() {
        let p = canonicalize("/sas/../etc/passwd", Path::new("/")).unwrap();
        assert_eq!(p, PathBuf::from("/etc/passwd"));
        let p = canonicalize("/a/./b/../../../c", Path::new("/")).unwrap();
        assert_eq!(p, PathBuf::from("/c"));
    }

    #[test]
    fn relative_paths_join_base() {
        let tmp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(tmp.path()).unwrap();
        let p = canonicalize("sub/../t.parquet", &base).unwrap();
        assert_eq!(p, base.join("t.parquet"));
    }

    #[test]
    fn symlinks_are_resolved_before_parent_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("real/deep")).unwrap();
        fs::create_dir_all(root.join("allowed")).unwrap();
        std::os::unix::fs::symlink(root.join("real/deep"), root.join("allowed/link")).unwrap();

        // allowed/link/.. is real/, not allowed/
        let p = canonicalize(&format!("{}/allowed/link/../x.parquet", root.display()), Path::new("/")).unwrap();
        assert_eq!(p, root.join("real/x.parquet"));

        let p = canonicalize(&format!("{}/allowed/link/y.parquet", root.display()), Path::new("/")).unwrap();
        assert_eq!(p, root.join("real/deep/y.parquet"));
    }

    #[test]
    fn dangling_symlink_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        std::os::unix::fs::symlink(root.join("nowhere"), root.join("dangling")).unwrap();
        let err = canonicalize(&format!("{}/dangling", root.display()), Path::new("/")).unwrap_err();
        assert_eq!(err.code_str(), "unresolvable_path");
    }

    #[test]
    fn symlink_after_missing_segment_is_still_resolved() {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        std::os::unix::fs::symlink(root.join("target"), root.join("link")).unwrap();
        let p = canonicalize(&format!("{}/missing/../link/x", root.display()), Path::new("/")).unwrap();
        assert_eq!(p, root.join("target/x"));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(canonicalize("", Path::new("/")).is_err());
        assert!(canonicalize("/a\0b", Path::new("/")).is_err());
    }
}

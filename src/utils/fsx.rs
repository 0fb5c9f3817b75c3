//! Filesystem helpers shared by the build engine.
//!
//! All containment tests are lexical: paths are cleaned (`.` and `..`
//! components resolved textually) and never canonicalized, so symlinks
//! are not followed.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

// ============================================================================
// Queries
// ============================================================================

pub fn dir_exists(path: &Path) -> bool {
    path.is_dir()
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Modification time of `path` in the local zone.
pub fn mod_time(path: &Path) -> Result<DateTime<Local>> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", path.display()))?;
    Ok(DateTime::<Local>::from(modified))
}

/// Number of entries in a directory, zero if it does not exist.
pub fn dir_count(path: &Path) -> usize {
    fs::read_dir(path).map(|rd| rd.count()).unwrap_or(0)
}

// ============================================================================
// Read / Write
// ============================================================================

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Write `text` to `path`, creating missing parent directories.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Copy `src` to `dst`, creating missing parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Recursively copy the contents of directory `src` into `dst`.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let target = path_translate(entry.path(), src, dst);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory {}", target.display()))?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove everything inside `dir`, creating it if missing.
pub fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            }
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    } else {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

// ============================================================================
// Path Arithmetic
// ============================================================================

/// Lexically clean a path: drop `.` components and fold `..` into its parent.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Absolute, cleaned form of `path` (relative paths are joined to the cwd).
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(clean(path));
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(clean(&cwd.join(path)))
}

/// True when `path` equals `dir` or lies strictly beneath it.
pub fn path_is_in_dir(path: &Path, dir: &Path) -> bool {
    clean(path).starts_with(clean(dir))
}

/// Map `path` under `src_root` to the equivalent path under `dst_root`.
///
/// # Panics
/// If `path` is not inside `src_root`.
pub fn path_translate(path: &Path, src_root: &Path, dst_root: &Path) -> PathBuf {
    let path = clean(path);
    let rel = path
        .strip_prefix(clean(src_root))
        .unwrap_or_else(|_| {
            panic!(
                "path outside root: {} not in {}",
                path.display(),
                src_root.display()
            )
        });
    clean(&dst_root.join(rel))
}

/// Slash-separated path of `path` relative to `root` (empty for the root itself).
pub fn rel_slash(path: &Path, root: &Path) -> Option<String> {
    let rel = clean(path).strip_prefix(clean(root)).ok()?.to_path_buf();
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// File name without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lower-cased extension including the leading dot, or empty.
pub fn ext(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Replace the extension of a file name (`ext` includes the dot).
pub fn replace_ext(name: &str, ext: &str) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 => format!("{}{ext}", &name[..pos]),
        _ => format!("{name}{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("a/..")), PathBuf::from("."));
        assert_eq!(clean(Path::new("/a/b/")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_path_is_in_dir() {
        assert!(path_is_in_dir(Path::new("/a/b/c"), Path::new("/a/b")));
        assert!(path_is_in_dir(Path::new("/a/b"), Path::new("/a/b/")));
        assert!(!path_is_in_dir(Path::new("/a/bc"), Path::new("/a/b")));
        assert!(!path_is_in_dir(Path::new("/a/b/../c"), Path::new("/a/b")));
    }

    #[test]
    fn test_path_translate() {
        let p = path_translate(
            Path::new("/site/content/posts/x.md"),
            Path::new("/site/content"),
            Path::new("/site/template"),
        );
        assert_eq!(p, PathBuf::from("/site/template/posts/x.md"));
        let root = path_translate(
            Path::new("/site/content"),
            Path::new("/site/content"),
            Path::new("/site/build"),
        );
        assert_eq!(root, PathBuf::from("/site/build"));
    }

    #[test]
    #[should_panic(expected = "path outside root")]
    fn test_path_translate_outside() {
        path_translate(Path::new("/x/y"), Path::new("/a"), Path::new("/b"));
    }

    #[test]
    fn test_rel_slash() {
        assert_eq!(
            rel_slash(Path::new("/a/b/c.md"), Path::new("/a")).as_deref(),
            Some("b/c.md")
        );
        assert_eq!(rel_slash(Path::new("/a"), Path::new("/a")).as_deref(), Some(""));
        assert_eq!(rel_slash(Path::new("/b"), Path::new("/a")), None);
    }

    #[test]
    fn test_replace_ext() {
        assert_eq!(replace_ext("post.md", ".html"), "post.html");
        assert_eq!(replace_ext("a.b.rmu", ".html"), "a.b.html");
        assert_eq!(replace_ext("README", ".html"), "README.html");
        assert_eq!(ext(Path::new("x/Y.MD")), ".md");
    }

    #[test]
    fn test_write_and_clear() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a/b/c.txt");
        write_text(&file, "hi").unwrap();
        assert_eq!(read_text(&file).unwrap(), "hi");
        assert!(mod_time(&file).is_ok());

        copy_dir(&dir.path().join("a"), &dir.path().join("z")).unwrap();
        assert!(file_exists(&dir.path().join("z/b/c.txt")));

        clear_dir(dir.path()).unwrap();
        assert_eq!(dir_count(dir.path()), 0);
        assert!(dir_exists(dir.path()));
    }
}

//! Page rendering, asset copying and template dependency tracking.
//!
//! - **refs**: Static analysis of `extends`/`include`/`import` tags
//! - **deps**: Reverse dependency graph (fragment → pages)
//! - **render**: Template engine seam (minijinja)
//! - **pages**: Render one page with its merged data
//! - **assets**: Copy static assets
//!
//! # Naming
//!
//! Every template is addressed by its template name: the path relative to the
//! template root with `/` separators (`index.html`, `_partials/nav.html`).
//! Names whose components start with `_` or `.` are fragments, everything
//! else is a [`Page`].

pub mod assets;
pub mod deps;
pub mod pages;
pub mod refs;
pub mod render;

use std::{
    collections::BTreeSet,
    fmt, fs,
    io::{self, Write},
    path::{Component, Path, PathBuf},
};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

// ============================================================================
// Page
// ============================================================================

/// A renderable output unit, identified by its template name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Page(String);

impl Page {
    /// Create a page from a template name. Returns `None` for fragments.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        is_page_name(&name).then_some(Self(name))
    }

    /// Create a page from an absolute path under the template root.
    pub fn from_path(templates: &Path, path: &Path) -> Option<Self> {
        template_name(templates, path).and_then(Self::new)
    }

    /// Template name (`posts/intro.html`).
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Output artifact location, mirroring the template layout.
    pub fn output_path(&self, output: &Path) -> PathBuf {
        output.join(&self.0)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a template name designates a page rather than a fragment.
pub fn is_page_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('/')
            .all(|part| !part.is_empty() && !part.starts_with('_') && !part.starts_with('.'))
}

/// Template name of `path`, or `None` if it lies outside `templates`.
pub fn template_name(templates: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(templates).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Discover every page under the template root, sorted by name.
pub fn discover_pages(templates: &Path) -> BTreeSet<Page> {
    collect_all_files(templates)
        .iter()
        .filter_map(|path| Page::from_path(templates, path))
        .collect()
}

// ============================================================================
// Shared utilities
// ============================================================================

/// Collect all files from a directory recursively, in a stable order.
pub fn collect_all_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Replace `dest` with `content` without ever exposing a partial file.
///
/// The content goes to a temporary file next to `dest` first and is then
/// renamed over it, so readers see either the old or the new artifact.
/// An existing destination keeps its permissions; new files get `0644`.
pub fn write_atomic(dest: &Path, content: &[u8]) -> io::Result<()> {
    write_atomic_with(dest, content, None)
}

/// Like [`write_atomic`], with explicit permissions for the result
/// (an asset takes its source file's mode).
pub fn write_atomic_with(
    dest: &Path,
    content: &[u8],
    permissions: Option<fs::Permissions>,
) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
    fs::create_dir_all(parent)?;

    // Temp files are created owner-only
    let permissions = permissions
        .or_else(|| fs::metadata(dest).ok().map(|m| m.permissions()))
        .or_else(default_permissions);

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_page_name() {
        assert!(is_page_name("index.html"));
        assert!(is_page_name("posts/lorem_ipsum.html"));
        assert!(!is_page_name("_base.html"));
        assert!(!is_page_name("_partials/nav.html"));
        assert!(!is_page_name("posts/_card.html"));
        assert!(!is_page_name(".hidden.html"));
        assert!(!is_page_name(""));
    }

    #[test]
    fn test_template_name() {
        let root = Path::new("/site/templates");
        assert_eq!(
            template_name(root, Path::new("/site/templates/posts/a.html")).as_deref(),
            Some("posts/a.html")
        );
        assert_eq!(template_name(root, Path::new("/site/assets/a.css")), None);
        assert_eq!(template_name(root, root), None);
    }

    #[test]
    fn test_page_output_path() {
        let page = Page::new("posts/a.html").unwrap();
        assert_eq!(
            page.output_path(Path::new("/site/dist")),
            PathBuf::from("/site/dist/posts/a.html")
        );
        assert!(Page::new("_base.html").is_none());
    }

    #[test]
    fn test_discover_pages_skips_fragments() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["index.html", "about.html", "_base.html", "_partials/nav.html", "posts/a.html"] {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let names: Vec<_> = discover_pages(root).iter().map(|p| p.name().to_owned()).collect();
        assert_eq!(names, vec!["about.html", "index.html", "posts/a.html"]);
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/out.html");

        write_atomic(&dest, b"first").unwrap();
        write_atomic(&dest, b"second").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "second");
        // No temporary files left behind
        let entries = fs::read_dir(dest.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_output_is_world_readable() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("index.html");

        write_atomic(&dest, b"page").unwrap();

        assert_eq!(mode(&dest), 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("index.html");
        fs::write(&dest, "old").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&dest, b"new").unwrap();

        assert_eq!(mode(&dest), 0o640);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_with_explicit_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("run.sh");
        fs::write(&dest, "old").unwrap();

        write_atomic_with(&dest, b"#!/bin/sh", Some(fs::Permissions::from_mode(0o755))).unwrap();

        assert_eq!(mode(&dest), 0o755);
    }
}

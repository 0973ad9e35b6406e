//! File category classification for watch mode.
//!
//! # File Categories
//!
//! | Category   | Rebuild Strategy                    | Example Files                  |
//! |------------|-------------------------------------|--------------------------------|
//! | Template   | Dependent pages (+ itself if page)  | `templates/_base.html`         |
//! | Asset      | Copy the single file                | `assets/style.css`             |
//! | Data       | Pages under the owning scope        | `data/index.sh`, `data.yaml`   |
//! | Unknown    | Ignored                             | Files outside watched dirs     |
//!
//! Roots are tested in table order; the first match wins.

use crate::config::{SiteConfig, normalize_path};
use crate::data::DataTree;
use std::path::Path;

/// Category of a changed file, used to pick the invalidation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Under the template root
    Template,
    /// Under the asset root
    Asset,
    /// Part of the data scope tree
    Data,
    /// Anything else
    Unknown,
}

impl FileCategory {
    /// Short name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Template => "templates",
            Self::Asset => "assets",
            Self::Data => "data",
            Self::Unknown => "unknown",
        }
    }
}

/// Categorize a file path to determine how a change to it is handled.
pub fn categorize_path(path: &Path, config: &SiteConfig, data: &DataTree) -> FileCategory {
    let path = normalize_path(path);

    if path.starts_with(&config.build.templates) {
        FileCategory::Template
    } else if path.starts_with(&config.build.assets) {
        FileCategory::Asset
    } else if data.owns(&path) {
        FileCategory::Data
    } else {
        FileCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::module::testing::MemLoader;
    use crate::logger::Logger;
    use std::{fs, sync::Arc};
    use tempfile::TempDir;

    fn setup() -> (TempDir, SiteConfig, DataTree) {
        let dir = TempDir::new().unwrap();
        for sub in ["templates", "assets", "data"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let config = SiteConfig::default().with_root(dir.path());
        let tree = DataTree::new(&config, Arc::new(MemLoader::default()), &Logger::silent());
        (dir, config, tree)
    }

    #[test]
    fn test_categorize_roots() {
        let (_dir, config, tree) = setup();
        let root = config.get_root().to_path_buf();

        let cases = [
            ("templates/_base.html", FileCategory::Template),
            ("templates/posts/a.html", FileCategory::Template),
            ("assets/style.css", FileCategory::Asset),
            ("data/index.sh", FileCategory::Data),
            ("data/notes.txt", FileCategory::Data),
            ("data.yaml", FileCategory::Data),
            ("loom.toml", FileCategory::Unknown),
            ("dist/index.html", FileCategory::Unknown),
            ("data.txt", FileCategory::Unknown),
        ];
        for (rel, expected) in cases {
            assert_eq!(categorize_path(&root.join(rel), &config, &tree), expected, "{rel}");
        }
    }

    #[test]
    fn test_category_name() {
        assert_eq!(FileCategory::Template.name(), "templates");
        assert_eq!(FileCategory::Asset.name(), "assets");
        assert_eq!(FileCategory::Data.name(), "data");
        assert_eq!(FileCategory::Unknown.name(), "unknown");
    }
}

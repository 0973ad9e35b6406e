//! Project scaffolding for `loom init`.

use crate::{config::SiteConfig, info, logger::Logger};
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Starter files, relative to the project root.
const STARTER_FILES: &[(&str, &str)] = &[
    ("templates/_base.html", include_str!("embed/init/templates/_base.html")),
    ("templates/index.html", include_str!("embed/init/templates/index.html")),
    ("assets/style.css", include_str!("embed/init/assets/style.css")),
    ("data/__init__.yaml", include_str!("embed/init/data/__init__.yaml")),
];

const CONFIG_TEMPLATE: &str = include_str!("embed/init/loom.toml");

/// Create a starter project. Does nothing when a config file already exists.
pub fn new_site(config: &SiteConfig, log: Logger) -> Result<()> {
    let root = config.get_root();
    let config_path = &config.config_path;

    if config_path.is_file() {
        info!(log, "init"; "{} found, skipping", config_path.display());
        return Ok(());
    }

    write_new(config_path, CONFIG_TEMPLATE, log)?;
    for (rel, content) in STARTER_FILES {
        write_new(&root.join(rel), content, log)?;
    }

    info!(log, "init"; "run `loom dev` in {} to start", root.display());
    Ok(())
}

/// Write a file unless something is already there.
fn write_new(path: &Path, content: &str, log: Logger) -> Result<()> {
    if path.exists() {
        info!(log, "init"; "{} exists, keeping it", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(log, "init"; "created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build::build_site, site::Site};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> SiteConfig {
        SiteConfig::default().with_root(dir.path())
    }

    #[test]
    fn test_new_site_creates_starter_project() {
        let dir = TempDir::new().unwrap();
        new_site(&config(&dir), Logger::silent()).unwrap();

        for rel in ["loom.toml", "templates/_base.html", "templates/index.html", "assets/style.css", "data/__init__.yaml"] {
            assert!(dir.path().join(rel).is_file(), "{rel}");
        }

        // The written config parses and the starter project builds
        let loaded = SiteConfig::from_path(&dir.path().join("loom.toml"))
            .unwrap()
            .with_root(dir.path());
        loaded.validate().unwrap();
        let mut site = Site::load(loaded, Logger::silent());
        build_site(&mut site).unwrap();

        let index = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
        assert!(index.contains("<h1>My Site</h1>"));
        assert!(dir.path().join("dist/style.css").is_file());
    }

    #[test]
    fn test_new_site_skips_existing_project() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("loom.toml"), "[build]\n").unwrap();

        new_site(&config(&dir), Logger::silent()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("loom.toml")).unwrap(), "[build]\n");
        assert!(!dir.path().join("templates").exists());
    }

    #[test]
    fn test_new_site_keeps_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("templates/index.html"), "mine").unwrap();

        new_site(&config(&dir), Logger::silent()).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("templates/index.html")).unwrap(),
            "mine"
        );
        assert!(dir.path().join("templates/_base.html").is_file());
    }
}

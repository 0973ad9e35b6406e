//! Programmatic data modules.
//!
//! A module registers named contributions of two kinds:
//!
//! - **global**: `(prev, config) → mapping`, evaluated once and cached
//! - **per-page**: `(prev, config, page) → mapping`, evaluated per request
//!
//! Contributions of one kind are folded left to right, each receiving the
//! mapping accumulated so far. A failing contribution is logged and
//! contributes nothing; the fold continues with the next one.

use super::{Data, DataError, merge};
use crate::compiler::Page;
use crate::config::SiteConfig;
use crate::error;
use crate::logger::Logger;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionKind {
    Global,
    PerPage,
}

/// One data function registered by a module.
pub trait Contribution: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ContributionKind;

    /// Evaluate the function. `page` is `None` for global contributions.
    fn call(&self, prev: &Data, config: &SiteConfig, page: Option<&Page>) -> Result<Data, DataError>;
}

/// Turns a module file into its registered contributions.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, module: &Path) -> Result<Vec<Box<dyn Contribution>>, DataError>;
}

/// The programmatic provider of one scope.
pub struct DataModule {
    path: PathBuf,
    contributions: Vec<Box<dyn Contribution>>,
    global: Option<Data>,
}

impl DataModule {
    /// Register the contributions of the module at `path`.
    ///
    /// A module that fails to load is kept with no contributions, so other
    /// scopes are unaffected and a later update can recover it.
    pub fn load(path: PathBuf, loader: &dyn ModuleLoader, log: &Logger) -> Self {
        let contributions = register(&path, loader, log);
        Self {
            path,
            contributions,
            global: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merged result of the global contributions, computed on first access.
    pub fn global_data(&mut self, config: &SiteConfig, log: &Logger) -> &Data {
        let Self {
            path,
            contributions,
            global,
        } = self;
        global.get_or_insert_with(|| fold(path, contributions, config, None, log))
    }

    /// Merged result of the per-page contributions for `page`. Never cached.
    pub fn page_data(&self, config: &SiteConfig, page: &Page, log: &Logger) -> Data {
        fold(&self.path, &self.contributions, config, Some(page), log)
    }

    /// Reload the module and recompute its global data.
    pub fn update(&mut self, loader: &dyn ModuleLoader, config: &SiteConfig, log: &Logger) {
        self.contributions = register(&self.path, loader, log);
        self.global = Some(fold(&self.path, &self.contributions, config, None, log));
    }
}

fn register(path: &Path, loader: &dyn ModuleLoader, log: &Logger) -> Vec<Box<dyn Contribution>> {
    loader.load(path).unwrap_or_else(|e| {
        error!(log, "data"; "{e}");
        Vec::new()
    })
}

fn fold(
    path: &Path,
    contributions: &[Box<dyn Contribution>],
    config: &SiteConfig,
    page: Option<&Page>,
    log: &Logger,
) -> Data {
    let kind = if page.is_some() {
        ContributionKind::PerPage
    } else {
        ContributionKind::Global
    };

    let mut acc = Data::new();
    for contribution in contributions.iter().filter(|c| c.kind() == kind) {
        match contribution.call(&acc, config, page) {
            Ok(data) => merge(&mut acc, data),
            Err(e) => error!(log, "data"; "{}: {e}", path.display()),
        }
    }
    acc
}

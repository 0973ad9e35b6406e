//! Incremental rebuild orchestrator.
//!
//! [`Site`] owns every piece of build state and turns a batch of file
//! changes into the smallest set of page renders:
//!
//! ```text
//! Change ──► categorize ──┬─ Template ──► graph.refresh ──► dependents (+ page)
//!                         ├─ Asset ─────► copy one file
//!                         ├─ Data ──────► tree.update ────► pages under scope
//!                         └─ Unknown ───► ignored
//!                                              │
//!                              union of rebuild sets, each page rendered once
//! ```
//!
//! # Deletions and additions
//!
//! | Change                 | Action                                                  |
//! |------------------------|---------------------------------------------------------|
//! | page deleted           | drop from page set and graph, delete its output         |
//! | fragment deleted       | refresh graph, re-render dependents (errors are logged) |
//! | asset / data deleted   | logged only                                             |
//! | file added, `rescan`   | page registered and rendered, data tree reloaded        |
//! | file added, no rescan  | handled like a modification                             |

use crate::compiler::{
    Page,
    assets::copy_asset,
    deps::{DependencyGraph, FsSource},
    discover_pages,
    pages::{remove_page_output, render_page},
    render::{JinjaRenderer, Renderer},
    template_name,
};
use crate::config::{SiteConfig, normalize_path};
use crate::data::{
    DataTree,
    module::ModuleLoader,
    script::ScriptLoader,
};
use crate::logger::Logger;
use crate::utils::category::{FileCategory, categorize_path};
use crate::{debug, error, info};
use anyhow::Result;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
}

/// One filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Modified, path)
    }

    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Added, path)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Deleted, path)
    }
}

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// Pages whose output was rewritten
    pub rendered: Vec<Page>,
    /// Pages that failed to render (previous output kept)
    pub failed: Vec<Page>,
    /// Asset destinations written
    pub copied: Vec<PathBuf>,
    /// Pages whose output was deleted
    pub removed: Vec<Page>,
}

impl RebuildReport {
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
            && self.failed.is_empty()
            && self.copied.is_empty()
            && self.removed.is_empty()
    }

    /// One-line summary for the watch log.
    pub fn summary(&self) -> String {
        let parts = [
            (self.rendered.len(), "rendered"),
            (self.failed.len(), "failed"),
            (self.copied.len(), "copied"),
            (self.removed.len(), "removed"),
        ];
        parts
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, what)| format!("{n} {what}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// All build state of one project.
pub struct Site {
    config: SiteConfig,
    log: Logger,
    pages: BTreeSet<Page>,
    graph: DependencyGraph,
    tree: DataTree,
    renderer: Box<dyn Renderer>,
    source: FsSource,
}

impl Site {
    /// Discover pages, templates and data of the configured project.
    pub fn load(config: SiteConfig, log: Logger) -> Self {
        let renderer = JinjaRenderer::new(&config.build.templates, config.build.strict);
        let loader = ScriptLoader::new(&config);
        Self::with_parts(config, log, Box::new(renderer), Arc::new(loader))
    }

    /// Like [`Site::load`] with explicit collaborators.
    pub fn with_parts(
        config: SiteConfig,
        log: Logger,
        renderer: Box<dyn Renderer>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        let source = FsSource::new(&config.build.templates);
        let pages = discover_pages(&config.build.templates);
        let graph = DependencyGraph::build(&pages, &source, &log);
        let tree = DataTree::new(&config, loader, &log);

        debug!(log, "site"; "{} pages, {} tracked in dependency graph", pages.len(), graph.len());

        Self {
            config,
            log,
            pages,
            graph,
            tree,
            renderer,
            source,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn logger(&self) -> Logger {
        self.log
    }

    pub fn pages(&self) -> &BTreeSet<Page> {
        &self.pages
    }

    /// Render one page with its merged data and write the output.
    pub fn render(&mut self, page: &Page) -> Result<PathBuf> {
        let data = self.tree.data_for(page, &self.config, &self.log);
        render_page(page, self.renderer.as_ref(), &data, &self.config.build.output)
    }

    /// Apply one batch of changes and re-render every affected page once.
    pub fn handle_batch(&mut self, changes: &[Change]) -> RebuildReport {
        let mut report = RebuildReport::default();
        let mut rebuild = BTreeSet::new();
        let mut templates_changed = false;

        for change in changes {
            let path = normalize_path(&change.path);
            let category = categorize_path(&path, &self.config, &self.tree);
            debug!(self.log, "watch"; "{:?} {} [{}]", change.kind, path.display(), category.name());

            match category {
                FileCategory::Template => {
                    templates_changed = true;
                    self.on_template(change.kind, &path, &mut rebuild, &mut report);
                }
                FileCategory::Asset => self.on_asset(change.kind, &path, &mut report),
                FileCategory::Data => self.on_data(change.kind, &path, &mut rebuild),
                FileCategory::Unknown => {
                    debug!(self.log, "watch"; "ignoring {}", path.display());
                }
            }
        }

        if templates_changed {
            self.renderer.invalidate();
        }

        for page in rebuild {
            if !self.pages.contains(&page) {
                continue;
            }
            match self.render(&page) {
                Ok(_) => report.rendered.push(page),
                Err(e) => {
                    error!(self.log, "render"; "{e:#}");
                    report.failed.push(page);
                }
            }
        }

        report
    }

    fn on_template(
        &mut self,
        kind: ChangeKind,
        path: &Path,
        rebuild: &mut BTreeSet<Page>,
        report: &mut RebuildReport,
    ) {
        let Some(name) = template_name(&self.config.build.templates, path) else {
            return;
        };
        let page = Page::new(name.as_str());
        let tracked = page.as_ref().is_some_and(|p| self.pages.contains(p));

        // Dependents before the change still reference the old content
        rebuild.extend(self.graph.dependent_pages(&name));

        match (kind, page) {
            (ChangeKind::Deleted, Some(page)) if tracked => {
                self.pages.remove(&page);
                self.graph.remove_page(&page);
                match remove_page_output(&page, &self.config.build.output) {
                    Ok(true) => {
                        info!(self.log, "watch"; "removed output of {page}");
                        report.removed.push(page);
                    }
                    Ok(false) => {}
                    Err(e) => error!(self.log, "watch"; "failed to remove output of {page}: {e}"),
                }
            }
            (ChangeKind::Added, Some(page)) if !tracked => {
                if self.config.watch.rescan {
                    self.pages.insert(page.clone());
                    rebuild.insert(page);
                } else {
                    debug!(self.log, "watch"; "new page {page} needs a restart (or [watch] rescan = true)");
                }
            }
            (_, Some(page)) if tracked => {
                rebuild.insert(page);
            }
            _ => {}
        }

        if kind == ChangeKind::Added && self.config.watch.rescan {
            // References to the new file were dropped while it was missing
            self.graph = DependencyGraph::build(&self.pages, &self.source, &self.log);
        } else {
            self.graph.refresh(&name, &self.source, &self.log);
        }
        rebuild.extend(self.graph.dependent_pages(&name));
    }

    fn on_asset(&mut self, kind: ChangeKind, path: &Path, report: &mut RebuildReport) {
        if kind == ChangeKind::Deleted {
            info!(self.log, "assets"; "{} deleted, output left in place", path.display());
            return;
        }
        if !path.is_file() {
            return;
        }

        let dest_root = self.config.asset_output();
        match copy_asset(&self.config.build.assets, &dest_root, path) {
            Ok(dest) => report.copied.push(dest),
            Err(e) => error!(self.log, "assets"; "{e:#}"),
        }
    }

    fn on_data(&mut self, kind: ChangeKind, path: &Path, rebuild: &mut BTreeSet<Page>) {
        match kind {
            ChangeKind::Deleted => {
                let used_by = self.tree.effected_pages(path, &self.pages).len();
                info!(
                    self.log, "data";
                    "{} deleted ({used_by} pages used it), cached data kept until restart",
                    path.display()
                );
            }
            ChangeKind::Added if self.config.watch.rescan => {
                self.tree.reload(&self.log);
                rebuild.extend(self.tree.update(path, &self.pages, &self.config, &self.log));
            }
            ChangeKind::Added | ChangeKind::Modified => {
                rebuild.extend(self.tree.update(path, &self.pages, &self.config, &self.log));
            }
        }
    }
}

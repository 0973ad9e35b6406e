//! Data scope tree.
//!
//! Scopes mirror the data root. A scope is keyed by its path relative to the
//! data root without suffix (`""` for the root, `posts`, `posts/intro`) and
//! applies to every page whose template name without extension is that key
//! or lies below it:
//!
//! ```text
//! data/__init__.yaml         ""        → every page
//! data/posts/__init__.sh     "posts"   → posts/a.html, posts/b.html
//! data/posts/a.yaml          "posts/a" → posts/a.html
//! ```
//!
//! Provider lookup for a scope rooted at `P`:
//!
//! | Provider | Candidates, first match wins                           |
//! |----------|--------------------------------------------------------|
//! | document | `P.yaml`, `P.yml`, `P/__init__.yaml`, `P/__init__.yml` |
//! | module   | `P.<suffix>`, `P/__init__.<suffix>`                    |
//!
//! Directories without provider files are transparent: scopes nested in them
//! hang off the nearest enclosing scope.

use super::module::{DataModule, ModuleLoader};
use super::structured::{self, Document};
use super::{Data, merge};
use crate::compiler::Page;
use crate::config::SiteConfig;
use crate::logger::Logger;
use crate::{debug, warn};
use std::{
    collections::BTreeSet,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Stem of provider files that belong to their directory's scope.
const INIT_STEM: &str = "__init__";

/// Which provider of a scope a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Document,
    Module,
}

/// One node of the tree, owning its own provider caches.
pub struct DataScope {
    key: String,
    path: PathBuf,
    document: Option<Document>,
    module: Option<DataModule>,
    children: Vec<DataScope>,
}

impl DataScope {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path the scope is rooted at, without suffix.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn children(&self) -> &[DataScope] {
        &self.children
    }

    pub fn has_providers(&self) -> bool {
        self.document.is_some() || self.module.is_some()
    }

    /// Which provider `file` is, if any.
    pub fn provider_of(&self, file: &Path) -> Option<Provider> {
        if self.document.as_ref().is_some_and(|d| d.path() == file) {
            Some(Provider::Document)
        } else if self.module.as_ref().is_some_and(|m| m.path() == file) {
            Some(Provider::Module)
        } else {
            None
        }
    }

    /// Whether this scope applies to the page with key `page_key`.
    pub fn applies_to(&self, page_key: &str) -> bool {
        self.key.is_empty()
            || page_key == self.key
            || page_key
                .strip_prefix(self.key.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn data_for(&mut self, page: &Page, page_key: &str, config: &SiteConfig, log: &Logger) -> Data {
        if !self.applies_to(page_key) {
            return Data::new();
        }

        let mut data = Data::new();
        if let Some(document) = &mut self.document {
            merge(&mut data, document.data(log).clone());
        }
        if let Some(module) = &mut self.module {
            merge(&mut data, module.global_data(config, log).clone());
            merge(&mut data, module.page_data(config, page, log));
        }
        for child in &mut self.children {
            merge(&mut data, child.data_for(page, page_key, config, log));
        }
        data
    }

    fn find(&self, file: &Path) -> Option<&DataScope> {
        if self.provider_of(file).is_some() {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(file))
    }

    fn find_mut(&mut self, file: &Path) -> Option<&mut DataScope> {
        if self.provider_of(file).is_some() {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(file))
    }
}

/// The scope tree rooted at the data root.
pub struct DataTree {
    root: PathBuf,
    suffix: String,
    ignore: Vec<String>,
    loader: Arc<dyn ModuleLoader>,
    scope: DataScope,
}

impl DataTree {
    /// Discover every scope under the configured data root.
    pub fn new(config: &SiteConfig, loader: Arc<dyn ModuleLoader>, log: &Logger) -> Self {
        let mut tree = Self {
            root: config.build.data.clone(),
            suffix: config.data.suffix.clone(),
            ignore: config.data.ignore.clone(),
            loader,
            scope: DataScope {
                key: String::new(),
                path: config.build.data.clone(),
                document: None,
                module: None,
                children: Vec::new(),
            },
        };
        tree.reload(log);
        tree
    }

    pub fn root_scope(&self) -> &DataScope {
        &self.scope
    }

    /// Rediscover the whole tree, dropping every cache.
    pub fn reload(&mut self, log: &Logger) {
        self.scope = self.discover(String::new(), log);
        debug!(log, "data"; "{} data scopes", count(self.root_scope()));
    }

    /// Merged data for `page` from every scope on its path.
    pub fn data_for(&mut self, page: &Page, config: &SiteConfig, log: &Logger) -> Data {
        let key = page_key(page);
        self.scope.data_for(page, &key, config, log)
    }

    /// Whether `file` lies in the data tree: under the data root, or a
    /// provider file next to it (`data.yaml` for a `data/` root).
    pub fn owns(&self, file: &Path) -> bool {
        file.starts_with(&self.root) || self.is_root_sibling(file)
    }

    fn is_root_sibling(&self, file: &Path) -> bool {
        let (Some(parent), Some(name)) = (self.root.parent(), self.root.file_name()) else {
            return false;
        };
        file.parent() == Some(parent)
            && file.file_stem() == Some(name)
            && file
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.is_provider_ext(ext))
    }

    /// The scope that has `file` as one of its providers.
    pub fn scope_for(&self, file: &Path) -> Option<&DataScope> {
        self.scope.find(file)
    }

    /// Pages affected by a change to `file`.
    pub fn effected_pages(&self, file: &Path, pages: &BTreeSet<Page>) -> BTreeSet<Page> {
        if !self.owns(file) {
            return BTreeSet::new();
        }
        self.scope_for(file)
            .map(|scope| pages_under(scope, pages))
            .unwrap_or_default()
    }

    /// Refresh the provider `file` belongs to and return the affected pages.
    pub fn update(
        &mut self,
        file: &Path,
        pages: &BTreeSet<Page>,
        config: &SiteConfig,
        log: &Logger,
    ) -> BTreeSet<Page> {
        if !self.owns(file) {
            return BTreeSet::new();
        }

        let loader = Arc::clone(&self.loader);
        let Some(scope) = self.scope.find_mut(file) else {
            warn!(log, "data"; "`{}` is not a registered data file", file.display());
            return BTreeSet::new();
        };

        debug!(log, "data"; "refreshing scope `{}` at {}", scope.key(), scope.path().display());
        match scope.provider_of(file) {
            Some(Provider::Document) => {
                if let Some(document) = &mut scope.document {
                    document.update(log);
                }
            }
            Some(Provider::Module) => {
                if let Some(module) = &mut scope.module {
                    module.update(loader.as_ref(), config, log);
                }
            }
            None => {}
        }

        pages_under(scope, pages)
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Build the scope keyed `key`, with its children.
    fn discover(&self, key: String, log: &Logger) -> DataScope {
        let path = if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&key)
        };

        let document = structured::EXTENSIONS
            .iter()
            .map(|ext| with_ext(&path, ext))
            .chain(structured::EXTENSIONS.iter().map(|ext| init_file(&path, ext)))
            .find(|p| p.is_file())
            .map(Document::new);

        let module = [with_ext(&path, &self.suffix), init_file(&path, &self.suffix)]
            .into_iter()
            .find(|p| p.is_file())
            .map(|p| DataModule::load(p, self.loader.as_ref(), log));

        let mut children = Vec::new();
        for name in self.child_names(&path) {
            let child_key = if key.is_empty() {
                name
            } else {
                format!("{key}/{name}")
            };
            let child = self.discover(child_key, log);
            if child.has_providers() {
                children.push(child);
            } else {
                children.extend(child.children);
            }
        }

        DataScope {
            key,
            path,
            document,
            module,
            children,
        }
    }

    /// Sorted names of candidate child scopes inside directory `dir`.
    fn child_names(&self, dir: &Path) -> BTreeSet<String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return BTreeSet::new();
        };

        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().into_string().ok()?;
                if name.starts_with('.') {
                    return None;
                }

                if path.is_dir() {
                    return (!self.ignore.contains(&name)).then_some(name);
                }

                let ext = path.extension()?.to_str()?;
                let stem = path.file_stem()?.to_str()?;
                (self.is_provider_ext(ext) && stem != INIT_STEM).then(|| stem.to_owned())
            })
            .collect()
    }

    fn is_provider_ext(&self, ext: &str) -> bool {
        ext == self.suffix || structured::EXTENSIONS.contains(&ext)
    }
}

/// Map a page onto the data tree: its template name without extension.
pub fn page_key(page: &Page) -> String {
    let name = page.name();
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[file_start..].rfind('.') {
        Some(dot) if dot > 0 => name[..file_start + dot].to_owned(),
        _ => name.to_owned(),
    }
}

fn pages_under(scope: &DataScope, pages: &BTreeSet<Page>) -> BTreeSet<Page> {
    pages
        .iter()
        .filter(|page| scope.applies_to(&page_key(page)))
        .cloned()
        .collect()
}

/// `path` with `.ext` appended (keeps dots already in the stem).
fn with_ext(path: &Path, ext: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn init_file(dir: &Path, ext: &str) -> PathBuf {
    dir.join(format!("{INIT_STEM}.{ext}"))
}

fn count(scope: &DataScope) -> usize {
    1 + scope.children().iter().map(count).sum::<usize>()
}

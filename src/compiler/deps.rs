//! Template dependency graph for precise rebuilds.
//!
//! Built by statically following `extends`/`include`/`import` references from
//! every page. The forward map records, per page, every fragment it pulls in
//! directly or transitively; the reverse map answers "which pages must be
//! re-rendered when this fragment changes" with a single lookup.
//!
//! ```text
//! forward                          reverse
//! index.html → {_base, _nav}       _base → {index.html, about.html}
//! about.html → {_base, _nav}       _nav  → {index.html, about.html}
//! ```

use super::Page;
use super::refs::scan_references;
use crate::logger::Logger;
use crate::{error, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

/// Where template sources are read from.
pub trait TemplateSource {
    fn read(&self, name: &str) -> io::Result<String>;
}

/// Templates on disk under a root directory.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl TemplateSource for FsSource {
    fn read(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(name))
    }
}

/// Page ↔ fragment dependency graph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// page → fragments it depends on (never contains the page itself)
    forward: FxHashMap<Page, FxHashSet<String>>,
    /// fragment → pages depending on it
    reverse: FxHashMap<String, FxHashSet<Page>>,
}

impl DependencyGraph {
    /// Build the graph for every page.
    pub fn build<'a>(
        pages: impl IntoIterator<Item = &'a Page>,
        source: &impl TemplateSource,
        log: &Logger,
    ) -> Self {
        let mut graph = Self::default();
        for page in pages {
            graph.insert_page(page, source, log);
        }
        graph
    }

    /// Pages that include or extend `fragment`, directly or transitively.
    pub fn dependent_pages(&self, fragment: &str) -> BTreeSet<Page> {
        self.reverse
            .get(fragment)
            .map(|pages| pages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Fragments `page` depends on.
    #[cfg(test)]
    pub fn dependencies(&self, page: &Page) -> BTreeSet<&str> {
        self.forward
            .get(page)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn contains_page(&self, page: &Page) -> bool {
        self.forward.contains_key(page)
    }

    /// Number of pages tracked.
    pub(crate) fn len(&self) -> usize {
        self.forward.len()
    }

    /// Analyze `page` and add its edges, replacing any previous ones.
    pub fn insert_page(&mut self, page: &Page, source: &impl TemplateSource, log: &Logger) {
        self.remove_page(page);

        let deps = collect_dependencies(page, source, log);
        for fragment in &deps {
            self.reverse
                .entry(fragment.clone())
                .or_default()
                .insert(page.clone());
        }
        self.forward.insert(page.clone(), deps);
    }

    /// Drop `page` and its outgoing edges.
    pub fn remove_page(&mut self, page: &Page) {
        let Some(deps) = self.forward.remove(page) else {
            return;
        };
        for fragment in deps {
            if let Some(pages) = self.reverse.get_mut(&fragment) {
                pages.remove(page);
                if pages.is_empty() {
                    self.reverse.remove(&fragment);
                }
            }
        }
    }

    /// Re-derive the edges affected by a change to `fragment`.
    ///
    /// Only pages that already depend on it (and the fragment itself, if it
    /// is a tracked page) are re-analyzed.
    pub fn refresh(&mut self, fragment: &str, source: &impl TemplateSource, log: &Logger) {
        let mut affected: Vec<Page> = self
            .reverse
            .get(fragment)
            .map(|pages| pages.iter().cloned().collect())
            .unwrap_or_default();

        if let Some(page) = Page::new(fragment)
            && self.forward.contains_key(&page)
        {
            affected.push(page);
        }

        for page in &affected {
            self.insert_page(page, source, log);
        }
    }
}

/// Follow references from `page` until every reachable fragment is found.
///
/// A missing fragment is dropped from its branch; a malformed source stops
/// the analysis of this page, keeping what was collected so far.
fn collect_dependencies(page: &Page, source: &impl TemplateSource, log: &Logger) -> FxHashSet<String> {
    let mut found = FxHashSet::default();
    let mut stack = vec![page.name().to_owned()];

    while let Some(name) = stack.pop() {
        let content = match source.read(&name) {
            Ok(content) => content,
            Err(e) => {
                warn!(log, "deps"; "template `{name}` referenced by `{page}` not found: {e}");
                found.remove(&name);
                continue;
            }
        };

        match scan_references(&content) {
            Ok(refs) => {
                for reference in refs {
                    if reference != page.name() && found.insert(reference.clone()) {
                        stack.push(reference);
                    }
                }
            }
            Err(e) => {
                error!(log, "deps"; "cannot analyze `{name}` (for `{page}`): {e}");
                break;
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory template source.
    #[derive(Default)]
    struct MemSource(HashMap<String, String>);

    impl MemSource {
        fn with(mut self, name: &str, content: &str) -> Self {
            self.0.insert(name.into(), content.into());
            self
        }
    }

    impl TemplateSource for MemSource {
        fn read(&self, name: &str) -> io::Result<String> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_owned()))
        }
    }

    fn page(name: &str) -> Page {
        Page::new(name).unwrap()
    }

    fn names(pages: BTreeSet<Page>) -> Vec<String> {
        pages.into_iter().map(|p| p.name().to_owned()).collect()
    }

    fn build(source: &MemSource, pages: &[&str]) -> DependencyGraph {
        let pages: Vec<_> = pages.iter().map(|p| page(p)).collect();
        DependencyGraph::build(&pages, source, &Logger::silent())
    }

    #[test]
    fn test_shared_base_affects_both_pages() {
        let source = MemSource::default()
            .with("_base.html", "<html>{% block body %}{% endblock %}</html>")
            .with("index.html", r#"{% extends "_base.html" %}"#)
            .with("about.html", r#"{% extends "_base.html" %}"#)
            .with("contact.html", "<p>standalone</p>");
        let graph = build(&source, &["index.html", "about.html", "contact.html"]);

        assert_eq!(
            names(graph.dependent_pages("_base.html")),
            vec!["about.html", "index.html"]
        );
    }

    #[test]
    fn test_transitive_dependencies() {
        let source = MemSource::default()
            .with("_nav.html", "<nav></nav>")
            .with("_base.html", r#"{% include "_nav.html" %}"#)
            .with("index.html", r#"{% extends "_base.html" %}"#);
        let graph = build(&source, &["index.html"]);

        assert_eq!(names(graph.dependent_pages("_nav.html")), vec!["index.html"]);
        assert_eq!(
            graph.dependencies(&page("index.html")),
            BTreeSet::from(["_base.html", "_nav.html"])
        );
    }

    #[test]
    fn test_unreferenced_fragment_has_no_dependents() {
        let source = MemSource::default()
            .with("_unused.html", "")
            .with("index.html", "<p></p>");
        let graph = build(&source, &["index.html"]);

        assert!(graph.dependent_pages("_unused.html").is_empty());
        // A page included by nobody has no dependents either
        assert!(graph.dependent_pages("index.html").is_empty());
    }

    #[test]
    fn test_include_cycle_terminates() {
        let source = MemSource::default()
            .with("a.html", r#"{% include "b.html" %}"#)
            .with("b.html", r#"{% include "a.html" %}"#);
        let graph = build(&source, &["a.html", "b.html"]);

        assert_eq!(names(graph.dependent_pages("a.html")), vec!["b.html"]);
        assert_eq!(names(graph.dependent_pages("b.html")), vec!["a.html"]);
        assert_eq!(graph.dependencies(&page("a.html")), BTreeSet::from(["b.html"]));
    }

    #[test]
    fn test_fragment_cycle_terminates() {
        let source = MemSource::default()
            .with("_x.html", r#"{% include "_y.html" %}"#)
            .with("_y.html", r#"{% include "_x.html" %}"#)
            .with("index.html", r#"{% include "_x.html" %}"#);
        let graph = build(&source, &["index.html"]);

        assert_eq!(names(graph.dependent_pages("_y.html")), vec!["index.html"]);
    }

    #[test]
    fn test_missing_fragment_dropped() {
        let source = MemSource::default()
            .with("index.html", r#"{% include "_gone.html" %}{% include "_here.html" %}"#)
            .with("_here.html", "");
        let graph = build(&source, &["index.html"]);

        assert!(graph.dependent_pages("_gone.html").is_empty());
        assert_eq!(names(graph.dependent_pages("_here.html")), vec!["index.html"]);
    }

    #[test]
    fn test_malformed_fragment_keeps_collected_edges() {
        let source = MemSource::default()
            .with("index.html", r#"{% include "_broken.html" %}"#)
            .with("_broken.html", r#"{% include "_never.html %}"#)
            .with("about.html", r#"{% include "_ok.html" %}"#)
            .with("_ok.html", "");
        let graph = build(&source, &["index.html", "about.html"]);

        // Edge found before the parse error survives
        assert_eq!(names(graph.dependent_pages("_broken.html")), vec!["index.html"]);
        assert!(graph.dependent_pages("_never.html").is_empty());
        // Other pages are unaffected
        assert_eq!(names(graph.dependent_pages("_ok.html")), vec!["about.html"]);
    }

    #[test]
    fn test_refresh_picks_up_new_reference() {
        let mut source = MemSource::default()
            .with("_base.html", "<html></html>")
            .with("_footer.html", "<footer></footer>")
            .with("index.html", r#"{% extends "_base.html" %}"#);
        let mut graph = build(&source, &["index.html"]);
        assert!(graph.dependent_pages("_footer.html").is_empty());

        source = source.with("_base.html", r#"<html>{% include "_footer.html" %}</html>"#);
        graph.refresh("_base.html", &source, &Logger::silent());

        assert_eq!(names(graph.dependent_pages("_footer.html")), vec!["index.html"]);
    }

    #[test]
    fn test_refresh_page_drops_old_reference() {
        let mut source = MemSource::default()
            .with("_old.html", "")
            .with("_new.html", "")
            .with("index.html", r#"{% include "_old.html" %}"#);
        let mut graph = build(&source, &["index.html"]);

        source = source.with("index.html", r#"{% include "_new.html" %}"#);
        graph.refresh("index.html", &source, &Logger::silent());

        assert!(graph.dependent_pages("_old.html").is_empty());
        assert_eq!(names(graph.dependent_pages("_new.html")), vec!["index.html"]);
    }

    #[test]
    fn test_remove_page() {
        let source = MemSource::default()
            .with("_base.html", "")
            .with("index.html", r#"{% extends "_base.html" %}"#)
            .with("about.html", r#"{% extends "_base.html" %}"#);
        let mut graph = build(&source, &["index.html", "about.html"]);

        graph.remove_page(&page("about.html"));

        assert!(!graph.contains_page(&page("about.html")));
        assert_eq!(graph.len(), 1);
        assert_eq!(names(graph.dependent_pages("_base.html")), vec!["index.html"]);
    }
}

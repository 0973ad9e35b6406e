//! File system watcher for incremental rebuilds.
//!
//! Monitors the template, asset and data roots and hands debounced batches
//! of changes to [`Site::handle_batch`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│  Site::handle_batch()  │  │
//! │  │ events   │    │ (quiet)  │    │  categorize, render    │  │
//! │  └──────────┘    └──────────┘    └────────────────────────┘  │
//! │                                                              │
//! │  shutdown flag checked between batches                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    config::SiteConfig,
    debug, error, info,
    site::{Change, ChangeKind, Site},
    warn,
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
    },
    time::{Duration, Instant},
};

/// How often an idle loop looks at the shutdown flag.
const IDLE_POLL: Duration = Duration::from_millis(250);

// =============================================================================
// Event Mapping
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name == "4913"
}

/// Modified if the path is still there, deleted otherwise.
fn by_existence(path: &Path) -> ChangeKind {
    if path.exists() {
        ChangeKind::Modified
    } else {
        ChangeKind::Deleted
    }
}

/// Translate one notify event into changes, dropping noise.
fn changes_from(event: Event) -> Vec<Change> {
    let kinds: Vec<ChangeKind> = match event.kind {
        EventKind::Create(_) => vec![ChangeKind::Added; event.paths.len()],
        EventKind::Remove(_) => vec![ChangeKind::Deleted; event.paths.len()],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![ChangeKind::Deleted; event.paths.len()]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            vec![ChangeKind::Added; event.paths.len()]
        }
        // paths = [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(i, _)| if i == 0 { ChangeKind::Deleted } else { ChangeKind::Added })
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| if p.exists() { ChangeKind::Added } else { ChangeKind::Deleted })
            .collect(),
        EventKind::Modify(_) => event.paths.iter().map(|p| by_existence(p)).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .zip(kinds)
        .filter(|(path, kind)| {
            !is_temp_file(path) && (*kind == ChangeKind::Deleted || !path.is_dir())
        })
        .map(|(path, kind)| Change::new(kind, path))
        .collect()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Collects changes until the configured quiet period has passed.
struct Debouncer {
    pending: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    quiet: Duration,
}

impl Debouncer {
    fn new(quiet: Duration) -> Self {
        Self {
            pending: FxHashMap::default(),
            last_event: None,
            quiet,
        }
    }

    /// Record a change, folding it into any pending change of the same path.
    fn add(&mut self, change: Change) {
        self.last_event = Some(Instant::now());
        let previous = self.pending.get(&change.path).copied();

        let kind = match (previous, change.kind) {
            (Some(ChangeKind::Added), ChangeKind::Modified) => ChangeKind::Added,
            // Created and gone again within one batch
            (Some(ChangeKind::Added), ChangeKind::Deleted) => {
                self.pending.remove(&change.path);
                return;
            }
            // Replaced (editor backup-and-write)
            (Some(ChangeKind::Deleted), ChangeKind::Added) => ChangeKind::Modified,
            (_, kind) => kind,
        };
        self.pending.insert(change.path, kind);
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.quiet)
    }

    /// Drain pending changes, ordered by path.
    fn take(&mut self) -> Vec<Change> {
        self.last_event = None;
        let mut changes: Vec<_> = self
            .pending
            .drain()
            .map(|(path, kind)| Change::new(kind, path))
            .collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            IDLE_POLL
        } else {
            self.quiet.min(IDLE_POLL)
        }
    }
}

// =============================================================================
// Batch Handling
// =============================================================================

/// Apply one batch and log what it did.
fn apply(site: &mut Site, changes: &[Change]) {
    let log = site.logger();
    let report = site.handle_batch(changes);

    if report.is_empty() {
        debug!(log, "watch"; "{} changes, nothing to rebuild", changes.len());
        return;
    }

    let time = chrono::Local::now().format("%H:%M:%S");
    if report.failed.is_empty() {
        info!(log, "watch"; "[{time}] {}", report.summary());
    } else {
        warn!(log, "watch"; "[{time}] {}", report.summary());
    }
}

/// Drain events until shutdown or until the event source disconnects.
fn event_loop(
    rx: &Receiver<notify::Result<Event>>,
    site: &mut Site,
    shutdown: &AtomicBool,
) {
    let log = site.logger();
    let mut debouncer = Debouncer::new(Duration::from_millis(site.config().watch.debounce_ms));

    while !shutdown.load(Ordering::SeqCst) {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) => {
                for change in changes_from(event) {
                    debouncer.add(change);
                }
            }
            Ok(Err(e)) => error!(log, "watch"; "{e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                apply(site, &debouncer.take());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if !debouncer.is_empty() {
                    apply(site, &debouncer.take());
                }
                break;
            }
        }
    }
}

// =============================================================================
// Watcher Setup
// =============================================================================

/// Directories to watch and how.
///
/// The data root's parent is watched flat for sibling files like `data.yaml`.
fn watch_roots(config: &SiteConfig) -> Vec<(PathBuf, RecursiveMode)> {
    let build = &config.build;
    let mut roots: Vec<_> = [&build.templates, &build.assets, &build.data]
        .into_iter()
        .map(|p| (p.clone(), RecursiveMode::Recursive))
        .collect();

    if let Some(parent) = build.data.parent() {
        roots.push((parent.to_path_buf(), RecursiveMode::NonRecursive));
    }

    roots.retain(|(p, _)| p.is_dir());
    roots
}

/// Format absolute path as relative to root, with trailing slash.
fn format_rel(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    if rel.as_os_str().is_empty() {
        "./".to_owned()
    } else {
        format!("{}/", rel.display())
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the project and rebuild affected pages until `shutdown` is set.
pub fn watch_blocking(site: &mut Site, shutdown: &AtomicBool) -> Result<()> {
    let log = site.logger();
    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;

    let roots = watch_roots(site.config());
    for (path, mode) in &roots {
        watcher
            .watch(path, *mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    let root = site.config().get_root();
    let shown: Vec<_> = roots.iter().map(|(p, _)| format_rel(p, root)).collect();
    info!(log, "watch"; "watching {}", shown.join(", "));

    event_loop(&rx, site, shutdown);

    info!(log, "watch"; "stopped");
    Ok(())
}

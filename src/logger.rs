//! Logging handle with colored output and progress bars.
//!
//! A [`Logger`] is created once at startup and handed to everything that
//! reports progress: the [`Site`](crate::site::Site) orchestrator, the watch
//! loop and the dev server. It is a small `Copy` value, so passing it around
//! is free.
//!
//! # Routing
//!
//! | Level   | Stream                                   | Style                  |
//! |---------|------------------------------------------|------------------------|
//! | `Debug` | stdout (only with `--verbose`)           | dimmed                 |
//! | `Info`  | stdout                                   | `[module] message`     |
//! | `Warn`  | stdout                                   | yellow `WARNING:`      |
//! | `Error` | stdout, mirrored to stderr if not a TTY  | red `ERROR:`           |
//!
//! # Example
//!
//! ```ignore
//! let log = Logger::new(cli.verbose);
//! info!(log, "build"; "rendering {} pages", count);
//! warn!(log, "data"; "{} is not a data file", path.display());
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
    tty::IsTty,
};
use std::{
    fmt,
    io::{Write, stderr, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Active progress bar count (for log coordination)
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Layout Constants
// ============================================================================
//
// Progress bar format: "[module] [████░░░░] 42/100"
//                       ^------^ ^-------^ ^----^
//                       prefix   bar       count

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;
/// Bar wrapper: " []" (space + brackets around progress bar)
const BAR_WRAPPER_LEN: usize = 3;
/// Space before count: "...] 42/100" <- this space
const SPACE_BEFORE_COUNT: usize = 1;
/// Minimum progress bar width in characters
const MIN_BAR_WIDTH: usize = 10;
/// Maximum progress bar width in characters
const MAX_BAR_WIDTH: usize = 40;

#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
/// Falls back to 120 columns if detection fails.
fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Macros
// ============================================================================

/// Log a debug message (shown only with `--verbose`).
///
/// ```ignore
/// debug!(log, "watch"; "ignoring {}", path.display());
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        $logger.emit($crate::logger::Level::Debug, $module, format_args!($($arg)*))
    }};
}

/// Log an informational message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        $logger.emit($crate::logger::Level::Info, $module, format_args!($($arg)*))
    }};
}

/// Log a warning.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        $logger.emit($crate::logger::Level::Warn, $module, format_args!($($arg)*))
    }};
}

/// Log an error. The process keeps running; callers decide what fails.
#[macro_export]
macro_rules! error {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        $logger.emit($crate::logger::Level::Error, $module, format_args!($($arg)*))
    }};
}

// ============================================================================
// Logger
// ============================================================================

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Explicit logging handle.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    /// Lowest level that is printed; `None` silences everything.
    min_level: Option<Level>,
    /// Copy errors to stderr (only when stderr is not an interactive terminal).
    mirror_errors: bool,
}

impl Logger {
    /// Create the process logger.
    pub fn new(verbose: bool) -> Self {
        Self {
            min_level: Some(if verbose { Level::Debug } else { Level::Info }),
            mirror_errors: !stderr().is_tty(),
        }
    }

    /// A logger that drops every message.
    pub const fn silent() -> Self {
        Self {
            min_level: None,
            mirror_errors: false,
        }
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.min_level.is_some_and(|min| level >= min)
    }

    /// Whether progress bars should be drawn.
    pub fn is_interactive(&self) -> bool {
        self.enabled(Level::Info) && stdout().is_tty()
    }

    /// Write one message. Use the `debug!`/`info!`/`warn!`/`error!` macros instead.
    pub fn emit(&self, level: Level, module: &str, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }

        let message = args.to_string();
        let prefix = colorize_prefix(module, level);
        let body = match level {
            Level::Debug => message.dimmed().to_string(),
            Level::Info => message.clone(),
            Level::Warn => format!("WARNING: {message}").yellow().bold().to_string(),
            Level::Error => format!("ERROR: {message}").red().bold().to_string(),
        };

        write_stdout(module, &prefix, &body, level <= Level::Info);

        if level == Level::Error && self.mirror_errors {
            let mut err = stderr().lock();
            writeln!(err, "[{module}] ERROR: {message}").ok();
            err.flush().ok();
        }
    }
}

/// Print a line to stdout, keeping active progress bars below it.
#[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
fn write_stdout(module: &str, prefix: &ColoredString, body: &str, truncate: bool) {
    let mut stdout = stdout().lock();

    let bar_count = BAR_COUNT.load(Ordering::SeqCst);
    if bar_count > 0 {
        execute!(stdout, cursor::MoveUp(bar_count as u16)).ok();
        execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
    }

    // Multiline messages and problems are never cut
    if truncate && !body.contains('\n') {
        let max_len = (get_terminal_width() as usize).saturating_sub(calc_prefix_len(module.len()));
        writeln!(stdout, "{prefix} {}", truncate_str(body, max_len)).ok();
    } else {
        writeln!(stdout, "{prefix} {body}").ok();
    }

    for _ in 0..bar_count {
        writeln!(stdout).ok();
    }
    stdout.flush().ok();
}

/// Apply color to a module prefix.
#[inline]
fn colorize_prefix(module: &str, level: Level) -> ColoredString {
    let prefix = format!("[{module}]");
    match (level, module) {
        (Level::Error, _) => prefix.bright_red().bold(),
        (_, "serve") => prefix.bright_blue().bold(),
        (_, "watch") => prefix.bright_green().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress Bars
// ============================================================================

/// Multiple progress bars displayed on separate terminal lines.
///
/// Each bar occupies one line and updates in place using ANSI cursor control.
/// Uses a mutex to synchronize terminal updates from rayon workers.
pub struct ProgressBars {
    bars: Vec<ProgressBar>,
    lock: Mutex<()>,
}

struct ProgressBar {
    name: &'static str,
    prefix: ColoredString,
    prefix_len: usize,
    total: usize,
    current: AtomicUsize,
    row: usize,
}

impl ProgressBars {
    /// Create bars for `(name, total)` pairs, skipping empty ones.
    ///
    /// Returns `None` when the logger is not attached to a terminal or there
    /// is nothing worth a bar.
    pub fn new(logger: &Logger, modules: &[(&'static str, usize)]) -> Option<Self> {
        let modules: Vec<_> = modules.iter().filter(|(_, n)| *n > 0).copied().collect();
        if !logger.is_interactive() || modules.iter().map(|(_, n)| n).sum::<usize>() <= 1 {
            return None;
        }

        // Reserve terminal lines for progress bars
        let mut stdout = stdout().lock();
        for _ in 0..modules.len() {
            writeln!(stdout).ok();
        }
        stdout.flush().ok();

        BAR_COUNT.store(modules.len(), Ordering::SeqCst);

        let bars = modules
            .iter()
            .enumerate()
            .map(|(row, (name, total))| ProgressBar {
                name,
                prefix: colorize_prefix(name, Level::Info),
                prefix_len: calc_prefix_len(name.len()),
                total: *total,
                current: AtomicUsize::new(0),
                row,
            })
            .collect();

        Some(Self {
            bars,
            lock: Mutex::new(()),
        })
    }

    /// Increment the bar with the given name.
    pub fn inc(&self, name: &str) {
        if let Some(bar) = self.bars.iter().find(|b| b.name == name) {
            let current = bar.current.fetch_add(1, Ordering::Relaxed) + 1;
            self.display(bar, current);
        }
    }

    #[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
    fn display(&self, bar: &ProgressBar, current: usize) {
        let _guard = self.lock.lock().ok();

        let width = get_terminal_width() as usize;
        let progress_text = format!("{}/{}", current, bar.total);
        let overhead = bar.prefix_len + BAR_WRAPPER_LEN + SPACE_BEFORE_COUNT + progress_text.len();
        let bar_width = width.saturating_sub(overhead).clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);

        let filled = if bar.total > 0 {
            (current * bar_width) / bar.total
        } else {
            0
        };
        let progress_bar = "█".repeat(filled) + &"░".repeat(bar_width.saturating_sub(filled));

        let mut stdout = stdout().lock();
        let lines_up = (self.bars.len() - bar.row) as u16;
        execute!(stdout, cursor::MoveUp(lines_up)).ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        write!(stdout, "{} [{}] {}", bar.prefix, progress_bar, progress_text).ok();
        execute!(stdout, cursor::MoveDown(lines_up)).ok();
        write!(stdout, "\r").ok();
        stdout.flush().ok();
    }

    /// Clear all progress bars from the terminal.
    #[allow(clippy::cast_possible_truncation)]
    pub fn finish(&self) {
        if BAR_COUNT.swap(0, Ordering::SeqCst) == 0 {
            return;
        }
        let _guard = self.lock.lock().ok();

        let mut stdout = stdout().lock();
        let bars_len = self.bars.len() as u16;

        execute!(stdout, cursor::MoveUp(bars_len)).ok();
        for _ in &self.bars {
            execute!(stdout, Clear(ClearType::CurrentLine)).ok();
            execute!(stdout, cursor::MoveDown(1)).ok();
        }
        execute!(stdout, cursor::MoveUp(bars_len)).ok();
        stdout.flush().ok();
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_prefix_len() {
        // "data" -> "[data] " = 4 + 2 + 1 = 7
        assert_eq!(calc_prefix_len(4), 7);
        assert_eq!(calc_prefix_len(0), 3);
    }

    #[test]
    fn test_truncate_str_needs_truncation() {
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        // "€€" is 6 bytes (3 bytes per char)
        assert_eq!(truncate_str("€€", 4), "€");
        assert_eq!(truncate_str("a€b", 3), "a");
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_verbose_enables_debug() {
        let quiet = Logger::new(false);
        assert!(!quiet.enabled(Level::Debug));
        assert!(quiet.enabled(Level::Info));
        assert!(quiet.enabled(Level::Error));

        let verbose = Logger::new(true);
        assert!(verbose.enabled(Level::Debug));
    }

    #[test]
    fn test_emit_every_level_with_error_mirror() {
        let log = Logger {
            min_level: Some(Level::Debug),
            mirror_errors: true,
        };
        debug!(log, "test"; "debug {}", 1);
        info!(log, "test"; "info {}", 2);
        warn!(log, "test"; "warn {}", 3);
        error!(log, "test"; "error {}", 4);
    }

    #[test]
    fn test_silent_logger_drops_everything() {
        let log = Logger::silent();
        assert!(!log.enabled(Level::Error));
        assert!(!log.is_interactive());
        // Must not panic or print
        error!(log, "test"; "nothing to see {}", 42);
    }

    #[test]
    fn test_progress_bars_disabled_when_silent() {
        let log = Logger::silent();
        assert!(ProgressBars::new(&log, &[("pages", 10)]).is_none());
    }
}

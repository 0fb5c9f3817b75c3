//! Terminal logging.
//!
//! | Macro       | Shown at      |
//! |-------------|---------------|
//! | `log!`      | always        |
//! | `verbose!`  | `-v` and up   |
//! | `verbose2!` | `-vv`         |
//!
//! Every line starts with a colored `[module]` tag. `[error]` lines go to
//! stderr, everything else to stdout. [`WatchStatus`] is the rewritable
//! status block printed by the development server.
//!
//! ```ignore
//! log!("build"; "documents: {}", count);
//! verbose!("render"; "rendered: {}", path.display());
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stderr, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicU8, Ordering},
    },
};

const FALLBACK_WIDTH: u16 = 120;

static WIDTH: OnceLock<u16> = OnceLock::new();

/// 0 normal, 1 `-v`, 2 `-vv`.
static VERBOSITY: AtomicU8 = AtomicU8::new(0);

pub fn set_verbosity(level: u8) {
    VERBOSITY.store(level, Ordering::Relaxed);
}

pub fn verbosity() -> u8 {
    VERBOSITY.load(Ordering::Relaxed)
}

fn terminal_width() -> usize {
    usize::from(*WIDTH.get_or_init(|| size().map_or(FALLBACK_WIDTH, |(w, _)| w)))
}

// ============================================================================
// Macros
// ============================================================================

/// `log!("module"; "format", args...)`
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!` but only with `-v` or `-vv`.
#[macro_export]
macro_rules! verbose {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::verbosity() >= 1 {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Like `log!` but only with `-vv`.
#[macro_export]
macro_rules! verbose2 {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::verbosity() >= 2 {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Output
// ============================================================================

/// Print `message` tagged with `module`. One-line messages are clipped to
/// the terminal width.
pub fn log(module: &str, message: &str) {
    let tag = tag(module);
    let message = if message.contains('\n') {
        message
    } else {
        // "[" module "] "
        let room = terminal_width().saturating_sub(module.len() + 3);
        clip(message, room)
    };
    let line = format!("{tag} {message}\n");
    if module.eq_ignore_ascii_case("error") {
        let mut err = stderr().lock();
        err.write_all(line.as_bytes()).ok();
        err.flush().ok();
    } else {
        let mut out = stdout().lock();
        out.write_all(line.as_bytes()).ok();
        out.flush().ok();
    }
}

fn tag(module: &str) -> ColoredString {
    let tag = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "error" => tag.bright_red().bold(),
        "warn" => tag.red(),
        "serve" | "livereload" => tag.bright_blue().bold(),
        "watch" => tag.bright_green().bold(),
        _ => tag.bright_yellow().bold(),
    }
}

/// Longest prefix of `s` no more than `max` bytes long that ends on a char
/// boundary.
fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max)
        .last()
        .unwrap_or(0);
    &s[..end]
}

// ============================================================================
// Watch Status
// ============================================================================

/// Serve mode status block.
///
/// Each report replaces the previous one in place, so the terminal shows the
/// outcome of the latest change only. Call [`WatchStatus::detach`] after
/// other output has been logged to keep it from being overwritten.
pub struct WatchStatus {
    /// Height of the block printed last.
    lines: usize,
}

impl WatchStatus {
    pub const fn new() -> Self {
        Self { lines: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.show(&"✓".green(), message);
    }

    /// Report a failure; a non-empty `detail` is printed below `summary`.
    pub fn error(&mut self, summary: &str, detail: &str) {
        if detail.is_empty() {
            self.show(&"✗".red(), summary);
        } else {
            self.show(&"✗".red(), &format!("{summary}\n{detail}"));
        }
    }

    pub fn detach(&mut self) {
        self.lines = 0;
    }

    fn show(&mut self, mark: &ColoredString, message: &str) {
        let mut out = stdout().lock();
        if let Ok(up) = u16::try_from(self.lines)
            && up > 0
        {
            execute!(out, cursor::MoveUp(up), Clear(ClearType::FromCursorDown)).ok();
        }
        let time = chrono::Local::now().format("[%H:%M:%S]").to_string();
        writeln!(out, "{} {mark} {message}", time.dimmed()).ok();
        out.flush().ok();
        self.lines = message.lines().count().max(1);
    }
}

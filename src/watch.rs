//! File system watcher for serve mode.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Watcher thread                            │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌──────────┐               │
//! │  │ notify   │───▶│ filter   │───▶│ Debouncer│───▶ emit()    │
//! │  │ events   │    │          │    │  (50ms)  │               │
//! │  └──────────┘    └──────────┘    └──────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The filter drops directory events, `exclude`d content paths and anything
//! under `template/init`. The debouncer holds one event and forwards it
//! after a lull; a pending `Rename` is forwarded early when a different path
//! arrives so the dispatcher deletes before it creates.

use crate::{
    config::{ConfigSet, SiteDirs},
    site::{ChangeEvent, Op},
    utils::fsx,
    verbose, verbose2,
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use parking_lot::RwLock;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const LULL_MS: u64 = 50;
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Event Mapping
// =============================================================================

/// Translate a notify event into change events. Metadata and access events
/// yield nothing.
fn change_events(event: &Event) -> Vec<ChangeEvent> {
    let each = |op: Op| {
        event
            .paths
            .iter()
            .map(|p| ChangeEvent::new(op, p.clone()))
            .collect::<Vec<_>>()
    };
    match event.kind {
        EventKind::Create(_) => each(Op::Create),
        EventKind::Remove(_) => each(Op::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(Op::Rename),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(Op::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                ChangeEvent::new(Op::Rename, from.clone()),
                ChangeEvent::new(Op::Create, to.clone()),
            ],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let op = if p.exists() { Op::Create } else { Op::Rename };
                ChangeEvent::new(op, p.clone())
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(Op::Write),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Decides which change events reach the debouncer.
struct Filter {
    content: PathBuf,
    template: PathBuf,
    init: PathBuf,
    /// Replaced by the engine after each full build.
    configs: Arc<RwLock<ConfigSet>>,
}

impl Filter {
    fn accept(&self, path: &Path) -> bool {
        let verdict = if fsx::dir_exists(path) {
            Some("ignored")
        } else if fsx::path_is_in_dir(path, &self.content) {
            self.configs.read().exclude(path).then_some("excluded")
        } else if !fsx::path_is_in_dir(path, &self.template) || fsx::path_is_in_dir(path, &self.init) {
            Some("ignored")
        } else {
            None
        };
        verbose2!("watch"; "{}: {}", verdict.unwrap_or("accepted"), path.display());
        verdict.is_none()
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// One-slot debouncer. Each accepted event replaces the pending one and
/// restarts the lull.
#[derive(Debug)]
pub struct Debouncer {
    pending: Option<ChangeEvent>,
    deadline: Option<Instant>,
    lull: Duration,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(LULL_MS))
    }
}

impl Debouncer {
    pub fn new(lull: Duration) -> Self {
        Self {
            pending: None,
            deadline: None,
            lull,
        }
    }

    /// Hold `evt`. Returns a pending `Rename` of a different path, which
    /// must be forwarded before anything else.
    pub fn push(&mut self, evt: ChangeEvent, now: Instant) -> Option<ChangeEvent> {
        let flushed = self
            .pending
            .take()
            .filter(|prev| prev.op == Op::Rename && prev.path != evt.path);
        self.pending = Some(evt);
        self.deadline = Some(now + self.lull);
        flushed
    }

    /// The pending event once the lull has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeEvent> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// How long to wait for the next notify event.
    pub fn timeout(&self, now: Instant) -> Duration {
        self.deadline
            .map_or(IDLE_TIMEOUT, |d| d.saturating_duration_since(now))
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the content and template trees on a background thread.
///
/// `emit` receives debounced change events and watcher errors; the thread
/// exits when it returns `false`.
pub fn spawn<F>(dirs: &SiteDirs, configs: Arc<RwLock<ConfigSet>>, mut emit: F) -> Result<()>
where
    F: FnMut(Result<ChangeEvent, notify::Error>) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    for dir in [&dirs.content, &dirs.template] {
        verbose!("watch"; "watching: {}", dir.display());
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
    }
    let filter = Filter {
        content: dirs.content.clone(),
        template: dirs.template.clone(),
        init: dirs.init.clone(),
        configs,
    };

    thread::spawn(move || {
        // Dropping the watcher stops notifications.
        let _watcher = watcher;
        let mut debouncer = Debouncer::default();
        loop {
            match rx.recv_timeout(debouncer.timeout(Instant::now())) {
                Ok(Ok(event)) => {
                    verbose2!("watch"; "notify: {:?}: {:?}", event.kind, event.paths);
                    for evt in change_events(&event) {
                        if !filter.accept(&evt.path) {
                            continue;
                        }
                        if let Some(rename) = debouncer.push(evt, Instant::now())
                            && !emit(Ok(rename))
                        {
                            return;
                        }
                    }
                }
                Ok(Err(e)) => {
                    if !emit(Err(e)) {
                        return;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
            if let Some(evt) = debouncer.poll(Instant::now())
                && !emit(Ok(evt))
            {
                return;
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut e = Event::new(kind);
        for p in paths {
            e = e.add_path(PathBuf::from(p));
        }
        e
    }

    #[test]
    fn test_change_events() {
        let evts = change_events(&event(EventKind::Create(CreateKind::File), &["/c/a.md"]));
        assert_eq!(evts, vec![ChangeEvent::new(Op::Create, "/c/a.md")]);

        let evts = change_events(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/c/a.md"],
        ));
        assert_eq!(evts, vec![ChangeEvent::new(Op::Write, "/c/a.md")]);

        let evts = change_events(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/c/a.md", "/c/b.md"],
        ));
        assert_eq!(
            evts,
            vec![
                ChangeEvent::new(Op::Rename, "/c/a.md"),
                ChangeEvent::new(Op::Create, "/c/b.md"),
            ]
        );

        let evts = change_events(&event(EventKind::Remove(RemoveKind::File), &["/c/a.md"]));
        assert_eq!(evts, vec![ChangeEvent::new(Op::Remove, "/c/a.md")]);

        let evts = change_events(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/c/a.md"],
        ));
        assert!(evts.is_empty());
    }

    #[test]
    fn test_debounce_latest_wins() {
        let t0 = Instant::now();
        let lull = Duration::from_millis(50);
        let mut d = Debouncer::new(lull);
        assert_eq!(d.timeout(t0), IDLE_TIMEOUT);

        assert_eq!(d.push(ChangeEvent::new(Op::Create, "/c/a.md"), t0), None);
        assert_eq!(d.push(ChangeEvent::new(Op::Write, "/c/a.md"), t0 + lull / 2), None);
        assert_eq!(d.poll(t0 + lull), None);
        assert_eq!(
            d.poll(t0 + lull / 2 + lull),
            Some(ChangeEvent::new(Op::Write, "/c/a.md"))
        );
        assert_eq!(d.poll(t0 + lull * 4), None);
    }

    #[test]
    fn test_debounce_rename_flush() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(50));
        d.push(ChangeEvent::new(Op::Rename, "/c/a.md"), t0);
        let flushed = d.push(ChangeEvent::new(Op::Create, "/c/b.md"), t0);
        assert_eq!(flushed, Some(ChangeEvent::new(Op::Rename, "/c/a.md")));

        // A rename followed by an event on the same path is superseded.
        d.push(ChangeEvent::new(Op::Rename, "/c/x.md"), t0);
        assert_eq!(d.push(ChangeEvent::new(Op::Create, "/c/x.md"), t0), None);
        assert_eq!(
            d.poll(t0 + Duration::from_secs(1)),
            Some(ChangeEvent::new(Op::Create, "/c/x.md"))
        );
    }
}

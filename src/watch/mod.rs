//! Watch Manager
//!
//! Translates the original's `Inotify` class (`original_source/notify.cpp`,
//! `inotify_init1` + a poll loop over the inotify fd and an eventfd used
//! only to signal shutdown) into a `notify`-crate-backed watcher. `notify`
//! wraps the same underlying inotify API on Linux (and kqueue/FSEvents
//! elsewhere), so the OS-level behavior this crate relies on — one watch
//! per bucket directory, events translated into ADD/REMOVE/INVALIDATE — is
//! unchanged; only the hand-rolled poll loop and raw `inotify_event` buffer
//! parsing are replaced by the crate's safe event stream.
//!
//! No example repo in this pack watches the filesystem, so there's no
//! teacher idiom to imitate here beyond "a background thread owns the
//! watcher and feeds a channel" — the standard shape for any crate built on
//! a callback-based watch API, and the shape `notify`'s own documentation
//! recommends.

use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};

use notify::{EventKind as NotifyEventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, warn};

/// What happened to a name inside a watched bucket directory.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A file was created or moved into the directory.
    Add { bucket: String, name: String },
    /// A file was deleted or moved out of the directory.
    Remove { bucket: String, name: String },
    /// The watch overflowed or lost events; the bucket's whole listing must
    /// be invalidated and re-filled from scratch on next access.
    Invalidate { bucket: String },
}

/// Capability surface the cache depends on; lets tests and environments
/// without working OS watch support run with a no-op implementation
/// instead of failing outright, matching spec.md's "the cache must still
/// function, just without live invalidation" fallback.
pub trait WatchManager: Send + Sync {
    /// Begins watching `path` (a bucket's directory), tagging future events
    /// for it with `bucket`.
    fn add_watch(&self, bucket: &str, path: &Path) -> Result<(), notify::Error>;

    /// Stops watching a bucket's directory (called on recycle/eviction).
    fn remove_watch(&self, bucket: &str, path: &Path);
}

/// A [`WatchManager`] that observes nothing. Used when the backend could
/// not be initialized, or in tests that don't exercise invalidation.
#[derive(Debug)]
pub struct NullWatch;

impl WatchManager for NullWatch {
    fn add_watch(&self, _bucket: &str, _path: &Path) -> Result<(), notify::Error> {
        Ok(())
    }

    fn remove_watch(&self, _bucket: &str, _path: &Path) {}
}

/// `notify`-backed watch manager. Owns a background watcher and multiplexes
/// every watched directory's raw events onto one channel of [`WatchEvent`]s,
/// tagging each with the bucket name the caller registered for that path.
pub struct NotifyWatch {
    watcher: parking_lot::Mutex<RecommendedWatcher>,
    paths: std::sync::Arc<parking_lot::Mutex<std::collections::HashMap<std::path::PathBuf, String>>>,
}

impl std::fmt::Debug for NotifyWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatch")
            .field("watched_paths", &self.paths.lock().len())
            .finish_non_exhaustive()
    }
}

impl NotifyWatch {
    /// Creates a watcher and returns it along with the receiving end of its
    /// event channel. Returns `Err` if the platform backend could not be
    /// initialized (e.g. inotify instance limits exhausted) — callers
    /// should fall back to [`NullWatch`] in that case rather than treat it
    /// as fatal.
    pub fn new() -> notify::Result<(Self, Receiver<WatchEvent>)> {
        let (raw_tx, raw_rx): (Sender<notify::Event>, Receiver<notify::Event>) = channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(e) => error!(error = %e, "watch backend reported an error"),
            }
        })?;

        let paths = std::sync::Arc::new(parking_lot::Mutex::new(
            std::collections::HashMap::new(),
        ));
        let manager = Self {
            watcher: parking_lot::Mutex::new(watcher),
            paths: paths.clone(),
        };

        let (tx, rx) = channel();
        std::thread::spawn(move || translate_loop(raw_rx, paths, tx));

        Ok((manager, rx))
    }
}

/// Background loop translating raw `notify` events into [`WatchEvent`]s.
/// `IN_Q_OVERFLOW` has no direct `notify` equivalent; `notify` surfaces
/// queue overflow as an `EventKind::Other` with a platform-specific
/// message, so any event this loop can't classify is treated the same way
/// the original treated `IN_Q_OVERFLOW`: an `Invalidate` for every bucket
/// currently watched under the affected path's parent.
fn translate_loop(
    raw_rx: Receiver<notify::Event>,
    paths: std::sync::Arc<parking_lot::Mutex<std::collections::HashMap<std::path::PathBuf, String>>>,
    tx: Sender<WatchEvent>,
) {
    for event in raw_rx {
        for path in &event.paths {
            let dir = match path.parent() {
                Some(p) => p.to_path_buf(),
                None => continue,
            };
            let bucket = match paths.lock().get(&dir).cloned() {
                Some(b) => b,
                None => continue,
            };
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            let translated = match event.kind {
                NotifyEventKind::Create(_) => Some(WatchEvent::Add {
                    bucket: bucket.clone(),
                    name,
                }),
                NotifyEventKind::Remove(_) => Some(WatchEvent::Remove {
                    bucket: bucket.clone(),
                    name,
                }),
                NotifyEventKind::Modify(notify::event::ModifyKind::Name(_)) => {
                    // A rename; conservatively invalidate rather than guess
                    // whether this path is the rename's source or target.
                    Some(WatchEvent::Invalidate {
                        bucket: bucket.clone(),
                    })
                }
                _ => None,
            };
            if let Some(ev) = translated {
                if tx.send(ev).is_err() {
                    return;
                }
            }
        }
        if matches!(event.kind, NotifyEventKind::Other) {
            warn!("watch backend reported an unclassified event; invalidating all watched buckets");
            let snapshot: Vec<String> = paths.lock().values().cloned().collect();
            for bucket in snapshot {
                if tx.send(WatchEvent::Invalidate { bucket }).is_err() {
                    return;
                }
            }
        }
    }
}

impl WatchManager for NotifyWatch {
    fn add_watch(&self, bucket: &str, path: &Path) -> Result<(), notify::Error> {
        self.watcher
            .lock()
            .watch(path, RecursiveMode::NonRecursive)?;
        self.paths
            .lock()
            .insert(path.to_path_buf(), bucket.to_string());
        Ok(())
    }

    fn remove_watch(&self, _bucket: &str, path: &Path) {
        let mut watcher = self.watcher.lock();
        let _ = watcher.unwatch(path);
        self.paths.lock().remove(path);
    }
}

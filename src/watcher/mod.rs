//! Debounced filesystem watcher (spec §4.5).
//!
//! One long-lived `notify` watcher per enabled root feeds a pending-path set
//! guarded by a mutex; a debounce timer resets on every event and, on fire,
//! drains the set atomically (`mem::take`) and fans the snapshot out to
//! subscribers concurrently, isolating per-subscriber failures.

use crate::error::{WatcherError, WatcherResult};
use crate::ignore::IgnoreMatcher;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::collections::HashSet;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// A change a subscriber should react to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File created or modified; the subscriber should re-index/re-scan it.
    Changed,
    /// File removed; the subscriber should clear any derived state for it.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// A subscriber callback invoked with one debounce cycle's drained changes.
pub type Subscriber = Arc<dyn Fn(Vec<Change>) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub enabled: bool,
    pub watched_roots: Vec<PathBuf>,
    pub directory_count: u64,
    pub debounce: Duration,
    pub pending_files: u64,
}

struct Pending {
    changes: HashSet<Change>,
}

/// Watches one or more roots and dispatches debounced change batches to
/// subscribers. Holding the `notify` watcher handles alive is what keeps the
/// filesystem watch active; `stop` drops them.
pub struct Watcher {
    root: PathBuf,
    ignore: Arc<IgnoreMatcher>,
    debounce: Duration,
    enabled: bool,
    pending: Arc<Mutex<Pending>>,
    subscribers: Vec<Subscriber>,
    _handles: Vec<RecommendedWatcher>,
    debounce_task: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Registers filesystem watches on `root` and spawns the debounce task.
    /// Subscribers are notified after `debounce` of inactivity following the
    /// last observed change.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Watch` if `notify` cannot register a watch on
    /// `root`.
    pub fn start(
        root: &Path,
        ignore: Arc<IgnoreMatcher>,
        debounce: Duration,
        subscribers: Vec<Subscriber>,
    ) -> WatcherResult<Self> {
        let pending = Arc::new(Mutex::new(Pending { changes: HashSet::new() }));
        let (tx, rx) = mpsc::unbounded_channel::<Change>();

        let ignore_for_events = ignore.clone();
        let root_owned = root.to_path_buf();
        let mut handle = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    error!("watcher event error: {err}");
                    return;
                }
            };
            let kind = match event.kind {
                EventKind::Remove(_) => ChangeKind::Removed,
                EventKind::Create(_) | EventKind::Modify(_) => ChangeKind::Changed,
                _ => return,
            };
            for path in event.paths {
                let Ok(rel) = path.strip_prefix(&root_owned) else {
                    continue;
                };
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                let is_dir = kind == ChangeKind::Changed && path.is_dir();
                if ignore_for_events.should_ignore(&rel_str, is_dir) {
                    continue;
                }
                let _ = tx.send(Change { path: path.clone(), kind: kind.clone() });
            }
        })
        .map_err(|source| WatcherError::Watch { path: root.to_path_buf(), source })?;

        handle.watch(root, RecursiveMode::Recursive).map_err(|source| WatcherError::Watch {
            path: root.to_path_buf(),
            source,
        })?;

        let debounce_task = spawn_debounce_loop(rx, pending.clone(), debounce, subscribers.clone());

        Ok(Self {
            root: root.to_path_buf(),
            ignore,
            debounce,
            enabled: true,
            pending,
            subscribers,
            _handles: vec![handle],
            debounce_task: Some(debounce_task),
        })
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        let pending_files = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .changes
            .len() as u64;
        Stats {
            enabled: self.enabled,
            watched_roots: vec![self.root.clone()],
            directory_count: count_dirs(&self.root, &self.ignore),
            debounce: self.debounce,
            pending_files,
        }
    }

    /// Cancels the debounce timer, drains and dispatches any pending changes
    /// one final time, and drops the filesystem watch handles.
    pub async fn stop(mut self) {
        self.enabled = false;
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
        let remaining = {
            let mut guard = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            mem::take(&mut guard.changes)
        };
        if !remaining.is_empty() {
            dispatch(remaining.into_iter().collect(), &self.subscribers).await;
        }
    }
}

fn spawn_debounce_loop(
    mut rx: mpsc::UnboundedReceiver<Change>,
    pending: Arc<Mutex<Pending>>,
    debounce: Duration,
    subscribers: Vec<Subscriber>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(first) = rx.recv().await else {
                return;
            };
            {
                let mut guard = pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                guard.changes.insert(first);
            }
            loop {
                tokio::select! {
                    next = rx.recv() => {
                        match next {
                            Some(change) => {
                                let mut guard = pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                                guard.changes.insert(change);
                            }
                            None => return,
                        }
                    }
                    () = tokio::time::sleep(debounce) => break,
                }
            }
            let drained = {
                let mut guard = pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                mem::take(&mut guard.changes)
            };
            if !drained.is_empty() {
                dispatch(drained.into_iter().collect(), &subscribers).await;
            }
        }
    })
}

async fn dispatch(changes: Vec<Change>, subscribers: &[Subscriber]) {
    let mut tasks = Vec::with_capacity(subscribers.len());
    for subscriber in subscribers {
        let subscriber = subscriber.clone();
        let batch = changes.clone();
        tasks.push(tokio::spawn(async move {
            subscriber(batch);
        }));
    }
    for task in tasks {
        if let Err(err) = task.await {
            warn!("watcher subscriber panicked: {err}");
        }
    }
}

fn count_dirs(root: &Path, ignore: &IgnoreMatcher) -> u64 {
    let mut count = 0u64;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let (skip_entry, skip_subtree) = ignore.walk_entry(&path, true);
            if skip_entry {
                if !skip_subtree {
                    stack.push(path);
                }
                continue;
            }
            count += 1;
            stack.push(path);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn changed_file_triggers_subscriber_after_debounce() {
        let dir = tempdir().unwrap();
        let ignore = Arc::new(IgnoreMatcher::new(dir.path()).unwrap());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let subscriber: Subscriber = Arc::new(move |changes| {
            seen_clone.fetch_add(changes.len(), Ordering::SeqCst);
        });

        let watcher = Watcher::start(
            dir.path(),
            ignore,
            Duration::from_millis(50),
            vec![subscriber],
        )
        .unwrap();

        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(seen.load(Ordering::SeqCst) > 0);
        watcher.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_drains_pending_changes_once_more() {
        let dir = tempdir().unwrap();
        let ignore = Arc::new(IgnoreMatcher::new(dir.path()).unwrap());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let subscriber: Subscriber = Arc::new(move |changes| {
            seen_clone.fetch_add(changes.len(), Ordering::SeqCst);
        });

        let watcher = Watcher::start(
            dir.path(),
            ignore,
            Duration::from_secs(3600),
            vec![subscriber],
        )
        .unwrap();

        std::fs::write(dir.path().join("b.txt"), "hello").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        watcher.stop().await;

        assert!(seen.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn stats_report_enabled_and_debounce() {
        let dir = tempdir().unwrap();
        let ignore = Arc::new(IgnoreMatcher::new(dir.path()).unwrap());
        let stats = Stats {
            enabled: true,
            watched_roots: vec![dir.path().to_path_buf()],
            directory_count: count_dirs(dir.path(), &ignore),
            debounce: Duration::from_secs(30),
            pending_files: 0,
        };
        assert!(stats.enabled);
        assert_eq!(stats.debounce, Duration::from_secs(30));
    }
}

//! Startup scan and live re-indexing of the watched folders.
//!
//! A [`Monitor`] registers a recursive watcher per root, scans every
//! root once, and then re-indexes supported files as they are created
//! or modified. Events raised during the scan wait in the channel. Events for a path are debounced so the file is read only
//! after the writer producing them has gone quiet. All indexing runs on
//! the monitor's own thread, one file at a time, through the shared
//! [`IndexService`].

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        Mutex,
        PoisonError,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::{
    config::DEFAULT_DEBOUNCE_MS,
    debounce::Debouncer,
    error::{Error, Result},
    ingestion::{self, IngestReport},
    tantivy_index::IndexService,
    walker,
};

/// Consecutive index write failures after which the monitor gives up.
pub const MAX_WRITE_FAILURES: u32 = 3;

/// Lifecycle of a watched root.
///
/// `Idle → ScanTriggered → Extracting → Indexed → Idle`. A root is
/// `ScanTriggered` while it has changes waiting out their quiet period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootState {
    Idle,
    ScanTriggered,
    Extracting,
    Indexed,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// Quiet period before a changed file is re-read.
    pub debounce: Duration,
    /// Consecutive write failures tolerated before stopping.
    pub max_write_failures: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            max_write_failures: MAX_WRITE_FAILURES,
        }
    }
}

/// Messages consumed by the monitor thread.
#[derive(Debug)]
pub enum MonitorMessage {
    Fs(notify::Result<Event>),
    Shutdown,
}

/// Shared, observable state of every root.
#[derive(Debug, Clone, Default)]
pub struct RootStates {
    inner: Arc<Mutex<HashMap<PathBuf, RootState>>>,
}

impl RootStates {
    pub fn new(roots: &[PathBuf]) -> Self {
        let states = roots
            .iter()
            .map(|root| (root.clone(), RootState::Idle))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(states)),
        }
    }

    pub fn get(&self, root: &Path) -> Option<RootState> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(root)
            .copied()
    }

    fn set(&self, root: &Path, state: RootState) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = map.get_mut(root)
            && *current != state
        {
            debug!(root = %root.display(), from = ?*current, to = ?state, "root state");
            *current = state;
        }
    }
}

/// Canonicalize the roots to watch, dropping duplicates.
///
/// Scanning and watching both use the canonical form, so a file is keyed
/// by the same path no matter which one reports it.
pub fn canonical_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut canonical = Vec::with_capacity(roots.len());
    for root in roots {
        let path = root.canonicalize()?;
        if !canonical.contains(&path) {
            canonical.push(path);
        }
    }
    Ok(canonical)
}

/// Index every supported file under a root and commit once.
///
/// A root that cannot be listed is logged and counts as empty; writer
/// failures are returned.
pub fn scan_root(
    service: &IndexService,
    root: &Path,
    states: &RootStates,
) -> Result<IngestReport> {
    states.set(root, RootState::ScanTriggered);
    let files = match walker::discover_files(root) {
        Ok(files) => files,
        Err(e) => {
            warn!(root = %root.display(), "cannot scan folder: {e}");
            states.set(root, RootState::Idle);
            return Ok(IngestReport::default());
        }
    };

    states.set(root, RootState::Extracting);
    let report = ingestion::ingest_files(service, &files);
    match &report {
        Ok(r) => {
            states.set(root, RootState::Indexed);
            info!(
                root = %root.display(),
                indexed = r.indexed,
                skipped = r.skipped,
                "scan complete"
            );
        }
        Err(e) => error!(root = %root.display(), "scan failed: {e}"),
    }
    states.set(root, RootState::Idle);
    report
}

/// Scan every root in turn, summing the results.
pub fn initial_scan(
    service: &IndexService,
    roots: &[PathBuf],
    states: &RootStates,
) -> Result<IngestReport> {
    let mut total = IngestReport::default();
    for root in roots {
        let report = scan_root(service, root, states)?;
        total.indexed += report.indexed;
        total.skipped += report.skipped;
    }
    Ok(total)
}

/// Create and modify events become re-index requests; everything else
/// (removals, access, metadata-less noise) is ignored.
fn changed_paths(event: &Event) -> impl Iterator<Item = &PathBuf> {
    let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    event
        .paths
        .iter()
        .filter(move |path| relevant && walker::is_candidate(path))
}

fn root_of<'a>(roots: &'a [PathBuf], path: &Path) -> Option<&'a PathBuf> {
    roots.iter().find(|root| path.starts_with(root))
}

/// A running monitor. Dropping it without [`stop`](Self::stop) leaves
/// the thread to exit when the watcher goes away.
pub struct Monitor {
    roots: Vec<PathBuf>,
    states: RootStates,
    sender: Sender<MonitorMessage>,
    watcher: Option<RecommendedWatcher>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Monitor {
    /// Start watching every root, then scan them.
    ///
    /// Watching first means a file written while the scan runs is
    /// indexed by the worker afterwards instead of being missed.
    pub fn start(
        service: Arc<IndexService>,
        roots: &[PathBuf],
        options: MonitorOptions,
    ) -> Result<Self> {
        let roots = canonical_roots(roots)?;
        let states = RootStates::new(&roots);

        let (sender, receiver) = mpsc::channel();
        let events = sender.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<Event>| {
                // The receiver is gone once the monitor has stopped.
                let _ = events.send(MonitorMessage::Fs(res));
            },
        )?;
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!(root = %root.display(), "watching");
        }

        initial_scan(&service, &roots, &states)?;

        let worker = Worker {
            service,
            roots: roots.clone(),
            states: states.clone(),
            debouncer: Debouncer::new(options.debounce),
            failures: 0,
            max_failures: options.max_write_failures.max(1),
        };
        let handle = std::thread::Builder::new()
            .name("docwatch-monitor".to_string())
            .spawn(move || worker.run(receiver))?;

        Ok(Self {
            roots,
            states,
            sender,
            watcher: Some(watcher),
            handle: Some(handle),
        })
    }

    /// Canonical roots being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Current state of a watched root.
    pub fn root_state(&self, root: &Path) -> Option<RootState> {
        let canonical = root.canonicalize().ok()?;
        self.states.get(&canonical)
    }

    /// Whether the monitor thread has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Unregister the watches, stop the thread and return its outcome.
    ///
    /// A change still waiting out its quiet period is dropped; a file
    /// being indexed finishes first.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut watcher) = self.watcher.take() {
            for root in &self.roots {
                if let Err(e) = watcher.unwatch(root) {
                    debug!(root = %root.display(), "unwatch failed: {e}");
                }
            }
        }
        let _ = self.sender.send(MonitorMessage::Shutdown);

        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(Error::Io(io::Error::other("monitor thread panicked")))
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

struct Worker {
    service: Arc<IndexService>,
    roots: Vec<PathBuf>,
    states: RootStates,
    debouncer: Debouncer,
    failures: u32,
    max_failures: u32,
}

impl Worker {
    fn run(mut self, receiver: Receiver<MonitorMessage>) -> Result<()> {
        loop {
            let message = match self.debouncer.next_deadline() {
                Some(deadline) => receiver.recv_timeout(
                    deadline.saturating_duration_since(Instant::now()),
                ),
                None => receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match message {
                Ok(MonitorMessage::Fs(Ok(event))) => self.record(&event),
                Ok(MonitorMessage::Fs(Err(e))) => warn!("watch error: {e}"),
                Ok(MonitorMessage::Shutdown)
                | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            for path in self.debouncer.due(Instant::now()) {
                self.process(&path)?;
            }
        }

        if !self.debouncer.is_empty() {
            debug!(pending = self.debouncer.len(), "dropping pending changes");
        }
        info!("monitor stopped");
        Ok(())
    }

    fn record(&mut self, event: &Event) {
        let now = Instant::now();
        for path in changed_paths(event) {
            let Some(root) = root_of(&self.roots, path) else {
                continue;
            };
            debug!(path = %path.display(), kind = ?event.kind, "change");
            self.states.set(root, RootState::ScanTriggered);
            self.debouncer.record(path, now);
        }
    }

    /// Re-index one path. Only index write failures escape, and only
    /// once they have happened `max_failures` times in a row.
    fn process(&mut self, path: &Path) -> Result<()> {
        let root = root_of(&self.roots, path).cloned();
        if let Some(root) = &root {
            self.states.set(root, RootState::Extracting);
        }

        let outcome = if path.is_file() {
            ingestion::index_file(&self.service, path).map(|_| ())
        } else {
            debug!(path = %path.display(), "file vanished before indexing");
            Ok(())
        };

        let result = match outcome {
            Ok(()) => {
                self.failures = 0;
                Ok(())
            }
            Err(e) if e.is_index_write() => {
                self.failures += 1;
                error!(
                    path = %path.display(),
                    failures = self.failures,
                    "index write failed: {e}"
                );
                if self.failures >= self.max_failures {
                    error!("too many index write failures, stopping monitor");
                    Err(e)
                } else {
                    Ok(())
                }
            }
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "file vanished before indexing");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), "dropping change: {e}");
                Ok(())
            }
        };

        if let Some(root) = &root {
            self.states.set(root, RootState::Indexed);
            if self.debouncer.has_pending_under(root) {
                self.states.set(root, RootState::ScanTriggered);
            } else {
                self.states.set(root, RootState::Idle);
            }
        }
        result
    }
}

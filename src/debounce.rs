use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// A path that keeps changing is still re-read after this many delays.
pub const MAX_WAIT_FACTOR: u32 = 10;

/// Per-path quiet-period tracker.
///
/// Every recorded event pushes the path's deadline to `now + delay`; a
/// path becomes due once no event has been recorded for it for a full
/// delay, or once `MAX_WAIT_FACTOR` delays have passed since its first
/// pending event. Time is passed in so the logic can be driven without
/// sleeping.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    max_wait: Duration,
    pending: HashMap<PathBuf, Pending>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    first_seen: Instant,
    deadline: Instant,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_wait: delay * MAX_WAIT_FACTOR,
            pending: HashMap::new(),
        }
    }

    /// Note an event for `path` at `now`.
    pub fn record(&mut self, path: &Path, now: Instant) {
        let pending =
            self.pending.entry(path.to_path_buf()).or_insert(Pending {
                first_seen: now,
                deadline: now,
            });
        let quiet = now + self.delay;
        pending.deadline = quiet.min(pending.first_seen + self.max_wait);
    }

    /// Remove and return the paths whose deadline is at or before `now`,
    /// sorted.
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    /// The earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    /// Whether any pending path lies under `dir`.
    pub fn has_pending_under(&self, dir: &Path) -> bool {
        self.pending.keys().any(|path| path.starts_with(dir))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

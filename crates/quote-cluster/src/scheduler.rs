//! Keyed one-shot timers shared by the election engine

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Timers the engine keeps at most one of at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Start-up leader discovery probe
    Discovery,
    /// Own candidacy after answering OK to a junior node
    Reassert,
    /// Re-election when an awaited COORDINATOR never arrives
    CoordinatorWait,
}

type TimerTable = HashMap<TimerKey, (u64, JoinHandle<()>)>;

/// Shared timer service.
///
/// A timer that fires first detaches itself from the table and only then runs
/// its body, so transitions triggered by the body never abort it. Dropping the
/// scheduler (or calling [`Scheduler::shutdown`]) aborts every pending timer.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Arc<Mutex<TimerTable>>,
    generation: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(timers: &Mutex<TimerTable>) -> MutexGuard<'_, TimerTable> {
        timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `task` after `delay`, replacing any pending timer under `key`
    pub fn schedule<F>(&self, key: TimerKey, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut table = Self::table(&self.timers);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut table = Self::table(&timers);
                match table.get(&key) {
                    Some((current, _)) if *current == generation => {
                        table.remove(&key);
                    }
                    _ => return,
                }
            }
            task.await;
        });

        if let Some((_, previous)) = table.insert(key, (generation, handle)) {
            debug!("Replacing pending {:?} timer", key);
            previous.abort();
        }
    }

    /// Like [`Scheduler::schedule`] but keeps an already pending timer.
    ///
    /// Returns whether a new timer was armed.
    pub fn schedule_if_idle<F>(&self, key: TimerKey, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_scheduled(key) {
            return false;
        }
        self.schedule(key, delay, task);
        true
    }

    /// Abort the pending timer under `key`, if any
    pub fn cancel(&self, key: TimerKey) -> bool {
        match Self::table(&self.timers).remove(&key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: TimerKey) -> bool {
        Self::table(&self.timers).contains_key(&key)
    }

    /// Abort every pending timer
    pub fn shutdown(&self) {
        let mut table = Self::table(&self.timers);
        for (_, (_, handle)) in table.drain() {
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

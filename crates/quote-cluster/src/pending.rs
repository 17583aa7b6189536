//! Registry of elections still waiting for an OK

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Elections started by this node that have not yet resolved.
///
/// Each entry carries a one-shot completion signal. An entry lives exactly as
/// long as the [`PendingGuard`] returned by [`PendingElections::register`].
#[derive(Debug, Clone, Default)]
pub struct PendingElections {
    entries: Arc<DashMap<String, oneshot::Sender<()>>>,
}

impl PendingElections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register election `election_id` and return its guard and completion signal
    pub fn register<S: Into<String>>(&self, election_id: S) -> (PendingGuard, oneshot::Receiver<()>) {
        let election_id = election_id.into();
        let (tx, rx) = oneshot::channel();
        self.entries.insert(election_id.clone(), tx);

        let guard = PendingGuard {
            election_id,
            entries: Arc::clone(&self.entries),
        };
        (guard, rx)
    }

    /// Complete election `election_id`.
    ///
    /// Returns `false` when the election is unknown or already resolved.
    pub fn resolve(&self, election_id: &str) -> bool {
        match self.entries.remove(election_id) {
            Some((_, tx)) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn contains(&self, election_id: &str) -> bool {
        self.entries.contains_key(election_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes its election from the registry when dropped
#[derive(Debug)]
pub struct PendingGuard {
    election_id: String,
    entries: Arc<DashMap<String, oneshot::Sender<()>>>,
}

impl PendingGuard {
    pub fn election_id(&self) -> &str {
        &self.election_id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.election_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_signals_waiter() {
        let pending = PendingElections::new();
        let (_guard, rx) = pending.register("e1");

        assert!(pending.resolve("e1"));
        assert!(rx.await.is_ok());
        assert!(!pending.contains("e1"));
    }

    #[test]
    fn test_resolve_is_single_shot() {
        let pending = PendingElections::new();
        let (_guard, _rx) = pending.register("e1");

        assert!(pending.resolve("e1"));
        assert!(!pending.resolve("e1"));
        assert!(!pending.resolve("unknown"));
    }

    #[test]
    fn test_guard_drop_removes_entry() {
        let pending = PendingElections::new();
        let (guard, _rx) = pending.register("e1");
        assert_eq!(guard.election_id(), "e1");
        assert_eq!(pending.len(), 1);

        drop(guard);
        assert!(pending.is_empty());
        assert!(!pending.resolve("e1"));
    }
}

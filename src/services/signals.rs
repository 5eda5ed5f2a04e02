//! Completion signals for uploads that finish through a pass-through callback.
//!
//! The uploader subscribes with the callback key before handing the upload
//! URL to the client and awaits the receiver; the callback fires it.

use dashmap::DashMap;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct CompletionSignals {
    waiters: DashMap<String, oneshot::Sender<()>>,
}

impl CompletionSignals {
    /// Register interest in `key`. A second subscription replaces the first,
    /// whose receiver then resolves with an error.
    pub fn subscribe(&self, key: &str) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(key.to_string(), tx);
        rx
    }

    /// Fire the signal for `key`. Returns whether anyone was still waiting.
    pub fn finish(&self, key: &str) -> bool {
        match self.waiters.remove(key) {
            Some((_, tx)) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Forget waiters whose receiver has been dropped. Returns how many went.
    pub fn prune_closed(&self) -> usize {
        let before = self.waiters.len();
        self.waiters.retain(|_, tx| !tx.is_closed());
        before.saturating_sub(self.waiters.len())
    }

    pub fn pending(&self) -> usize {
        self.waiters.len()
    }
}

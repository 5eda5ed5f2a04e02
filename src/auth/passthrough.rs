//! Providers whose callbacks carry no signature.
//!
//! OneDrive and COS callbacks are trusted purely because they present a
//! one-time callback key, which the dispatcher has already consumed by the
//! time this verifier runs. Anyone who learns an unconsumed key can complete
//! that upload.

use std::sync::Arc;
use tracing::debug;

use crate::services::signals::CompletionSignals;

pub struct PassThroughVerifier {
    signals: Option<Arc<CompletionSignals>>,
}

impl PassThroughVerifier {
    /// Accepts and wakes whoever is waiting on the callback key.
    pub fn with_signals(signals: Arc<CompletionSignals>) -> Self {
        Self {
            signals: Some(signals),
        }
    }

    /// Accepts without telling anyone.
    pub fn silent() -> Self {
        Self { signals: None }
    }

    pub fn complete(&self, key: &str) {
        if let Some(signals) = &self.signals {
            let delivered = signals.finish(key);
            debug!(key, delivered, "Sent upload completion signal");
        }
    }
}

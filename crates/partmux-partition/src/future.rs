use std::sync::{Arc, OnceLock};

use crate::channel::StreamChannel;

/// How a handshake ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Completed,
    Failed(String),
}

/// One-shot completion of a stream handshake.
///
/// Clones share the same outcome. The first `succeed`/`fail` wins; later
/// calls return `false` and change nothing.
#[derive(Debug, Clone)]
pub struct HandshakeFuture {
    channel: StreamChannel,
    outcome: Arc<OnceLock<HandshakeOutcome>>,
}

impl HandshakeFuture {
    pub fn new(channel: StreamChannel) -> Self {
        Self {
            channel,
            outcome: Arc::new(OnceLock::new()),
        }
    }

    /// The channel whose handshake this future tracks.
    pub fn channel(&self) -> &StreamChannel {
        &self.channel
    }

    pub fn succeed(&self) -> bool {
        self.outcome.set(HandshakeOutcome::Completed).is_ok()
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.outcome
            .set(HandshakeOutcome::Failed(reason.into()))
            .is_ok()
    }

    pub fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome.get(), Some(HandshakeOutcome::Completed))
    }

    pub fn outcome(&self) -> Option<&HandshakeOutcome> {
        self.outcome.get()
    }
}

//! The ordered message log.
//!
//! Every transition publishes a complete new snapshot on a `watch` channel,
//! so subscribers never observe a half-applied `replace_tail`.

use std::sync::Arc;
use tokio::sync::watch;

use crate::state::Message;

/// Immutable view of the conversation at one point in time.
pub type Transcript = Arc<[Message]>;

pub struct ConversationStore {
    tx: watch::Sender<Transcript>,
}

impl ConversationStore {
    /// New log holding only `seed`.
    pub fn new(seed: Message) -> Self {
        let (tx, _rx) = watch::channel(Transcript::from(vec![seed]));
        Self { tx }
    }

    pub fn append(&self, message: Message) {
        self.tx.send_modify(|transcript| {
            let mut next = transcript.to_vec();
            next.push(message);
            *transcript = next.into();
        });
    }

    /// Drop the last `drop_count` entries and append `message` in one step.
    /// Dropping more entries than exist empties the log first.
    pub fn replace_tail(&self, drop_count: usize, message: Message) {
        self.tx.send_modify(|transcript| {
            let keep = transcript.len().saturating_sub(drop_count);
            let mut next = transcript[..keep].to_vec();
            next.push(message);
            *transcript = next.into();
        });
    }

    pub fn current(&self) -> Transcript {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.tx.subscribe()
    }

    /// Discard the conversation and start again from `seed`.
    pub fn reset(&self, seed: Message) {
        self.tx.send_replace(Transcript::from(vec![seed]));
    }
}

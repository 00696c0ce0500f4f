//! One conversation and its send cycle.
//!
//! A cycle goes `Idle -> Sending -> {Settled, RolledBack}`. The busy flag is
//! held by a [`BusyGuard`] for the whole of `Sending` and released by its
//! `Drop`, so every exit path (including a panicking answerer) frees it.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::remote::{Answerer, SendError};
use crate::state::{ChatRequest, Message, GREETING};
use crate::store::{ConversationStore, Transcript};

/// What happens to the user's question when its cycle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Keep the question and put the error below it.
    #[default]
    RetainQuery,
    /// Replace the question with the error.
    DropQuery,
}

impl RollbackPolicy {
    pub fn drop_count(&self) -> usize {
        match self {
            RollbackPolicy::RetainQuery => 0,
            RollbackPolicy::DropQuery => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
}

/// Terminal state of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Settled,
    RolledBack(SendError),
}

struct Shared {
    store: ConversationStore,
    busy: AtomicBool,
    answerer: Arc<dyn Answerer>,
    clock: Arc<dyn Clock>,
    rollback: RollbackPolicy,
}

impl Shared {
    fn seed(&self) -> Message {
        Message::assistant(GREETING, self.clock.now())
    }
}

struct BusyGuard {
    shared: Arc<Shared>,
}

impl BusyGuard {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                shared: Arc::clone(shared),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.shared.busy.store(false, Ordering::Release);
    }
}

/// A cycle that has passed its guards and appended the user's message.
struct Cycle {
    guard: BusyGuard,
    request: ChatRequest,
}

impl Cycle {
    async fn run(self) -> CycleOutcome {
        let shared = &self.guard.shared;

        let result = AssertUnwindSafe(shared.answerer.answer(&self.request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                warn!("answerer panicked");
                Err(SendError::Unclassified)
            });

        match result {
            Ok(answer) => {
                shared
                    .store
                    .append(Message::assistant(answer, shared.clock.now()));
                info!("answer received");
                CycleOutcome::Settled
            }
            Err(err) => {
                warn!(error = %err, policy = ?shared.rollback, "send cycle failed");
                shared.store.replace_tail(
                    shared.rollback.drop_count(),
                    Message::assistant(err.to_string(), shared.clock.now()),
                );
                CycleOutcome::RolledBack(err)
            }
        }
    }
}

/// A conversation with the answering service. Cheap to clone; clones share
/// the same transcript and busy flag.
#[derive(Clone)]
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl ChatSession {
    pub fn new(
        answerer: Arc<dyn Answerer>,
        clock: Arc<dyn Clock>,
        rollback: RollbackPolicy,
    ) -> Self {
        let seed = Message::assistant(GREETING, clock.now());
        Self {
            shared: Arc::new(Shared {
                store: ConversationStore::new(seed),
                busy: AtomicBool::new(false),
                answerer,
                clock,
                rollback,
            }),
        }
    }

    /// Start a cycle for the text in `draft`, clearing it.
    ///
    /// Returns `None` without touching anything when the draft is blank or a
    /// cycle is already outstanding. The request runs on a spawned task; its
    /// result lands in the transcript.
    pub fn submit(&self, draft: &mut String) -> Option<JoinHandle<CycleOutcome>> {
        let cycle = self.begin(draft)?;
        Some(tokio::spawn(cycle.run()))
    }

    /// Run one cycle for `query` to completion. `None` means it was refused.
    pub async fn ask(&self, query: &str) -> Option<CycleOutcome> {
        let mut draft = query.to_string();
        let cycle = self.begin(&mut draft)?;
        Some(cycle.run().await)
    }

    fn begin(&self, draft: &mut String) -> Option<Cycle> {
        if draft.trim().is_empty() {
            return None;
        }
        let guard = BusyGuard::acquire(&self.shared)?;
        let query = std::mem::take(draft);

        // History is everything before this question.
        let request = ChatRequest::new(query.clone(), &self.shared.store.current());
        info!(history = request.history.len(), "query submitted");

        self.shared
            .store
            .append(Message::user(query, self.shared.clock.now()));

        Some(Cycle { guard, request })
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> Phase {
        if self.is_busy() {
            Phase::Sending
        } else {
            Phase::Idle
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.shared.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.shared.store.subscribe()
    }

    /// Start over from the greeting. Refused while a cycle is outstanding.
    pub fn reset(&self) -> bool {
        let Some(_guard) = BusyGuard::acquire(&self.shared) else {
            return false;
        };
        self.shared.store.reset(self.shared.seed());
        true
    }
}

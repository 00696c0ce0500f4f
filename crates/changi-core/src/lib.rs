pub mod clock;
pub mod config;
pub mod remote;
pub mod render;
pub mod session;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use clock::{Clock, HourFormat, LocalClock};
pub use config::Config;
pub use remote::{Answerer, HttpAnswerer, SendError, DEFAULT_ENDPOINT};
pub use render::{render, segments, Segment};
pub use session::{ChatSession, CycleOutcome, Phase, RollbackPolicy};
pub use state::{ChatRequest, HistoryEntry, Message, Role, GREETING};
pub use store::{ConversationStore, Transcript};

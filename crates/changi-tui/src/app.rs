use changi_core::{ChatSession, CycleOutcome, Transcript};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Shown once at startup until the user acknowledges it.
pub const NOTICE: &str = "This assistant answers questions about Changi Airport from publicly \
available information. Answers can be incomplete or out of date, so please confirm flight \
and terminal details with official sources.";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: ChatSession,
    pub endpoint: String,
    pub show_notice: bool,

    // Input state
    pub draft: String,
    pub cursor: usize, // character index into draft

    // Transcript state
    pub transcript_rx: watch::Receiver<Transcript>,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub follow_bottom: bool,

    // Outstanding request, polled on every event
    pub pending: Option<JoinHandle<CycleOutcome>>,
    pub animation_frame: u8,
}

impl App {
    pub fn new(session: ChatSession, endpoint: String) -> Self {
        let transcript_rx = session.subscribe();
        Self {
            should_quit: false,
            session,
            endpoint,
            show_notice: true,
            draft: String::new(),
            cursor: 0,
            transcript_rx,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_bottom: true,
            pending: None,
            animation_frame: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// Acknowledge the startup notice. It never comes back.
    pub fn dismiss_notice(&mut self) {
        self.show_notice = false;
    }

    /// Hand the draft to the session. The draft is cleared right away so the
    /// next question can be typed while this one is outstanding.
    pub fn submit(&mut self) {
        if let Some(handle) = self.session.submit(&mut self.draft) {
            self.cursor = 0;
            self.pending = Some(handle);
            self.follow_bottom = true;
        }
    }

    /// Reap a finished request task.
    pub fn poll_pending(&mut self) {
        let finished = self.pending.as_ref().is_some_and(|h| h.is_finished());
        if !finished {
            return;
        }
        if let Some(handle) = self.pending.take() {
            // The cycle has already written its outcome to the transcript. A
            // join error only means the task itself was torn down.
            if let Some(Err(err)) = handle.now_or_never() {
                warn!(error = %err, "send task did not complete");
            }
        }
    }

    /// Pin the view to the bottom whenever the transcript changes.
    pub fn sync_transcript(&mut self) {
        if self.transcript_rx.has_changed().unwrap_or(false) {
            self.transcript_rx.borrow_and_update();
            self.follow_bottom = true;
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript_rx.borrow().clone()
    }

    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    /// Clamp the scroll offset for `total_lines` of wrapped content.
    pub fn fit_scroll(&mut self, total_lines: u16) {
        let max_scroll = total_lines.saturating_sub(self.chat_height);
        if self.follow_bottom || self.chat_scroll >= max_scroll {
            self.chat_scroll = max_scroll;
            self.follow_bottom = true;
        }
    }

    /// Start a fresh conversation. Ignored while a request is outstanding.
    pub fn reset_conversation(&mut self) {
        if self.session.reset() {
            self.chat_scroll = 0;
            self.follow_bottom = true;
        }
    }
}

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use changi_core::{
    Answerer, ChatRequest, ChatSession, Clock, CycleOutcome, HistoryEntry, Phase, Role,
    RollbackPolicy, SendError, GREETING,
};
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;

/// Hands out "09:00", "09:01", ... so creation order is visible.
#[derive(Default)]
struct TickClock {
    ticks: AtomicUsize,
}

impl Clock for TickClock {
    fn now(&self) -> String {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        format!("09:{:02}", n)
    }
}

#[derive(Default)]
struct ScriptedAnswerer {
    replies: Mutex<VecDeque<Result<String, SendError>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedAnswerer {
    fn with(replies: Vec<Result<String, SendError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::default(),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Answerer for ScriptedAnswerer {
    async fn answer(&self, request: &ChatRequest) -> Result<String, SendError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(SendError::Unclassified))
    }
}

/// Holds the request open until the test releases it.
struct GatedAnswerer {
    gate: Mutex<Option<oneshot::Receiver<Result<String, SendError>>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl Answerer for GatedAnswerer {
    async fn answer(&self, _request: &ChatRequest) -> Result<String, SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        match gate {
            Some(rx) => rx.await.unwrap_or(Err(SendError::Unclassified)),
            None => Err(SendError::Unclassified),
        }
    }
}

struct PanickingAnswerer;

#[async_trait]
impl Answerer for PanickingAnswerer {
    async fn answer(&self, _request: &ChatRequest) -> Result<String, SendError> {
        panic!("answer handler blew up");
    }
}

fn session_with(answerer: Arc<dyn Answerer>, rollback: RollbackPolicy) -> ChatSession {
    ChatSession::new(answerer, Arc::new(TickClock::default()), rollback)
}

fn roles_and_contents(session: &ChatSession) -> Vec<(Role, String)> {
    session
        .transcript()
        .iter()
        .map(|m| (m.role(), m.content().to_string()))
        .collect()
}

#[test]
fn test_fresh_session_holds_greeting_only() {
    let session = session_with(ScriptedAnswerer::with(vec![]), RollbackPolicy::default());
    assert_eq!(
        roles_and_contents(&session),
        vec![(Role::Assistant, GREETING.to_string())]
    );
    assert_eq!(session.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_successful_cycle_appends_question_then_answer() {
    let answerer = ScriptedAnswerer::with(vec![Ok("T4 operates 24/7.".to_string())]);
    let session = session_with(answerer.clone(), RollbackPolicy::default());

    let outcome = session.ask("When is T4 open?").await;
    assert_eq!(outcome, Some(CycleOutcome::Settled));

    assert_eq!(
        roles_and_contents(&session),
        vec![
            (Role::Assistant, GREETING.to_string()),
            (Role::User, "When is T4 open?".to_string()),
            (Role::Assistant, "T4 operates 24/7.".to_string()),
        ]
    );

    let transcript = session.transcript();
    let stamps: Vec<&str> = transcript.iter().map(|m| m.timestamp()).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]), "{stamps:?}");
}

#[tokio::test]
async fn test_history_is_snapshot_before_question() {
    let answerer = ScriptedAnswerer::with(vec![
        Ok("T4 operates 24/7.".to_string()),
        Ok("Take the free shuttle bus.".to_string()),
    ]);
    let session = session_with(answerer.clone(), RollbackPolicy::default());

    session.ask("When is T4 open?").await;
    session.ask("How do I get there?").await;

    let requests = answerer.requests();
    assert_eq!(requests.len(), 2);

    assert_eq!(requests[0].query, "When is T4 open?");
    assert_eq!(
        requests[0].history,
        vec![HistoryEntry {
            role: Role::Assistant,
            content: GREETING.to_string(),
        }]
    );

    assert_eq!(requests[1].query, "How do I get there?");
    assert_eq!(
        requests[1].history,
        vec![
            HistoryEntry {
                role: Role::Assistant,
                content: GREETING.to_string(),
            },
            HistoryEntry {
                role: Role::User,
                content: "When is T4 open?".to_string(),
            },
            HistoryEntry {
                role: Role::Assistant,
                content: "T4 operates 24/7.".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_failure_with_drop_query_replaces_question() {
    let endpoint = "http://127.0.0.1:8000/chat".to_string();
    let answerer = ScriptedAnswerer::with(vec![Err(SendError::RemoteUnreachable {
        endpoint: endpoint.clone(),
    })]);
    let session = session_with(answerer, RollbackPolicy::DropQuery);

    let outcome = session.ask("hello").await;
    assert!(matches!(
        outcome,
        Some(CycleOutcome::RolledBack(SendError::RemoteUnreachable { .. }))
    ));

    assert_eq!(
        roles_and_contents(&session),
        vec![
            (Role::Assistant, GREETING.to_string()),
            (
                Role::Assistant,
                format!("No response from server. Is it running at {endpoint}?"),
            ),
        ]
    );
}

#[tokio::test]
async fn test_failure_keeps_question_by_default() {
    let answerer = ScriptedAnswerer::with(vec![Err(SendError::RemoteRejected { status: 500 })]);
    let session = session_with(answerer, RollbackPolicy::default());

    session.ask("hello").await;

    assert_eq!(
        roles_and_contents(&session),
        vec![
            (Role::Assistant, GREETING.to_string()),
            (Role::User, "hello".to_string()),
            (Role::Assistant, "Server responded with status 500.".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_every_error_kind_becomes_assistant_text() {
    let cases = vec![
        (
            SendError::RemoteRejected { status: 404 },
            "Server responded with status 404.",
        ),
        (
            SendError::construction("invalid header value"),
            "Could not send request. invalid header value.",
        ),
        (
            SendError::Unclassified,
            "An unexpected error occurred. Please try again.",
        ),
    ];

    for (error, text) in cases {
        let session = session_with(
            ScriptedAnswerer::with(vec![Err(error.clone())]),
            RollbackPolicy::DropQuery,
        );
        let outcome = session.ask("anything").await;
        assert_eq!(outcome, Some(CycleOutcome::RolledBack(error)));

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role(), Role::Assistant);
        assert_eq!(transcript[1].content(), text);
        assert!(!session.is_busy());
    }
}

#[tokio::test]
async fn test_blank_queries_are_ignored() {
    let answerer = ScriptedAnswerer::with(vec![Ok("unused".to_string())]);
    let session = session_with(answerer.clone(), RollbackPolicy::default());

    for query in ["", "   ", "\n\t "] {
        assert_eq!(session.ask(query).await, None);
    }

    assert_eq!(session.transcript().len(), 1);
    assert!(answerer.requests().is_empty());
}

#[tokio::test]
async fn test_busy_blocks_second_submit_until_settled() {
    let (release, gate) = oneshot::channel();
    let answerer = Arc::new(GatedAnswerer {
        gate: Mutex::new(Some(gate)),
        calls: AtomicUsize::new(0),
    });
    let session = session_with(answerer.clone(), RollbackPolicy::default());

    let mut draft = "When is T4 open?".to_string();
    let handle = session.submit(&mut draft).expect("first submit starts");
    assert!(draft.is_empty());
    assert!(session.is_busy());
    assert_eq!(session.transcript().len(), 2);

    let mut second = "Are you there?".to_string();
    assert!(session.submit(&mut second).is_none());
    assert_eq!(second, "Are you there?");
    assert_eq!(session.transcript().len(), 2);

    release.send(Ok("T4 operates 24/7.".to_string())).unwrap();
    assert_eq!(handle.await.unwrap(), CycleOutcome::Settled);

    assert!(!session.is_busy());
    assert_eq!(answerer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.transcript().len(), 3);
}

#[tokio::test]
async fn test_busy_released_after_failure() {
    let (release, gate) = oneshot::channel();
    let answerer = Arc::new(GatedAnswerer {
        gate: Mutex::new(Some(gate)),
        calls: AtomicUsize::new(0),
    });
    let session = session_with(answerer, RollbackPolicy::DropQuery);

    let mut draft = "hello".to_string();
    let handle = session.submit(&mut draft).unwrap();
    assert_eq!(session.phase(), Phase::Sending);

    release.send(Err(SendError::RemoteRejected { status: 502 })).unwrap();
    handle.await.unwrap();

    assert_eq!(session.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_panicking_answerer_still_releases_busy() {
    let session = session_with(Arc::new(PanickingAnswerer), RollbackPolicy::default());

    let outcome = session.ask("hello").await;
    assert_eq!(outcome, Some(CycleOutcome::RolledBack(SendError::Unclassified)));
    assert!(!session.is_busy());

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(
        transcript[2].content(),
        "An unexpected error occurred. Please try again."
    );
}

#[tokio::test]
async fn test_subscriber_sees_each_transition() {
    let answerer = ScriptedAnswerer::with(vec![Ok("answer".to_string())]);
    let session = session_with(answerer, RollbackPolicy::default());
    let mut rx = session.subscribe();
    rx.borrow_and_update();

    let mut draft = "question".to_string();
    let handle = session.submit(&mut draft).unwrap();
    assert_eq!(rx.borrow_and_update().len(), 2);

    handle.await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().len(), 3);
}

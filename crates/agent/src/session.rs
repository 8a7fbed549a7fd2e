//! Per-conversation state and background turn execution.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use proto::{AgentError, AgentTurnResult, Message, SessionId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{memory::ConversationMemory, runtime::AgentLoop};

struct SessionState {
    memory: ConversationMemory,
    /// Bumped on every reset so turns started before it never record.
    epoch: u64,
    cancel_root: CancellationToken,
    /// Cancelled once the most recently submitted turn is through.
    last_turn: Option<CancellationToken>,
}

/// One conversation: its memory plus the turns running against it
///
/// Turns of a session run one after another in submission order; a turn
/// submitted while another is running waits for it.
pub struct Session {
    id: SessionId,
    agent: Arc<AgentLoop>,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self::with_memory(SessionId::new(), agent, ConversationMemory::new())
    }

    pub fn with_memory(id: SessionId, agent: Arc<AgentLoop>, memory: ConversationMemory) -> Self {
        Self {
            id,
            agent,
            state: Arc::new(Mutex::new(SessionState {
                memory,
                epoch: 0,
                cancel_root: CancellationToken::new(),
                last_turn: None,
            })),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Snapshot of the conversation so far.
    pub fn history(&self) -> Vec<Message> {
        self.state.lock().memory.messages().to_vec()
    }

    /// Starts a turn on the tokio runtime and returns immediately.
    ///
    /// The user message and the answer are recorded only when the turn
    /// completes without being cancelled or outlived by a reset.
    pub fn submit(&self, user_input: impl Into<String>) -> TurnHandle {
        let user_input = user_input.into();
        let done = CancellationToken::new();
        // The queue position is taken here, not when the task first runs.
        let (cancel, epoch, previous) = {
            let mut state = self.state.lock();
            let previous = state.last_turn.replace(done.clone());
            (state.cancel_root.child_token(), state.epoch, previous)
        };
        let agent = Arc::clone(&self.agent);
        let state = Arc::clone(&self.state);
        let token = cancel.clone();
        let session_id = self.id.clone();

        let join = tokio::spawn(async move {
            let done = done.drop_guard();
            if let Some(previous) = previous {
                let cancelled = tokio::select! {
                    biased;
                    _ = token.cancelled() => true,
                    _ = previous.cancelled() => false,
                };
                if cancelled {
                    // The next turn still waits for the one before this.
                    tokio::spawn(async move {
                        previous.cancelled().await;
                        drop(done);
                    });
                    return Err(AgentError::Cancelled);
                }
            }
            let history = state.lock().memory.messages().to_vec();
            debug!(session = %session_id, history = history.len(), "Turn started");

            let result = agent
                .run_turn_cancellable(&history, &user_input, &token)
                .await?;

            let mut state = state.lock();
            if token.is_cancelled() || state.epoch != epoch {
                return Err(AgentError::Cancelled);
            }
            state.memory.record_turn(&user_input, &result);
            Ok(result)
        });

        TurnHandle { cancel, join }
    }

    /// Runs a turn and waits for its result.
    pub async fn send(&self, user_input: impl Into<String>) -> Result<AgentTurnResult, AgentError> {
        self.submit(user_input).wait().await
    }

    /// Cancels running turns and clears the conversation.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.cancel_root.cancel();
        state.cancel_root = CancellationToken::new();
        state.epoch += 1;
        state.memory.reset();
        info!(session = %self.id, "Session reset");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.state.lock().cancel_root.cancel();
    }
}

/// A turn running in the background
pub struct TurnHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<AgentTurnResult, AgentError>>,
}

impl TurnHandle {
    /// Requests cancellation; the turn stops at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this turn, usable after the handle is consumed by `wait`.
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<AgentTurnResult, AgentError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AgentError::Cancelled),
            Err(e) => Err(AgentError::TaskFailed(e.to_string())),
        }
    }
}

/// Concurrent sessions sharing one agent loop
pub struct SessionManager {
    agent: Arc<AgentLoop>,
    greeting: Option<String>,
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionManager {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self {
            agent,
            greeting: None,
            sessions: DashMap::new(),
        }
    }

    /// New sessions start with this assistant message.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Opens a fresh session.
    pub fn create(&self) -> Arc<Session> {
        self.get_or_create(&SessionId::new())
    }

    pub fn get_or_create(&self, id: &SessionId) -> Arc<Session> {
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                let memory = match &self.greeting {
                    Some(greeting) => ConversationMemory::with_greeting(greeting.clone()),
                    None => ConversationMemory::new(),
                };
                debug!(session = %id, "Session created");
                Arc::new(Session::with_memory(id.clone(), Arc::clone(&self.agent), memory))
            })
            .clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Drops a session, cancelling its running turns.
    pub fn remove(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.state.lock().cancel_root.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

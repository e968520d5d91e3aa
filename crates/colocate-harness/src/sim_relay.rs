//! Simulated session relay.
//!
//! Sessions are keyed by name. Start-or-join is atomic: of two concurrent
//! callers for the same name, one lands first and sees itself alone, the
//! other sees two participants. The room-shared record published by any
//! participant is visible to every participant immediately.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use colocate_core::{
    env::Environment,
    error::TransportError,
    room::SharedRoomRecord,
    services::{SessionHandle, SessionTransport},
};
use tracing::debug;

#[derive(Debug, Default)]
struct Session {
    participants: usize,
    shared_room: Option<SharedRoomRecord>,
}

#[derive(Debug, Default)]
struct RelayState {
    sessions: BTreeMap<String, Session>,
    join_delay: Duration,
    rejected: HashSet<String>,
    joins: usize,
}

/// In-process relay shared by every device in a scenario.
#[derive(Debug, Clone, Default)]
pub struct SimRelay {
    state: Arc<Mutex<RelayState>>,
}

impl SimRelay {
    /// Relay with no sessions and instant joins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every start-or-join by `delay`.
    pub fn set_join_delay(&self, delay: Duration) {
        self.lock().join_delay = delay;
    }

    /// Refuse start-or-join for session `name`.
    pub fn reject(&self, name: impl Into<String>) {
        self.lock().rejected.insert(name.into());
    }

    /// Endpoint for one device.
    pub fn endpoint<E: Environment>(&self, env: E) -> SimSessionTransport<E> {
        SimSessionTransport { relay: self.clone(), env }
    }

    /// Current participants of session `name`.
    pub fn participants(&self, name: &str) -> usize {
        self.lock().sessions.get(name).map_or(0, |s| s.participants)
    }

    /// Names of sessions with at least one participant.
    pub fn live_sessions(&self) -> Vec<String> {
        self.lock()
            .sessions
            .iter()
            .filter(|(_, s)| s.participants > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Successful start-or-join calls so far.
    pub fn joins(&self) -> usize {
        self.lock().joins
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One device's connection to the [`SimRelay`].
#[derive(Debug, Clone)]
pub struct SimSessionTransport<E> {
    relay: SimRelay,
    env: E,
}

#[async_trait]
impl<E: Environment> SessionTransport for SimSessionTransport<E> {
    async fn start_or_join(&self, name: &str) -> Result<Box<dyn SessionHandle>, TransportError> {
        let delay = self.relay.lock().join_delay;
        if !delay.is_zero() {
            self.env.sleep(delay).await;
        }

        let participants = {
            let mut state = self.relay.lock();
            if state.rejected.contains(name) {
                return Err(TransportError::Rejected {
                    name: name.to_string(),
                    reason: "relay refused".to_string(),
                });
            }
            state.joins += 1;
            let session = state.sessions.entry(name.to_string()).or_default();
            session.participants += 1;
            session.participants
        };

        debug!(session = name, participants, "participant entered");
        Ok(Box::new(SimSession {
            relay: self.relay.clone(),
            name: name.to_string(),
            participants,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Membership in a simulated session.
pub struct SimSession {
    relay: SimRelay,
    name: String,
    participants: usize,
    closed: AtomicBool,
}

impl fmt::Debug for SimSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimSession")
            .field("name", &self.name)
            .field("participants", &self.participants)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionHandle for SimSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn participant_count(&self) -> usize {
        self.participants
    }

    async fn publish_shared_room(&self, record: SharedRoomRecord) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut state = self.relay.lock();
        let session = state.sessions.entry(self.name.clone()).or_default();
        session.shared_room = Some(record);
        Ok(())
    }

    fn shared_room(&self) -> Option<SharedRoomRecord> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.relay.lock().sessions.get(&self.name).and_then(|s| s.shared_room.clone())
    }

    async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.relay.lock();
        if let Some(session) = state.sessions.get_mut(&self.name) {
            session.participants = session.participants.saturating_sub(1);
            if session.participants == 0 {
                session.shared_room = None;
            }
        }
        debug!(session = %self.name, "participant left");
    }
}

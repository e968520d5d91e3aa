//! Colocation orchestrator.
//!
//! Drives one device from Init to Ready or Error:
//!
//! 1. Discovering: listen for a nearby group.
//! 2. Heard one: JoiningTransport, LoadingRoom, Ready as CLIENT.
//! 3. Heard nothing: Advertising, then either ScanningRoom, StartingTransport,
//!    SharingRoom, Ready as HOST, or, when the session probe finds the
//!    session already populated, the CLIENT path on the probe connection.
//!
//! Each phase is awaited in sequence on `&mut self`; nothing runs two phases
//! at once. There are no automatic retries: a failed run stays in Error until
//! [`ColocationOrchestrator::restart`] is called.
//!
//! # Ownership
//!
//! The orchestrator owns at most one session handle at a time. A probe
//! handle is either promoted into that slot or shut down by the transport
//! layer. Restart shuts down the owned handle and stops any advertisement
//! before building a fresh context.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::{
    anchors::SpatialAnchorStore,
    config::ColocationConfig,
    discovery::Discovery,
    env::Environment,
    error::ColocationError,
    event::ColocationEvent,
    group::{GroupId, GroupIdProvider, Role, SessionDescriptor},
    negotiate::{HostClaim, RoleNegotiator},
    pose::Pose,
    room::RoomSnapshot,
    room_share::{RoomShareCoordinator, SharedRoom},
    services::{SessionHandle, Services},
    state::{ColocationState, OrchestrationContext},
    transport::SessionConnector,
};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ColocationOutcome {
    /// Negotiated role.
    pub role: Role,
    /// Group shared with the other devices.
    pub group_id: GroupId,
    /// Room in the shared frame, collision enabled.
    pub room: RoomSnapshot,
    /// Transform that took the local frame into the host's.
    pub alignment: Pose,
    /// Whether local data stood in for the host's room.
    pub degraded: bool,
}

/// Watch-backed [`GroupIdProvider`].
///
/// Cheap to clone; every clone sees the orchestrator's latest group.
#[derive(Debug, Clone)]
pub struct GroupIdWatch(watch::Receiver<Option<GroupId>>);

impl GroupIdWatch {
    /// Wait until a group is determined.
    ///
    /// Returns `None` if the orchestrator is dropped first.
    pub async fn wait(&mut self) -> Option<GroupId> {
        self.0.wait_for(Option::is_some).await.ok().and_then(|group| *group)
    }
}

impl GroupIdProvider for GroupIdWatch {
    fn group_id(&self) -> Option<GroupId> {
        *self.0.borrow()
    }
}

/// Top-level colocation state machine for one device.
pub struct ColocationOrchestrator<E: Environment> {
    env: E,
    config: ColocationConfig,
    negotiator: RoleNegotiator<E>,
    connector: SessionConnector<E>,
    rooms: RoomShareCoordinator<E>,
    context: OrchestrationContext,
    session: Option<Arc<dyn SessionHandle>>,
    advertising: bool,
    result: Option<Result<ColocationOutcome, ColocationError>>,
    events: broadcast::Sender<ColocationEvent>,
    group_tx: watch::Sender<Option<GroupId>>,
}

impl<E: Environment> ColocationOrchestrator<E> {
    /// Orchestrator over `services`, in Init.
    pub fn new(services: Services, config: ColocationConfig, env: E) -> Self {
        let discovery = Discovery::new(services.discovery, env.clone());
        let connector = SessionConnector::new(services.transport, env.clone());
        let negotiator = RoleNegotiator::new(discovery, connector.clone(), &config);
        let store = SpatialAnchorStore::new(services.scanner, services.anchors, services.records, env.clone());
        let rooms = RoomShareCoordinator::new(store, env.clone(), &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (group_tx, _) = watch::channel(None);

        Self {
            context: OrchestrationContext::new(env.now()),
            env,
            config,
            negotiator,
            connector,
            rooms,
            session: None,
            advertising: false,
            result: None,
            events,
            group_tx,
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ColocationEvent> {
        self.events.subscribe()
    }

    /// Capability for sibling components that need the group identifier.
    pub fn group_id_provider(&self) -> GroupIdWatch {
        GroupIdWatch(self.group_tx.subscribe())
    }

    /// Negotiated role, once known.
    pub fn role(&self) -> Option<Role> {
        self.context.role()
    }

    /// Group identifier, once known.
    pub fn group_id(&self) -> Option<GroupId> {
        self.context.group_id()
    }

    /// Current state.
    pub fn current_state(&self) -> ColocationState {
        self.context.state()
    }

    /// Read-only view of the run's context.
    pub fn context(&self) -> &OrchestrationContext {
        &self.context
    }

    /// Outcome of a run that reached Ready.
    pub fn outcome(&self) -> Option<&ColocationOutcome> {
        self.result.as_ref().and_then(|result| result.as_ref().ok())
    }

    /// Session name and role, once both are known.
    pub fn session_descriptor(&self) -> Option<SessionDescriptor> {
        Some(SessionDescriptor::new(self.context.group_id()?, self.context.role()?))
    }

    /// Session this device currently owns.
    pub fn session(&self) -> Option<&Arc<dyn SessionHandle>> {
        self.session.as_ref()
    }

    /// Run to Ready or Error.
    ///
    /// Calling this again on a finished run returns the same result without
    /// emitting anything.
    pub async fn run(&mut self) -> Result<ColocationOutcome, ColocationError> {
        if let Some(result) = &self.result {
            return result.clone();
        }

        let state = self.context.state();
        if state != ColocationState::Init {
            // An earlier run future was dropped mid-phase.
            return Err(ColocationError::InvalidTransition { from: state, to: ColocationState::Discovering });
        }

        let started = self.env.now();
        let result = self.drive().await;
        let elapsed_ms = self.env.now().saturating_duration_since(started).as_millis() as u64;
        self.conclude(result, elapsed_ms)
    }

    /// Tear down this run and return to Init.
    ///
    /// Shuts down the owned session, stops advertising and forgets the group,
    /// so the next [`run`](Self::run) determines a new one.
    pub async fn restart(&mut self) {
        info!(from = %self.context.state(), "restarting colocation");

        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
        if self.advertising {
            self.negotiator.stop_advertising().await;
            self.advertising = false;
        }

        self.rooms.reset();
        self.result = None;
        self.context = OrchestrationContext::new(self.env.now());
        self.group_tx.send_replace(None);
        self.emit_status();
    }

    async fn drive(&mut self) -> Result<ColocationOutcome, ColocationError> {
        self.enter(ColocationState::Discovering)?;

        if let Some(group) = self.negotiator.discover_existing().await {
            self.determine(Role::Client, group);
            let shared = self.run_client(group, None).await?;
            return self.finish(Role::Client, group, shared);
        }

        self.enter(ColocationState::Advertising)?;
        match self.negotiator.claim_host().await? {
            HostClaim::Downgraded { group_id, session } => {
                self.determine(Role::Client, group_id);
                let shared = self.run_client(group_id, Some(session)).await?;
                self.finish(Role::Client, group_id, shared)
            },
            HostClaim::Host { group_id, session } => {
                self.advertising = true;
                self.determine(Role::Host, group_id);
                let shared = self.run_host(group_id, session).await?;
                self.finish(Role::Host, group_id, shared)
            },
        }
    }

    async fn run_client(
        &mut self,
        group: GroupId,
        promoted: Option<Arc<dyn SessionHandle>>,
    ) -> Result<SharedRoom, ColocationError> {
        self.adopt(promoted).await;
        self.enter(ColocationState::JoiningTransport)?;

        let session = match self.session.clone() {
            Some(session) => {
                debug!(session = session.name(), "client using probe session");
                session
            },
            None => {
                let session =
                    self.connector.join(&group.session_name(), self.config.transport_timeout).await?;
                self.session.insert(session).clone()
            },
        };

        self.enter(ColocationState::LoadingRoom)?;
        self.rooms.receive_shared_room(group, session.as_ref()).await
    }

    async fn run_host(
        &mut self,
        group: GroupId,
        promoted: Option<Arc<dyn SessionHandle>>,
    ) -> Result<SharedRoom, ColocationError> {
        self.adopt(promoted).await;
        self.enter(ColocationState::ScanningRoom)?;
        self.rooms.prepare_host_room().await?;

        self.enter(ColocationState::StartingTransport)?;
        let session = match self.session.clone() {
            Some(session) => {
                debug!(session = session.name(), "host using probe session");
                session
            },
            None => {
                let session =
                    self.connector.start(&group.session_name(), self.config.transport_timeout).await?;
                self.session.insert(session).clone()
            },
        };

        self.enter(ColocationState::SharingRoom)?;
        self.rooms.share_host_room(group, session.as_ref()).await
    }

    async fn adopt(&mut self, promoted: Option<Arc<dyn SessionHandle>>) {
        if let Some(session) = promoted {
            if let Some(previous) = self.session.replace(session) {
                warn!(session = previous.name(), "replacing an owned session");
                previous.shutdown().await;
            }
        }
    }

    fn finish(
        &mut self,
        role: Role,
        group_id: GroupId,
        shared: SharedRoom,
    ) -> Result<ColocationOutcome, ColocationError> {
        self.enter(ColocationState::Ready)?;
        Ok(ColocationOutcome {
            role,
            group_id,
            room: shared.room,
            alignment: shared.alignment,
            degraded: shared.degraded,
        })
    }

    fn determine(&mut self, role: Role, group: GroupId) {
        self.context.assign_role(role);
        self.context.assign_group(group);
        self.group_tx.send_replace(self.context.group_id());
        info!(%role, group_id = %group, "role determined");
    }

    fn enter(&mut self, state: ColocationState) -> Result<(), ColocationError> {
        let from = self.context.state();
        let elapsed_ms = self.context.elapsed_in_state(self.env.now()).as_millis() as u64;
        self.context.transition(state, self.env.now())?;
        info!(%from, to = %state, elapsed_ms, "{}", state.status_text());
        self.emit_status();
        Ok(())
    }

    fn conclude(
        &mut self,
        result: Result<ColocationOutcome, ColocationError>,
        elapsed_ms: u64,
    ) -> Result<ColocationOutcome, ColocationError> {
        match &result {
            Ok(outcome) => {
                info!(
                    role = %outcome.role,
                    group_id = %outcome.group_id,
                    degraded = outcome.degraded,
                    anchors = outcome.room.anchors.len(),
                    elapsed_ms,
                    "colocation ready"
                );
                self.emit(ColocationEvent::Ready { outcome: outcome.clone() });
            },
            Err(failure) => {
                match self.context.fail(failure.clone(), self.env.now()) {
                    Ok(()) => self.emit_status(),
                    Err(e) => warn!(error = %e, "failure recorded outside the state graph"),
                }
                error!(cause = %failure.cause(), error = %failure, elapsed_ms, "colocation failed");
                self.emit(ColocationEvent::Failed { cause: failure.cause(), detail: failure.to_string() });
            },
        }

        self.result = Some(result.clone());
        result
    }

    fn emit_status(&self) {
        let state = self.context.state();
        let text = match (state, self.context.last_error()) {
            (ColocationState::Error, Some(failure)) => format!("Error: {failure}"),
            _ => state.status_text().to_string(),
        };
        self.emit(ColocationEvent::StatusChanged { state, text });
    }

    fn emit(&self, event: ColocationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

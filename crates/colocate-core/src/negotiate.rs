//! Role negotiation.
//!
//! A device that hears a nearby advertisement within the discovery window is
//! a CLIENT of that group. A device that hears nothing advertises a group of
//! its own and becomes HOST.
//!
//! Two devices that start together can both hear nothing. Before committing
//! to HOST, the candidate probes the relayed session named after its group:
//!
//! - probe lands with other participants present: downgrade to CLIENT and
//!   keep the probe connection as the client's session
//! - probe lands alone: stay HOST and keep the probe connection as the host's
//!   session
//! - probe fails or times out: stay HOST with no session yet
//!
//! A channel that forces HOST skips the probe. A forced client may already
//! sit in the session waiting for it, and must not demote the host.
//!
//! The probe narrows the race but cannot close it. Two candidates with
//! different groups probe different sessions, and two probes that both time
//! out both stay HOST.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    config::ColocationConfig,
    discovery::{Discovery, DiscoveryOutcome},
    env::Environment,
    error::ColocationError,
    group::{GroupId, Role},
    services::SessionHandle,
    transport::SessionConnector,
};

/// What a host candidate ended up as.
#[derive(Debug)]
pub enum HostClaim {
    /// Stays HOST. Carries the probe session if it landed alone.
    Host {
        /// Advertised group.
        group_id: GroupId,
        /// Promoted probe session.
        session: Option<Arc<dyn SessionHandle>>,
    },

    /// Probe found an existing session; now a CLIENT of it.
    Downgraded {
        /// Advertised group, also the joined session's group.
        group_id: GroupId,
        /// Promoted probe session.
        session: Arc<dyn SessionHandle>,
    },
}

/// Outcome of a complete negotiation.
#[derive(Debug)]
pub struct Negotiation {
    /// Negotiated role.
    pub role: Role,
    /// Group the role applies to.
    pub group_id: GroupId,
    /// Session already established during negotiation, if any.
    pub session: Option<Arc<dyn SessionHandle>>,
}

/// Decides HOST or CLIENT.
#[derive(Clone)]
pub struct RoleNegotiator<E> {
    discovery: Discovery<E>,
    connector: SessionConnector<E>,
    discovery_wait: Duration,
    session_probe: bool,
    probe_timeout: Duration,
}

impl<E: Environment> RoleNegotiator<E> {
    /// Negotiator with timings from `config`.
    pub fn new(discovery: Discovery<E>, connector: SessionConnector<E>, config: &ColocationConfig) -> Self {
        Self {
            discovery,
            connector,
            discovery_wait: config.discovery_wait,
            session_probe: config.session_probe,
            probe_timeout: config.probe_timeout,
        }
    }

    /// Listen for a nearby group for the discovery window.
    ///
    /// Unavailable discovery is treated as hearing nothing.
    pub async fn discover_existing(&self) -> Option<GroupId> {
        match self.discovery.discover(self.discovery_wait).await {
            DiscoveryOutcome::Found(group) => Some(group),
            DiscoveryOutcome::NotFound => None,
            DiscoveryOutcome::Unavailable(reason) => {
                warn!(%reason, "discovery unavailable, proceeding as host");
                None
            },
        }
    }

    /// Advertise a group and settle whether to keep HOST.
    pub async fn claim_host(&self) -> Result<HostClaim, ColocationError> {
        let group_id = self.discovery.advertise().await?;

        if self.discovery.forces_host() {
            info!(%group_id, "host forced, skipping session probe");
            return Ok(HostClaim::Host { group_id, session: None });
        }
        if !self.session_probe {
            return Ok(HostClaim::Host { group_id, session: None });
        }

        let name = group_id.session_name();
        match self.connector.probe(&name, self.probe_timeout).await {
            Some(session) if session.participant_count() > 1 => {
                info!(
                    %group_id,
                    participants = session.participant_count(),
                    "session already populated, downgrading to client"
                );
                self.discovery.stop_advertising().await;
                Ok(HostClaim::Downgraded { group_id, session })
            },
            Some(session) => {
                info!(%group_id, "probe session empty, keeping host and its session");
                Ok(HostClaim::Host { group_id, session: Some(session) })
            },
            None => {
                info!(%group_id, "probe found no session, keeping host");
                Ok(HostClaim::Host { group_id, session: None })
            },
        }
    }

    /// Discover, then claim host if nothing was heard.
    pub async fn negotiate(&self) -> Result<Negotiation, ColocationError> {
        if let Some(group_id) = self.discover_existing().await {
            return Ok(Negotiation { role: Role::Client, group_id, session: None });
        }

        Ok(match self.claim_host().await? {
            HostClaim::Host { group_id, session } => Negotiation { role: Role::Host, group_id, session },
            HostClaim::Downgraded { group_id, session } => {
                Negotiation { role: Role::Client, group_id, session: Some(session) }
            },
        })
    }

    /// Stop this device's advertisement.
    pub async fn stop_advertising(&self) {
        self.discovery.stop_advertising().await;
    }
}

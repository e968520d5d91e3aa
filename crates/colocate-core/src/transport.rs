//! Bounded start/join of the relayed session.
//!
//! Every call runs detached: when the bound fires, the pending start or join
//! keeps going on the runtime, and a handle that arrives late is shut down
//! the moment it resolves. The caller therefore never ends up holding a
//! session it does not know about.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::ColocationError,
    services::{SessionHandle, SessionTransport},
    wait,
};

/// Timed front end over a [`SessionTransport`].
#[derive(Clone)]
pub struct SessionConnector<E> {
    transport: Arc<dyn SessionTransport>,
    env: E,
}

impl<E: Environment> SessionConnector<E> {
    /// Wrap `transport`.
    pub fn new(transport: Arc<dyn SessionTransport>, env: E) -> Self {
        Self { transport, env }
    }

    /// Start session `name` as host within `timeout`.
    pub async fn start(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn SessionHandle>, ColocationError> {
        let handle = self
            .start_or_join("session start", name, timeout)
            .await
            .map_err(ColocationError::TransportStartFailed)?;
        info!(session = name, participants = handle.participant_count(), "session started");
        Ok(handle)
    }

    /// Join session `name` as client within `timeout`.
    pub async fn join(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn SessionHandle>, ColocationError> {
        let handle = self
            .start_or_join("session join", name, timeout)
            .await
            .map_err(ColocationError::TransportJoinFailed)?;
        info!(session = name, participants = handle.participant_count(), "session joined");
        Ok(handle)
    }

    /// Check whether session `name` already has participants.
    ///
    /// Returns the handle if the start-or-join landed within `timeout`;
    /// `None` on failure or timeout.
    pub async fn probe(&self, name: &str, timeout: Duration) -> Option<Arc<dyn SessionHandle>> {
        match self.start_or_join("session probe", name, timeout).await {
            Ok(handle) => {
                debug!(session = name, participants = handle.participant_count(), "probe landed");
                Some(handle)
            },
            Err(reason) => {
                debug!(session = name, %reason, "probe found nothing");
                None
            },
        }
    }

    async fn start_or_join(
        &self,
        operation: &'static str,
        name: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn SessionHandle>, String> {
        let transport = Arc::clone(&self.transport);
        let session = name.to_string();

        let result = wait::detached(
            &self.env,
            operation,
            timeout,
            async move { transport.start_or_join(&session).await },
            move |late| async move {
                if let Ok(handle) = late {
                    warn!(operation, session = handle.name(), "late session handle, shutting down");
                    handle.shutdown().await;
                }
            },
        )
        .await;

        match result {
            Ok(Ok(handle)) => Ok(Arc::from(handle)),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

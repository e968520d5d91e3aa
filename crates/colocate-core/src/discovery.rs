//! Short-range discovery of a nearby group.
//!
//! [`Discovery`] wraps a [`DiscoveryChannel`] with the timing guarantees the
//! negotiator relies on: a discover call never reports "nothing heard" before
//! its window closes, and never runs past it.
//!
//! [`OfflineChannel`] stands in for the radio on bench and offline runs. It
//! derives the group identifier from a session name, and the composition root
//! decides up front how it should bias role negotiation.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::{ColocationError, DiscoveryError},
    group::GroupId,
    services::DiscoveryChannel,
    wait,
};

/// Result of one discovery window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// A nearby device advertised this group.
    Found(GroupId),
    /// Nothing heard before the window closed.
    NotFound,
    /// Discovery could not be started.
    Unavailable(String),
}

/// Timed front end over a [`DiscoveryChannel`].
#[derive(Clone)]
pub struct Discovery<E> {
    channel: Arc<dyn DiscoveryChannel>,
    env: E,
}

impl<E: Environment> Discovery<E> {
    /// Wrap `channel`.
    pub fn new(channel: Arc<dyn DiscoveryChannel>, env: E) -> Self {
        Self { channel, env }
    }

    /// Listen for exactly `window`, or until something is heard.
    pub async fn discover(&self, window: Duration) -> DiscoveryOutcome {
        let started = self.env.now();
        let deadline = started + window;

        let heard = wait::bounded(&self.env, "discover", window, self.channel.discover(window)).await;

        let outcome = match heard {
            Ok(Ok(Some(group))) => DiscoveryOutcome::Found(group),
            Ok(Ok(None)) => {
                // Channel gave up early; hold the window open anyway.
                let now = self.env.now();
                if now < deadline {
                    self.env.sleep(deadline - now).await;
                }
                DiscoveryOutcome::NotFound
            },
            Err(_) => DiscoveryOutcome::NotFound,
            Ok(Err(e)) => DiscoveryOutcome::Unavailable(e.to_string()),
        };

        let elapsed_ms = self.env.now().saturating_duration_since(started).as_millis() as u64;
        match &outcome {
            DiscoveryOutcome::Found(group) => info!(%group, elapsed_ms, "discovered nearby group"),
            DiscoveryOutcome::NotFound => info!(elapsed_ms, "no nearby group"),
            DiscoveryOutcome::Unavailable(reason) => warn!(%reason, "discovery unavailable"),
        }
        outcome
    }

    /// Start advertising; resolves to the advertised group.
    pub async fn advertise(&self) -> Result<GroupId, ColocationError> {
        match self.channel.advertise().await {
            Ok(group) => {
                info!(%group, "advertising");
                Ok(group)
            },
            Err(e) => {
                warn!(error = %e, "advertisement failed");
                Err(ColocationError::AdvertisementFailed(e.to_string()))
            },
        }
    }

    /// Whether the channel pins this device to HOST.
    pub fn forces_host(&self) -> bool {
        self.channel.forces_host()
    }

    /// Stop advertising.
    pub async fn stop_advertising(&self) {
        self.channel.stop_advertising().await;
        debug!("advertisement stopped");
    }
}

/// How an [`OfflineChannel`] steers role negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleBias {
    /// Hear nothing and advertise; the session probe settles the role.
    #[default]
    Auto,
    /// Hear nothing, advertise, and host without probing the session.
    ForceHost,
    /// Hear the derived group immediately.
    ForceClient,
}

/// Radio-free discovery keyed by a session name.
#[derive(Debug, Clone)]
pub struct OfflineChannel<E> {
    group: GroupId,
    bias: RoleBias,
    env: E,
}

impl<E: Environment> OfflineChannel<E> {
    /// Channel for `session_name` with the given bias.
    pub fn new(session_name: &str, bias: RoleBias, env: E) -> Self {
        Self { group: GroupId::from_name(session_name), bias, env }
    }

    /// Group every device using the same session name agrees on.
    pub fn group_id(&self) -> GroupId {
        self.group
    }
}

#[async_trait]
impl<E: Environment> DiscoveryChannel for OfflineChannel<E> {
    async fn advertise(&self) -> Result<GroupId, DiscoveryError> {
        Ok(self.group)
    }

    async fn discover(&self, timeout: Duration) -> Result<Option<GroupId>, DiscoveryError> {
        match self.bias {
            RoleBias::ForceClient => Ok(Some(self.group)),
            RoleBias::Auto | RoleBias::ForceHost => {
                self.env.sleep(timeout).await;
                Ok(None)
            },
        }
    }

    async fn stop_advertising(&self) {}

    fn forces_host(&self) -> bool {
        self.bias == RoleBias::ForceHost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::SystemEnv;

    struct EarlyGiveUp;

    #[async_trait]
    impl DiscoveryChannel for EarlyGiveUp {
        async fn advertise(&self) -> Result<GroupId, DiscoveryError> {
            Err(DiscoveryError::AdvertisementRejected("radio busy".into()))
        }

        async fn discover(&self, _timeout: Duration) -> Result<Option<GroupId>, DiscoveryError> {
            Ok(None)
        }

        async fn stop_advertising(&self) {}
    }

    struct Broken;

    #[async_trait]
    impl DiscoveryChannel for Broken {
        async fn advertise(&self) -> Result<GroupId, DiscoveryError> {
            Err(DiscoveryError::Unavailable("no permission".into()))
        }

        async fn discover(&self, _timeout: Duration) -> Result<Option<GroupId>, DiscoveryError> {
            Err(DiscoveryError::Unavailable("no permission".into()))
        }

        async fn stop_advertising(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_waits_out_full_window() {
        let env = SystemEnv;
        let discovery = Discovery::new(Arc::new(EarlyGiveUp), env);
        let t0 = env.now();

        let outcome = discovery.discover(Duration::from_millis(3000)).await;

        assert_eq!(outcome, DiscoveryOutcome::NotFound);
        assert_eq!(env.now() - t0, Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_is_reported_not_raised() {
        let discovery = Discovery::new(Arc::new(Broken), SystemEnv);
        let outcome = discovery.discover(Duration::from_secs(1)).await;
        assert!(matches!(outcome, DiscoveryOutcome::Unavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn advertise_failure_maps_to_advertisement_failed() {
        let discovery = Discovery::new(Arc::new(EarlyGiveUp), SystemEnv);
        let error = discovery.advertise().await.unwrap_err();
        assert!(matches!(error, ColocationError::AdvertisementFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn force_client_hears_derived_group_at_once() {
        let env = SystemEnv;
        let channel = OfflineChannel::new("ShootingGame_Dev", RoleBias::ForceClient, env);
        let expected = channel.group_id();
        let discovery = Discovery::new(Arc::new(channel), env);
        let t0 = env.now();

        assert_eq!(
            discovery.discover(Duration::from_secs(3)).await,
            DiscoveryOutcome::Found(expected)
        );
        assert_eq!(env.now(), t0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_and_force_host_advertise_same_group() {
        let env = SystemEnv;
        let auto = OfflineChannel::new("lab", RoleBias::Auto, env);
        let host = OfflineChannel::new("lab", RoleBias::ForceHost, env);
        assert_eq!(auto.advertise().await.unwrap(), host.advertise().await.unwrap());
        assert_eq!(auto.discover(Duration::from_millis(10)).await.unwrap(), None);
    }

    #[test]
    fn only_force_host_pins_the_role() {
        let biases = [RoleBias::Auto, RoleBias::ForceHost, RoleBias::ForceClient];
        let forced: Vec<bool> = biases
            .into_iter()
            .map(|bias| Discovery::new(Arc::new(OfflineChannel::new("lab", bias, SystemEnv)), SystemEnv).forces_host())
            .collect();
        assert_eq!(forced, vec![false, true, false]);
        assert!(!Discovery::new(Arc::new(Broken), SystemEnv).forces_host());
    }
}

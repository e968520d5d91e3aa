//! Simulated short-range radio.
//!
//! All devices in a scenario share one [`SimAir`]. An advertisement is
//! visible to every other device's discover call from the instant it is
//! made until it is stopped. A device never hears its own advertisement.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use colocate_core::{
    env::Environment, error::DiscoveryError, group::GroupId, services::DiscoveryChannel,
};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Advert {
    device: String,
    group: GroupId,
}

/// Shared advertisement medium.
#[derive(Debug, Clone)]
pub struct SimAir {
    adverts: Arc<watch::Sender<Vec<Advert>>>,
}

impl Default for SimAir {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAir {
    /// Empty medium.
    pub fn new() -> Self {
        let (adverts, _) = watch::channel(Vec::new());
        Self { adverts: Arc::new(adverts) }
    }

    /// Radio for `device`.
    pub fn radio<E: Environment>(&self, device: impl Into<String>, env: E, faults: RadioFaults) -> SimRadio<E> {
        SimRadio { air: self.clone(), device: device.into(), env, faults }
    }

    /// Groups currently being advertised.
    pub fn advertised(&self) -> Vec<GroupId> {
        self.adverts.borrow().iter().map(|a| a.group).collect()
    }
}

/// Radio faults for one device.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadioFaults {
    /// Discovery and advertisement cannot start.
    pub unavailable: bool,
    /// Advertisement start is rejected.
    pub advertise_rejected: bool,
}

/// One device's view of the [`SimAir`].
#[derive(Debug, Clone)]
pub struct SimRadio<E> {
    air: SimAir,
    device: String,
    env: E,
    faults: RadioFaults,
}

#[async_trait]
impl<E: Environment> DiscoveryChannel for SimRadio<E> {
    async fn advertise(&self) -> Result<GroupId, DiscoveryError> {
        if self.faults.unavailable {
            return Err(DiscoveryError::Unavailable("radio off".to_string()));
        }
        if self.faults.advertise_rejected {
            return Err(DiscoveryError::AdvertisementRejected("advertiser busy".to_string()));
        }

        let group = GroupId::random(&self.env);
        let device = self.device.clone();
        self.air.adverts.send_modify(|adverts| {
            adverts.retain(|a| a.device != device);
            adverts.push(Advert { device, group });
        });
        debug!(device = %self.device, %group, "advert on air");
        Ok(group)
    }

    async fn discover(&self, timeout: Duration) -> Result<Option<GroupId>, DiscoveryError> {
        if self.faults.unavailable {
            return Err(DiscoveryError::Unavailable("radio off".to_string()));
        }

        let mut rx = self.air.adverts.subscribe();
        let device = self.device.as_str();

        let heard = tokio::select! {
            biased;
            heard = rx.wait_for(|adverts| adverts.iter().any(|a| a.device != device)) => {
                heard.ok().and_then(|adverts| adverts.iter().find(|a| a.device != device).map(|a| a.group))
            },
            () = self.env.sleep(timeout) => None,
        };
        Ok(heard)
    }

    async fn stop_advertising(&self) {
        let device = self.device.as_str();
        self.air.adverts.send_modify(|adverts| adverts.retain(|a| a.device != device));
    }
}

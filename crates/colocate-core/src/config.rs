//! Tunables for a colocation run and for post-ready calibration.

use std::time::Duration;

/// Timeouts and switches for one colocation run.
#[derive(Debug, Clone)]
pub struct ColocationConfig {
    /// How long to listen for a nearby advertisement before hosting.
    pub discovery_wait: Duration,

    /// Whether a host candidate probes for an existing session first.
    pub session_probe: bool,

    /// Join timeout for the session probe.
    pub probe_timeout: Duration,

    /// Bound on starting or joining the relayed session.
    pub transport_timeout: Duration,

    /// Delay before the single share retry.
    pub share_retry_backoff: Duration,

    /// How long a client waits for the host's room-shared record.
    pub shared_room_wait: Duration,

    /// Poll interval while waiting for the room-shared record.
    pub shared_room_poll_interval: Duration,

    /// Bound on loading the shared room. Exceeding it degrades to local data.
    pub room_load_timeout: Duration,

    /// Name under which the host's room record is persisted.
    pub record_name: String,
}

impl Default for ColocationConfig {
    fn default() -> Self {
        Self {
            discovery_wait: Duration::from_secs(3),
            session_probe: true,
            probe_timeout: Duration::from_secs(2),
            transport_timeout: Duration::from_secs(30),
            share_retry_backoff: Duration::from_millis(2500),
            shared_room_wait: Duration::from_secs(30),
            shared_room_poll_interval: Duration::from_millis(500),
            room_load_timeout: Duration::from_secs(30),
            record_name: "default".to_string(),
        }
    }
}

impl ColocationConfig {
    /// Worst-case time from Init to Ready, excluding the unbounded room
    /// capture.
    pub fn phase_budget(&self) -> Duration {
        let probe = if self.session_probe { self.probe_timeout } else { Duration::ZERO };
        self.discovery_wait
            + probe
            + self.transport_timeout
            + self.share_retry_backoff
            + self.shared_room_wait
            + self.room_load_timeout
    }
}

/// Calibration measurement settings.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Delay after a tracking reset before realigning.
    pub settle_delay: Duration,

    /// Calibration error below which status is PASS, in millimetres.
    pub pass_threshold_mm: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { settle_delay: Duration::from_millis(500), pass_threshold_mm: 10.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_startup_flow() {
        let config = ColocationConfig::default();
        assert_eq!(config.discovery_wait, Duration::from_secs(3));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.shared_room_wait, Duration::from_secs(30));
        assert_eq!(config.shared_room_poll_interval, Duration::from_millis(500));
        assert!(config.session_probe);
    }

    #[test]
    fn phase_budget_drops_probe_when_disabled() {
        let mut config = ColocationConfig::default();
        let with_probe = config.phase_budget();
        config.session_probe = false;
        assert_eq!(with_probe - config.phase_budget(), config.probe_timeout);
    }
}

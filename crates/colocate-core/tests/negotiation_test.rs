//! Role negotiation against the simulated radio and relay.

use std::{sync::Arc, time::Duration};

use colocate_core::{
    ColocationConfig, GroupId, Role,
    discovery::{Discovery, OfflineChannel, RoleBias},
    negotiate::RoleNegotiator,
    services::{DiscoveryChannel, SessionTransport},
    transport::SessionConnector,
};
use colocate_harness::{RadioFaults, SimEnv, Testbed};
use proptest::prelude::*;

fn negotiator(testbed: &Testbed, channel: Arc<dyn DiscoveryChannel>, env: SimEnv, config: &ColocationConfig) -> RoleNegotiator<SimEnv> {
    RoleNegotiator::new(
        Discovery::new(channel, env.clone()),
        SessionConnector::new(Arc::new(testbed.relay().endpoint(env.clone())), env),
        config,
    )
}

fn offline_pair(testbed: &Testbed, config: &ColocationConfig) -> (RoleNegotiator<SimEnv>, RoleNegotiator<SimEnv>) {
    let (env_a, env_b) = (testbed.env(0), testbed.env(1));
    let a = negotiator(testbed, Arc::new(OfflineChannel::new("lab", RoleBias::Auto, env_a.clone())), env_a, config);
    let b = negotiator(testbed, Arc::new(OfflineChannel::new("lab", RoleBias::Auto, env_b.clone())), env_b, config);
    (a, b)
}

/// Role a lone negotiator settles on when another device starts advertising
/// `advert_at` into the run.
fn role_with_advert_at(advert_at: Duration) -> Role {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build().unwrap();

    runtime.block_on(async move {
        let testbed = Testbed::new(1);
        let env = testbed.env(0);
        let radio = testbed.air().radio("me", env.clone(), RadioFaults::default());
        let other = testbed.air().radio("other", testbed.env(1), RadioFaults::default());
        let negotiator = negotiator(&testbed, Arc::new(radio), env, &ColocationConfig::default());

        let (negotiation, ()) = tokio::join!(negotiator.negotiate(), async {
            tokio::time::sleep(advert_at).await;
            other.advertise().await.unwrap();
        });
        negotiation.unwrap().role
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn advert_inside_window_makes_client(ms in 0u64..3000) {
        prop_assert_eq!(role_with_advert_at(Duration::from_millis(ms)), Role::Client);
    }

    #[test]
    fn advert_after_window_makes_host(ms in 3001u64..10_000) {
        prop_assert_eq!(role_with_advert_at(Duration::from_millis(ms)), Role::Host);
    }
}

#[tokio::test(start_paused = true)]
async fn simultaneous_candidates_split_on_probe() {
    let testbed = Testbed::new(2);
    let (a, b) = offline_pair(&testbed, &ColocationConfig::default());

    let (a, b) = tokio::join!(a.negotiate(), b.negotiate());
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut roles = [a.role, b.role];
    roles.sort_by_key(|role| matches!(role, Role::Client));
    assert_eq!(roles, [Role::Host, Role::Client]);
    assert_eq!(a.group_id, b.group_id);

    // Both probe connections were promoted, not leaked.
    let session_a = a.session.unwrap();
    let session_b = b.session.unwrap();
    assert_eq!(session_a.name(), session_b.name());
    assert_eq!(testbed.relay().participants(session_a.name()), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_relay_lets_both_candidates_host() {
    let testbed = Testbed::new(3);
    testbed.relay().set_join_delay(Duration::from_secs(3));
    let (a, b) = offline_pair(&testbed, &ColocationConfig::default());

    let (a, b) = tokio::join!(a.negotiate(), b.negotiate());
    let (a, b) = (a.unwrap(), b.unwrap());

    // Both probes outlive the probe bound.
    assert_eq!((a.role, b.role), (Role::Host, Role::Host));
    assert!(a.session.is_none() && b.session.is_none());

    // The late probe connections are released once they land.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(testbed.relay().joins(), 2);
    assert!(testbed.relay().live_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn without_probe_both_candidates_host() {
    let testbed = Testbed::new(4);
    let config = ColocationConfig { session_probe: false, ..ColocationConfig::default() };
    let (a, b) = offline_pair(&testbed, &config);

    let (a, b) = tokio::join!(a.negotiate(), b.negotiate());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!((a.role, b.role), (Role::Host, Role::Host));
    assert_eq!(testbed.relay().joins(), 0);
}

#[tokio::test(start_paused = true)]
async fn forced_client_skips_the_window() {
    let testbed = Testbed::new(5);
    let env = testbed.env(0);
    let channel = Arc::new(OfflineChannel::new("lab", RoleBias::ForceClient, env.clone()));
    let negotiator = negotiator(&testbed, channel, env, &ColocationConfig::default());

    let started = tokio::time::Instant::now();
    let negotiation = negotiator.negotiate().await.unwrap();

    assert_eq!(negotiation.role, Role::Client);
    assert!(negotiation.session.is_none());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn forced_host_ignores_a_waiting_client() {
    let testbed = Testbed::new(6);
    let env = testbed.env(0);

    // A forced client is already in the session when the host advertises.
    let session_name = GroupId::from_name("lab").session_name();
    let waiting = testbed.relay().endpoint(testbed.env(1)).start_or_join(&session_name).await.unwrap();
    assert_eq!(waiting.participant_count(), 1);

    let channel = Arc::new(OfflineChannel::new("lab", RoleBias::ForceHost, env.clone()));
    let negotiation = negotiator(&testbed, channel, env, &ColocationConfig::default()).negotiate().await.unwrap();

    assert_eq!(negotiation.role, Role::Host);
    assert_eq!(negotiation.group_id, GroupId::from_name("lab"));
    assert!(negotiation.session.is_none());
    assert_eq!(testbed.relay().joins(), 1);
}

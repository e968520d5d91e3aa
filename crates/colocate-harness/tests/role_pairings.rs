//! Every role-bias pairing ends with one host and an aligned client.

use std::time::Duration;

use colocate_core::{
    ColocationConfig,
    discovery::RoleBias,
    pose::{Pose, Vec3},
};
use colocate_harness::{
    DeviceSpec, fixtures,
    scenario::{Scenario, oracle},
};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Pairing {
    AutoAuto,
    ForceHostForceClient,
    AutoForceClient,
}

impl Pairing {
    fn biases(self) -> (RoleBias, RoleBias) {
        match self {
            Self::AutoAuto => (RoleBias::Auto, RoleBias::Auto),
            Self::ForceHostForceClient => (RoleBias::ForceHost, RoleBias::ForceClient),
            Self::AutoForceClient => (RoleBias::Auto, RoleBias::ForceClient),
        }
    }

    /// Start delay of the second device.
    ///
    /// A forced client already in the session when an Auto candidate probes
    /// demotes that candidate, so it arrives after the first probe.
    fn second_start(self, lag: Duration) -> Duration {
        match self {
            Self::AutoForceClient => Duration::from_millis(3500) + lag,
            Self::AutoAuto | Self::ForceHostForceClient => lag,
        }
    }
}

fn pairing_scenario(pairing: Pairing, session: &str, seed: u64, lag: Duration, client_frame: Pose) -> Scenario {
    let (first, second) = pairing.biases();
    Scenario::new(format!("{pairing:?} in {session:?}"))
        .seed(seed)
        .device("first", DeviceSpec::default().room(fixtures::room(1, Pose::IDENTITY)).offline(session, first))
        .device(
            "second",
            DeviceSpec::default()
                .room(fixtures::room(2, Pose::from_yaw(Vec3::new(0.4, 0.0, -0.2), 0.1)))
                .frame(client_frame)
                .offline(session, second)
                .start_after(pairing.second_start(lag)),
        )
}

async fn run_pairing(pairing: Pairing, session: &str, seed: u64, lag: Duration, client_frame: Pose) -> Result<(), String> {
    let budget = ColocationConfig::default().phase_budget();
    pairing_scenario(pairing, session, seed, lag, client_frame)
        .oracle(oracle::all_of(vec![
            oracle::all_ready(),
            oracle::group_ids_match(),
            oracle::exactly_one_host(),
            oracle::clients_aligned_to_host(),
            oracle::one_terminal_event_each(),
            oracle::finished_within(budget),
        ]))
        .run()
        .await
}

#[tokio::test(start_paused = true)]
async fn forced_host_serves_client_that_joined_first() {
    let frame = Pose::from_yaw(Vec3::new(1.5, 0.0, -2.0), 0.8);
    run_pairing(Pairing::ForceHostForceClient, "lab", 0, Duration::ZERO, frame).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn forced_host_and_client_with_empty_session_name() {
    run_pairing(Pairing::ForceHostForceClient, "", 0, Duration::ZERO, Pose::IDENTITY).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn forced_host_is_first_in_line_after_the_window() {
    Scenario::new("forced host vs waiting client")
        .device("host", DeviceSpec::default().offline("lab", RoleBias::ForceHost))
        .device("client", DeviceSpec::default().offline("lab", RoleBias::ForceClient))
        .oracle(Box::new(|world| {
            let host = world.device("host").ok_or("host missing")?;
            // Discovery window, then straight to sharing with no probe.
            if host.elapsed != Duration::from_secs(3) {
                return Err(format!("host took {}ms", host.elapsed.as_millis()));
            }
            let relay = world.testbed().relay();
            if relay.joins() != 2 {
                return Err(format!("expected one entry per device, got {}", relay.joins()));
            }
            Ok(())
        }))
        .run()
        .await
        .unwrap();
}

fn pairing() -> impl Strategy<Value = Pairing> {
    prop_oneof![
        Just(Pairing::AutoAuto),
        Just(Pairing::ForceHostForceClient),
        Just(Pairing::AutoForceClient),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_pairing_agrees_on_one_group(
        pairing in pairing(),
        session in "[A-Za-z0-9_ -]{0,16}",
        seed in any::<u64>(),
        lag_ms in 0u64..8000,
        x in -4.0f32..4.0,
        z in -4.0f32..4.0,
        yaw in -3.0f32..3.0,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build().unwrap();
        let frame = Pose::from_yaw(Vec3::new(x, 0.0, z), yaw);

        let result = runtime.block_on(run_pairing(pairing, &session, seed, Duration::from_millis(lag_ms), frame));
        prop_assert_eq!(result, Ok(()));
    }
}

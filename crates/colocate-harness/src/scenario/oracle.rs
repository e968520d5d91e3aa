//! Reusable oracles.

use std::time::Duration;

use colocate_core::{group::Role, state::ColocationState};

use crate::scenario::{OracleFn, World};

/// Every device reached Ready.
pub fn all_ready() -> OracleFn {
    Box::new(|world: &World| {
        if world.all_ready() {
            return Ok(());
        }
        for (name, device) in world.devices() {
            if device.state != ColocationState::Ready {
                return Err(format!(
                    "{name} should be Ready, got {:?} ({:?})",
                    device.state, device.error
                ));
            }
        }
        Ok(())
    })
}

/// Every device determined the same group.
pub fn group_ids_match() -> OracleFn {
    Box::new(|world: &World| {
        if world.group_ids_match() {
            return Ok(());
        }
        let groups: Vec<_> =
            world.devices().map(|(name, d)| format!("{name}={:?}", d.group_id)).collect();
        Err(format!("group ids differ: {}", groups.join(", ")))
    })
}

/// Exactly one device ended as HOST.
pub fn exactly_one_host() -> OracleFn {
    Box::new(|world: &World| match world.host_count() {
        1 => Ok(()),
        n => Err(format!("expected exactly one host, got {n}")),
    })
}

/// Every Ready device ended with collision on for its whole room.
pub fn collision_everywhere() -> OracleFn {
    Box::new(|world: &World| {
        for (name, device) in world.devices() {
            if let Some(outcome) = &device.outcome {
                if !outcome.room.collision_ready() {
                    return Err(format!("{name} reached Ready with collision disabled"));
                }
            }
        }
        Ok(())
    })
}

/// Every client loaded the host's room and sits on the host's floor.
pub fn clients_aligned_to_host() -> OracleFn {
    Box::new(|world: &World| {
        let mut hosts = world.devices().filter(|(_, d)| d.role == Some(Role::Host));
        let Some((host_name, host)) = hosts.next() else {
            return Err("no host".to_string());
        };
        let host_floor = host.outcome.as_ref().ok_or_else(|| format!("{host_name} has no outcome"))?.room.floor;

        for (name, device) in world.devices().filter(|(_, d)| d.role == Some(Role::Client)) {
            let outcome = device.outcome.as_ref().ok_or_else(|| format!("{name} has no outcome"))?;
            if outcome.degraded {
                return Err(format!("{name} degraded after {}ms", device.elapsed.as_millis()));
            }
            if !outcome.room.floor.approx_eq(&host_floor, 1e-3) {
                return Err(format!("{name} floor {:?} not on host floor {host_floor:?}", outcome.room.floor));
            }
        }
        Ok(())
    })
}

/// Every device emitted exactly one terminal event.
pub fn one_terminal_event_each() -> OracleFn {
    Box::new(|world: &World| {
        for (name, device) in world.devices() {
            let n = device.terminal_events();
            if n != 1 {
                return Err(format!("{name} emitted {n} terminal events"));
            }
        }
        Ok(())
    })
}

/// Every device finished within `budget` of its start.
pub fn finished_within(budget: Duration) -> OracleFn {
    Box::new(move |world: &World| {
        for (name, device) in world.devices() {
            if device.elapsed > budget {
                return Err(format!(
                    "{name} took {}ms, budget {}ms",
                    device.elapsed.as_millis(),
                    budget.as_millis()
                ));
            }
        }
        Ok(())
    })
}

/// Every oracle in `oracles` holds.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
}

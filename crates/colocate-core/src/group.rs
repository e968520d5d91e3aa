//! Group identifiers, roles and session descriptors.
//!
//! A [`GroupId`] correlates three things that otherwise know nothing about
//! each other: the short-range advertisement, the relayed session name and
//! the spatial-anchor sharing group.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

use crate::env::Environment;

/// Namespace for name-derived group identifiers.
const GROUP_NAMESPACE: Uuid = Uuid::from_u128(0x6c0c_a7e0_5e55_4a1f_9d2b_c010_ca7e_0001_u128);

/// Opaque 128-bit colocation group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Wrap a raw 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Derive a stable identifier from a session name.
    ///
    /// Used for offline and bench runs where no discovery channel exists.
    /// The same name always yields the same identifier.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&GROUP_NAMESPACE, name.as_bytes()))
    }

    /// Draw a fresh random identifier from the environment.
    pub fn random<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; 16];
        env.random_bytes(&mut bytes);
        Self(Builder::from_random_bytes(bytes).into_uuid())
    }

    /// Name of the relayed session bound to this group.
    pub fn session_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for GroupId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Asymmetric colocation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Owns room capture, sharing and session authority.
    Host,
    /// Loads and aligns to the host's room.
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("HOST"),
            Self::Client => f.write_str("CLIENT"),
        }
    }
}

/// Relayed session this device takes part in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    /// Session name, the string form of the group identifier.
    pub name: String,
    /// Role this device plays in the session.
    pub role: Role,
}

impl SessionDescriptor {
    /// Descriptor for `group` played as `role`.
    pub fn new(group: GroupId, role: Role) -> Self {
        Self { name: group.session_name(), role }
    }
}

/// Capability for reading the current group identifier.
///
/// Handed to sibling components at composition time so they never reach into
/// the orchestrator's internals.
pub trait GroupIdProvider: Send + Sync {
    /// Group identifier, once determined.
    fn group_id(&self) -> Option<GroupId>;
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::env::SystemEnv;

    #[test]
    fn session_name_is_hyphenated_uuid() {
        let group = GroupId::from_u128(0x1234_5678_90ab_cdef_1234_5678_90ab_cdef);
        assert_eq!(group.session_name(), "12345678-90ab-cdef-1234-567890abcdef");
    }

    #[test]
    fn random_ids_differ() {
        let env = SystemEnv;
        assert_ne!(GroupId::random(&env), GroupId::random(&env));
    }

    #[test]
    fn descriptor_uses_group_string() {
        let group = GroupId::from_name("ShootingGame_Dev");
        let descriptor = SessionDescriptor::new(group, Role::Client);
        assert_eq!(descriptor.name, group.to_string());
        assert_eq!(descriptor.role, Role::Client);
    }

    proptest! {
        #[test]
        fn name_derivation_is_stable(name in ".{0,64}") {
            prop_assert_eq!(GroupId::from_name(&name), GroupId::from_name(&name));
        }

        #[test]
        fn display_parses_back(value in any::<u128>()) {
            let group = GroupId::from_u128(value);
            let parsed: GroupId = group.to_string().parse().unwrap();
            prop_assert_eq!(parsed, group);
        }
    }
}

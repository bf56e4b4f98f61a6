//! Typed identifiers for roles and users.
//!
//! Both wrap the store's integer primary key. They're transparent on the
//! wire so persisted JSON (`"role": [1, 2]`) stays a plain number list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A role identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(u32);

/// A user identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u32);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap a raw store key.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// The raw store key.
            pub const fn get(&self) -> u32 {
                self.0
            }

            /// Parse from decimal text (cache keys, query strings).
            pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u32> for $T {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl From<$T> for u32 {
            fn from(id: $T) -> u32 {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_typed_id!(RoleId, "RoleId");
impl_typed_id!(UserId, "UserId");

// ── Well-known roles ────────────────────────────────────────────────────────

impl RoleId {
    /// The protected `guest` role.
    pub const GUEST: RoleId = RoleId(1);

    /// The protected `admin` role.
    pub const ADMIN: RoleId = RoleId(2);
}

//! Permission bits checked against namespace grants.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Access bits carried by a namespace grant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// May see the namespace
        const READ = 0b0000_0001;
        /// May modify the namespace
        const UPDATE = 0b0000_0010;
        /// May create below the namespace
        const CREATE = 0b0000_0100;
        /// May delete the namespace
        const DELETE = 0b0000_1000;
        /// Full control
        const CRUD = Self::READ.bits() | Self::UPDATE.bits() | Self::CREATE.bits() | Self::DELETE.bits();
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl Permissions {
    /// Downgrade to read-only, keeping READ only where it was already granted.
    pub fn read_only(self) -> Self {
        self & Self::READ
    }
}

// Grants are persisted as their raw bitmask.
impl Serialize for Permissions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid Permissions bits: {:#04x}", bits))
        })
    }
}

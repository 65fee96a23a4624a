//! Network id handshake.
//!
//! ```text
//! Idle ──request──▶ Requesting ──IdGranted──▶ Granted(id) ──consume──▶ Idle
//! ```
//!
//! The host hands out ids from a single counter, so two requests can never
//! receive the same id.

use super::error::{ReplicationError, ReplicationResult};
use crate::protocol::NetworkId;

/// Client-side handshake state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing requested.
    #[default]
    Idle,
    /// Request sent, waiting for the grant.
    Requesting,
    /// Grant received, not yet bound to an entity.
    Granted(NetworkId),
}

impl HandshakeState {
    /// Moves to `Requesting`.
    ///
    /// # Errors
    ///
    /// Returns `GrantOutstanding` unless idle.
    pub fn begin(&mut self) -> ReplicationResult<()> {
        if *self != Self::Idle {
            return Err(ReplicationError::GrantOutstanding);
        }
        *self = Self::Requesting;
        Ok(())
    }

    /// Records a grant. Returns false if none was requested.
    pub fn grant(&mut self, id: NetworkId) -> bool {
        if *self != Self::Requesting {
            return false;
        }
        *self = Self::Granted(id);
        true
    }

    /// The granted id, if one is pending.
    #[must_use]
    pub const fn pending(self) -> Option<NetworkId> {
        match self {
            Self::Granted(id) => Some(id),
            Self::Idle | Self::Requesting => None,
        }
    }

    /// Takes the pending grant and returns to `Idle`.
    pub fn take(&mut self) -> Option<NetworkId> {
        let id = self.pending()?;
        *self = Self::Idle;
        Some(id)
    }
}

/// Host-side id counter. Ids start at 1; 0 is never issued.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Issues the next id.
    pub fn allocate(&mut self) -> NetworkId {
        let id = NetworkId(self.next);
        // Wrapping past u32::MAX skips the invalid id
        self.next = self.next.checked_add(1).unwrap_or(1);
        id
    }

    /// Number of ids issued so far, modulo wrap.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.next - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

//! Identifiers that cross the wire.

use std::fmt;

/// Session-wide entity identity, allocated only by the host.
///
/// Ids start at 1; 0 is never handed out and means "no identity".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NetworkId(pub u32);

impl NetworkId {
    /// The invalid id.
    pub const INVALID: Self = Self(0);

    /// Returns true unless this is [`Self::INVALID`].
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// Identity of a peer in the session. The host is always [`PeerId::HOST`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// The host's identity.
    pub const HOST: Self = Self(0);
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Stable on-wire component identifier.
///
/// Wire ids are part of the deployed protocol. Once assigned to a component
/// type they must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct WireId(pub u8);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire#{}", self.0)
    }
}

//! Component signatures.
//!
//! One bit per registered component type. A system matches an entity when
//! the entity's signature contains every bit of the system's signature.

use super::component::ComponentType;
use std::ops::{BitAnd, BitOr};

/// Maximum number of component types a world can register.
pub const MAX_COMPONENTS: usize = 32;

/// Fixed-width bitset over component-type indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Signature(u32);

impl Signature {
    /// Signature with no bits set.
    pub const EMPTY: Self = Self(0);

    /// Creates a signature from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns a copy with the component's bit set.
    #[inline]
    #[must_use]
    pub const fn with(self, component: ComponentType) -> Self {
        Self(self.0 | (1 << component.raw()))
    }

    /// Returns a copy with the component's bit cleared.
    #[inline]
    #[must_use]
    pub const fn without(self, component: ComponentType) -> Self {
        Self(self.0 & !(1 << component.raw()))
    }

    /// Returns true if the component's bit is set.
    #[inline]
    #[must_use]
    pub const fn has(self, component: ComponentType) -> bool {
        self.0 & (1 << component.raw()) != 0
    }

    /// Returns true if every bit of `required` is also set here.
    #[inline]
    #[must_use]
    pub const fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Returns true if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of component types in the signature.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl BitAnd for Signature {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Signature {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl FromIterator<ComponentType> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_and_without() {
        let a = ComponentType::from_raw(0);
        let b = ComponentType::from_raw(31);

        let signature = Signature::EMPTY.with(a).with(b);
        assert!(signature.has(a));
        assert!(signature.has(b));
        assert_eq!(signature.count(), 2);

        let signature = signature.without(a);
        assert!(!signature.has(a));
        assert_eq!(signature.bits(), 1 << 31);
    }

    #[test]
    fn test_superset_match() {
        let required = Signature::from_bits(0b0110);
        assert!(Signature::from_bits(0b0110).contains(required));
        assert!(Signature::from_bits(0b1111).contains(required));
        assert!(!Signature::from_bits(0b0100).contains(required));
        assert!(Signature::from_bits(0b1000).contains(Signature::EMPTY));
    }

    #[test]
    fn test_collect() {
        let signature: Signature = [0, 2, 4]
            .into_iter()
            .map(ComponentType::from_raw)
            .collect();
        assert_eq!(signature, Signature::from_bits(0b10101));
    }
}

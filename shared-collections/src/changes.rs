// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-field change flags recorded while merging remote updates into local state.
use std::fmt;
use std::marker::PhantomData;

/// A field whose change can be recorded in [`Changes`].
pub trait ChangeKind: Copy + fmt::Debug + 'static {
    /// All flags of this kind, in bit order.
    const ALL: &'static [Self];

    /// Bit position of this flag.
    fn bit(self) -> u8;
}

/// Change flags of a [`Collection`](crate::Collection).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionChange {
    New,
    Name,
    Cover,
    Removed,
}

impl ChangeKind for CollectionChange {
    const ALL: &'static [Self] = &[Self::New, Self::Name, Self::Cover, Self::Removed];

    fn bit(self) -> u8 {
        self as u8
    }
}

/// Change flags of a [`Member`](crate::Member).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberChange {
    New,
    Name,
    Order,
    Removed,
}

impl ChangeKind for MemberChange {
    const ALL: &'static [Self] = &[Self::New, Self::Name, Self::Order, Self::Removed];

    fn bit(self) -> u8 {
        self as u8
    }
}

/// Bitmask of changed fields.
///
/// Flags are only ever set while merging, consumers clear them with [`Changes::clear`] once
/// they have been delivered.
pub struct Changes<C> {
    bits: u8,
    _marker: PhantomData<C>,
}

impl<C: ChangeKind> Changes<C> {
    pub fn new() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    pub fn set(&mut self, change: C) {
        self.bits |= 1 << change.bit();
    }

    pub fn contains(&self, change: C) -> bool {
        self.bits & (1 << change.bit()) != 0
    }

    /// Returns true if any flag is set.
    pub fn any(&self) -> bool {
        self.bits != 0
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = C> + '_ {
        C::ALL.iter().copied().filter(|change| self.contains(*change))
    }
}

impl<C: ChangeKind> Default for Changes<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for Changes<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Changes<C> {}

impl<C> PartialEq for Changes<C> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<C> Eq for Changes<C> {}

impl<C: ChangeKind> fmt::Debug for Changes<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Changes, CollectionChange, MemberChange};

    #[test]
    fn set_and_query() {
        let mut changes = Changes::<CollectionChange>::new();
        assert!(!changes.any());

        changes.set(CollectionChange::Cover);
        assert!(changes.any());
        assert!(changes.contains(CollectionChange::Cover));
        assert!(!changes.contains(CollectionChange::Name));

        changes.set(CollectionChange::Cover);
        changes.set(CollectionChange::New);
        assert_eq!(
            changes.iter().collect::<Vec<_>>(),
            vec![CollectionChange::New, CollectionChange::Cover]
        );

        changes.clear();
        assert!(!changes.any());
    }

    #[test]
    fn debug_lists_flags() {
        let mut changes = Changes::<MemberChange>::new();
        changes.set(MemberChange::Order);
        assert_eq!(format!("{changes:?}"), "{Order}");
    }
}

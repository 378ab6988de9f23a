// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dictionary of named attributes carried by collections and members.
//!
//! The dictionary is only allocated once a tag gets written. An absent dictionary and an empty
//! one read the same, the distinction only matters for telling apart "attributes were never
//! received" from "attributes were received and are empty".
//!
//! An empty value acts as a delete marker when attributes get rebased on inherited defaults, see
//! [`Attributes::rebase_on`].
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag of the display name attribute.
pub const NAME_TAG: &str = "n";

/// Plain mapping from attribute tag to value.
pub type AttributeMap = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Attributes(Option<AttributeMap>);

impl Attributes {
    /// Returns an absent attribute dictionary.
    pub fn new() -> Self {
        Self(None)
    }

    /// Wraps the given map, an empty map is stored as absent.
    pub fn from_map(map: AttributeMap) -> Self {
        if map.is_empty() {
            Self(None)
        } else {
            Self(Some(map))
        }
    }

    /// Wraps the given map and keeps it present even when empty.
    pub(crate) fn present(map: AttributeMap) -> Self {
        Self(Some(map))
    }

    /// Returns true if a dictionary is allocated, even if it holds no tags.
    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_ref().is_none_or(|map| map.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |map| map.len())
    }

    pub fn as_map(&self) -> Option<&AttributeMap> {
        self.0.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|map| map.iter())
            .map(|(tag, value)| (tag.as_str(), value.as_str()))
    }

    /// Returns the value for `tag` or an empty string if it is not set.
    pub fn get(&self, tag: &str) -> &str {
        self.0
            .as_ref()
            .and_then(|map| map.get(tag))
            .map_or("", |value| value.as_str())
    }

    /// Sets `tag` to `value`, allocating the dictionary if needed.
    ///
    /// An empty value is kept as a delete marker.
    pub fn set(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.0
            .get_or_insert_with(AttributeMap::new)
            .insert(tag.into(), value.into());
    }

    /// Merges inherited `base` attributes underneath the local ones.
    ///
    /// Local tags with a value override the base, local tags with an empty value remove the tag
    /// from the result and tags missing locally are inherited from the base. Does nothing when
    /// `base` is absent. The delete markers are consumed by the merge.
    pub fn rebase_on(&mut self, base: &Attributes) {
        let Some(base) = base.as_map() else {
            return;
        };

        let rebased = match self.0.take() {
            Some(local) if !local.is_empty() => {
                let mut rebased = base.clone();
                for (tag, value) in local {
                    if value.is_empty() {
                        rebased.remove(&tag);
                    } else {
                        rebased.insert(tag, value);
                    }
                }
                rebased
            }
            _ => base.clone(),
        };

        self.0 = if rebased.is_empty() {
            None
        } else {
            Some(rebased)
        };
    }

    /// Returns true if the value of `tag` differs between `self` and `other`.
    pub fn has_changed(&self, tag: &str, other: &Attributes) -> bool {
        self.get(tag) != other.get(tag)
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        // Absent and empty dictionaries are the same to readers.
        let this = self.0.as_ref().filter(|map| !map.is_empty());
        let other = other.0.as_ref().filter(|map| !map.is_empty());
        this == other
    }
}

impl Eq for Attributes {}

impl From<AttributeMap> for Attributes {
    fn from(value: AttributeMap) -> Self {
        Self::from_map(value)
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(tag, value)| (tag.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeMap, Attributes, NAME_TAG};

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().copied().collect()
    }

    #[test]
    fn lazy_allocation() {
        let mut attributes = Attributes::new();
        assert!(!attributes.is_present());
        assert_eq!(attributes.get(NAME_TAG), "");

        attributes.set(NAME_TAG, "Holidays");
        assert!(attributes.is_present());
        assert_eq!(attributes.get(NAME_TAG), "Holidays");
        assert_eq!(attributes.get("missing"), "");
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn absent_equals_empty() {
        assert_eq!(Attributes::new(), Attributes::present(AttributeMap::new()));
        assert!(!Attributes::from_map(AttributeMap::new()).is_present());
        assert!(Attributes::present(AttributeMap::new()).is_present());
        assert!(Attributes::present(AttributeMap::new()).is_empty());
    }

    #[test]
    fn rebase_overrides_and_inherits() {
        let mut local = attrs(&[("n", "local")]);
        local.rebase_on(&attrs(&[("n", "base"), ("c", "cover")]));
        assert_eq!(local, attrs(&[("n", "local"), ("c", "cover")]));
    }

    #[test]
    fn rebase_delete_marker() {
        let mut local = attrs(&[("n", "")]);
        local.rebase_on(&attrs(&[("n", "x"), ("c", "y")]));
        assert_eq!(local, attrs(&[("c", "y")]));
        assert_eq!(local.as_map().unwrap().get("n"), None);
    }

    #[test]
    fn rebase_on_empty_local_copies_base() {
        let base = attrs(&[("n", "x"), ("c", "y")]);

        let mut local = Attributes::new();
        local.rebase_on(&base);
        assert_eq!(local, base);

        let mut local = Attributes::present(AttributeMap::new());
        local.rebase_on(&base);
        assert_eq!(local, base);
    }

    #[test]
    fn rebase_on_absent_base_is_noop() {
        let mut local = attrs(&[("n", "")]);
        local.rebase_on(&Attributes::new());
        assert_eq!(local.as_map().unwrap().get("n").map(String::as_str), Some(""));
    }

    #[test]
    fn rebase_releases_empty_result() {
        let mut local = attrs(&[("n", "")]);
        local.rebase_on(&attrs(&[("n", "x")]));
        assert!(!local.is_present());

        let mut local = Attributes::new();
        local.rebase_on(&Attributes::present(AttributeMap::new()));
        assert!(!local.is_present());
    }

    #[test]
    fn rebase_is_idempotent() {
        let base = attrs(&[("n", "x"), ("c", "y"), ("d", "z")]);
        let mut once = attrs(&[("n", "mine"), ("e", "extra")]);
        once.rebase_on(&base);

        let mut twice = once.clone();
        twice.rebase_on(&base);

        assert_eq!(once, twice);
    }

    #[test]
    fn rebase_consumes_delete_marker() {
        let base = attrs(&[("n", "x"), ("c", "y")]);
        let mut local = attrs(&[("n", "")]);

        local.rebase_on(&base);
        assert_eq!(local, attrs(&[("c", "y")]));

        // The marker is gone, so a second rebase inherits the tag again.
        local.rebase_on(&base);
        assert_eq!(local, attrs(&[("n", "x"), ("c", "y")]));
    }

    #[test]
    fn attribute_change_detection() {
        let local = attrs(&[("n", "A")]);
        assert!(!local.has_changed("n", &attrs(&[("n", "A")])));
        assert!(local.has_changed("n", &attrs(&[("n", "B")])));
        assert!(local.has_changed("n", &Attributes::new()));
        assert!(!local.has_changed("c", &Attributes::new()));
        assert!(!Attributes::new().has_changed("n", &attrs(&[("n", "")])));
    }
}

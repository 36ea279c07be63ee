use derive_more::{Deref, DerefMut};
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap as _HashMap;

/// Signed index / size type used for every per-dimension quantity.
pub type Idx = i64;

/// Product of `values`, or `None` on overflow.
pub fn try_product(values: impl IntoIterator<Item = Idx>) -> Option<Idx> {
    values.into_iter().try_fold(1, Idx::checked_mul)
}

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;

/// Ordered `dimension name -> value` tuple.
///
/// Iteration follows insertion order, which is the declaration order of the
/// dimensions, so printed tuples and products are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdxTuple(IndexMap<String, Idx>);

impl IdxTuple {
    /// Empty tuple.
    pub fn new() -> Self {
        Self(IndexMap::default())
    }

    /// Tuple over `names`, every entry set to `value`.
    pub fn filled<'a>(names: impl IntoIterator<Item = &'a str>, value: Idx) -> Self {
        Self(names.into_iter().map(|n| (n.to_owned(), value)).collect())
    }

    /// Value for `dim`, or `0` when absent.
    #[must_use]
    pub fn val(&self, dim: &str) -> Idx {
        self.0.get(dim).copied().unwrap_or(0)
    }

    /// Set `dim` to `value`, appending the dimension if it is new.
    pub fn set_val(&mut self, dim: &str, value: Idx) {
        match self.0.get_mut(dim) {
            Some(slot) => *slot = value,
            None => {
                self.0.insert(dim.to_owned(), value);
            }
        }
    }

    /// Product of all values, `1` for an empty tuple, or `None` on overflow.
    #[must_use]
    pub fn try_product(&self) -> Option<Idx> {
        try_product(self.0.values().copied())
    }

    /// Element-wise combination with `other`; dimensions missing from
    /// `other` read as `0`.
    #[must_use]
    pub fn map_with(&self, other: &Self, f: impl Fn(Idx, Idx) -> Idx) -> Self {
        Self(
            self.0
                .iter()
                .map(|(dim, &v)| (dim.clone(), f(v, other.val(dim))))
                .collect(),
        )
    }

    /// Subtract `n` from every value.
    #[must_use]
    pub fn sub_elements(&self, n: Idx) -> Self {
        Self(self.0.iter().map(|(dim, &v)| (dim.clone(), v - n)).collect())
    }

    /// `x=1, y=2` rendering.
    #[must_use]
    pub fn dim_val_str(&self) -> String {
        self.join_with(", ", |dim, v| format!("{dim}={v}"))
    }

    /// `x=+1, y=-2` rendering, used for offsets.
    #[must_use]
    pub fn dim_val_offset_str(&self) -> String {
        self.join_with(", ", |dim, v| format!("{dim}{v:+}"))
    }

    /// Values only, joined by `sep` (e.g. `64 * 64 * 32`).
    #[must_use]
    pub fn val_str(&self, sep: &str) -> String {
        self.join_with(sep, |_, v| v.to_string())
    }

    fn join_with(&self, sep: &str, f: impl Fn(&str, Idx) -> String) -> String {
        self.0
            .iter()
            .map(|(dim, &v)| f(dim, v))
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl FromIterator<(String, Idx)> for IdxTuple {
    fn from_iter<I: IntoIterator<Item = (String, Idx)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_declaration_order() {
        let mut t = IdxTuple::filled(["x", "y", "z"], 4);
        t.set_val("y", 8);
        assert_eq!(t.dim_val_str(), "x=4, y=8, z=4");
        assert_eq!(t.val_str(" * "), "4 * 8 * 4");
        assert_eq!(t.try_product(), Some(128));
        assert_eq!(t.sub_elements(1).val_str(" "), "3 7 3");
    }

    #[test]
    fn offsets_carry_sign() {
        let t: IdxTuple = [("x".to_owned(), 3), ("y".to_owned(), -2)]
            .into_iter()
            .collect();
        assert_eq!(t.dim_val_offset_str(), "x+3, y-2");
    }

    #[test]
    fn missing_dims_read_as_zero() {
        let a = IdxTuple::filled(["x", "y"], 5);
        let b = IdxTuple::filled(["x"], 2);
        assert_eq!(a.map_with(&b, |l, r| l * r).val_str(","), "10,0");
        assert_eq!(a.val("w"), 0);
        assert_eq!(IdxTuple::new().try_product(), Some(1));
    }

    #[test]
    fn product_overflow_is_detected() {
        let t = IdxTuple::filled(["x", "y", "z"], 3_000_000);
        assert_eq!(t.try_product(), None);
        assert_eq!(try_product([Idx::MAX, 1]), Some(Idx::MAX));
        assert_eq!(try_product([Idx::MAX, 2]), None);
    }
}

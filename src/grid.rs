use crate::{error::SolutionResult, types::IdxTuple};
use core::fmt::Debug;

/// Sizes a grid must adopt after a parameter change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridLayout {
    /// Points per rank per domain dimension.
    pub domain_sizes: IdxTuple,
    /// Requested padding per domain dimension (minimum plus extra).
    pub pad_sizes: IdxTuple,
}

impl GridLayout {
    /// Elements needed to hold the padded domain once, or `None` if the
    /// count overflows.
    #[must_use]
    pub fn num_elements(&self) -> Option<usize> {
        let padded = self.domain_sizes.map_with(&self.pad_sizes, |size, pad| {
            size.saturating_add(pad.max(0).saturating_mul(2)).max(0)
        });
        padded.try_product().map(|n| usize::try_from(n).unwrap_or(0))
    }
}

/// Storage capability of an opaque data grid.
///
/// The update mathematics live elsewhere; the control layer only resizes,
/// allocates, releases and aliases storage. Every method takes `&self`
/// because handles are shared between the registry and the compute engine.
pub trait Grid: Debug + Send + Sync {
    /// Name of the grid.
    fn name(&self) -> &str;

    /// Adopt new sizes. Existing storage is kept until the next allocation.
    fn update_layout(&self, layout: &GridLayout);

    /// Allocate storage for the current layout, replacing any previous one.
    ///
    /// # Errors
    /// If the allocation cannot be satisfied.
    fn alloc_storage(&self) -> SolutionResult<()>;

    /// Drop this grid's storage. Returns `false` when there was none.
    fn release_storage(&self) -> bool;

    /// Alias `source`'s storage instead of owning separate memory.
    ///
    /// # Errors
    /// If `source` holds no storage or the layouts are incompatible.
    fn share_storage(&self, source: &Self) -> SolutionResult<()>;

    /// Bytes currently held.
    fn num_bytes(&self) -> usize;

    /// Whether storage is currently held.
    fn has_storage(&self) -> bool;
}

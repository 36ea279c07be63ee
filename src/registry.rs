use crate::{
    error::{SolutionError, SolutionResult},
    grid::{Grid, GridLayout},
    types::IndexMap,
};
use std::sync::Arc;

/// Name-keyed registry of grid handles with a marked output subset.
///
/// Both maps keep registration order, so they double as the ordered lists
/// that allocation walks.
#[must_use]
#[derive(Debug)]
pub struct GridRegistry<G: Grid> {
    grids: IndexMap<String, Arc<G>>,
    outputs: IndexMap<String, Arc<G>>,
}

impl<G: Grid> Default for GridRegistry<G> {
    fn default() -> Self {
        Self {
            grids: IndexMap::default(),
            outputs: IndexMap::default(),
        }
    }
}

impl<G: Grid> GridRegistry<G> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `grid` under `name`, also to the output subset if `is_output`.
    ///
    /// # Errors
    /// [`SolutionError::DuplicateGrid`] if `name` is taken; the registry is
    /// left unchanged.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        grid: Arc<G>,
        is_output: bool,
    ) -> SolutionResult<()> {
        let Self { grids, outputs } = self;
        let name = name.into();
        if grids.contains_key(&name) {
            return Err(SolutionError::DuplicateGrid { name });
        }
        if is_output {
            outputs.insert(name.clone(), grid.clone());
        }
        grids.insert(name, grid);
        Ok(())
    }

    /// Alias every grid whose name also exists in `source` to the source's
    /// storage. Names missing from `source` are skipped.
    ///
    /// Returns how many grids were aliased.
    ///
    /// # Errors
    /// Whatever the grid reports when aliasing a matched pair.
    pub fn share_storage(&self, source: &Self) -> SolutionResult<usize> {
        let mut shared = 0;
        for (name, grid) in &self.grids {
            let Some(src) = source.grids.get(name) else {
                continue;
            };
            grid.share_storage(src)?;
            shared += 1;
        }
        Ok(shared)
    }

    /// Push `layout` to every grid.
    pub fn update_layouts(&self, layout: &GridLayout) {
        for grid in self.grids.values() {
            grid.update_layout(layout);
        }
    }

    /// Release every grid's storage; returns how many actually held some.
    pub fn release_all(&self) -> usize {
        self.grids
            .values()
            .filter(|grid| grid.release_storage())
            .count()
    }

    /// Grid registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<G>> {
        self.grids.get(name)
    }

    /// Whether `name` is registered as an output grid.
    #[must_use]
    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// All grids in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<G>)> {
        self.grids.iter().map(|(n, g)| (n.as_str(), g))
    }

    /// Output grids in registration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Arc<G>)> {
        self.outputs.iter().map(|(n, g)| (n.as_str(), g))
    }

    /// Number of grids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Whether no grid is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Number of output grids.
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Bytes held by all grids.
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.grids.values().map(|g| g.num_bytes()).sum()
    }
}

use crate::{
    collab::{
        AutoTuner, Coordination, HostAllocator, HostGrid, QuietTuner, SingleRank,
        StorageAllocator, TilingEngine, UniformTiling,
    },
    grid::Grid,
};

/// Configuration entry-point for instantiating a solution.
///
/// A concrete `Config` binds the grid type and every external collaborator
/// a [`Solution`](crate::solution::Solution) drives: distributed
/// coordination, settings normalization and tiling, auto-tuning, and
/// storage allocation.
pub trait Config: Sized + 'static {
    /// Data grid handle type.
    type Grid: Grid;
    /// Distributed coordination.
    type Env: Coordination;
    /// Settings normalization and rank geometry.
    type Tiling: TilingEngine;
    /// Tiling-size auto-tuner.
    type Tuner: AutoTuner;
    /// Grid, scratch and communication memory.
    type Storage: StorageAllocator<Self::Grid>;
}

/// Single-process configuration backed by heap storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostConfig;

impl Config for HostConfig {
    type Grid = HostGrid;
    type Env = SingleRank;
    type Tiling = UniformTiling;
    type Tuner = QuietTuner;
    type Storage = HostAllocator;
}

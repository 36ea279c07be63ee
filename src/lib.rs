//! Configuration, lifecycle and performance accounting for a tile-scheduled
//! stencil solution.
//!
//! This crate is the control layer a compute engine runs under. It:
//! - Holds the dimension-keyed sizing parameters (rank counts, rank and tile
//!   sizes, padding) and invalidates derived geometry whenever one of them
//!   changes the decomposition.
//! - Sequences preparation: barrier, settings normalization, thread-count
//!   policy, geometry, then storage allocation with grids first so they get
//!   the preferred memory.
//! - Reconciles overlapping wall-clock timers (`run`, `halo`, `wait`, `test`,
//!   `exterior`, `interior`) into a disjoint breakdown, with a per-pack
//!   rollup that never exceeds the total compute time.
//!
//! Key modules:
//! - `config`: binds the grid type and the external collaborators via the
//!   `Config` trait.
//! - `collab`: collaborator traits (coordination, tiling, tuning, storage)
//!   and in-process implementations.
//! - `params`: the parameter store and its per-parameter contracts.
//! - `solution`: the lifecycle controller.
//! - `stats`: timer reconciliation and reporting.
//!
//! Quick start:
//! 1. Pick a `Config` (e.g. `HostConfig`) and create a `Solution` from
//!    `Dims`.
//! 2. Register grids and work packs, set sizes, then call `prepare`.
//! 3. Execute through `Solution::run`, read `report_stats`, and finish with
//!    `end`.

/// Collaborator interfaces and in-process implementations.
///
/// The solution delegates distributed coordination, settings normalization
/// and rank geometry, auto-tuning, and memory management to these traits.
pub mod collab;
/// Public interface to configure a solution.
///
/// Exposes the `Config` trait which binds the grid type and collaborators
/// for a concrete instantiation of [`solution::Solution`].
pub mod config;
/// Dimension names and kinds.
pub mod dims;
/// Error taxonomy.
pub mod error;
/// Bounding boxes and the rank geometry derived from settings.
pub mod geometry;
/// The grid handle interface.
pub mod grid;
/// Work packs and their per-step work estimates.
pub mod pack;
/// Dimension-keyed sizing parameters with kind checks and invalidation.
pub mod params;
/// Name-keyed grid registry.
pub mod registry;
/// Value-level kernel settings.
pub mod settings;
/// The lifecycle controller: `prepare`, execution windows, reporting and
/// `end`.
pub mod solution;
/// Timer reconciliation, per-pack rollup and report rendering.
pub mod stats;
/// Thread-count policy and the region pool.
pub mod threads;
/// Accumulating wall-clock timers.
pub mod timer;
/// Core aliases and the dimension-keyed tuple.
pub mod types;
/// Human-readable number formatting.
pub mod utils;

pub use crate::{
    config::{Config, HostConfig},
    dims::{DimKind, Dims},
    error::{SolutionError, SolutionResult},
    params::{SizingParam, ThreadOption},
    solution::{Phase, RunContext, Solution},
    stats::{Report, Stats},
};

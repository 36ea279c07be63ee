use crate::{
    collab::{Coordination, TilingEngine},
    dims::{DimKind, Dims},
    error::{SolutionError, SolutionResult},
    geometry::{GeometryCache, RankGeometry},
    grid::GridLayout,
    settings::KernelSettings,
    types::{Idx, IdxTuple},
};
use derive_more::Display;

/// A per-dimension sizing quantity exposed through [`ParamStore::get`] and
/// [`ParamStore::set`].
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SizingParam {
    /// Ranks along the dimension.
    #[display("num_ranks")]
    NumRanks,
    /// This rank's position along the dimension.
    #[display("rank_index")]
    RankIndex,
    /// Points per rank.
    #[display("rank_domain_size")]
    RankDomainSize,
    /// Region size.
    #[display("region_size")]
    RegionSize,
    /// Block size.
    #[display("block_size")]
    BlockSize,
    /// Minimum padding.
    #[display("min_pad_size")]
    MinPadSize,
    /// Extra padding.
    #[display("extra_pad_size")]
    ExtraPadSize,
    /// Rank size times rank count. Derived.
    #[display("overall_domain_size")]
    OverallDomainSize,
    /// First index of this rank's domain. Derived.
    #[display("first_rank_domain_index")]
    FirstRankDomainIndex,
    /// Last index of this rank's domain. Derived.
    #[display("last_rank_domain_index")]
    LastRankDomainIndex,
}

/// Contract of one [`SizingParam`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRule {
    /// Dimension kinds the parameter accepts.
    pub allowed: &'static [DimKind],
    /// Reading needs prepared geometry.
    pub requires_preparation: bool,
    /// Writing invalidates geometry.
    pub invalidates_geometry: bool,
    /// Whether the parameter can be written at all.
    pub writable: bool,
}

const DOMAIN: &[DimKind] = &[DimKind::Domain];
const STEP_DOMAIN: &[DimKind] = &[DimKind::Step, DimKind::Domain];

impl SizingParam {
    /// Every parameter.
    pub const ALL: [Self; 10] = [
        Self::NumRanks,
        Self::RankIndex,
        Self::RankDomainSize,
        Self::RegionSize,
        Self::BlockSize,
        Self::MinPadSize,
        Self::ExtraPadSize,
        Self::OverallDomainSize,
        Self::FirstRankDomainIndex,
        Self::LastRankDomainIndex,
    ];

    /// The parameter's contract.
    #[must_use]
    pub const fn rule(self) -> ParamRule {
        let (allowed, requires_preparation, invalidates_geometry, writable) = match self {
            Self::NumRanks | Self::RankIndex | Self::RankDomainSize => (DOMAIN, false, true, true),
            Self::RegionSize | Self::BlockSize => (STEP_DOMAIN, false, true, true),
            Self::MinPadSize | Self::ExtraPadSize => (DOMAIN, false, false, true),
            Self::OverallDomainSize | Self::FirstRankDomainIndex | Self::LastRankDomainIndex => {
                (DOMAIN, true, false, false)
            }
        };
        ParamRule {
            allowed,
            requires_preparation,
            invalidates_geometry,
            writable,
        }
    }
}

/// A threading knob settable by name.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ThreadOption {
    /// Upper bound on compute threads; `0` means all available.
    #[display("max_threads")]
    MaxThreads,
    /// Divides the available threads.
    #[display("thread_divisor")]
    ThreadDivisor,
    /// Threads per block.
    #[display("block_threads")]
    BlockThreads,
}

impl ThreadOption {
    /// Every option.
    pub const ALL: [Self; 3] = [Self::MaxThreads, Self::ThreadDivisor, Self::BlockThreads];

    /// Option spelled `name`, if any.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|opt| opt.to_string() == name)
    }
}

/// Dimension-keyed sizing parameters plus the geometry derived from them.
#[must_use]
#[derive(Debug)]
pub struct ParamStore {
    dims: Dims,
    settings: KernelSettings,
    overall_domain_sizes: IdxTuple,
    geometry: GeometryCache,
}

impl ParamStore {
    /// Default settings for `dims`; geometry starts invalid.
    pub fn new(dims: Dims) -> Self {
        let settings = KernelSettings::new(&dims);
        Self {
            overall_domain_sizes: settings.overall_domain_sizes(),
            settings,
            dims,
            geometry: GeometryCache::new(),
        }
    }

    /// Declared dimensions.
    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    /// Current global settings.
    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    /// Overall problem size per domain dimension, kept current on every write.
    pub fn overall_domain_sizes(&self) -> &IdxTuple {
        &self.overall_domain_sizes
    }

    /// The geometry cache.
    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    /// Mark geometry stale.
    pub fn invalidate_geometry(&mut self) {
        self.geometry.invalidate();
    }

    /// Layout grids must adopt under the current settings.
    pub fn grid_layout(&self) -> GridLayout {
        let KernelSettings {
            rank_sizes,
            min_pad_sizes,
            extra_pad_sizes,
            ..
        } = &self.settings;
        GridLayout {
            domain_sizes: rank_sizes.clone(),
            pad_sizes: min_pad_sizes
                .map_with(extra_pad_sizes, |min, extra| min.saturating_add(extra)),
        }
    }

    fn check_dim(&self, op: &str, rule: &ParamRule, dim: &str) -> SolutionResult<()> {
        let Some(kind) = self.dims.kind_of(dim) else {
            return Err(SolutionError::UnknownDimension {
                op: op.to_owned(),
                dim: dim.to_owned(),
            });
        };
        if rule.allowed.contains(&kind) {
            return Ok(());
        }
        Err(SolutionError::InvalidDimensionKind {
            op: op.to_owned(),
            dim: dim.to_owned(),
            kind,
            allowed: rule
                .allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Read `param` along `dim`.
    ///
    /// # Errors
    /// - [`SolutionError::UnknownDimension`] / [`SolutionError::InvalidDimensionKind`]
    ///   if `dim` is not acceptable for `param`.
    /// - [`SolutionError::PreparationRequired`] for derived parameters while
    ///   geometry is stale.
    pub fn get(&self, param: SizingParam, dim: &str) -> SolutionResult<Idx> {
        let op = format!("get_{param}");
        let rule = param.rule();
        self.check_dim(&op, &rule, dim)?;
        if rule.requires_preparation && !self.geometry.is_valid() {
            return Err(SolutionError::PreparationRequired { op });
        }
        let s = &self.settings;
        let value = match param {
            SizingParam::NumRanks => s.num_ranks.val(dim),
            SizingParam::RankIndex => s.rank_indices.val(dim),
            SizingParam::RankDomainSize => s.rank_sizes.val(dim),
            SizingParam::RegionSize => s.region_sizes.val(dim),
            SizingParam::BlockSize => s.block_sizes.val(dim),
            SizingParam::MinPadSize => s.min_pad_sizes.val(dim),
            SizingParam::ExtraPadSize => s.extra_pad_sizes.val(dim),
            SizingParam::OverallDomainSize => self.overall_domain_sizes.val(dim),
            SizingParam::FirstRankDomainIndex => self.prepared(&op)?.rank_bb.begin.val(dim),
            SizingParam::LastRankDomainIndex => self.prepared(&op)?.rank_bb.end.val(dim) - 1,
        };
        Ok(value)
    }

    /// Write `param` along `dim`, refresh the overall sizes, and invalidate
    /// geometry if the parameter affects decomposition.
    ///
    /// # Errors
    /// - [`SolutionError::UnknownDimension`] / [`SolutionError::InvalidDimensionKind`]
    ///   if `dim` is not acceptable for `param`.
    /// - [`SolutionError::ReadOnlyParameter`] for derived parameters.
    pub fn set(&mut self, param: SizingParam, dim: &str, value: Idx) -> SolutionResult<()> {
        let op = format!("set_{param}");
        let rule = param.rule();
        self.check_dim(&op, &rule, dim)?;
        let s = &mut self.settings;
        let slot = match param {
            SizingParam::NumRanks => &mut s.num_ranks,
            SizingParam::RankIndex => &mut s.rank_indices,
            SizingParam::RankDomainSize => &mut s.rank_sizes,
            SizingParam::RegionSize => &mut s.region_sizes,
            SizingParam::BlockSize => &mut s.block_sizes,
            SizingParam::MinPadSize => &mut s.min_pad_sizes,
            SizingParam::ExtraPadSize => &mut s.extra_pad_sizes,
            SizingParam::OverallDomainSize
            | SizingParam::FirstRankDomainIndex
            | SizingParam::LastRankDomainIndex => {
                return Err(SolutionError::ReadOnlyParameter { op });
            }
        };
        slot.set_val(dim, value);
        self.overall_domain_sizes = self.settings.overall_domain_sizes();
        if rule.invalidates_geometry {
            self.geometry.invalidate();
        }
        Ok(())
    }

    /// Set a threading knob.
    pub fn set_thread_option(&mut self, opt: ThreadOption, value: usize) {
        let s = &mut self.settings;
        let slot = match opt {
            ThreadOption::MaxThreads => &mut s.max_threads,
            ThreadOption::ThreadDivisor => &mut s.thread_divisor,
            ThreadOption::BlockThreads => &mut s.block_threads,
        };
        *slot = value;
    }

    fn prepared(&self, op: &str) -> SolutionResult<&RankGeometry> {
        self.geometry.prepared(op)
    }

    /// Normalize the settings through `tiling`. Normalization may move
    /// decomposition sizes, so geometry is invalidated.
    ///
    /// # Errors
    /// Whatever the tiling engine reports.
    pub fn adjust_settings<T: TilingEngine, E: Coordination>(
        &mut self,
        tiling: &mut T,
        env: &E,
    ) -> SolutionResult<Vec<String>> {
        let Self {
            dims,
            settings,
            overall_domain_sizes,
            geometry,
        } = self;
        let notes = tiling.adjust_settings(settings, dims, env)?;
        *overall_domain_sizes = settings.overall_domain_sizes();
        geometry.invalidate();
        Ok(notes)
    }

    /// Recompute geometry if stale and return it.
    ///
    /// # Errors
    /// Whatever the tiling engine reports.
    pub fn ensure_geometry<T: TilingEngine, E: Coordination>(
        &mut self,
        tiling: &mut T,
        env: &E,
    ) -> SolutionResult<&RankGeometry> {
        let Self {
            dims,
            settings,
            geometry,
            ..
        } = self;
        geometry.ensure_valid(settings, dims, tiling, env)
    }
}

use crate::{
    collab::{Coordination, TilingEngine},
    dims::Dims,
    error::{SolutionError, SolutionResult},
    settings::KernelSettings,
    types::{Idx, IdxTuple},
};

/// Axis-aligned half-open box `[begin, end)` over the domain dimensions.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundingBox {
    /// First index per dimension.
    pub begin: IdxTuple,
    /// One past the last index per dimension.
    pub end: IdxTuple,
    /// Number of points inside the box.
    pub num_points: Idx,
    /// Whether the box reflects the current settings.
    pub valid: bool,
}

impl BoundingBox {
    /// Box spanning `[begin, end)`; the point count is computed and the box is
    /// marked valid.
    ///
    /// # Errors
    /// [`SolutionError::InvalidSetting`] if the point count overflows.
    pub fn new(begin: IdxTuple, end: IdxTuple) -> SolutionResult<Self> {
        let mut bb = Self {
            begin,
            end,
            num_points: 0,
            valid: false,
        };
        bb.update()?;
        Ok(bb)
    }

    /// Recompute the point count and mark the box valid.
    ///
    /// # Errors
    /// [`SolutionError::InvalidSetting`] if the point count overflows; the box
    /// is left invalid.
    pub fn update(&mut self) -> SolutionResult<()> {
        self.valid = false;
        self.num_points = self
            .end
            .map_with(&self.begin, |e, b| e.saturating_sub(b).max(0))
            .try_product()
            .ok_or_else(|| {
                SolutionError::invalid_setting(format!(
                    "point count of {} overflows",
                    self.range_str()
                ))
            })?;
        self.valid = true;
        Ok(())
    }

    /// Extent along `dim`.
    #[must_use]
    pub fn len(&self, dim: &str) -> Idx {
        self.end.val(dim) - self.begin.val(dim)
    }

    /// Whether the box holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// `begin ... last` rendering of the inclusive range.
    #[must_use]
    pub fn range_str(&self) -> String {
        format!(
            "{} ... {}",
            self.begin.dim_val_str(),
            self.end.sub_elements(1).dim_val_str()
        )
    }
}

/// Wavefront and temporal-block shape chosen by the tiling engine.
///
/// Only read for diagnostics here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporalTiling {
    /// Steps per wavefront; `0` disables wavefront tiling.
    pub wf_steps: Idx,
    /// Wavefront angle per domain dimension.
    pub wf_angles: IdxTuple,
    /// Number of wavefront shifts.
    pub num_wf_shifts: Idx,
    /// Points shifted per dimension over a whole wavefront.
    pub wf_shift_pts: IdxTuple,
    /// Left extension of the rank domain.
    pub left_wf_exts: IdxTuple,
    /// Right extension of the rank domain.
    pub right_wf_exts: IdxTuple,
    /// Steps per temporal block.
    pub tb_steps: Idx,
    /// Temporal-block angle per domain dimension.
    pub tb_angles: IdxTuple,
    /// Number of temporal-block shifts.
    pub num_tb_shifts: Idx,
    /// Long base of a temporal block.
    pub tb_widths: IdxTuple,
    /// Short base of a temporal block.
    pub tb_tops: IdxTuple,
    /// Mini-block angle per domain dimension.
    pub mb_angles: IdxTuple,
}

/// Everything the tiling engine derives for this rank.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankGeometry {
    /// This rank's domain.
    pub rank_bb: BoundingBox,
    /// `rank_bb` widened by the wavefront extensions.
    pub ext_bb: BoundingBox,
    /// Offset of this rank's domain from the global origin.
    pub rank_domain_offsets: IdxTuple,
    /// Region that needs no halo data, when comms are overlapped.
    pub mpi_interior: Option<BoundingBox>,
    /// Largest halo per domain dimension over all grids.
    pub max_halos: IdxTuple,
    /// Temporal tiling shape.
    pub temporal: TemporalTiling,
}

/// Invalidatable cache of [`RankGeometry`].
///
/// Geometry-affecting parameter writes call [`invalidate`](Self::invalidate);
/// internal code recomputes lazily through [`ensure_valid`](Self::ensure_valid)
/// while externally exposed queries go through [`prepared`](Self::prepared),
/// which never recomputes.
#[must_use]
#[derive(Debug, Default)]
pub struct GeometryCache {
    geometry: RankGeometry,
}

impl GeometryCache {
    /// Empty, invalid cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark both boxes stale.
    pub fn invalidate(&mut self) {
        let RankGeometry { rank_bb, ext_bb, .. } = &mut self.geometry;
        rank_bb.valid = false;
        ext_bb.valid = false;
    }

    /// Whether both boxes reflect the current settings.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let RankGeometry { rank_bb, ext_bb, .. } = &self.geometry;
        rank_bb.valid && ext_bb.valid
    }

    /// Recompute through `tiling` if stale, then return the geometry.
    ///
    /// A valid cache is returned untouched, so repeated calls without an
    /// intervening invalidation yield identical results.
    ///
    /// # Errors
    /// Whatever the tiling engine reports.
    pub fn ensure_valid<T: TilingEngine, E: Coordination>(
        &mut self,
        settings: &KernelSettings,
        dims: &Dims,
        tiling: &mut T,
        env: &E,
    ) -> SolutionResult<&RankGeometry> {
        if !self.is_valid() {
            let mut geometry = tiling.setup_rank(settings, dims, env)?;
            geometry.rank_bb.update()?;
            geometry.ext_bb.update()?;
            self.geometry = geometry;
        }
        Ok(&self.geometry)
    }

    /// Geometry from the last preparation.
    ///
    /// # Errors
    /// [`SolutionError::PreparationRequired`] naming `op` if the cache is stale.
    pub fn prepared(&self, op: &str) -> SolutionResult<&RankGeometry> {
        if self.is_valid() {
            Ok(&self.geometry)
        } else {
            Err(SolutionError::preparation_required(op))
        }
    }
}

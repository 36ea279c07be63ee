use crate::{
    collab::{Coordination as _, StorageAllocator as _, TilingEngine as _},
    config::Config,
    error::SolutionResult,
    solution::{Footprint, Solution},
    utils::{byte_str, count_str},
};
use core::fmt::Write as _;
use tracing::info;

fn as_idx(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn as_bytes(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

impl<C: Config> Solution<C> {
    /// Summarize sizes, memory and tiling of the prepared solution.
    ///
    /// Also refreshes [`Solution::footprint`]. The text is for humans only.
    ///
    /// # Errors
    /// [`SolutionError::PreparationRequired`](crate::error::SolutionError::PreparationRequired)
    /// while geometry is stale.
    pub fn print_info(&mut self) -> SolutionResult<String> {
        let rank_nbytes = as_idx(self.grids.num_bytes() + self.storage.num_bytes());
        let rank_domain_pts = self.params.geometry().prepared("print_info")?.rank_bb.num_points;
        self.footprint = Footprint {
            rank_nbytes,
            tot_nbytes: self.env.sum_over_ranks(rank_nbytes),
            rank_domain_pts,
            tot_domain_pts: self.env.sum_over_ranks(rank_domain_pts),
        };

        let text = self.info_text()?;
        info!(target: "soln::info", "{text}");
        Ok(text)
    }

    fn info_text(&self) -> SolutionResult<String> {
        let geometry = self.params.geometry().prepared("print_info")?;
        let settings = self.params.settings();
        let kernel = self.tiling.kernel_info(self.params.dims());
        let multi_rank = self.env.num_ranks() > 1;
        let Footprint {
            rank_nbytes,
            tot_nbytes,
            rank_domain_pts,
            tot_domain_pts,
        } = self.footprint;
        let mut s = String::new();

        // `write!` into a `String` cannot fail.
        let _ = writeln!(s, "Domain size in this rank (points):          {}", count_str(rank_domain_pts));
        let _ = writeln!(s, "Total allocation in this rank:              {}", byte_str(as_bytes(rank_nbytes)));
        let _ = writeln!(s, "Overall problem size in {} rank(s) (points): {}", self.env.num_ranks(), count_str(tot_domain_pts));
        let _ = writeln!(s, "Total overall allocation in {} rank(s):      {}", self.env.num_ranks(), byte_str(as_bytes(tot_nbytes)));

        let _ = writeln!(s, "\nWork-unit sizes in points (from smallest to largest):");
        let _ = writeln!(s, " vector-size:           {}", kernel.fold_pts.dim_val_str());
        let _ = writeln!(s, " cluster-size:          {}", kernel.cluster_pts.dim_val_str());
        let _ = writeln!(s, " sub-block-size:        {}", settings.sub_block_sizes.dim_val_str());
        let _ = writeln!(s, " mini-block-size:       {}", settings.mini_block_sizes.dim_val_str());
        let _ = writeln!(s, " block-size:            {}", settings.block_sizes.dim_val_str());
        let _ = writeln!(s, " region-size:           {}", settings.region_sizes.dim_val_str());
        let _ = writeln!(s, " rank-domain-size:      {}", settings.rank_sizes.dim_val_str());
        let _ = writeln!(s, " overall-problem-size:  {}", self.params.overall_domain_sizes().dim_val_str());

        let _ = writeln!(s, "\nOther settings:");
        let _ = writeln!(s, " stencil-name:          {}", self.name);
        let _ = writeln!(s, " element-size:          {}", byte_str(kernel.element_bytes));
        let _ = writeln!(s, " rank-domain:           {}", geometry.rank_bb.range_str());
        if multi_rank {
            let _ = writeln!(s, " num-ranks:             {}", settings.num_ranks.dim_val_str());
            let _ = writeln!(s, " rank-indices:          {}", settings.rank_indices.dim_val_str());
            let _ = writeln!(s, " rank-domain-offsets:   {}", geometry.rank_domain_offsets.dim_val_offset_str());
            if let Some(interior) = &geometry.mpi_interior {
                let _ = writeln!(s, " mpi-interior:          {}", interior.range_str());
            }
        }
        let _ = writeln!(s, " vector-len:            {}", kernel.vector_len);
        let _ = writeln!(s, " extra-padding:         {}", settings.extra_pad_sizes.dim_val_str());
        let _ = writeln!(s, " minimum-padding:       {}", settings.min_pad_sizes.dim_val_str());
        let _ = writeln!(s, " L1-prefetch-distance:  {}", kernel.l1_prefetch);
        let _ = writeln!(s, " L2-prefetch-distance:  {}", kernel.l2_prefetch);
        let _ = writeln!(s, " max-halos:             {}", geometry.max_halos.dim_val_str());

        let tt = &geometry.temporal;
        if tt.wf_steps > 0 {
            let _ = writeln!(s, " wave-front-angles:     {}", tt.wf_angles.dim_val_str());
            let _ = writeln!(s, " num-wave-front-steps:  {}", tt.wf_steps);
            let _ = writeln!(s, " num-wave-front-shifts: {}", tt.num_wf_shifts);
            let _ = writeln!(s, " wave-front-shift-amounts: {}", tt.wf_shift_pts.dim_val_str());
            let _ = writeln!(s, " left-wave-front-exts:  {}", tt.left_wf_exts.dim_val_str());
            let _ = writeln!(s, " right-wave-front-exts: {}", tt.right_wf_exts.dim_val_str());
            let _ = writeln!(s, " ext-local-domain:      {}", geometry.ext_bb.range_str());
            let _ = writeln!(s, " temporal-block-angles: {}", tt.tb_angles.dim_val_str());
            let _ = writeln!(s, " num-temporal-block-steps:  {}", tt.tb_steps);
            let _ = writeln!(s, " num-temporal-block-shifts: {}", tt.num_tb_shifts);
            let _ = writeln!(s, " temporal-block-long-base:  {}", tt.tb_widths.dim_val_str());
            let _ = writeln!(s, " temporal-block-short-base: {}", tt.tb_tops.dim_val_str());
            let _ = writeln!(s, " mini-block-angles:     {}", tt.mb_angles.dim_val_str());
        }

        let _ = writeln!(s, "\nNum stencil packs:      {}", self.packs.len());
        for pack in &self.packs {
            let _ = writeln!(
                s,
                " pack '{}': {} reads, {} writes, {} est FP-ops per step",
                pack.name(),
                count_str(pack.reads_per_step()),
                count_str(pack.writes_per_step()),
                count_str(pack.fpops_per_step())
            );
        }
        Ok(s)
    }
}

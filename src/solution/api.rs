use crate::{
    config::Config,
    error::{SolutionError, SolutionResult},
    params::{SizingParam, ThreadOption},
    solution::Solution,
    types::Idx,
};

/// Per-dimension options, longest prefix first so `-ri` wins over `-r`.
const DIM_OPTIONS: [(&str, SizingParam); 7] = [
    ("nr", SizingParam::NumRanks),
    ("ri", SizingParam::RankIndex),
    ("mp", SizingParam::MinPadSize),
    ("ep", SizingParam::ExtraPadSize),
    ("d", SizingParam::RankDomainSize),
    ("r", SizingParam::RegionSize),
    ("b", SizingParam::BlockSize),
];

macro_rules! sizing_accessors {
    ($($param:ident => $get:ident, $set:ident;)*) => {$(
        #[doc = concat!("Read [`SizingParam::", stringify!($param), "`] along `dim`.")]
        ///
        /// # Errors
        /// See [`Solution::get`].
        pub fn $get(&self, dim: &str) -> SolutionResult<Idx> {
            self.get(SizingParam::$param, dim)
        }

        #[doc = concat!("Write [`SizingParam::", stringify!($param), "`] along `dim`.")]
        ///
        /// # Errors
        /// See [`Solution::set`].
        pub fn $set(&mut self, dim: &str, value: Idx) -> SolutionResult<()> {
            self.set(SizingParam::$param, dim, value)
        }
    )*};
}

macro_rules! derived_accessors {
    ($($param:ident => $get:ident;)*) => {$(
        #[doc = concat!("Read [`SizingParam::", stringify!($param), "`] along `dim`; needs `prepare()`.")]
        ///
        /// # Errors
        /// See [`Solution::get`].
        pub fn $get(&self, dim: &str) -> SolutionResult<Idx> {
            self.get(SizingParam::$param, dim)
        }
    )*};
}

impl<C: Config> Solution<C> {
    /// Read `param` along `dim`.
    ///
    /// # Errors
    /// - [`SolutionError::UnknownDimension`] or
    ///   [`SolutionError::InvalidDimensionKind`] if `dim` does not suit `param`.
    /// - [`SolutionError::PreparationRequired`] for derived parameters while
    ///   geometry is stale.
    pub fn get(&self, param: SizingParam, dim: &str) -> SolutionResult<Idx> {
        self.params.get(param, dim)
    }

    /// Write `param` along `dim` and push the new layout to the grids.
    ///
    /// # Errors
    /// - [`SolutionError::UnknownDimension`] or
    ///   [`SolutionError::InvalidDimensionKind`] if `dim` does not suit `param`.
    /// - [`SolutionError::ReadOnlyParameter`] for derived parameters.
    pub fn set(&mut self, param: SizingParam, dim: &str, value: Idx) -> SolutionResult<()> {
        self.params.set(param, dim, value)?;
        self.update_grid_info();
        Ok(())
    }

    sizing_accessors! {
        NumRanks => get_num_ranks, set_num_ranks;
        RankIndex => get_rank_index, set_rank_index;
        RankDomainSize => get_rank_domain_size, set_rank_domain_size;
        RegionSize => get_region_size, set_region_size;
        BlockSize => get_block_size, set_block_size;
        MinPadSize => get_min_pad_size, set_min_pad_size;
        ExtraPadSize => get_extra_pad_size, set_extra_pad_size;
    }

    derived_accessors! {
        OverallDomainSize => get_overall_domain_size;
        FirstRankDomainIndex => get_first_rank_domain_index;
        LastRankDomainIndex => get_last_rank_domain_index;
    }

    /// Apply `-<opt>[<dim>] <value>` options from `args`.
    ///
    /// Sizing options are `nr`, `ri`, `d`, `r`, `b`, `mp` and `ep`; without a
    /// dimension suffix they apply to every domain dimension. `-max_threads`,
    /// `-thread_divisor` and `-block_threads` take a plain count. Returns the
    /// unrecognized tokens joined by single spaces.
    ///
    /// # Errors
    /// [`SolutionError::InvalidOption`] for a missing or non-integer value,
    /// or whatever [`Solution::set`] reports.
    pub fn apply_command_line_options(&mut self, args: &str) -> SolutionResult<String> {
        let mut rest = Vec::new();
        let mut tokens = args.split_whitespace();
        while let Some(token) = tokens.next() {
            let Some(opt) = token.strip_prefix('-') else {
                rest.push(token);
                continue;
            };

            if let Some(opt) = ThreadOption::from_name(opt) {
                let value = parse_value::<usize>(token, tokens.next())?;
                self.params.set_thread_option(opt, value);
                continue;
            }

            let Some((param, dim)) = self.match_dim_option(opt) else {
                rest.push(token);
                continue;
            };
            let value = parse_value::<Idx>(token, tokens.next())?;
            match dim {
                Some(dim) => self.set(param, &dim, value)?,
                None => {
                    let dims: Vec<String> = self.dims().domain_dims().map(str::to_owned).collect();
                    for dim in &dims {
                        self.set(param, dim, value)?;
                    }
                }
            }
        }
        Ok(rest.join(" "))
    }

    fn match_dim_option(&self, opt: &str) -> Option<(SizingParam, Option<String>)> {
        DIM_OPTIONS.iter().find_map(|&(prefix, param)| {
            let suffix = opt.strip_prefix(prefix)?;
            if suffix.is_empty() {
                Some((param, None))
            } else {
                self.dims()
                    .kind_of(suffix)
                    .map(|_| (param, Some(suffix.to_owned())))
            }
        })
    }
}

fn parse_value<T: core::str::FromStr>(option: &str, value: Option<&str>) -> SolutionResult<T> {
    let invalid = |reason: String| SolutionError::InvalidOption {
        option: option.to_owned(),
        reason,
    };
    let value = value.ok_or_else(|| invalid("missing value".to_owned()))?;
    value
        .parse()
        .map_err(|_| invalid(format!("'{value}' is not a valid integer")))
}

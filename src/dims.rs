use crate::types::{HashMap, IdxTuple};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Classification of a dimension. Fixed once the dimension is declared.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimKind {
    /// The time / iteration axis.
    #[display("step")]
    Step,
    /// A spatial axis subject to decomposition across ranks.
    #[display("domain")]
    Domain,
    /// An auxiliary indexing axis that is never decomposed.
    #[display("misc")]
    Misc,
}

/// The declared dimensions of a solution.
///
/// Exactly one step dimension, one or more domain dimensions, and any number
/// of misc dimensions. Names are unique across kinds.
#[must_use]
#[derive(Debug, Clone)]
pub struct Dims {
    step: String,
    domain: Vec<String>,
    misc: Vec<String>,
    kinds: HashMap<String, DimKind>,
}

impl Dims {
    /// Declare the dimensions of a solution.
    ///
    /// # Panics
    /// If a name is declared twice or no domain dimension is given.
    pub fn new<S: Into<String>>(
        step: impl Into<String>,
        domain: impl IntoIterator<Item = S>,
        misc: impl IntoIterator<Item = S>,
    ) -> Self {
        let step = step.into();
        let domain: Vec<String> = domain.into_iter().map(Into::into).collect();
        let misc: Vec<String> = misc.into_iter().map(Into::into).collect();
        assert!(!domain.is_empty(), "Dims::new: no domain dimension");

        let mut kinds = HashMap::default();
        let declared = std::iter::once((&step, DimKind::Step))
            .chain(domain.iter().map(|d| (d, DimKind::Domain)))
            .chain(misc.iter().map(|d| (d, DimKind::Misc)));
        for (name, kind) in declared {
            let prev = kinds.insert(name.clone(), kind);
            assert!(prev.is_none(), "Dims::new: dimension '{name}' declared twice");
        }
        Self {
            step,
            domain,
            misc,
            kinds,
        }
    }

    /// Kind of `dim`, or `None` if it is not declared.
    #[must_use]
    pub fn kind_of(&self, dim: &str) -> Option<DimKind> {
        self.kinds.get(dim).copied()
    }

    /// Name of the step dimension.
    #[must_use]
    pub fn step_dim(&self) -> &str {
        &self.step
    }

    /// Domain dimension names in declaration order.
    pub fn domain_dims(&self) -> impl Iterator<Item = &str> {
        self.domain.iter().map(String::as_str)
    }

    /// Misc dimension names in declaration order.
    pub fn misc_dims(&self) -> impl Iterator<Item = &str> {
        self.misc.iter().map(String::as_str)
    }

    /// Number of domain dimensions.
    #[must_use]
    pub fn num_domain_dims(&self) -> usize {
        self.domain.len()
    }

    /// Tuple over the domain dimensions, all set to `value`.
    pub fn domain_tuple(&self, value: i64) -> IdxTuple {
        IdxTuple::filled(self.domain_dims(), value)
    }

    /// Tuple over the step dimension followed by the domain dimensions.
    pub fn stencil_tuple(&self, step_value: i64, domain_value: i64) -> IdxTuple {
        let mut t = IdxTuple::new();
        t.set_val(&self.step, step_value);
        for d in self.domain_dims() {
            t.set_val(d, domain_value);
        }
        t
    }
}

impl Default for Dims {
    /// `t` as the step dimension and `x`, `y`, `z` as domain dimensions.
    fn default() -> Self {
        Self::new("t", ["x", "y", "z"], [])
    }
}

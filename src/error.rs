use crate::dims::DimKind;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type SolutionResult<T> = Result<T, SolutionError>;

/// Errors raised by the solution control layer.
///
/// Every variant is raised at the point of detection and names the failing
/// operation and the offending dimension or grid. Nothing is retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SolutionError {
    /// A parameter was read or written through a dimension of the wrong kind.
    #[error("'{op}()' called with {kind} dimension '{dim}'; allowed kinds: {allowed}")]
    InvalidDimensionKind {
        /// Failing operation.
        op: String,
        /// Offending dimension.
        dim: String,
        /// Kind of the offending dimension.
        kind: DimKind,
        /// Comma-separated allowed kinds.
        allowed: String,
    },

    /// The dimension name is not declared for this solution.
    #[error("'{op}()' called with unknown dimension '{dim}'")]
    UnknownDimension {
        /// Failing operation.
        op: String,
        /// Offending dimension.
        dim: String,
    },

    /// A geometry-dependent query ran before `prepare()`.
    #[error("'{op}()' called before calling 'prepare()'")]
    PreparationRequired {
        /// Failing operation.
        op: String,
    },

    /// Attempt to write a derived parameter.
    #[error("'{op}()' is derived and cannot be set")]
    ReadOnlyParameter {
        /// Failing operation.
        op: String,
    },

    /// A grid with the same name is already registered.
    #[error("grid '{name}' already exists")]
    DuplicateGrid {
        /// Name of the rejected grid.
        name: String,
    },

    /// Lifecycle entry point used after `end()`.
    #[error("'{op}()' called after 'end()'")]
    Ended {
        /// Failing operation.
        op: String,
    },

    /// Settings normalization rejected the current values.
    #[error("invalid settings: {message}")]
    InvalidSetting {
        /// Description of the rejected value.
        message: String,
    },

    /// A command-line option had a missing or unparsable value.
    #[error("option '{option}': {reason}")]
    InvalidOption {
        /// The option token.
        option: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Storage allocation or sharing failed.
    #[error("{op}: {message}")]
    Storage {
        /// Failing operation.
        op: String,
        /// Description from the storage layer.
        message: String,
    },

    /// The region thread pool could not be built.
    #[error("cannot build region thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SolutionError {
    pub(crate) fn preparation_required(op: &str) -> Self {
        Self::PreparationRequired { op: op.to_owned() }
    }

    pub(crate) fn ended(op: &str) -> Self {
        Self::Ended { op: op.to_owned() }
    }

    pub(crate) fn storage(op: &str, message: impl Into<String>) -> Self {
        Self::Storage {
            op: op.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_setting(message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            message: message.into(),
        }
    }
}

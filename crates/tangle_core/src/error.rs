use thiserror::Error;

/// Failure modes of the spectrum estimator. Every variant is fatal for the
/// current run; there is no partial spectrum and no automatic retry with
/// relaxed parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpectrumError {
    /// The series cannot supply the requested neighbor count, detected
    /// before any computation starts.
    #[error("too few points to find {min_neighbors} neighbors ({available} embedded points available)")]
    Infeasible {
        min_neighbors: usize,
        available: usize,
    },

    /// The input series has zero variance.
    #[error("variance of the data is zero")]
    DegenerateInput,

    /// Fewer than the required neighbors were found for some query point
    /// even at the maximum search radius.
    #[error("not enough neighbors found around index {index} even at the maximum radius")]
    InsufficientNeighbors { index: usize },

    /// A zero pivot survived partial pivoting; the local neighborhood is
    /// degenerate.
    #[error("singular matrix in local regression")]
    SingularMatrix,
}

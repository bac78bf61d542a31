/// Tolerance used for geometric comparisons which must not be exact.
pub const ERROR_MARGIN: f32 = 0.00001;

/// Miscellaneous errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Growing a point, marker, vertex or index buffer failed.
    #[error("failed to grow a geometry buffer")]
    OutOfMemory,
    /// The matrix has a zero or non-finite determinant and can not be inverted.
    #[error("the matrix is not invertible")]
    InvalidMatrix,
    /// The handle refers to a context which was already destroyed.
    #[error("the context handle is stale")]
    StaleHandle,
    /// The rendering backend failed to submit or complete a batch.
    #[error("renderer backend failure: {0}")]
    Backend(String),
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

use thiserror::Error;

/// Why a future could not hand out a result (or accept one).
///
/// `Failed` carries the application error verbatim; the engine never
/// inspects or transforms it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FutureError<E> {
    #[error("operation is invalid in the future's current state")]
    InvalidState,
    #[error("future was cancelled")]
    Cancelled,
    #[error("future failed")]
    Failed(E),
}

impl<E> FutureError<E> {
    /// The stored application error, if this is a failure.
    pub fn into_failed(self) -> Option<E> {
        match self {
            FutureError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

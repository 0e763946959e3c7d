use thiserror::Error;

/// Why a fetch-mode subscribe could not answer synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("source cannot answer a fetch synchronously")]
    Unsupported,
}

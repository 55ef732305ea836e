use glossgate_core::SessionId;
use glossgate_core::engine::CheckError;
use glossgate_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("check error: {0}")]
    Check(#[from] CheckError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The session does not resolve to an actor; the caller should re-authenticate.
    #[error("invalid session: {0}")]
    InvalidSession(SessionId),
}

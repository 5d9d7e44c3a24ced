/// Core error type for the backend.
///
/// Adapter crates map their specific errors into this type so the HTTP layer
/// and the bot can decide consistently between a user-facing message and a
/// generic failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("user not found")]
    UserNotFound,

    #[error("resource {0} not found")]
    ResourceNotFound(i64),

    #[error("live drop pool is empty")]
    EmptyPool,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Storage-level failures (file missing, corrupt, unwritable, actor gone).
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid instrument code '{0}': expected 4 digits, optionally suffixed with .JNX or .CIX")]
    InvalidInstrument(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("store not connected")]
    StoreDisconnected,

    #[error("tick source error: {0}")]
    Source(String),

    #[error("supervisor error: {0}")]
    Supervisor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

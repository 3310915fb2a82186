//! Host errors.

use thiserror::Error;

/// Errors that stop the overlay application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Window error: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<softbuffer::SoftBufferError> for AppError {
    fn from(err: softbuffer::SoftBufferError) -> Self {
        AppError::Surface(err.to_string())
    }
}

/// Result type for host operations.
pub type AppResult<T> = Result<T, AppError>;

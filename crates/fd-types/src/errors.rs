//! Error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("OAuth flow error: {0}")]
    OAuth(String),

    #[error("No sign-in is in progress")]
    NoPendingLogin,

    #[error("Sign-in was superseded by a newer attempt")]
    LoginSuperseded,
}

pub type AppResult<T> = Result<T, AppError>;

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

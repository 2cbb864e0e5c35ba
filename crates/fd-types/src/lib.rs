//! Shared types and error types for ForgeDesk

pub mod account;
pub mod errors;

pub use account::Account;
pub use errors::{AppError, AppResult};

//! Desk accounts, sessions and role checks.

mod account;
mod session;

pub use account::*;
pub use session::*;

use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Role {role} may not {action}")]
    Forbidden { role: String, action: String },
}

pub type AuthResult<T> = Result<T, AuthError>;

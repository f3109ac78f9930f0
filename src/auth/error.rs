use thiserror::Error;

/// Failures surfaced by the auth services.
///
/// `InvalidCredentials` is deliberately the same for an unknown user and a wrong
/// password.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Your account is disabled. Please contact the administrator.")]
    AccountDisabled,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Forbidden")]
    AuthorizationDenied,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

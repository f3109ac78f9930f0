//! Session validation.
//!
//! The session token is the username. It is valid for as long as the account
//! exists; account status is not consulted here, only at login.

use std::sync::Arc;

use super::{error::AuthError, models::Identity};
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct SessionValidator {
    users: Arc<dyn CredentialStore>,
}

impl SessionValidator {
    #[must_use]
    pub fn new(users: Arc<dyn CredentialStore>) -> Self {
        Self { users }
    }

    /// Resolve a token to the caller's identity, or `None` if no account
    /// matches.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the store fails.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }

        let account = self.users.find_user(token).await?;

        Ok(account.as_ref().map(Identity::from))
    }
}

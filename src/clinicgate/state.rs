//! Shared request state and cookie settings.

use std::sync::Arc;

use crate::{
    auth::{Accounts, AuditLogger, Authenticator, SessionValidator},
    store::{AuditStore, CredentialStore},
};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl AuthConfig {
    /// `secure` marks session cookies `Secure`; turn it off only for plain
    /// HTTP development setups.
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: secure,
        }
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

pub struct AppState {
    authenticator: Authenticator,
    sessions: SessionValidator,
    accounts: Accounts,
    audit: AuditLogger,
    config: AuthConfig,
}

impl AppState {
    #[must_use]
    pub fn new(
        users: Arc<dyn CredentialStore>,
        logs: Arc<dyn AuditStore>,
        config: AuthConfig,
    ) -> Self {
        let audit = AuditLogger::new(logs);

        Self {
            authenticator: Authenticator::new(users.clone(), audit.clone()),
            sessions: SessionValidator::new(users.clone()),
            accounts: Accounts::new(users),
            audit,
            config,
        }
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionValidator {
        &self.sessions
    }

    #[must_use]
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

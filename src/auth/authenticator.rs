//! Credential checks, registration and bootstrap seeding.
//!
//! Flow Overview (login):
//! 1) Validate input shape.
//! 2) Look up the account and verify the password; unknown users and wrong
//!    passwords fail the same way.
//! 3) Reject disabled accounts, only after the password matched.
//! 4) Upgrade plaintext or bcrypt superadmin material to Argon2id (best effort).
//! 5) Record the login in the audit trail (best effort) and issue the token.

use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    audit::{detect_os, AuditLogger},
    error::AuthError,
    models::{
        AuditLogEntry, ClientContext, Role, SessionToken, Status, UserAccount, BOOTSTRAP_USERNAME,
    },
    password::PasswordPolicy,
};
use crate::store::{CredentialStore, InsertOutcome};

/// Usernames reserved for the bootstrap account, compared case-insensitively.
const RESERVED_USERNAMES: &[&str] = &[BOOTSTRAP_USERNAME];

/// 3 to 30 ASCII letters, digits or underscores.
#[must_use]
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9_]{3,30}$").is_ok_and(|re| re.is_match(username))
}

#[must_use]
pub fn reserved_username(username: &str) -> bool {
    RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
}

/// Which entry point is creating the account.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistrationFlow {
    /// A superadmin adding an account from the dashboard.
    Standard,
    /// The bootstrap account provisioning its replacement. Creating a
    /// superadmin here removes the bootstrap account.
    Setup,
}

#[derive(Debug, Eq, PartialEq)]
pub enum SeedOutcome {
    Created,
    Skipped,
}

#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn CredentialStore>,
    audit: AuditLogger,
    policy: PasswordPolicy,
}

impl Authenticator {
    #[must_use]
    pub fn new(users: Arc<dyn CredentialStore>, audit: AuditLogger) -> Self {
        Self {
            users,
            audit,
            policy: PasswordPolicy,
        }
    }

    /// Check credentials and issue a session token.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] for missing or malformed input
    /// - [`AuthError::InvalidCredentials`] for an unknown user or wrong password
    /// - [`AuthError::AccountDisabled`] for a disabled account with the right password
    /// - [`AuthError::Internal`] if the store fails
    #[instrument(skip(self, password, client), fields(ip = %client.ip))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: &ClientContext,
    ) -> Result<SessionToken, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::validation("Username and password are required"));
        }

        if !valid_username(username) {
            return Err(AuthError::validation("Invalid username format"));
        }

        let Some(account) = self.users.find_user(username).await? else {
            warn!(username, ip = %client.ip, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.policy.verify_async(password, &account.password).await? {
            warn!(username, ip = %client.ip, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if account.status == Status::Disable {
            debug!("Login rejected, account disabled");
            return Err(AuthError::AccountDisabled);
        }

        if self.policy.needs_migration(&account.password, account.role) {
            self.migrate_password(&account.username, password).await;
        }

        let user_agent = client
            .user_agent
            .as_deref()
            .filter(|agent| !agent.is_empty());
        self.audit
            .record(AuditLogEntry {
                username: account.username.clone(),
                ip: client.ip.clone(),
                time: Utc::now(),
                os: user_agent.map_or("Unknown", detect_os).to_string(),
                browser: user_agent.unwrap_or("Unknown").to_string(),
            })
            .await;

        Ok(SessionToken::for_username(&account.username))
    }

    // Failure leaves the old material in place; the next login retries.
    async fn migrate_password(&self, username: &str, password: &str) {
        let hashed = match self.policy.hash_async(password).await {
            Ok(hashed) => hashed,
            Err(err) => {
                warn!("Unable to hash password for {username}: {err:#}");
                return;
            }
        };

        match self.users.update_password(username, &hashed).await {
            Ok(true) => info!("Password for user {username} has been hashed and updated"),
            Ok(false) => warn!("Password migration skipped, {username} no longer exists"),
            Err(err) => warn!("Password migration failed for {username}: {err:#}"),
        }
    }

    /// Create an account and return its username.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] for missing fields, a malformed or reserved
    ///   username, an unknown role or an existing username
    /// - [`AuthError::Internal`] if the store fails
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: &str,
        flow: RegistrationFlow,
    ) -> Result<String, AuthError> {
        if username.is_empty() || password.is_empty() || role.is_empty() {
            return Err(AuthError::validation(
                "Username, password, and role are required.",
            ));
        }

        let Some(role) = Role::assignable(role) else {
            return Err(AuthError::validation("Invalid role."));
        };

        if !valid_username(username) {
            return Err(AuthError::validation("Invalid username format."));
        }

        if reserved_username(username) {
            return Err(AuthError::validation("Username is reserved."));
        }

        if self.users.find_user(username).await?.is_some() {
            return Err(AuthError::validation("Username already exists."));
        }

        let account = UserAccount {
            username: username.to_string(),
            password: self.policy.material_for_async(role, password).await?,
            role,
            status: Status::Enable,
        };

        // a concurrent registration can still win the race
        if self.users.insert_user(&account).await? == InsertOutcome::Conflict {
            return Err(AuthError::validation("Username already exists."));
        }

        info!("Account {username} created with role {role}");

        if flow == RegistrationFlow::Setup && role == Role::Superadmin {
            let removed = self.users.delete_temp_users().await?;
            info!("Setup complete, removed {removed} bootstrap account(s)");
        }

        Ok(account.username)
    }

    /// Create the bootstrap account when the store holds no accounts.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if hashing or the store fails.
    pub async fn seed_bootstrap(&self, password: &str) -> Result<SeedOutcome, AuthError> {
        if self.users.count_users().await? > 0 {
            debug!("User table not empty, skipping bootstrap account");
            return Ok(SeedOutcome::Skipped);
        }

        let account = UserAccount {
            username: BOOTSTRAP_USERNAME.to_string(),
            password: self.policy.hash_async(password).await?,
            role: Role::Temp,
            status: Status::Enable,
        };

        match self.users.insert_user(&account).await? {
            InsertOutcome::Created => {
                info!("Bootstrap account {BOOTSTRAP_USERNAME} created");
                Ok(SeedOutcome::Created)
            }
            InsertOutcome::Conflict => Ok(SeedOutcome::Skipped),
        }
    }
}

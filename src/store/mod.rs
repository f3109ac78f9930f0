//! Credential store gateway.
//!
//! The auth services only talk to persistence through these traits. Every
//! method is safe to call concurrently; the backing store provides the only
//! synchronisation.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::auth::models::{AuditLogEntry, PasswordMaterial, Role, Status, UserAccount};

/// Outcome when inserting an account.
#[derive(Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

/// Outcome of an administrative update.
#[derive(Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// The new username is already taken.
    Conflict,
}

/// Fields changed by an administrative update. `None` leaves the column alone.
#[derive(Debug, Default)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub password: Option<PasswordMaterial>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact-match lookup.
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>>;

    /// All accounts ordered by username.
    async fn list_users(&self) -> Result<Vec<UserAccount>>;

    async fn count_users(&self) -> Result<u64>;

    async fn insert_user(&self, account: &UserAccount) -> Result<InsertOutcome>;

    /// Returns `false` when no account matched.
    async fn update_password(&self, username: &str, password: &PasswordMaterial) -> Result<bool>;

    async fn update_user(&self, username: &str, changes: &AccountChanges) -> Result<UpdateOutcome>;

    /// Returns `false` when no account matched.
    async fn delete_user(&self, username: &str) -> Result<bool>;

    /// Remove every `temp` account, returning how many were deleted.
    async fn delete_temp_users(&self) -> Result<u64>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()>;

    /// Entries ordered by time, newest first. `username` narrows the result to
    /// one account.
    async fn list(&self, username: Option<&str>) -> Result<Vec<AuditLogEntry>>;
}

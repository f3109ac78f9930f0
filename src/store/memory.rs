//! In-process store used by tests and local tooling.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{AccountChanges, AuditStore, CredentialStore, InsertOutcome, UpdateOutcome};
use crate::auth::models::{AuditLogEntry, PasswordMaterial, Role, UserAccount};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<BTreeMap<String, UserAccount>>,
    logs: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn insert_user(&self, account: &UserAccount) -> Result<InsertOutcome> {
        let mut users = self.users.write().await;
        let temp_taken =
            account.role == Role::Temp && users.values().any(|user| user.role == Role::Temp);
        if temp_taken || users.contains_key(&account.username) {
            return Ok(InsertOutcome::Conflict);
        }
        users.insert(account.username.clone(), account.clone());
        Ok(InsertOutcome::Created)
    }

    async fn update_password(&self, username: &str, password: &PasswordMaterial) -> Result<bool> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(username).map_or(false, |user| {
            user.password = password.clone();
            true
        }))
    }

    async fn update_user(&self, username: &str, changes: &AccountChanges) -> Result<UpdateOutcome> {
        let mut users = self.users.write().await;
        if !users.contains_key(username) {
            return Ok(UpdateOutcome::NotFound);
        }
        if let Some(new_username) = &changes.username {
            if new_username != username && users.contains_key(new_username) {
                return Ok(UpdateOutcome::Conflict);
            }
        }
        let Some(mut user) = users.remove(username) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if let Some(new_username) = &changes.username {
            user.username.clone_from(new_username);
        }
        if let Some(password) = &changes.password {
            user.password = password.clone();
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        users.insert(user.username.clone(), user);
        Ok(UpdateOutcome::Updated)
    }

    async fn delete_user(&self, username: &str) -> Result<bool> {
        Ok(self.users.write().await.remove(username).is_some())
    }

    async fn delete_temp_users(&self) -> Result<u64> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, user| user.role != Role::Temp);
        Ok((before - users.len()) as u64)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        self.logs.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<AuditLogEntry>> {
        let logs = self.logs.read().await;
        // stable sort keeps later appends first among equal timestamps
        let mut entries: Vec<AuditLogEntry> = logs
            .iter()
            .rev()
            .filter(|entry| username.map_or(true, |name| entry.username == name))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(entries)
    }
}

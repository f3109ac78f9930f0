//! Administrative account management and self-service password changes.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{
    authenticator::{reserved_username, valid_username},
    error::AuthError,
    models::{Identity, Role, Status},
    password::PasswordPolicy,
};
use crate::store::{AccountChanges, CredentialStore, UpdateOutcome};

/// Account as shown in the user list. Password material is never exposed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, ToSchema)]
pub struct AccountSummary {
    pub username: String,
    pub role: Role,
    pub status: Status,
}

/// Raw update request. Empty strings count as "not supplied".
#[derive(Clone, Debug, Default)]
pub struct AccountUpdate {
    pub new_username: Option<String>,
    pub new_password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

fn supplied(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

#[derive(Clone)]
pub struct Accounts {
    users: Arc<dyn CredentialStore>,
    policy: PasswordPolicy,
}

impl Accounts {
    #[must_use]
    pub fn new(users: Arc<dyn CredentialStore>) -> Self {
        Self {
            users,
            policy: PasswordPolicy,
        }
    }

    /// Every account ordered by username.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the store fails.
    pub async fn list(&self) -> Result<Vec<AccountSummary>, AuthError> {
        let accounts = self.users.list_users().await?;

        Ok(accounts
            .into_iter()
            .map(|account| AccountSummary {
                username: account.username,
                role: account.role,
                status: account.status,
            })
            .collect())
    }

    /// # Errors
    /// - [`AuthError::Validation`] if `username` is empty
    /// - [`AuthError::NotFound`] if no account matched
    #[instrument(skip(self))]
    pub async fn delete(&self, username: &str) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::validation("Username is required"));
        }

        if !self.users.delete_user(username).await? {
            return Err(AuthError::NotFound("User"));
        }

        info!("Account {username} deleted");
        Ok(())
    }

    /// Apply an administrative update to `username`.
    ///
    /// A new password is stored according to the account's resulting role.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] for an unknown role or status, a malformed,
    ///   reserved or taken new username, or an update with no changes
    /// - [`AuthError::NotFound`] if no account matched
    #[instrument(skip(self, update))]
    pub async fn update(&self, username: &str, update: &AccountUpdate) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::validation("Username is required"));
        }

        let status = supplied(update.status.as_ref())
            .map(|value| {
                value
                    .parse::<Status>()
                    .map_err(|_| AuthError::validation("Invalid status value"))
            })
            .transpose()?;

        let role = supplied(update.role.as_ref())
            .map(|value| {
                Role::assignable(value).ok_or_else(|| AuthError::validation("Invalid role value"))
            })
            .transpose()?;

        let new_username = supplied(update.new_username.as_ref());
        if let Some(name) = new_username {
            if !valid_username(name) {
                return Err(AuthError::validation("Invalid username format"));
            }
            if reserved_username(name) && name != username {
                return Err(AuthError::validation("Username is reserved."));
            }
        }

        let new_password = supplied(update.new_password.as_ref());

        if new_username.is_none() && new_password.is_none() && role.is_none() && status.is_none() {
            return Err(AuthError::validation("No changes supplied"));
        }

        let Some(account) = self.users.find_user(username).await? else {
            return Err(AuthError::NotFound("User"));
        };

        if let Some(name) = new_username {
            if name != username && self.users.find_user(name).await?.is_some() {
                return Err(AuthError::validation("Username already exists."));
            }
        }

        let password = match new_password {
            Some(plain) => {
                let role = role.unwrap_or(account.role);
                Some(self.policy.material_for_async(role, plain).await?)
            }
            None => None,
        };

        let changes = AccountChanges {
            username: new_username.map(str::to_string),
            password,
            role,
            status,
        };

        match self.users.update_user(username, &changes).await? {
            UpdateOutcome::Updated => {}
            UpdateOutcome::NotFound => return Err(AuthError::NotFound("User")),
            // a concurrent rename can still take the name
            UpdateOutcome::Conflict => {
                return Err(AuthError::validation("Username already exists."));
            }
        }

        info!("Account {username} updated");
        Ok(())
    }

    /// Change a password after checking the old one.
    ///
    /// Callers may change their own password; superadmins may change anyone's.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] for missing fields or a wrong old password
    /// - [`AuthError::AuthorizationDenied`] when targeting someone else without
    ///   being a superadmin
    /// - [`AuthError::NotFound`] if no account matched
    #[instrument(skip(self, actor, old_password, new_password), fields(actor = %actor.username))]
    pub async fn change_password(
        &self,
        actor: &Identity,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if username.is_empty() || old_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::validation("All fields are required."));
        }

        if actor.role != Role::Superadmin && actor.username != username {
            return Err(AuthError::AuthorizationDenied);
        }

        let Some(account) = self.users.find_user(username).await? else {
            return Err(AuthError::NotFound("User"));
        };

        if !self.policy.verify_async(old_password, &account.password).await? {
            return Err(AuthError::validation("Old password is incorrect."));
        }

        let material = self
            .policy
            .material_for_async(account.role, new_password)
            .await?;
        if !self.users.update_password(username, &material).await? {
            return Err(AuthError::NotFound("User"));
        }

        info!("Password changed for {username}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{PasswordMaterial, UserAccount};
    use crate::store::{InsertOutcome, MemoryStore};
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    async fn seeded() -> Result<(Arc<MemoryStore>, Accounts)> {
        let store = Arc::new(MemoryStore::new());
        for (username, role) in [
            ("alice", Role::User),
            ("bob", Role::User),
            ("root", Role::Superadmin),
        ] {
            store
                .insert_user(&UserAccount {
                    username: username.to_string(),
                    password: PasswordMaterial::Plaintext("pw1234".to_string()),
                    role,
                    status: Status::Enable,
                })
                .await?;
        }
        let accounts = Accounts::new(store.clone());
        Ok((store, accounts))
    }

    async fn account(store: &MemoryStore, username: &str) -> Result<UserAccount> {
        match store.find_user(username).await? {
            Some(account) => Ok(account),
            None => bail!("{username} missing"),
        }
    }

    fn identity(username: &str, role: Role) -> Identity {
        Identity {
            username: username.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn list_is_ordered_and_hides_passwords() -> Result<()> {
        let (_, accounts) = seeded().await?;
        let listed = accounts.list().await?;
        let names: Vec<_> = listed.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "root"]);

        let json = serde_json::to_value(&listed)?;
        assert!(json[0].get("password").is_none());
        assert_eq!(json[2]["role"], "superadmin");
        Ok(())
    }

    #[tokio::test]
    async fn delete_missing_account_is_not_found() -> Result<()> {
        let (store, accounts) = seeded().await?;
        accounts.delete("bob").await?;
        assert!(store.find_user("bob").await?.is_none());
        assert!(matches!(
            accounts.delete("bob").await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            accounts.delete("").await,
            Err(AuthError::Validation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn update_status_and_role() -> Result<()> {
        let (store, accounts) = seeded().await?;
        let update = AccountUpdate {
            status: Some("disable".to_string()),
            role: Some("superadmin".to_string()),
            ..AccountUpdate::default()
        };
        accounts.update("alice", &update).await?;

        let alice = account(&store, "alice").await?;
        assert_eq!(alice.status, Status::Disable);
        assert_eq!(alice.role, Role::Superadmin);
        Ok(())
    }

    #[tokio::test]
    async fn update_rejects_bad_values() -> Result<()> {
        let (_, accounts) = seeded().await?;
        let cases = [
            AccountUpdate {
                status: Some("disabled".to_string()),
                ..AccountUpdate::default()
            },
            AccountUpdate {
                role: Some("temp".to_string()),
                ..AccountUpdate::default()
            },
            AccountUpdate {
                new_username: Some("no spaces".to_string()),
                ..AccountUpdate::default()
            },
            AccountUpdate {
                new_username: Some("Admin".to_string()),
                ..AccountUpdate::default()
            },
            AccountUpdate {
                new_username: Some("bob".to_string()),
                ..AccountUpdate::default()
            },
            AccountUpdate {
                new_username: Some(String::new()),
                status: Some(String::new()),
                ..AccountUpdate::default()
            },
        ];
        for update in &cases {
            assert!(
                matches!(
                    accounts.update("alice", update).await,
                    Err(AuthError::Validation(_))
                ),
                "{update:?}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_account_is_not_found() -> Result<()> {
        let (_, accounts) = seeded().await?;
        let update = AccountUpdate {
            status: Some("disable".to_string()),
            ..AccountUpdate::default()
        };
        assert!(matches!(
            accounts.update("ghost", &update).await,
            Err(AuthError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn update_renames_account() -> Result<()> {
        let (store, accounts) = seeded().await?;
        let update = AccountUpdate {
            new_username: Some("alicia".to_string()),
            ..AccountUpdate::default()
        };
        accounts.update("alice", &update).await?;
        assert!(store.find_user("alice").await?.is_none());
        assert_eq!(account(&store, "alicia").await?.role, Role::User);
        Ok(())
    }

    #[tokio::test]
    async fn update_password_follows_resulting_role() -> Result<()> {
        let (store, accounts) = seeded().await?;

        let update = AccountUpdate {
            new_password: Some("fresh".to_string()),
            ..AccountUpdate::default()
        };
        accounts.update("alice", &update).await?;
        assert_eq!(
            account(&store, "alice").await?.password,
            PasswordMaterial::Plaintext("fresh".to_string())
        );

        let promote = AccountUpdate {
            new_password: Some("fresher".to_string()),
            role: Some("superadmin".to_string()),
            ..AccountUpdate::default()
        };
        accounts.update("bob", &promote).await?;
        let bob = account(&store, "bob").await?;
        assert!(!bob.password.is_plaintext());
        assert!(PasswordPolicy.verify("fresher", &bob.password));
        Ok(())
    }

    #[tokio::test]
    async fn change_own_password() -> Result<()> {
        let (store, accounts) = seeded().await?;
        let alice = identity("alice", Role::User);

        accounts
            .change_password(&alice, "alice", "pw1234", "newpass")
            .await?;
        assert_eq!(
            account(&store, "alice").await?.password,
            PasswordMaterial::Plaintext("newpass".to_string())
        );

        let wrong_old = accounts
            .change_password(&alice, "alice", "pw1234", "again")
            .await;
        assert!(matches!(wrong_old, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn change_password_for_someone_else() -> Result<()> {
        let (store, accounts) = seeded().await?;

        let denied = accounts
            .change_password(&identity("alice", Role::User), "bob", "pw1234", "x")
            .await;
        assert!(matches!(denied, Err(AuthError::AuthorizationDenied)));

        accounts
            .change_password(&identity("root", Role::Superadmin), "bob", "pw1234", "x")
            .await?;
        assert!(PasswordPolicy.verify("x", &account(&store, "bob").await?.password));
        Ok(())
    }

    #[tokio::test]
    async fn superadmin_password_change_is_hashed() -> Result<()> {
        let (store, accounts) = seeded().await?;
        let root = identity("root", Role::Superadmin);

        accounts
            .change_password(&root, "root", "pw1234", "longer-secret")
            .await?;
        let stored = account(&store, "root").await?.password;
        assert!(!stored.is_plaintext());
        assert!(PasswordPolicy.verify("longer-secret", &stored));
        Ok(())
    }

    #[tokio::test]
    async fn change_password_requires_all_fields() -> Result<()> {
        let (_, accounts) = seeded().await?;
        let alice = identity("alice", Role::User);
        for (target, old, new) in [("", "a", "b"), ("alice", "", "b"), ("alice", "a", "")] {
            assert!(matches!(
                accounts.change_password(&alice, target, old, new).await,
                Err(AuthError::Validation(_))
            ));
        }
        Ok(())
    }

    /// Reports every rename as taken, as if another request claimed the name
    /// between the lookup and the write.
    struct RenameRace(Arc<MemoryStore>);

    #[async_trait]
    impl CredentialStore for RenameRace {
        async fn find_user(&self, username: &str) -> Result<Option<UserAccount>> {
            self.0.find_user(username).await
        }
        async fn list_users(&self) -> Result<Vec<UserAccount>> {
            self.0.list_users().await
        }
        async fn count_users(&self) -> Result<u64> {
            self.0.count_users().await
        }
        async fn insert_user(&self, account: &UserAccount) -> Result<InsertOutcome> {
            self.0.insert_user(account).await
        }
        async fn update_password(
            &self,
            username: &str,
            password: &PasswordMaterial,
        ) -> Result<bool> {
            self.0.update_password(username, password).await
        }
        async fn update_user(
            &self,
            _username: &str,
            _changes: &AccountChanges,
        ) -> Result<UpdateOutcome> {
            Ok(UpdateOutcome::Conflict)
        }
        async fn delete_user(&self, username: &str) -> Result<bool> {
            self.0.delete_user(username).await
        }
        async fn delete_temp_users(&self) -> Result<u64> {
            self.0.delete_temp_users().await
        }
    }

    #[tokio::test]
    async fn rename_losing_a_race_is_a_validation_error() -> Result<()> {
        let (store, _) = seeded().await?;
        let accounts = Accounts::new(Arc::new(RenameRace(store.clone())));

        let update = AccountUpdate {
            new_username: Some("alicia".to_string()),
            ..AccountUpdate::default()
        };
        let result = accounts.update("alice", &update).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert!(store.find_user("alice").await?.is_some());
        Ok(())
    }
}

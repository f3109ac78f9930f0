//! Domain records shared by the authenticator, the session validator and the
//! store gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Username of the account created by first-run seeding.
pub const BOOTSTRAP_USERNAME: &str = "admin";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Superadmin,
    /// Bootstrap account, only good for the setup flow.
    Temp,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Superadmin => "superadmin",
            Self::Temp => "temp",
        }
    }

    /// Parse a role that may be assigned through registration or an
    /// administrative update. `temp` is never assignable.
    #[must_use]
    pub fn assignable(value: &str) -> Option<Self> {
        match value.parse() {
            Ok(Self::Temp) | Err(_) => None,
            Ok(role) => Some(role),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "superadmin" => Ok(Self::Superadmin),
            "temp" => Ok(Self::Temp),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enable,
    Disable,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Stored password material.
///
/// Persisted as a single text column; the variant is recovered with
/// [`PasswordMaterial::from_stored`] so hashed material is never compared as a
/// literal string.
#[derive(Clone, Eq, PartialEq)]
pub enum PasswordMaterial {
    Plaintext(String),
    Hashed(String),
}

impl PasswordMaterial {
    /// Classify a stored column value. Anything shaped like a modular crypt
    /// string (`$<scheme>$...`) is treated as a hash.
    #[must_use]
    pub fn from_stored(value: String) -> Self {
        if looks_hashed(&value) {
            Self::Hashed(value)
        } else {
            Self::Plaintext(value)
        }
    }

    /// Value to write back into the store.
    #[must_use]
    pub fn as_stored(&self) -> &str {
        match self {
            Self::Plaintext(value) | Self::Hashed(value) => value,
        }
    }

    #[must_use]
    pub const fn is_plaintext(&self) -> bool {
        matches!(self, Self::Plaintext(_))
    }
}

// never print password material, not even plaintext legacy values
impl fmt::Debug for PasswordMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext(_) => f.write_str("Plaintext(***)"),
            Self::Hashed(_) => f.write_str("Hashed(***)"),
        }
    }
}

pub(crate) fn looks_hashed(value: &str) -> bool {
    value.strip_prefix('$').is_some_and(|rest| {
        rest.split_once('$').is_some_and(|(scheme, tail)| {
            !scheme.is_empty()
                && !tail.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserAccount {
    pub username: String,
    pub password: PasswordMaterial,
    pub role: Role,
    pub status: Status,
}

/// Caller resolved from a session token.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, ToSchema)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl From<&UserAccount> for Identity {
    fn from(account: &UserAccount) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
        }
    }
}

/// Cookie value identifying the caller. It is the username itself.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub(crate) fn for_username(username: &str) -> Self {
        Self(username.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request details captured for the audit trail.
#[derive(Clone, Debug, Default)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub username: String,
    pub ip: String,
    pub time: DateTime<Utc>,
    pub os: String,
    pub browser: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Superadmin, Role::Temp] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn temp_is_not_assignable() {
        assert_eq!(Role::assignable("user"), Some(Role::User));
        assert_eq!(Role::assignable("superadmin"), Some(Role::Superadmin));
        assert_eq!(Role::assignable("temp"), None);
        assert_eq!(Role::assignable("Superadmin"), None);
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert_eq!("disable".parse::<Status>(), Ok(Status::Disable));
        assert!("disabled".parse::<Status>().is_err());
    }

    #[test]
    fn stored_material_is_sniffed() {
        let hashed = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string();
        assert!(matches!(
            PasswordMaterial::from_stored(hashed),
            PasswordMaterial::Hashed(_)
        ));
        assert!(matches!(
            PasswordMaterial::from_stored("$2b$10$abcdefghijklmnopqrstuv".to_string()),
            PasswordMaterial::Hashed(_)
        ));
        assert!(PasswordMaterial::from_stored("hunter2".to_string()).is_plaintext());
        assert!(PasswordMaterial::from_stored("$dollar".to_string()).is_plaintext());
        assert!(PasswordMaterial::from_stored("$$".to_string()).is_plaintext());
    }

    #[test]
    fn material_debug_is_redacted() {
        let material = PasswordMaterial::Plaintext("hunter2".to_string());
        assert_eq!(format!("{material:?}"), "Plaintext(***)");
    }

    #[test]
    fn role_serializes_lowercase() -> anyhow::Result<()> {
        let value = serde_json::to_value(Role::Superadmin)?;
        assert_eq!(value, serde_json::json!("superadmin"));
        Ok(())
    }
}

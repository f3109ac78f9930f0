//! Login audit trail.

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    error::AuthError,
    models::{AuditLogEntry, Identity, Role},
};
use crate::store::AuditStore;

const UNKNOWN: &str = "Unknown";

// first match wins, so mobile platforms go before the desktop families they
// mention in their user agents
const OS_PATTERNS: &[(&str, &str)] = &[
    (r"Windows NT 10\.0", "Windows 10"),
    (r"Windows NT 6\.3", "Windows 8.1"),
    (r"Windows NT 6\.2", "Windows 8"),
    (r"Windows NT 6\.1", "Windows 7"),
    (r"iPhone|iPad|iPod", "iOS"),
    (r"Android", "Android"),
    (r"Macintosh|Mac OS X", "MacOS"),
    (r"Linux", "Linux"),
];

/// Coarse operating system label for a user agent.
#[must_use]
pub fn detect_os(user_agent: &str) -> &'static str {
    OS_PATTERNS
        .iter()
        .find(|(pattern, _)| {
            Regex::new(&format!("(?i){pattern}")).is_ok_and(|re| re.is_match(user_agent))
        })
        .map_or(UNKNOWN, |(_, label)| *label)
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an entry. Failures are logged and dropped.
    pub async fn record(&self, entry: AuditLogEntry) {
        match self.store.append(&entry).await {
            Ok(()) => debug!(username = %entry.username, "Login recorded"),
            Err(err) => error!("Error logging user activity: {err:#}"),
        }
    }

    /// Entries visible to `identity`, newest first. Superadmins see every
    /// account; everyone else only their own.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the store fails.
    pub async fn list_for(&self, identity: &Identity) -> Result<Vec<AuditLogEntry>, AuthError> {
        let scope = match identity.role {
            Role::Superadmin => None,
            Role::User | Role::Temp => Some(identity.username.as_str()),
        };

        Ok(self.store.list(scope).await?)
    }
}

//! # Clinicgate
//!
//! `clinicgate` is the authentication and access-control layer of a small
//! multi-role clinic dashboard. It checks credentials, issues and resolves
//! the session cookie, gates every route by role, upgrades legacy plaintext
//! superadmin passwords to Argon2id on login and keeps an audit trail of
//! successful logins.
//!
//! ## Roles
//!
//! - `superadmin`: full access, including account administration.
//! - `user`: dashboard pages and their own login history.
//! - `temp`: the first-run `admin` account. It can only reach the setup flow
//!   and disappears once a superadmin has been provisioned.
//!
//! ## Layout
//!
//! - [`auth`]: the authenticator, session validator, route policy, password
//!   policy and audit logger.
//! - [`store`]: persistence traits with Postgres and in-memory backends.
//! - [`clinicgate`]: the axum router, middleware and JSON handlers.
//! - [`cli`]: argument parsing, telemetry and the server action.

pub mod auth;
pub mod cli;
pub mod clinicgate;
pub mod store;

pub use clinicgate::GIT_COMMIT_HASH;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }
}

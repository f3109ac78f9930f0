//! Authentication, sessions, role gating, password migration and the login
//! audit trail.
//!
//! Everything here talks to persistence through [`crate::store`]; nothing is
//! cached between calls.

pub mod accounts;
pub mod audit;
pub mod authenticator;
pub mod error;
pub mod models;
pub mod password;
pub mod policy;
pub mod session;

pub use self::accounts::{AccountSummary, AccountUpdate, Accounts};
pub use self::audit::AuditLogger;
pub use self::authenticator::{Authenticator, RegistrationFlow, SeedOutcome};
pub use self::error::AuthError;
pub use self::models::{
    AuditLogEntry, ClientContext, Identity, PasswordMaterial, Role, SessionToken, Status,
    UserAccount, BOOTSTRAP_USERNAME,
};
pub use self::password::PasswordPolicy;
pub use self::policy::{decide, Outcome, RouteClass};
pub use self::session::SessionValidator;

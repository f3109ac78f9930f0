use crate::{
    auth::{Authenticator, SeedOutcome, BOOTSTRAP_USERNAME},
    clinicgate::{self, AppState, AuthConfig},
    store::PgStore,
};
use anyhow::Result;
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const GENERATED_PASSWORD_LENGTH: usize = 24;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub development: bool,
    pub bootstrap_password: Option<SecretString>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, seeding fails or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = Arc::new(PgStore::connect(&args.dsn).await?);
    store.apply_schema().await?;

    let state = Arc::new(AppState::new(
        store.clone(),
        store.clone(),
        AuthConfig::new(!args.development),
    ));

    if let Err(err) = seed_bootstrap(state.authenticator(), args.bootstrap_password).await {
        store.close().await;
        return Err(err);
    }

    let result = clinicgate::new(args.port, state).await;

    store.close().await;
    debug!("Database pool closed");

    result
}

async fn seed_bootstrap(
    authenticator: &Authenticator,
    configured: Option<SecretString>,
) -> Result<()> {
    let generated = configured.is_none();
    let password = configured.unwrap_or_else(|| SecretString::from(generate_password()));

    match authenticator
        .seed_bootstrap(password.expose_secret())
        .await?
    {
        SeedOutcome::Created if generated => warn!(
            "Bootstrap account {BOOTSTRAP_USERNAME} created with generated password: {}",
            password.expose_secret()
        ),
        SeedOutcome::Created => info!("Bootstrap account {BOOTSTRAP_USERNAME} created"),
        SeedOutcome::Skipped => debug!("Accounts exist, bootstrap account not needed"),
    }

    Ok(())
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

fn log_startup_args(args: &Args) {
    info!(
        "Starting {} {} ({}) on port {}, dsn: {}, environment: {}, bootstrap password set: {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(clinicgate::GIT_COMMIT_HASH),
        args.port,
        redact_dsn(&args.dsn),
        if args.development {
            "development"
        } else {
            "production"
        },
        args.bootstrap_password.is_some()
    );
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

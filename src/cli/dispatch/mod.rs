use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let development = matches
        .get_one::<String>("environment")
        .is_some_and(|environment| environment == "development");
    let bootstrap_password = matches
        .get_one::<String>("bootstrap-password")
        .filter(|password| !password.is_empty())
        .map(|password| SecretString::from(password.clone()));

    Ok(Action::Server(Args {
        port,
        dsn,
        development,
        bootstrap_password,
    }))
}

//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: SecretString::from(auth_opts.token_secret),
        frontend_base_url: auth_opts.frontend_base_url,
        issuer: auth_opts.issuer,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        pending_ttl_seconds: auth_opts.pending_ttl_seconds,
        lock_ttl_seconds: auth_opts.lock_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_builds_server_args() {
        temp_env::with_vars(
            [
                ("UZNO_AUTH_PORT", None::<&str>),
                ("UZNO_AUTH_DSN", None),
                ("UZNO_AUTH_TOKEN_SECRET", None),
                ("UZNO_AUTH_LOCK_TTL_SECONDS", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "uzno-auth",
                    "--dsn",
                    "postgres://user@localhost:5432/uzno",
                    "--token-secret",
                    "s3cret",
                    "--lock-ttl-seconds",
                    "45",
                ]);
                let action = handler(&matches).unwrap();
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/uzno");
                assert_eq!(args.frontend_base_url, "https://uzno.dev");
                assert_eq!(args.token_ttl_seconds, 3600);
                assert_eq!(args.pending_ttl_seconds, 600);
                assert_eq!(args.lock_ttl_seconds, 45);
            },
        );
    }
}

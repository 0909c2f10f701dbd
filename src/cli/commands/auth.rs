use crate::api::handlers::auth::{
    DEFAULT_ISSUER, DEFAULT_LOCK_TTL_SECONDS, DEFAULT_PENDING_TTL_SECONDS,
    DEFAULT_TOKEN_TTL_SECONDS,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_two_factor_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, used as the allowed CORS origin")
                .env("UZNO_AUTH_FRONTEND_BASE_URL")
                .default_value("https://uzno.dev"),
        )
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("Secret used to sign and verify access tokens")
                .env("UZNO_AUTH_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("UZNO_AUTH_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_two_factor_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("issuer")
                .long("issuer")
                .help("Issuer label embedded in otpauth provisioning URLs")
                .env("UZNO_AUTH_ISSUER")
                .default_value(DEFAULT_ISSUER),
        )
        .arg(
            Arg::new("pending-ttl-seconds")
                .long("pending-ttl-seconds")
                .help("TTL for unconfirmed two-factor enrollments in seconds")
                .env("UZNO_AUTH_PENDING_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("lock-ttl-seconds")
                .long("lock-ttl-seconds")
                .help("Lock session TTL in seconds")
                .env("UZNO_AUTH_LOCK_TTL_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub issuer: String,
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub pending_ttl_seconds: u64,
    pub lock_ttl_seconds: u64,
}

impl Options {
    /// Collect the auth arguments from validated CLI matches.
    ///
    /// # Errors
    /// Returns an error if the token secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --token-secret")?;

        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .unwrap_or_else(|| "https://uzno.dev".to_string()),
            issuer: matches
                .get_one::<String>("issuer")
                .cloned()
                .unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            token_secret,
            token_ttl_seconds: matches
                .get_one::<i64>("token-ttl-seconds")
                .copied()
                .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS),
            pending_ttl_seconds: matches
                .get_one::<u64>("pending-ttl-seconds")
                .copied()
                .unwrap_or(DEFAULT_PENDING_TTL_SECONDS),
            lock_ttl_seconds: matches
                .get_one::<u64>("lock-ttl-seconds")
                .copied()
                .unwrap_or(DEFAULT_LOCK_TTL_SECONDS),
        })
    }
}

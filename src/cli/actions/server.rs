use crate::api::{self, handlers::auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub frontend_base_url: String,
    pub issuer: String,
    pub token_ttl_seconds: i64,
    pub pending_ttl_seconds: u64,
    pub lock_ttl_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(port = args.port, issuer = %args.issuer, "starting server");

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_issuer(args.issuer)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_pending_ttl_seconds(args.pending_ttl_seconds)
        .with_lock_ttl_seconds(args.lock_ttl_seconds);

    api::new(args.port, args.dsn, args.token_secret, auth_config).await
}

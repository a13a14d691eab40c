use crate::{
    api::{self, jwt::TokenIssuer, users::MemoryUserStore, AuthState},
    lock::LockVerifier,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub jwt_secret: SecretString,
    pub jwt_ttl: u64,
    pub freshness_window_ms: u64,
    pub max_clock_skew_ms: Option<u64>,
    pub allowed_origin: Option<String>,
}

/// Build the shared handler state from the server arguments.
#[must_use]
pub fn auth_state(args: &Args) -> AuthState {
    let issuer = TokenIssuer::new(&args.jwt_secret, args.jwt_ttl);

    let verifier =
        LockVerifier::new(args.freshness_window_ms).with_max_clock_skew(args.max_clock_skew_ms);

    AuthState::new(issuer, Arc::new(MemoryUserStore::default()), verifier)
}

/// Execute the server action.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    info!(
        port = args.port,
        jwt_ttl = args.jwt_ttl,
        freshness_window_ms = args.freshness_window_ms,
        max_clock_skew_ms = ?args.max_clock_skew_ms,
        allowed_origin = ?args.allowed_origin,
        "starting server"
    );

    let state = Arc::new(auth_state(&args));

    api::new(args.port, state, args.allowed_origin.as_deref()).await
}

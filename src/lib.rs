//! # Sessionlock (session-bound bearer tokens and risk gating)
//!
//! `sessionlock` binds an issued bearer token (JWT) to the session that obtained it and
//! gates authentication attempts on the verdict of an external fraud-scoring service.
//!
//! ## Session Lock
//!
//! Each client session owns a non-exportable ECDSA P-256 key pair ([`keystore::KeyStore`]).
//! The public half is sent at signup/login and embedded by the server into the signed
//! JWT payload. Before every request the client *locks* the JWT:
//!
//! ```text
//! header.payload.jwtsig.<unix-ms>.<base64 ECDSA(header.payload.jwtsig.<unix-ms>)>
//! ```
//!
//! The resource server accepts the request only when the outer signature verifies against
//! the embedded key, the timestamp is within the freshness window, and the inner JWT
//! verifies. A stolen bearer token is useless without the session's private key.
//!
//! ## Risk Gate
//!
//! Fraud-scoring results carry `warn` and `deny` rule groups. Any triggered `deny` rule
//! rejects the attempt (`403`), otherwise any triggered `warn` rule flags it (`300`),
//! otherwise it proceeds (`200`).

pub mod api;
pub mod cli;
pub mod client;
pub mod error;
pub mod keystore;
pub mod lock;
pub mod risk;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}

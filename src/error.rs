use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no session key found")]
    KeyNotFound,
    #[error("malformed locked token: {0}")]
    MalformedToken(&'static str),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("key storage error: {0}")]
    Storage(String),
    #[error("signing failed")]
    Signing,
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("trust token missing")]
    MissingTrustToken,
    #[error("trust token malformed: {0}")]
    MalformedTrustToken(String),
    #[error("session token rejected: {0}")]
    InvalidSession(#[from] jsonwebtoken::errors::Error),
    #[error("unexpected token kind: expected {expected}, got {actual}")]
    WrongTokenKind { expected: String, actual: String },
}

pub type TrustResult<T> = Result<T, TrustError>;

use std::fmt;

use crate::types::{ServerError, TransactionStatus};

/// Every failure surfaced by the driver.
///
/// `Clone` so a cursor can cache the first failure and hand the same value
/// back on every later call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Network or HTTP failure, including an unreadable body stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected token while decoding a response.
    #[error("protocol decode error at byte {offset}: {message}")]
    ProtocolDecode { offset: u64, message: String },

    /// The fully drained response carried a non-empty `errors` array.
    #[error("database returned errors: {}", join(.0))]
    ServerReported(Vec<ServerError>),

    #[error("unsupported server version '{found}' (supported major versions are: {{{supported}}})")]
    VersionUnsupported { found: String, supported: String },

    /// Operation attempted on a finished transaction.
    #[error("transaction is {status}, no further operations allowed")]
    TransactionState { status: TransactionStatus },

    #[error("config error: {0}")]
    Config(String),

    #[error("encode error: {0}")]
    Encode(String),
}

fn join(errors: &[ServerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    pub fn decode(offset: u64, msg: impl Into<String>) -> Self {
        Error::ProtocolDecode {
            offset,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Add context to the error.
    ///
    /// Produces `"context: original message"` for message-carrying variants.
    /// Structured variants are returned unchanged.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            Error::Transport(msg) => Error::Transport(format!("{ctx}: {msg}")),
            Error::ProtocolDecode { offset, message } => Error::ProtocolDecode {
                offset,
                message: format!("{ctx}: {message}"),
            },
            Error::Config(msg) => Error::Config(format!("{ctx}: {msg}")),
            Error::Encode(msg) => Error::Encode(format!("{ctx}: {msg}")),
            other => other,
        }
    }

    /// Server-reported entries, if this is a `ServerReported` error.
    pub fn server_errors(&self) -> &[ServerError] {
        match self {
            Error::ServerReported(errors) => errors,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;

use serde::{Deserialize, Serialize};

/// One entry of a response's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Warning attached to a response (e.g. a cartesian product hint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub code: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Lifecycle of an explicit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Requested, but no statement has been answered yet.
    Unbound,
    /// The server has assigned an id.
    Bound,
    Committed,
    RolledBack,
    /// A failed operation ended the transaction.
    Aborted,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::RolledBack | TransactionStatus::Aborted
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Unbound => f.write_str("unbound"),
            TransactionStatus::Bound => f.write_str("bound"),
            TransactionStatus::Committed => f.write_str("committed"),
            TransactionStatus::RolledBack => f.write_str("rolled back"),
            TransactionStatus::Aborted => f.write_str("aborted"),
        }
    }
}

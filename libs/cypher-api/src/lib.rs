//! Protocol-independent data model shared by cypher drivers.
//!
//! Holds the generic [`Value`] tree used for row columns and parameters,
//! [`Statement`], per-result [`Stats`], and the crate-wide [`Error`].

pub mod error;
pub mod statement;
pub mod stats;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use statement::Statement;
pub use stats::Stats;
pub use types::{Notification, ServerError, TransactionStatus};
pub use value::{Number, Value};

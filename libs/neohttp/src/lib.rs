//! Driver for the Neo4j transactional HTTP endpoint.
//!
//! Responses are decoded while they stream in, through three nested
//! forward-only cursors: [`ResponseCursor`] over results, [`ResultCursor`]
//! over rows, and [`Row`] values.
//!
//! The server lists statement errors after every result, so they are only
//! seen once a response has been read to the end. Finish every response with
//! [`ResponseCursor::drain`]; a response dropped early releases its body but
//! may hide a failed statement.
//!
//! ```no_run
//! use cypher_api::Statement;
//! use neohttp::{ClientConfig, Database};
//!
//! # fn main() -> cypher_api::Result<()> {
//! let db = Database::connect(&ClientConfig::new("http://localhost:7474"))?;
//! let mut response = db.run(&Statement::new("MATCH (n) RETURN n.name AS name LIMIT 5"));
//! while let Some(mut result) = response.advance_result()? {
//!     while let Some(row) = result.advance_row()? {
//!         println!("{:?}", row.get("name"));
//!     }
//! }
//! response.drain()?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod database;
pub mod driver;
mod request;
pub mod response;
pub mod result;
pub mod row;
pub mod token;
pub mod transaction;
pub mod transport;

pub use bootstrap::{Discovery, SUPPORTED_MAJOR_VERSIONS};
pub use config::ClientConfig;
pub use database::Database;
pub use driver::{Connector, NEOHTTP, NeoHttpConnector, Registry};
pub use response::ResponseCursor;
pub use result::ResultCursor;
pub use row::{Columns, Row};
pub use transaction::Transaction;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

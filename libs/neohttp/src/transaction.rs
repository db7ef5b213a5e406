use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cypher_api::{Error, Result, Statement, TransactionStatus};

use crate::database::Database;
use crate::response::ResponseCursor;
use crate::transport::Method;

/// Explicit transaction.
///
/// Starts `Unbound`; the first `run` opens it on the server and binds it to
/// the id the server returns in the `Location` header. Once committed, rolled
/// back or aborted every further call fails with
/// [`Error::TransactionState`] without sending anything.
///
/// Calls must be serialized by the caller, and each returned cursor should be
/// drained before the next call.
pub struct Transaction<'db> {
    db: &'db Database,
    id: Option<String>,
    status: TransactionStatus,
    alive: Arc<AtomicBool>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            id: None,
            status: TransactionStatus::Unbound,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Server-assigned id, once bound.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether the last fully read response still carried transaction
    /// metadata. Purely informational; nothing is refused because of it.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn run(&mut self, statement: &Statement) -> Result<ResponseCursor> {
        self.run_many(std::slice::from_ref(statement))
    }

    pub fn run_many(&mut self, statements: &[Statement]) -> Result<ResponseCursor> {
        self.ensure_open()?;
        let path = match &self.id {
            Some(id) => format!("/{id}"),
            None => String::new(),
        };
        let response = match self.db.exchange(Method::Post, &path, Some(statements)) {
            Ok(response) => response,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };

        if self.id.is_none() {
            let Some(id) = response
                .location
                .as_deref()
                .and_then(transaction_id)
                .map(str::to_owned)
            else {
                self.abort();
                let status = response.status;
                self.db.open(response).drain()?;
                return Err(Error::decode(
                    0,
                    format!("begin response (status {status}) carried no usable Location header"),
                ));
            };
            tracing::debug!(tx = %id, "transaction bound");
            self.id = Some(id);
            self.status = TransactionStatus::Bound;
        }
        Ok(self.db.open(response).observe_liveness(self.alive.clone()))
    }

    /// Commit the transaction. With no statement ever run this is a local
    /// no-op. On failure the transaction is aborted.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let Some(id) = self.id.clone() else {
            tracing::debug!("committing unbound transaction, nothing to send");
            self.finish(TransactionStatus::Committed);
            return Ok(());
        };
        let outcome = self
            .db
            .exchange(Method::Post, &format!("/{id}/commit"), Some(&[]))
            .and_then(|response| self.db.open(response).drain());
        match outcome {
            Ok(()) => {
                tracing::debug!(tx = %id, "transaction committed");
                self.finish(TransactionStatus::Committed);
                Ok(())
            }
            Err(e) => {
                self.finish(TransactionStatus::Aborted);
                Err(e.with_context(format!("commit of transaction {id}")))
            }
        }
    }

    /// Roll the transaction back. The transaction is marked rolled back even
    /// when the request fails; that failure is still returned.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.finish(TransactionStatus::RolledBack);
        let Some(id) = self.id.as_deref() else {
            tracing::debug!("rolling back unbound transaction, nothing to send");
            return Ok(());
        };
        self.db
            .exchange(Method::Delete, &format!("/{id}"), None)
            .and_then(|response| self.db.open(response).drain())
            .map_err(|e| e.with_context(format!("rollback of transaction {id}")))?;
        tracing::debug!(tx = %id, "transaction rolled back");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::TransactionState {
                status: self.status,
            });
        }
        Ok(())
    }

    fn abort(&mut self) {
        tracing::debug!(tx = ?self.id, "transaction aborted");
        self.finish(TransactionStatus::Aborted);
    }

    fn finish(&mut self, status: TransactionStatus) {
        self.status = status;
        self.alive.store(false, Ordering::Relaxed);
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.status == TransactionStatus::Bound {
            tracing::warn!(tx = ?self.id, "transaction dropped while open; the server rolls it back on expiry");
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status)
            .finish()
    }
}

/// Last path segment of a transaction `Location` header.
pub(crate) fn transaction_id(location: &str) -> Option<&str> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

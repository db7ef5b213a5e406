use std::sync::Arc;

use cypher_api::{Result, Statement};

use crate::bootstrap::{self, Discovery};
use crate::config::ClientConfig;
use crate::request;
use crate::response::ResponseCursor;
use crate::transaction::Transaction;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

/// Handle to one database on a discovered server.
///
/// Cheap to clone. Independent `run` calls share nothing but the transport and
/// may be issued from several threads at once.
#[derive(Clone)]
pub struct Database {
    transport: Arc<dyn Transport>,
    tx_endpoint: String,
    discovery: Discovery,
    auth: Option<String>,
    stream: bool,
    log_bodies: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tx_endpoint", &self.tx_endpoint)
            .field("discovery", &self.discovery)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Connect over HTTP using `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        bootstrap::connect(config, Arc::new(transport))
    }

    /// Connect through a caller-supplied transport.
    pub fn connect_with(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        bootstrap::connect(config, transport)
    }

    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        tx_endpoint: String,
        discovery: Discovery,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            tx_endpoint,
            discovery,
            auth: config.authorization(),
            stream: config.stream,
            log_bodies: config.log_bodies,
        }
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Transaction endpoint with the database name filled in.
    pub fn endpoint(&self) -> &str {
        &self.tx_endpoint
    }

    /// Run one statement in its own autocommit transaction.
    ///
    /// Never fails directly: a transport or encoding failure is returned by
    /// the first call on the cursor.
    pub fn run(&self, statement: &Statement) -> ResponseCursor {
        self.run_many(std::slice::from_ref(statement))
    }

    /// Run several statements in one autocommit request, one result each.
    pub fn run_many(&self, statements: &[Statement]) -> ResponseCursor {
        match self.exchange(Method::Post, "/commit", Some(statements)) {
            Ok(response) => self.open(response),
            Err(e) => ResponseCursor::failed(e),
        }
    }

    /// Start an explicit transaction. Nothing is sent until its first `run`.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Run `job` inside a transaction: commit if it succeeds, roll back if it
    /// fails. A job that finishes the transaction itself is left alone.
    pub fn transact<T>(&self, job: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut tx = self.begin();
        match job(&mut tx) {
            Ok(value) => {
                if !tx.status().is_terminal() {
                    tx.commit()?;
                }
                Ok(value)
            }
            Err(e) => {
                if !tx.status().is_terminal() {
                    tx.rollback()
                        .map_err(|rb| rb.with_context(format!("rollback after failed job ({e})")))?;
                }
                Err(e)
            }
        }
    }

    /// Send one request to `<endpoint><path>`.
    pub(crate) fn exchange(
        &self,
        method: Method,
        path: &str,
        statements: Option<&[Statement]>,
    ) -> Result<HttpResponse> {
        let url = format!("{}{path}", self.tx_endpoint);
        let body = statements.map(request::encode_statements).transpose()?;
        let payload = body.as_deref().map(String::from_utf8_lossy);
        tracing::trace!(%method, %url, payload = payload.as_deref().unwrap_or(""), "sending request");

        let response = self.transport.send(HttpRequest {
            method,
            url,
            headers: request::headers(self.auth.as_deref(), self.stream),
            body,
        })?;
        tracing::debug!(status = response.status, "response received");
        Ok(response)
    }

    pub(crate) fn open(&self, response: HttpResponse) -> ResponseCursor {
        ResponseCursor::from_http(response, self.log_bodies)
    }
}

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cypher_api::{Error, Notification, Result, ServerError, Stats};
use serde::Deserialize;

use crate::result::{ResultCursor, ResultState};
use crate::row::Row;
use crate::token::{Token, TokenStream};
use crate::transport::HttpResponse;

/// Streamed response body.
pub type Body = Box<dyn Read + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing read yet.
    Header,
    /// Inside the `results` array.
    Results,
    /// Trailer parsed and body released.
    Consumed,
}

#[derive(Debug, Clone, Deserialize)]
struct TransactionInfo {
    #[serde(default)]
    expires: Option<String>,
}

/// Forward-only cursor over the results of one HTTP response.
///
/// The server reports errors after all results, so they can only be seen
/// once the response is fully read: every use of a response should end in
/// [`ResponseCursor::drain`]. The body is released exactly once, when the
/// trailer has been parsed, when a read fails, or when the cursor is dropped.
///
/// The first failure is cached; every later call returns it without touching
/// the stream.
pub struct ResponseCursor {
    tokens: Option<TokenStream<Body>>,
    phase: Phase,
    failure: Option<Error>,
    current: Option<ResultState>,
    completed: Vec<Stats>,
    result_count: usize,
    results_seen: bool,

    status: Option<u16>,
    location: Option<String>,
    errors: Vec<ServerError>,
    notifications: Vec<Notification>,
    commit: Option<String>,
    transaction: Option<TransactionInfo>,
    liveness: Option<Arc<AtomicBool>>,
}

impl ResponseCursor {
    /// Cursor over an already-open body, e.g. a recorded response.
    pub fn from_body(body: impl Read + Send + 'static) -> Self {
        Self::with_stream(Some(TokenStream::new(Box::new(body))), None)
    }

    /// Cursor that replays `err` on every call.
    pub(crate) fn failed(err: Error) -> Self {
        Self::with_stream(None, Some(err))
    }

    /// Take over an HTTP response. With `log_bodies`, the body is buffered and
    /// logged before decoding.
    pub(crate) fn from_http(response: HttpResponse, log_bodies: bool) -> Self {
        let HttpResponse {
            status,
            location,
            mut body,
        } = response;
        let mut cursor = if log_bodies {
            let mut buf = Vec::new();
            match body.read_to_end(&mut buf) {
                Ok(_) => {
                    tracing::debug!(status, body = %String::from_utf8_lossy(&buf), "response body");
                    Self::from_body(Cursor::new(buf))
                }
                Err(e) => Self::failed(Error::transport(format!("reading response body: {e}"))),
            }
        } else {
            Self::with_stream(Some(TokenStream::new(body)), None)
        };
        cursor.status = Some(status);
        cursor.location = location;
        cursor
    }

    fn with_stream(tokens: Option<TokenStream<Body>>, failure: Option<Error>) -> Self {
        Self {
            tokens,
            phase: Phase::Header,
            failure,
            current: None,
            completed: Vec::new(),
            result_count: 0,
            results_seen: false,
            status: None,
            location: None,
            errors: Vec::new(),
            notifications: Vec::new(),
            commit: None,
            transaction: None,
            liveness: None,
        }
    }

    /// Report whether the trailer still carries transaction metadata into
    /// `flag` once the response is consumed.
    pub(crate) fn observe_liveness(mut self, flag: Arc<AtomicBool>) -> Self {
        self.liveness = Some(flag);
        self
    }

    /// Next result, or `None` once the `results` array closes.
    ///
    /// A previous result left unconsumed is drained first.
    pub fn advance_result(&mut self) -> Result<Option<ResultCursor<'_>>> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        match self.next_result() {
            Ok(true) => {
                let Some((index, columns)) = self.current.as_ref().map(|s| (s.index(), s.columns()))
                else {
                    return Ok(None);
                };
                Ok(Some(ResultCursor::new(self, index, columns)))
            }
            Ok(false) => Ok(None),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Read to the end of the response, discarding every remaining row.
    ///
    /// Fails with [`Error::ServerReported`] if the server listed errors.
    /// Calling it again returns the same outcome without further reads.
    pub fn drain(&mut self) -> Result<()> {
        while let Some(mut result) = self.advance_result()? {
            result.drain()?;
        }
        if self.errors.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = self.errors.len(), "response carried server errors");
        Err(self.fail(Error::ServerReported(self.errors.clone())))
    }

    /// First row of the first result. Everything else is discarded and the
    /// response drained.
    pub fn single_row(&mut self) -> Result<Option<Row>> {
        let row = match self.advance_result()? {
            Some(mut result) => result.advance_row()?,
            None => None,
        };
        self.drain()?;
        Ok(row)
    }

    /// Stats of the first result, after draining the whole response.
    pub fn consume_single(&mut self) -> Result<Option<Stats>> {
        let stats = match self.advance_result()? {
            Some(mut result) => Some(result.drain()?),
            None => None,
        };
        self.drain()?;
        Ok(stats)
    }

    pub fn is_consumed(&self) -> bool {
        self.phase == Phase::Consumed
    }

    /// The cached failure, if any operation has failed.
    pub fn error(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// HTTP status of the exchange; `None` for bodies opened directly.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Entries of the `errors` key read so far.
    pub fn server_errors(&self) -> &[ServerError] {
        &self.errors
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Commit URI the server offered for the open transaction.
    pub fn commit_uri(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    /// Expiry of the open transaction, if the trailer carried one.
    pub fn transaction_expires(&self) -> Option<&str> {
        self.transaction.as_ref().and_then(|t| t.expires.as_deref())
    }

    /// Stats of every result the cursor has moved past, in order.
    ///
    /// After a full drain this holds one entry per result.
    pub fn result_stats(&self) -> &[Stats] {
        &self.completed
    }

    pub(crate) fn current_result(&self) -> Option<&ResultState> {
        self.current.as_ref()
    }

    /// Run `step` against the active result, caching any failure.
    pub(crate) fn step_result<T>(
        &mut self,
        step: impl FnOnce(&mut ResultState, &mut TokenStream<Body>) -> Result<T>,
    ) -> Result<T> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let outcome = match (self.current.as_mut(), self.tokens.as_mut()) {
            (Some(state), Some(tokens)) => step(state, tokens),
            _ => Err(Error::decode(0, "no active result")),
        };
        outcome.map_err(|e| self.fail(e))
    }

    fn next_result(&mut self) -> Result<bool> {
        if self.phase == Phase::Header {
            self.tokens_mut()?.expect_token(Token::BeginObject)?;
            self.parse_keys()?;
        }
        if self.phase == Phase::Consumed {
            return Ok(false);
        }
        let tokens = match self.tokens.as_mut() {
            Some(t) => t,
            None => return Err(released()),
        };
        if let Some(mut state) = self.current.take() {
            if !state.is_consumed() {
                tracing::debug!(result = state.index(), "previous result not consumed, draining");
                state.drain(tokens)?;
            }
            self.completed.push(state.stats());
        }
        if !tokens.has_more()? {
            tokens.expect_token(Token::EndArray)?;
            self.parse_keys()?;
            return Ok(false);
        }
        let state = ResultState::open(self.result_count, tokens)?;
        self.result_count += 1;
        self.current = Some(state);
        Ok(true)
    }

    /// Response-level keys, up to `results` or the closing brace.
    fn parse_keys(&mut self) -> Result<()> {
        let tokens = match self.tokens.as_mut() {
            Some(t) => t,
            None => return Err(released()),
        };
        while tokens.has_more()? {
            let offset = tokens.offset();
            let key = tokens.next_key()?;
            let ctx = || format!("response key '{key}'");
            match key.as_str() {
                "results" if self.results_seen => {
                    return Err(Error::decode(offset, "duplicate 'results' key"));
                }
                "results" => {
                    tokens.expect_token(Token::BeginArray)?;
                    self.results_seen = true;
                    self.phase = Phase::Results;
                    return Ok(());
                }
                "errors" => {
                    let errors: Option<Vec<ServerError>> =
                        tokens.decode().map_err(|e| e.with_context(ctx()))?;
                    self.errors = errors.unwrap_or_default();
                }
                "notifications" => {
                    let notes: Option<Vec<Notification>> =
                        tokens.decode().map_err(|e| e.with_context(ctx()))?;
                    self.notifications = notes.unwrap_or_default();
                }
                "commit" => {
                    self.commit = tokens.decode().map_err(|e| e.with_context(ctx()))?;
                }
                "transaction" => {
                    self.transaction = tokens.decode().map_err(|e| e.with_context(ctx()))?;
                }
                other => {
                    return Err(Error::decode(offset, format!("unexpected response key '{other}'")));
                }
            }
        }
        tokens.expect_token(Token::EndObject)?;
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        self.phase = Phase::Consumed;
        self.tokens = None;
        if let Some(flag) = &self.liveness {
            flag.store(self.transaction.is_some(), Ordering::Relaxed);
        }
        tracing::debug!(
            results = self.result_count,
            errors = self.errors.len(),
            "response consumed, body released"
        );
    }

    fn fail(&mut self, err: Error) -> Error {
        if self.tokens.take().is_some() {
            tracing::debug!(error = %err, "response failed, body released");
        }
        self.failure = Some(err.clone());
        err
    }

    fn tokens_mut(&mut self) -> Result<&mut TokenStream<Body>> {
        self.tokens.as_mut().ok_or_else(released)
    }
}

fn released() -> Error {
    Error::decode(0, "response body already released")
}

impl Drop for ResponseCursor {
    fn drop(&mut self) {
        if self.tokens.is_some() {
            tracing::warn!("response dropped before it was drained; server-reported errors may have been missed");
        }
    }
}

impl std::fmt::Debug for ResponseCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCursor")
            .field("phase", &self.phase)
            .field("status", &self.status)
            .field("results", &self.result_count)
            .field("failure", &self.failure)
            .finish()
    }
}

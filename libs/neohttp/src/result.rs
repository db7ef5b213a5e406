use std::sync::Arc;

use cypher_api::{Error, Result, Stats};

use crate::response::{Body, ResponseCursor};
use crate::row::{Columns, RawRow, Row};
use crate::token::{Token, TokenStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Rows,
    Consumed,
}

/// Parse position of one result object inside `results`.
#[derive(Debug)]
pub(crate) struct ResultState {
    index: usize,
    columns: Arc<Columns>,
    phase: Phase,
    rows: usize,
    stats: Stats,
}

impl ResultState {
    /// Read the opening brace and every key up to the `data` array.
    pub(crate) fn open(index: usize, tokens: &mut TokenStream<Body>) -> Result<Self> {
        tokens.expect_token(Token::BeginObject)?;
        let mut state = Self {
            index,
            columns: Arc::new(Columns::default()),
            phase: Phase::Header,
            rows: 0,
            stats: Stats::default(),
        };
        state.parse_keys(tokens)?;
        Ok(state)
    }

    pub(crate) fn is_consumed(&self) -> bool {
        self.phase == Phase::Consumed
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn columns(&self) -> Arc<Columns> {
        self.columns.clone()
    }

    pub(crate) fn stats(&self) -> Stats {
        self.stats
    }

    fn parse_keys(&mut self, tokens: &mut TokenStream<Body>) -> Result<()> {
        while tokens.has_more()? {
            let offset = tokens.offset();
            let key = tokens.next_key()?;
            match key.as_str() {
                "columns" => {
                    let names: Vec<String> = tokens
                        .decode()
                        .map_err(|e| e.with_context("result key 'columns'"))?;
                    self.columns = Arc::new(Columns::new(names));
                }
                "data" => {
                    tokens.expect_token(Token::BeginArray)?;
                    self.phase = Phase::Rows;
                    return Ok(());
                }
                "stats" => {
                    self.stats = tokens
                        .decode()
                        .map_err(|e| e.with_context("result key 'stats'"))?;
                }
                other => {
                    return Err(Error::decode(offset, format!("unexpected result key '{other}'")));
                }
            }
        }
        tokens.expect_token(Token::EndObject)?;
        self.phase = Phase::Consumed;
        tracing::debug!(result = self.index, rows = self.rows, "result consumed");
        Ok(())
    }

    pub(crate) fn next_row(&mut self, tokens: &mut TokenStream<Body>) -> Result<Option<Row>> {
        if self.phase == Phase::Consumed {
            return Ok(None);
        }
        if !tokens.has_more()? {
            tokens.expect_token(Token::EndArray)?;
            self.parse_keys(tokens)?;
            return Ok(None);
        }
        let raw: RawRow = tokens
            .decode()
            .map_err(|e| e.with_context(format!("row {} of result {}", self.rows, self.index)))?;
        self.rows += 1;
        Ok(Some(Row::from_raw(self.columns.clone(), raw)))
    }

    /// Skip remaining rows without decoding them. Idempotent.
    pub(crate) fn drain(&mut self, tokens: &mut TokenStream<Body>) -> Result<Stats> {
        while self.phase != Phase::Consumed {
            if tokens.has_more()? {
                tokens.skip_value()?;
                self.rows += 1;
            } else {
                tokens.expect_token(Token::EndArray)?;
                self.parse_keys(tokens)?;
            }
        }
        Ok(self.stats)
    }
}

/// Forward-only cursor over the rows of one result.
///
/// Borrows its response; the response cannot advance while it is alive.
/// Column names are known before the first row; [`ResultCursor::stats`] is
/// only available after the last one.
pub struct ResultCursor<'r> {
    response: &'r mut ResponseCursor,
    index: usize,
    columns: Arc<Columns>,
}

impl<'r> ResultCursor<'r> {
    pub(crate) fn new(response: &'r mut ResponseCursor, index: usize, columns: Arc<Columns>) -> Self {
        Self {
            response,
            index,
            columns,
        }
    }

    /// Position of this result in the response's `results` array.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Next row, or `None` once the `data` array closes.
    pub fn advance_row(&mut self) -> Result<Option<Row>> {
        self.response.step_result(ResultState::next_row)
    }

    /// Discard the remaining rows and return the result's stats.
    pub fn drain(&mut self) -> Result<Stats> {
        self.response.step_result(ResultState::drain)
    }

    /// Read every remaining row into memory.
    pub fn collect(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.advance_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    pub fn is_consumed(&self) -> bool {
        self.response.current_result().is_some_and(ResultState::is_consumed)
    }

    /// Stats, once every row has been read.
    pub fn stats(&self) -> Option<Stats> {
        self.response
            .current_result()
            .filter(|s| s.is_consumed())
            .map(ResultState::stats)
    }
}

impl std::fmt::Debug for ResultCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("index", &self.index)
            .field("columns", &self.columns.names())
            .finish()
    }
}

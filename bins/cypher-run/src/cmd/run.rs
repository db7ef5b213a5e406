use std::io::Write;

use cypher_api::{Error, Statement, Value};
use neohttp::ResponseCursor;

use crate::config::RunArgs;
use crate::error::RunError;

pub fn run(args: RunArgs) -> Result<(), RunError> {
    let params = parse_params(&args.params)?;
    let statements: Vec<Statement> = args
        .statements
        .iter()
        .map(|text| Statement::new(text.as_str()).with_params(params.clone()))
        .collect();

    let db = super::connect(&args.connect)?;
    let mut out = std::io::stdout().lock();
    if !args.tx {
        return print_response(&mut db.run_many(&statements), &mut out);
    }

    let mut tx = db.begin();
    let printed = tx
        .run_many(&statements)
        .map_err(RunError::from)
        .and_then(|mut response| print_response(&mut response, &mut out));
    match printed {
        Ok(()) => Ok(tx.commit()?),
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Print each row as one JSON line and each result's stats after its rows.
fn print_response(response: &mut ResponseCursor, out: &mut impl Write) -> Result<(), RunError> {
    while let Some(mut result) = response.advance_result()? {
        let index = result.index();
        while let Some(row) = result.advance_row()? {
            let line = serde_json::to_string(&row).map_err(|e| Error::Encode(e.to_string()))?;
            writeln!(out, "{line}")?;
        }
        let stats = result.drain()?;
        let stats = serde_json::to_string(&stats).map_err(|e| Error::Encode(e.to_string()))?;
        writeln!(out, "-- result {index}: {stats}")?;
    }
    response.drain()?;
    for note in response.notifications() {
        tracing::warn!(code = %note.code, title = %note.title, "{}", note.description);
    }
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Vec<(String, Value)>, RunError> {
    raw.iter()
        .map(|param| {
            let (name, value) = param
                .split_once('=')
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| RunError::Param(param.clone()))?;
            let value = serde_json::from_str::<serde_json::Value>(value)
                .map(Value::from)
                .unwrap_or_else(|_| Value::from(value));
            Ok((name.to_owned(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_json_or_strings() {
        let params = parse_params(&["n=5".into(), "name=ann".into(), "tags=[\"a\"]".into()]).unwrap();
        assert_eq!(params[0], ("n".to_owned(), Value::from(5i64)));
        assert_eq!(params[1], ("name".to_owned(), Value::from("ann")));
        assert_eq!(params[2].1.as_list().map(|l| l.len()), Some(1));
    }

    #[test]
    fn param_without_name_is_rejected() {
        assert!(matches!(parse_params(&["=1".into()]), Err(RunError::Param(_))));
        assert!(matches!(parse_params(&["bare".into()]), Err(RunError::Param(_))));
    }

    #[test]
    fn prints_rows_then_stats() {
        let body = r#"{"results":[{"columns":["name"],"data":[{"row":["ann"]}],"stats":{"nodes_created":2}}],"errors":[]}"#;
        let mut response = ResponseCursor::from_body(std::io::Cursor::new(body.as_bytes().to_vec()));
        let mut out = Vec::new();
        print_response(&mut response, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(r#"{"name":"ann"}"#));
        assert!(lines.next().unwrap().starts_with("-- result 0: {"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_output_error() {
        let body = r#"{"results":[{"columns":["n"],"data":[{"row":[1]}]}],"errors":[]}"#;
        let mut response = ResponseCursor::from_body(std::io::Cursor::new(body.as_bytes().to_vec()));
        let err = print_response(&mut response, &mut ClosedPipe).unwrap_err();
        assert!(matches!(err, RunError::Output(_)), "{err}");
    }
}

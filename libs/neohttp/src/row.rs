use std::collections::HashMap;
use std::sync::Arc;

use cypher_api::{Error, Result, Value};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Column names of one result and their positions.
///
/// Built once from the result's `columns` key and shared by all of its rows.
/// A repeated name resolves to its first position.
#[derive(Debug, Default)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// Wire shape of one `data` entry.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRow {
    row: Vec<Value>,
    #[serde(default)]
    meta: Vec<Value>,
}

/// One decoded record.
///
/// `get(name)` and `get_at(i)` agree whenever `name` is at position `i`.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<Value>,
    meta: Vec<Value>,
}

impl Row {
    pub(crate) fn from_raw(columns: Arc<Columns>, raw: RawRow) -> Self {
        Self {
            columns,
            values: raw.row,
            meta: raw.meta,
        }
    }

    pub fn get_at(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.position(name).and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Per-column entity metadata as sent by the server (`null` for plain values).
    pub fn meta(&self) -> &[Value] {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Bind the row to `T` through its `{column: value}` form.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        let json = serde_json::to_value(self).map_err(|e| Error::Encode(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| Error::Encode(format!("bind row: {e}")))
    }
}

/// Serializes as an object keyed by column name, in column order.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let names = self.columns.names();
        let mut map = serializer.serialize_map(Some(names.len()))?;
        for name in names {
            map.serialize_entry(name, self.get(name).unwrap_or(&Value::Null))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(columns: &[&str], values: serde_json::Value) -> Row {
        let cols = Arc::new(Columns::new(columns.iter().map(|c| c.to_string()).collect()));
        let raw: RawRow = serde_json::from_value(serde_json::json!({ "row": values })).unwrap();
        Row::from_raw(cols, raw)
    }

    #[test]
    fn name_and_position_lookups_agree() {
        let r = row(&["n", "m"], serde_json::json!([1, "two"]));
        for (i, name) in r.columns().iter().enumerate() {
            assert_eq!(r.get(name), r.get_at(i));
        }
        assert_eq!(r.get("m").and_then(Value::as_str), Some("two"));
        assert_eq!(r.get("missing"), None);
        assert_eq!(r.get_at(5), None);
    }

    #[test]
    fn repeated_column_name_uses_first_position() {
        let r = row(&["x", "x"], serde_json::json!([1, 2]));
        assert_eq!(r.get("x").and_then(Value::as_i64), Some(1));
    }

    #[test]
    fn serializes_as_column_object() {
        let r = row(&["name", "age"], serde_json::json!(["ann", 41]));
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"name":"ann","age":41}"#
        );
    }

    #[test]
    fn binds_to_struct() {
        #[derive(Deserialize)]
        struct Person {
            name: String,
            age: u32,
        }
        let p: Person = row(&["name", "age"], serde_json::json!(["ann", 41]))
            .bind()
            .unwrap();
        assert_eq!(p.name, "ann");
        assert_eq!(p.age, 41);
    }

    #[test]
    fn bind_mismatch_is_encode_error() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Person {
            age: u32,
        }
        let err = row(&["age"], serde_json::json!(["old"]))
            .bind::<Person>()
            .unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }
}

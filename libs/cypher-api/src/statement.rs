use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::Value;

/// One cypher query with its named parameters.
///
/// Built once by the caller and borrowed by every run call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    #[serde(rename = "statement")]
    text: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Value>,
    #[serde(rename = "includeStats")]
    include_stats: bool,
}

impl Statement {
    /// New statement with no parameters. Statistics are requested by default.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: BTreeMap::new(),
            include_stats: true,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.parameters.extend(params);
        self
    }

    pub fn include_stats(mut self, include: bool) -> Self {
        self.include_stats = include;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn includes_stats(&self) -> bool {
        self.include_stats
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Statement::new(text)
    }
}

impl From<String> for Statement {
    fn from(text: String) -> Self {
        Statement::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_wire_shape() {
        let stmt = Statement::new("MATCH (n) WHERE n.id = $id RETURN n").param("id", 3);
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "statement": "MATCH (n) WHERE n.id = $id RETURN n",
                "parameters": {"id": 3},
                "includeStats": true
            })
        );
    }

    #[test]
    fn empty_parameters_are_omitted() {
        let json = serde_json::to_value(Statement::new("RETURN 1")).unwrap();
        assert!(json.get("parameters").is_none());
    }
}

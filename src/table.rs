use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An untyped tabular export as handed over by the I/O layer.
///
/// Headers and cells are arbitrary: column names come from whatever the bank
/// put in the first row, and cells are whatever the parser produced (strings,
/// numbers, nulls). The table is consumed once by the pipeline entry point and
/// never mutated by it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.headers.is_empty()
    }

    /// Index of the column with this exact header, if present.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell at (row, column index); short rows yield `None`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All cells of the named column, padding short rows with `Value::Null`.
    pub fn column(&self, header: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(header)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).unwrap_or(&Value::Null))
                .collect(),
        )
    }
}

/// Coerce a cell into the string the cleaners operate on.
///
/// `Null` means "missing" and coerces to `None`; everything else becomes its
/// textual form (numbers without quotes, nested values as compact JSON).
pub fn cell_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_lookup() {
        let table = RawTable::new(
            vec!["Date".to_string(), "Amount".to_string()],
            vec![
                vec![json!("2023-01-01"), json!(12.5)],
                vec![json!("2023-01-02")],
            ],
        );

        assert_eq!(table.column_index("Amount"), Some(1));
        assert_eq!(table.column_index("amount"), None);

        let cells = table.column("Amount").unwrap();
        assert_eq!(cells[0], &json!(12.5));
        assert_eq!(cells[1], &Value::Null);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Value::Null), None);
        assert_eq!(cell_to_string(&json!(" $5 ")), Some(" $5 ".to_string()));
        assert_eq!(cell_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(cell_to_string(&json!(true)), Some("true".to_string()));
    }
}

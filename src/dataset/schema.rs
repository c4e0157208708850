//! Schema checks and cell coercion for the input tables.
//!
//! Tables arrive as JSON arrays of objects. Columns are looked up by
//! configured name only; a key column that is missing everywhere is a
//! schema error, a bad or absent score cell is not.

use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// A JSON object row.
pub type Row = Map<String, Value>;

/// The three input tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Topics,
    Assignments,
    Scores,
}

impl Table {
    /// Key of this table inside a bundle file.
    pub fn key(&self) -> &'static str {
        match self {
            Table::Topics => "topics",
            Table::Assignments => "assignments",
            Table::Scores => "scores",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Input that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("bundle has no '{0}' table")]
    MissingTable(Table),

    #[error("{0} table must be a JSON array of objects")]
    NotATable(Table),

    #[error("{table} row #{row} is not a JSON object")]
    RowNotObject { table: Table, row: usize },

    #[error("{table} row #{row} is missing required field '{field}'")]
    MissingField {
        table: Table,
        field: String,
        row: usize,
    },

    #[error("{table} table has no '{column}' column in any row")]
    MissingColumn { table: Table, column: String },

    #[error("{table} row #{row} has invalid '{field}' value: {value}")]
    InvalidValue {
        table: Table,
        field: String,
        row: usize,
        value: String,
    },

    #[error("{table} table has duplicate '{field}' value: {value}")]
    DuplicateKey {
        table: Table,
        field: String,
        value: String,
    },
}

/// Borrow the rows of a table, checking it is an array of objects.
pub fn rows(table: Table, value: &Value) -> Result<Vec<&Row>, SchemaError> {
    let items = value.as_array().ok_or(SchemaError::NotATable(table))?;

    items
        .iter()
        .enumerate()
        .map(|(row, item)| item.as_object().ok_or(SchemaError::RowNotObject { table, row }))
        .collect()
}

/// Whether any row of the table carries `column`.
pub fn has_column(rows: &[&Row], column: &str) -> bool {
    rows.iter().any(|r| r.contains_key(column))
}

/// Fail if a non-empty table carries `column` in none of its rows.
pub fn require_column(table: Table, rows: &[&Row], column: &str) -> Result<(), SchemaError> {
    if rows.is_empty() || has_column(rows, column) {
        return Ok(());
    }

    Err(SchemaError::MissingColumn {
        table,
        column: column.to_string(),
    })
}

/// Read a required key-like cell (depth tag, row number).
pub fn key_cell(table: Table, row: &Row, index: usize, field: &str) -> Result<String, SchemaError> {
    let value = match row.get(field) {
        None | Some(Value::Null) => {
            return Err(SchemaError::MissingField {
                table,
                field: field.to_string(),
                row: index,
            })
        }
        Some(value) => value,
    };

    canonical_tag(value).ok_or_else(|| SchemaError::InvalidValue {
        table,
        field: field.to_string(),
        row: index,
        value: value.to_string(),
    })
}

/// Read a required text cell; numbers are rendered canonically.
pub fn required_text(
    table: Table,
    row: &Row,
    index: usize,
    field: &str,
) -> Result<String, SchemaError> {
    match row.get(field) {
        None | Some(Value::Null) => Err(SchemaError::MissingField {
            table,
            field: field.to_string(),
            row: index,
        }),
        Some(_) => Ok(text_cell(row, field)),
    }
}

/// Read an optional text cell, falling back to an empty string.
pub fn text_cell(row: &Row, field: &str) -> String {
    optional_text(row, field).unwrap_or_default()
}

/// Read an optional text cell; `None` when absent or null.
pub fn optional_text(row: &Row, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(canonical_number(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Read a score cell. `None` means the cell needs coercion to 0.
pub fn score_cell(row: &Row, field: &str) -> Option<f64> {
    let score = match row.get(field)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    score.is_finite().then_some(score)
}

/// Normalize a number or string into a comparable tag.
///
/// Integral values lose any fractional part ("1.0" -> "1"); other strings
/// are trimmed. Returns `None` for empty strings and non-scalar values.
pub fn canonical_tag(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(canonical_number(n)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(i) = trimmed.parse::<i64>() {
                return Some(i.to_string());
            }
            match trimmed.parse::<f64>() {
                Ok(f) if is_integral(f) => Some((f as i64).to_string()),
                _ => Some(trimmed.to_string()),
            }
        }
        _ => None,
    }
}

fn canonical_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if is_integral(f) => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn is_integral(f: f64) -> bool {
    // beyond 2^53 integral floats no longer map back to distinct integers
    f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rows_rejects_non_array() {
        let err = rows(Table::Topics, &json!({"depth": 1})).unwrap_err();
        assert_eq!(err, SchemaError::NotATable(Table::Topics));
    }

    #[test]
    fn test_rows_rejects_non_object_row() {
        let err = rows(Table::Scores, &json!([{"row_number": 1}, 5])).unwrap_err();
        assert_eq!(
            err,
            SchemaError::RowNotObject {
                table: Table::Scores,
                row: 1
            }
        );
    }

    #[test]
    fn test_require_column() {
        let value = json!([{"a": 1}, {"b": 2}]);
        let table = rows(Table::Scores, &value).unwrap();

        assert!(require_column(Table::Scores, &table, "b").is_ok());
        assert!(require_column(Table::Scores, &table, "c").is_err());
        assert!(require_column(Table::Scores, &[], "c").is_ok());
    }

    #[test]
    fn test_canonical_tag() {
        assert_eq!(canonical_tag(&json!(1)), Some("1".to_string()));
        assert_eq!(canonical_tag(&json!(1.0)), Some("1".to_string()));
        assert_eq!(canonical_tag(&json!("2")), Some("2".to_string()));
        assert_eq!(canonical_tag(&json!(" 2.0 ")), Some("2".to_string()));
        assert_eq!(canonical_tag(&json!(2.5)), Some("2.5".to_string()));
        assert_eq!(canonical_tag(&json!("row-a")), Some("row-a".to_string()));
        assert_eq!(canonical_tag(&json!("")), None);
        assert_eq!(canonical_tag(&json!(true)), None);
        assert_eq!(canonical_tag(&json!(null)), None);
    }

    #[test]
    fn test_key_cell_errors() {
        let r = row(json!({"depth": null, "row_number": [1]}));

        assert!(matches!(
            key_cell(Table::Topics, &r, 0, "depth"),
            Err(SchemaError::MissingField { .. })
        ));
        assert!(matches!(
            key_cell(Table::Scores, &r, 0, "row_number"),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_score_cell_coercion() {
        let r = row(json!({
            "num": 4,
            "float": 3.5,
            "text": " 2 ",
            "junk": "n/a",
            "null": null,
            "flag": true
        }));

        assert_eq!(score_cell(&r, "num"), Some(4.0));
        assert_eq!(score_cell(&r, "float"), Some(3.5));
        assert_eq!(score_cell(&r, "text"), Some(2.0));
        assert_eq!(score_cell(&r, "junk"), None);
        assert_eq!(score_cell(&r, "null"), None);
        assert_eq!(score_cell(&r, "flag"), None);
        assert_eq!(score_cell(&r, "absent"), None);
    }

    #[test]
    fn test_score_cell_rejects_non_finite_strings() {
        let r = row(json!({"inf": "inf", "nan": "NaN"}));
        assert_eq!(score_cell(&r, "inf"), None);
        assert_eq!(score_cell(&r, "nan"), None);
    }

    #[test]
    fn test_text_cells() {
        let r = row(json!({"title": "Idea", "count": 3, "empty": null}));

        assert_eq!(text_cell(&r, "title"), "Idea");
        assert_eq!(text_cell(&r, "count"), "3");
        assert_eq!(text_cell(&r, "empty"), "");
        assert_eq!(text_cell(&r, "absent"), "");
        assert_eq!(optional_text(&r, "empty"), None);
    }

    #[test]
    fn test_error_messages_name_the_field() {
        let err = SchemaError::MissingField {
            table: Table::Assignments,
            field: "row_number".to_string(),
            row: 3,
        };
        assert_eq!(
            err.to_string(),
            "assignments row #3 is missing required field 'row_number'"
        );
    }
}

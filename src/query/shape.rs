use serde_json::Value;

use super::descriptor::Shape;
use crate::database::JsonRow;

/// Apply `shape` to a result set. `None` means a single row was expected and
/// none came back.
pub fn shape_rows(rows: Vec<JsonRow>, shape: &Shape) -> Option<Value> {
    match shape {
        Shape::Rows => Some(Value::Array(rows.into_iter().map(Value::Object).collect())),
        Shape::Scalars(column) => Some(Value::Array(
            rows.into_iter()
                .map(|mut row| row.remove(*column).unwrap_or(Value::Null))
                .collect(),
        )),
        Shape::Redact(columns) => Some(Value::Array(
            rows.into_iter()
                .map(|mut row| {
                    row.retain(|key, _| !columns.iter().any(|c| c.eq_ignore_ascii_case(key)));
                    Value::Object(row)
                })
                .collect(),
        )),
        Shape::SingleRow => rows.into_iter().next().map(Value::Object),
    }
}

//! Request payload parsing
//!
//! Only fields named by the schema are looked at. `null` counts as absent.

use super::PredictError;
use crate::encoding::ColumnSchema;
use crate::models::{RawRow, RawValue};
use serde_json::Value;

/// Pull the schema fields out of a JSON request body
pub fn parse_payload(body: &Value, schema: &ColumnSchema) -> Result<RawRow, PredictError> {
    let object = body
        .as_object()
        .ok_or_else(|| PredictError::InvalidRequest("request body must be a JSON object".to_string()))?;

    let mut row = RawRow::with_capacity(schema.len());
    for column in schema.columns() {
        let value = match object.get(column) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => n.as_f64().map(RawValue::Number).ok_or_else(|| {
                PredictError::InvalidRequest(format!("field '{}' is not a representable number", column))
            })?,
            Some(Value::String(s)) => RawValue::Text(s.clone()),
            Some(_) => {
                return Err(PredictError::InvalidRequest(format!(
                    "field '{}' must be a number or a string",
                    column
                )))
            }
        };
        row.insert(column.clone(), value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(["Area", "City"]).unwrap()
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let row = parse_payload(&json!({"Area": 900, "City": "Lahore", "Owner": "x"}), &schema()).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row["Area"], RawValue::Number(900.0));
        assert_eq!(row["City"], RawValue::from("Lahore"));
    }

    #[test]
    fn test_null_is_absent() {
        let row = parse_payload(&json!({"Area": null, "City": "Lahore"}), &schema()).unwrap();
        assert!(!row.contains_key("Area"));
    }

    #[test]
    fn test_rejects_non_object_and_nested_values() {
        assert!(matches!(
            parse_payload(&json!([1, 2]), &schema()),
            Err(PredictError::InvalidRequest(_))
        ));
        assert!(matches!(
            parse_payload(&json!({"Area": true}), &schema()),
            Err(PredictError::InvalidRequest(_))
        ));
        assert!(matches!(
            parse_payload(&json!({"City": {"name": "Lahore"}}), &schema()),
            Err(PredictError::InvalidRequest(_))
        ));
        // Only schema fields are inspected
        assert!(parse_payload(&json!({"Garden": [1]}), &schema()).is_ok());
    }
}

//! Row encoding into the positional model input
//!
//! Walks the schema in order and produces one value per column: the label
//! code for categorical columns, the number itself for numeric columns, and
//! zero for anything the row does not carry.

use super::{ColumnSchema, EncodeError, LabelEncoder};
use crate::models::{RawRow, RawValue};
use std::collections::BTreeMap;

/// Label encoders keyed by column name
pub type CategoricalEncoders = BTreeMap<String, LabelEncoder>;

/// Value substituted for a column absent from the row
const MISSING_VALUE: f64 = 0.0;

/// A categorical value that was not seen during training
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnseenLabel {
    pub column: String,
    pub label: String,
    pub fallback: String,
}

/// Encoded vector in schema order plus any fallback substitutions made
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub values: Vec<f64>,
    pub unseen: Vec<UnseenLabel>,
}

/// Applies the schema and label encoders to raw rows
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    schema: ColumnSchema,
    encoders: CategoricalEncoders,
}

impl FeatureEncoder {
    pub fn new(schema: ColumnSchema, encoders: CategoricalEncoders) -> Result<Self, EncodeError> {
        if let Some(column) = encoders.keys().find(|c| !schema.contains(c)) {
            return Err(EncodeError::UnknownEncoderColumn(column.clone()));
        }
        Ok(Self { schema, encoders })
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn encoders(&self) -> &CategoricalEncoders {
        &self.encoders
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.encoders.contains_key(column)
    }

    /// Encode one row. Fields outside the schema are ignored.
    pub fn encode(&self, row: &RawRow) -> Result<EncodedRow, EncodeError> {
        let mut values = Vec::with_capacity(self.schema.len());
        let mut unseen = Vec::new();

        for column in self.schema.columns() {
            let raw = row.get(column);
            let value = match self.encoders.get(column) {
                Some(encoder) => {
                    // An absent categorical field behaves like a supplied 0.
                    let label = raw
                        .map(RawValue::as_label)
                        .unwrap_or_else(|| RawValue::Number(MISSING_VALUE).as_label());
                    let lookup = encoder.encode_or_fallback(&label);
                    if lookup.unseen {
                        unseen.push(UnseenLabel {
                            column: column.clone(),
                            label,
                            fallback: encoder.fallback_label().to_string(),
                        });
                    }
                    lookup.code as f64
                }
                None => match raw {
                    None => MISSING_VALUE,
                    Some(raw) => raw.as_number().ok_or_else(|| EncodeError::NonNumeric {
                        column: column.clone(),
                        value: raw.to_string(),
                    })?,
                },
            };
            values.push(value);
        }

        Ok(EncodedRow { values, unseen })
    }

    /// Encode many rows into a row-major matrix
    pub fn encode_batch<'a, I>(&self, rows: I) -> Result<Vec<Vec<f64>>, EncodeError>
    where
        I: IntoIterator<Item = &'a RawRow>,
    {
        rows.into_iter()
            .map(|row| self.encode(row).map(|encoded| encoded.values))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house_encoder() -> FeatureEncoder {
        let schema = ColumnSchema::new(["Area", "Bedrooms", "City"]).unwrap();
        let city = LabelEncoder::from_mapping(BTreeMap::from([
            ("Lahore".to_string(), 0),
            ("Karachi".to_string(), 1),
        ]))
        .unwrap();
        FeatureEncoder::new(schema, BTreeMap::from([("City".to_string(), city)])).unwrap()
    }

    fn row(fields: &[(&str, RawValue)]) -> RawRow {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_encode_known_row() {
        let encoder = house_encoder();
        let encoded = encoder
            .encode(&row(&[
                ("Area", RawValue::Number(1000.0)),
                ("Bedrooms", RawValue::Number(3.0)),
                ("City", "Lahore".into()),
            ]))
            .unwrap();
        assert_eq!(encoded.values, vec![1000.0, 3.0, 0.0]);
        assert!(encoded.unseen.is_empty());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = house_encoder();
        let r = row(&[
            ("Area", RawValue::Number(850.0)),
            ("Bedrooms", RawValue::Number(2.0)),
            ("City", "Karachi".into()),
        ]);
        assert_eq!(encoder.encode(&r).unwrap(), encoder.encode(&r).unwrap());
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let encoder = house_encoder();
        let forward = row(&[
            ("Area", RawValue::Number(1000.0)),
            ("Bedrooms", RawValue::Number(3.0)),
            ("City", "Karachi".into()),
        ]);
        let reversed = row(&[
            ("City", "Karachi".into()),
            ("Bedrooms", RawValue::Number(3.0)),
            ("Area", RawValue::Number(1000.0)),
        ]);
        assert_eq!(
            encoder.encode(&forward).unwrap().values,
            encoder.encode(&reversed).unwrap().values
        );
    }

    #[test]
    fn test_unseen_label_falls_back() {
        let encoder = house_encoder();
        let encoded = encoder
            .encode(&row(&[
                ("Area", RawValue::Number(1000.0)),
                ("Bedrooms", RawValue::Number(3.0)),
                ("City", "Islamabad".into()),
            ]))
            .unwrap();
        // "Karachi" sorts first and carries code 1.
        assert_eq!(encoded.values, vec![1000.0, 3.0, 1.0]);
        assert_eq!(
            encoded.unseen,
            vec![UnseenLabel {
                column: "City".to_string(),
                label: "Islamabad".to_string(),
                fallback: "Karachi".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_numeric_defaults_to_zero() {
        let encoder = house_encoder();
        let missing = encoder
            .encode(&row(&[("Area", RawValue::Number(1000.0)), ("City", "Lahore".into())]))
            .unwrap();
        let explicit = encoder
            .encode(&row(&[
                ("Area", RawValue::Number(1000.0)),
                ("Bedrooms", RawValue::Number(0.0)),
                ("City", "Lahore".into()),
            ]))
            .unwrap();
        assert_eq!(missing.values, vec![1000.0, 0.0, 0.0]);
        assert_eq!(missing, explicit);
    }

    #[test]
    fn test_missing_categorical_matches_supplied_zero() {
        let encoder = house_encoder();
        let missing = encoder
            .encode(&row(&[("Area", RawValue::Number(1.0)), ("Bedrooms", RawValue::Number(1.0))]))
            .unwrap();
        let zero = encoder
            .encode(&row(&[
                ("Area", RawValue::Number(1.0)),
                ("Bedrooms", RawValue::Number(1.0)),
                ("City", RawValue::Number(0.0)),
            ]))
            .unwrap();
        assert_eq!(missing, zero);
        assert_eq!(missing.unseen.len(), 1);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let encoder = house_encoder();
        let encoded = encoder
            .encode(&row(&[
                ("Area", RawValue::Number(500.0)),
                ("Bedrooms", RawValue::Number(1.0)),
                ("City", "Lahore".into()),
                ("Street Number", "42B".into()),
            ]))
            .unwrap();
        assert_eq!(encoded.values.len(), 3);
    }

    #[test]
    fn test_numeric_text_is_accepted_and_garbage_rejected() {
        let encoder = house_encoder();
        let encoded = encoder
            .encode(&row(&[("Area", "1200".into()), ("City", "Lahore".into())]))
            .unwrap();
        assert_eq!(encoded.values[0], 1200.0);

        let err = encoder
            .encode(&row(&[("Area", "large".into())]))
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::NonNumeric {
                column: "Area".to_string(),
                value: "large".to_string(),
            }
        );
    }

    #[test]
    fn test_encoder_column_must_be_in_schema() {
        let schema = ColumnSchema::new(["Area"]).unwrap();
        let encoders = BTreeMap::from([(
            "City".to_string(),
            LabelEncoder::fit(["Lahore"]).unwrap(),
        )]);
        assert_eq!(
            FeatureEncoder::new(schema, encoders),
            Err(EncodeError::UnknownEncoderColumn("City".to_string()))
        );
    }
}

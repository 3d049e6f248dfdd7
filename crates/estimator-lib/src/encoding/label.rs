//! Per-column categorical label encoding

use super::EncodeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frozen mapping from observed labels to contiguous integer codes.
///
/// Labels are kept in an ordered map, so the fallback for an unseen label is
/// always the lexicographically smallest known label, whatever code it was
/// assigned. Serialized as a plain `{label: code}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct LabelEncoder {
    codes: BTreeMap<String, u32>,
}

/// Result of looking a label up with fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelLookup {
    pub code: u32,
    pub unseen: bool,
}

impl LabelEncoder {
    /// Fit an encoder on observed labels: unique values are sorted and
    /// numbered from zero in that order.
    pub fn fit<I, S>(labels: I) -> Result<Self, EncodeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut codes: BTreeMap<String, u32> =
            labels.into_iter().map(|l| (l.into(), 0)).collect();
        if codes.is_empty() {
            return Err(EncodeError::NoLabels);
        }
        for (code, value) in codes.values_mut().enumerate() {
            *value = code as u32;
        }
        Ok(Self { codes })
    }

    /// Build an encoder from an explicit mapping. Codes must cover
    /// `0..len` exactly once.
    pub fn from_mapping(codes: BTreeMap<String, u32>) -> Result<Self, EncodeError> {
        if codes.is_empty() {
            return Err(EncodeError::NoLabels);
        }
        let mut seen = vec![false; codes.len()];
        for &code in codes.values() {
            match seen.get_mut(code as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(EncodeError::NonContiguousCodes {
                        expected: codes.len() - 1,
                    })
                }
            }
        }
        Ok(Self { codes })
    }

    /// Code for a known label
    pub fn encode(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    /// Code for a label, substituting the fallback code when unseen
    pub fn encode_or_fallback(&self, label: &str) -> LabelLookup {
        match self.encode(label) {
            Some(code) => LabelLookup {
                code,
                unseen: false,
            },
            None => LabelLookup {
                code: self.fallback_code(),
                unseen: true,
            },
        }
    }

    /// Lexicographically smallest known label
    pub fn fallback_label(&self) -> &str {
        // Construction guarantees at least one label.
        self.codes.keys().next().map(String::as_str).unwrap_or_default()
    }

    pub fn fallback_code(&self) -> u32 {
        self.codes.values().next().copied().unwrap_or_default()
    }

    /// Known labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    pub fn mapping(&self) -> &BTreeMap<String, u32> {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl TryFrom<BTreeMap<String, u32>> for LabelEncoder {
    type Error = EncodeError;

    fn try_from(codes: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        Self::from_mapping(codes)
    }
}

impl From<LabelEncoder> for BTreeMap<String, u32> {
    fn from(encoder: LabelEncoder) -> Self {
        encoder.codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_unique_labels() {
        let encoder = LabelEncoder::fit(["Lahore", "Karachi", "Lahore", "Islamabad"]).unwrap();
        assert_eq!(encoder.len(), 3);
        assert_eq!(encoder.encode("Islamabad"), Some(0));
        assert_eq!(encoder.encode("Karachi"), Some(1));
        assert_eq!(encoder.encode("Lahore"), Some(2));
    }

    #[test]
    fn test_fit_empty_fails() {
        let labels: Vec<String> = Vec::new();
        assert_eq!(LabelEncoder::fit(labels), Err(EncodeError::NoLabels));
    }

    #[test]
    fn test_fallback_is_lexicographically_first() {
        let mapping = BTreeMap::from([("Lahore".to_string(), 0), ("Karachi".to_string(), 1)]);
        let encoder = LabelEncoder::from_mapping(mapping).unwrap();

        assert_eq!(encoder.fallback_label(), "Karachi");
        assert_eq!(encoder.fallback_code(), 1);

        let lookup = encoder.encode_or_fallback("Islamabad");
        assert!(lookup.unseen);
        assert_eq!(lookup.code, 1);

        let lookup = encoder.encode_or_fallback("Lahore");
        assert!(!lookup.unseen);
        assert_eq!(lookup.code, 0);
    }

    #[test]
    fn test_from_mapping_rejects_gaps_and_duplicates() {
        let gap = BTreeMap::from([("a".to_string(), 0), ("b".to_string(), 2)]);
        assert!(matches!(
            LabelEncoder::from_mapping(gap),
            Err(EncodeError::NonContiguousCodes { expected: 1 })
        ));

        let dup = BTreeMap::from([("a".to_string(), 0), ("b".to_string(), 0)]);
        assert!(LabelEncoder::from_mapping(dup).is_err());
    }

    #[test]
    fn test_serde_as_plain_mapping() {
        let encoder = LabelEncoder::fit(["Lahore", "Karachi"]).unwrap();
        let json = serde_json::to_string(&encoder).unwrap();
        assert_eq!(json, r#"{"Karachi":0,"Lahore":1}"#);

        let back: LabelEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoder);

        let bad: Result<LabelEncoder, _> = serde_json::from_str(r#"{"a":3}"#);
        assert!(bad.is_err());
    }
}

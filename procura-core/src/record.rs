//! Raw records and blocks as returned by the remote source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::BLOCK_SIZE;

/// Untyped field map shaped by the remote source.
///
/// The schema is not guaranteed stable: fields may be absent, null, or carry
/// an unexpected JSON type. Accessors therefore return `Option` and leave the
/// decision about missing data to the normalizer.
///
/// # Examples
/// ```
/// use procura_core::RawRecord;
/// use serde_json::json;
///
/// let record = RawRecord::from_json(json!({"id": "42", "nif": "500"})).expect("object");
/// assert_eq!(record.integer("id"), Some(42));
/// assert_eq!(record.text("nif"), Some("500"));
/// assert_eq!(record.text("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Wrap an existing JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from a JSON value, returning `None` unless it is an object.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Raw value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of `field`; null and non-string values yield `None`.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Integer value of `field`, accepting JSON numbers and numeric strings.
    #[must_use]
    pub fn integer(&self, field: &str) -> Option<i64> {
        self.0.get(field).and_then(integer_value)
    }

    /// Human-readable rendering of the `id` field for diagnostics.
    #[must_use]
    pub fn id_label(&self) -> String {
        match self.0.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => "<missing>".to_owned(),
            Some(other) => other.to_string(),
        }
    }

    /// Borrow the underlying field map.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record and return the field map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Interpret a JSON number or numeric string as an integer.
pub(crate) fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Ordered page of raw records for one block index.
///
/// A block holding exactly [`BLOCK_SIZE`] records is complete. Shorter
/// non-empty blocks are valid remote responses but are never trusted from the
/// cache; an empty block is the end-of-data signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(Vec<RawRecord>);

impl Block {
    /// Wrap the supplied records.
    #[must_use]
    pub const fn new(records: Vec<RawRecord>) -> Self {
        Self(records)
    }

    /// Number of records in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the block holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the block holds exactly the nominal number of records.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        u64::try_from(self.0.len()).is_ok_and(|len| len == BLOCK_SIZE)
    }

    /// Borrow the records in remote order.
    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.0
    }

    /// Consume the block and return its records.
    #[must_use]
    pub fn into_records(self) -> Vec<RawRecord> {
        self.0
    }
}

impl From<Vec<RawRecord>> for Block {
    fn from(records: Vec<RawRecord>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a Block {
    type Item = &'a RawRecord;
    type IntoIter = std::slice::Iter<'a, RawRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

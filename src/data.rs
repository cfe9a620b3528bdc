use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// The value type for fields in a document.
///
/// Each variant corresponds to one storage primitive of the type catalog,
/// plus `Null` for absent values in nullable columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Null,

    /// Text content. Keyword fields carry their token set here, joined by `&`.
    Text(String),

    Integer(i64),

    Real(f64),

    /// Calendar date without time zone.
    Date(NaiveDate),

    /// Date and time without time zone.
    DateTime(NaiveDateTime),

    /// Opaque bytes, stored but never searched.
    Blob(Vec<u8>),
}

impl DataValue {
    /// Returns the text value if this is a Text variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value if this is an Integer variant.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the real value, widening integers.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            DataValue::Real(f) => Some(*f),
            DataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DataValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            DataValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            DataValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Short variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Text(_) => "text",
            DataValue::Integer(_) => "integer",
            DataValue::Real(_) => "real",
            DataValue::Date(_) => "date",
            DataValue::DateTime(_) => "datetime",
            DataValue::Blob(_) => "blob",
        }
    }
}

// --- Conversions ---

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::Text(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Text(v.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Integer(v)
    }
}

impl From<i32> for DataValue {
    fn from(v: i32) -> Self {
        DataValue::Integer(v as i64)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Real(v)
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Real(v as f64)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(d: NaiveDate) -> Self {
        DataValue::Date(d)
    }
}

impl From<NaiveDateTime> for DataValue {
    fn from(dt: NaiveDateTime) -> Self {
        DataValue::DateTime(dt)
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(v: Vec<u8>) -> Self {
        DataValue::Blob(v)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(DataValue::Null)
    }
}

/// A document: named field values in insertion order.
///
/// Documents handed to ingestion may list their fields in any order; documents
/// produced by a search list them in schema declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<(String, DataValue)>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a field to the document, replacing any earlier value of the same name.
    pub fn add_field(mut self, name: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Add a keyword field from its individual tokens; they are joined with `&`.
    pub fn add_keywords<I, S>(self, name: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = crate::store::codec::join_tokens(tokens);
        self.add_field(name, DataValue::Text(joined))
    }

    /// Set a field in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<DataValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Get a reference to a field's value.
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Check if the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all field names in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<DataValue>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.set(k, v);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_field_replaces() {
        let doc = Document::new()
            .add_field("title", "Heat")
            .add_field("year", 1995)
            .add_field("title", "Casino");

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("title").and_then(|v| v.as_text()), Some("Casino"));
        assert_eq!(doc.field_names(), vec!["title", "year"]);
    }

    #[test]
    fn test_add_keywords_joins() {
        let doc = Document::new().add_keywords("genres", ["Drama", "Romance"]);
        assert_eq!(
            doc.get("genres").and_then(|v| v.as_text()),
            Some("Drama&Romance")
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(DataValue::from(None::<i64>), DataValue::Null);
        assert_eq!(DataValue::from(Some(3)), DataValue::Integer(3));
        assert_eq!(DataValue::Integer(2).as_real(), Some(2.0));
    }
}

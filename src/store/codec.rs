//! Value conversion between [`DataValue`] and SQLite, and the `&` delimiter
//! encoding shared by keyword values and stored UUID sets.
//!
//! No escaping is performed: a token containing the delimiter would split
//! into two tokens. Callers are rejected up front where that matters
//! (UUIDs at ingest, `Contains` tokens at query construction).

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};

use crate::data::DataValue;
use crate::engine::field::StoragePrimitive;

/// Token delimiter for keyword values and UUID sets.
pub const DELIMITER: char = '&';

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Join tokens with the delimiter.
pub fn join_tokens<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, token) in tokens.into_iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(token.as_ref());
    }
    out
}

/// Split an encoded set into its tokens. Empty tokens are dropped, so an empty
/// string decodes to the empty set.
pub fn split_tokens(encoded: &str) -> impl Iterator<Item = &str> {
    encoded.split(DELIMITER).filter(|t| !t.is_empty())
}

pub fn contains_delimiter(token: &str) -> bool {
    token.contains(DELIMITER)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert `value` to the variant stored for `primitive`.
///
/// Lossless conversions are accepted (integer to real, ISO text to date,
/// numbers to text); anything else is reported as an error message naming
/// both sides, which callers wrap in the error kind of their context.
pub fn coerce(value: DataValue, primitive: StoragePrimitive) -> Result<DataValue, String> {
    let mismatch = |v: &DataValue| {
        format!(
            "cannot store {} value {:?} as {}",
            v.kind(),
            v,
            primitive.name()
        )
    };

    match (primitive, value) {
        (_, DataValue::Null) => Ok(DataValue::Null),

        (StoragePrimitive::Text, v @ DataValue::Text(_)) => Ok(v),
        (StoragePrimitive::Text, DataValue::Integer(i)) => Ok(DataValue::Text(i.to_string())),
        (StoragePrimitive::Text, DataValue::Real(f)) => Ok(DataValue::Text(f.to_string())),

        (StoragePrimitive::Integer, v @ DataValue::Integer(_)) => Ok(v),
        (StoragePrimitive::Integer, DataValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(DataValue::Integer)
            .map_err(|_| mismatch(&DataValue::Text(s))),

        // SQLite stores NaN as NULL, and infinities do not survive every client.
        (StoragePrimitive::Real, DataValue::Real(f)) if !f.is_finite() => {
            Err(format!("cannot store non-finite real {f} as {}", primitive.name()))
        }
        (StoragePrimitive::Real, v @ DataValue::Real(_)) => Ok(v),
        (StoragePrimitive::Real, DataValue::Integer(i)) => Ok(DataValue::Real(i as f64)),
        (StoragePrimitive::Real, DataValue::Text(s)) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(DataValue::Real(f)),
            _ => Err(mismatch(&DataValue::Text(s))),
        },

        (StoragePrimitive::Date, v @ DataValue::Date(_)) => Ok(v),
        (StoragePrimitive::Date, DataValue::Text(s)) => {
            NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(DataValue::Date)
                .map_err(|_| mismatch(&DataValue::Text(s)))
        }

        (StoragePrimitive::DateTime, v @ DataValue::DateTime(_)) => Ok(v),
        (StoragePrimitive::DateTime, DataValue::Date(d)) => d
            .and_hms_opt(0, 0, 0)
            .map(DataValue::DateTime)
            .ok_or_else(|| mismatch(&DataValue::Date(d))),
        (StoragePrimitive::DateTime, DataValue::Text(s)) => parse_datetime(s.trim())
            .map(DataValue::DateTime)
            .ok_or_else(|| mismatch(&DataValue::Text(s))),

        (StoragePrimitive::Blob, v @ DataValue::Blob(_)) => Ok(v),

        (_, other) => Err(mismatch(&other)),
    }
}

/// Decode a column value read back from SQLite into the variant of `primitive`.
pub fn decode(value: ValueRef<'_>, primitive: StoragePrimitive) -> Result<DataValue, String> {
    let unexpected = |v: ValueRef<'_>| {
        format!(
            "unexpected stored {:?} for {} column",
            v.data_type(),
            primitive.name()
        )
    };
    let text = |v: ValueRef<'_>| -> Result<String, String> {
        v.as_str().map(str::to_string).map_err(|e| e.to_string())
    };

    match (primitive, value) {
        (_, ValueRef::Null) => Ok(DataValue::Null),
        (StoragePrimitive::Text, v @ ValueRef::Text(_)) => text(v).map(DataValue::Text),
        (StoragePrimitive::Integer, ValueRef::Integer(i)) => Ok(DataValue::Integer(i)),
        (StoragePrimitive::Real, ValueRef::Real(f)) => Ok(DataValue::Real(f)),
        (StoragePrimitive::Real, ValueRef::Integer(i)) => Ok(DataValue::Real(i as f64)),
        (StoragePrimitive::Date, v @ ValueRef::Text(_)) => {
            let s = text(v)?;
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map(DataValue::Date)
                .map_err(|e| format!("invalid stored date '{s}': {e}"))
        }
        (StoragePrimitive::DateTime, v @ ValueRef::Text(_)) => {
            let s = text(v)?;
            parse_datetime(&s)
                .map(DataValue::DateTime)
                .ok_or_else(|| format!("invalid stored datetime '{s}'"))
        }
        (StoragePrimitive::Blob, ValueRef::Blob(b)) => Ok(DataValue::Blob(b.to_vec())),
        (_, v) => Err(unexpected(v)),
    }
}

impl ToSql for DataValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DataValue::Null => ToSqlOutput::Owned(Value::Null),
            DataValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            DataValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            DataValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            DataValue::Date(d) => {
                ToSqlOutput::Owned(Value::Text(d.format(DATE_FORMAT).to_string()))
            }
            DataValue::DateTime(dt) => {
                ToSqlOutput::Owned(Value::Text(dt.format(DATETIME_FORMAT).to_string()))
            }
            DataValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

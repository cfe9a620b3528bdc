//! Search result sequences.
//!
//! Results are produced as single-pass iterators. They are finite and not
//! restartable; to iterate again, run the search again.
//!
//! Keyword searches resolve their UUIDs up front and fetch each row lazily by
//! UUID. Relational-only searches read all matching rows in one scan before
//! the iterator is returned.

use rusqlite::{Connection, OptionalExtension};

use crate::data::{DataValue, Document};
use crate::engine::schema::Schema;
use crate::error::{Result, SearchError};
use crate::store::codec;
use crate::store::table::quote_ident;

/// One primary-table row, with values in schema field order.
pub type Row = Vec<DataValue>;

/// Decode a full primary-table row.
pub(crate) fn decode_row(schema: &Schema, row: &rusqlite::Row<'_>) -> Result<Row> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            codec::decode(row.get_ref(i)?, field.primitive()).map_err(|e| {
                SearchError::execution(format!("cannot decode column '{}': {e}", field.name()))
            })
        })
        .collect()
}

enum Source<'a> {
    /// Rows already read by a relational scan.
    Rows(std::vec::IntoIter<Row>),
    /// UUIDs resolved through the inverted index; each row is fetched on demand.
    PointLookups {
        conn: &'a Connection,
        schema: &'a Schema,
        sql: String,
        uuids: std::vec::IntoIter<String>,
    },
    Empty,
}

/// Rows matching a query.
pub struct SearchResults<'a> {
    source: Source<'a>,
}

impl<'a> SearchResults<'a> {
    pub(crate) fn empty() -> Self {
        Self {
            source: Source::Empty,
        }
    }

    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            source: Source::Rows(rows.into_iter()),
        }
    }

    pub(crate) fn from_uuids(conn: &'a Connection, schema: &'a Schema, uuids: Vec<String>) -> Self {
        let sql = format!(
            "{} WHERE {} = ?1",
            schema.primary_table().select_all_sql(),
            quote_ident(schema.uuid_field().name())
        );
        Self {
            source: Source::PointLookups {
                conn,
                schema,
                sql,
                uuids: uuids.into_iter(),
            },
        }
    }

    /// Number of rows not yet yielded.
    pub fn remaining(&self) -> usize {
        match &self.source {
            Source::Rows(rows) => rows.len(),
            Source::PointLookups { uuids, .. } => uuids.len(),
            Source::Empty => 0,
        }
    }

    fn fetch(conn: &Connection, schema: &Schema, sql: &str, uuid: &str) -> Result<Row> {
        let mut stmt = conn.prepare_cached(sql)?;
        let row = stmt
            .query_row([uuid], |row| Ok(decode_row(schema, row)))
            .optional()?;
        match row {
            Some(decoded) => decoded,
            None => Err(SearchError::execution(format!(
                "indexed document '{uuid}' is missing from table '{}'",
                schema.name()
            ))),
        }
    }
}

impl Iterator for SearchResults<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Rows(rows) => rows.next().map(Ok),
            Source::PointLookups {
                conn,
                schema,
                sql,
                uuids,
            } => {
                let uuid = uuids.next()?;
                Some(Self::fetch(*conn, *schema, sql.as_str(), &uuid))
            }
            Source::Empty => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

/// Documents matching a query, with fields in schema declaration order.
pub struct DocumentResults<'a> {
    schema: &'a Schema,
    rows: SearchResults<'a>,
}

impl<'a> DocumentResults<'a> {
    pub(crate) fn new(schema: &'a Schema, rows: SearchResults<'a>) -> Self {
        Self { schema, rows }
    }
}

impl Iterator for DocumentResults<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.map(|values| {
            self.schema
                .field_names()
                .into_iter()
                .zip(values)
                .collect()
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

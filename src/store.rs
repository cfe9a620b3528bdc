//! SQLite access for the primary table and the inverted index tables.
//!
//! Functions here take a plain `&Connection` so the engine can run them
//! either directly or inside a transaction (a `Transaction` derefs to its
//! connection).

pub mod codec;
pub mod table;

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};
use rusqlite::{Connection, OptionalExtension, params_from_iter};

use crate::data::{DataValue, Document};
use crate::engine::query::Statement;
use crate::engine::schema::{INDEX_KEYWORD_COLUMN, INDEX_UUID_SET_COLUMN, Schema};
use crate::engine::search::{Row, decode_row};
use crate::error::{Result, SearchError};
use crate::store::table::quote_ident;

/// Inverted index of one keyword field: keyword to the set of UUIDs holding it.
pub type InvertedIndex = AHashMap<String, BTreeSet<String>>;

/// Create the primary table and every index table if they do not exist.
pub fn create_tables(conn: &Connection, schema: &Schema) -> Result<()> {
    conn.execute_batch(&schema.primary_table().create_sql())?;
    for layout in schema.index_tables() {
        conn.execute_batch(&layout.create_sql())?;
    }
    Ok(())
}

/// Validate documents and turn them into primary-table rows.
///
/// Values are converted to their field's storage primitive and absent fields
/// become NULL. Nothing is written, so a bad document rejects the whole batch
/// before the store is touched. Fields unknown to the schema are ignored.
pub fn prepare_rows(schema: &Schema, documents: &[Document]) -> Result<Vec<Row>> {
    let uuid_name = schema.uuid_field().name();
    let mut ignored: BTreeSet<&str> = BTreeSet::new();
    let mut rows = Vec::with_capacity(documents.len());

    for (n, doc) in documents.iter().enumerate() {
        let uuid = match doc.get(uuid_name) {
            Some(DataValue::Null) | None => {
                return Err(SearchError::ingestion(format!(
                    "document #{n} has no value for UUID field '{uuid_name}'"
                )));
            }
            Some(DataValue::Text(s)) => s.clone(),
            Some(DataValue::Integer(i)) => i.to_string(),
            Some(other) => {
                return Err(SearchError::ingestion(format!(
                    "document #{n}: UUID field '{uuid_name}' must be text, got {}",
                    other.kind()
                )));
            }
        };
        if codec::contains_delimiter(&uuid) {
            return Err(SearchError::ingestion(format!(
                "document #{n}: UUID {uuid:?} contains the set delimiter '{}'",
                codec::DELIMITER
            )));
        }

        for (name, _) in doc.iter() {
            if !schema.contains(name) {
                ignored.insert(name);
            }
        }

        let mut row = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let value = doc.get(field.name()).cloned().unwrap_or(DataValue::Null);
            if field.is_keyword() && !matches!(value, DataValue::Text(_) | DataValue::Null) {
                return Err(SearchError::ingestion(format!(
                    "document '{uuid}': keyword field '{}' expects '{}'-joined text, got {}",
                    field.name(),
                    codec::DELIMITER,
                    value.kind()
                )));
            }
            let value = codec::coerce(value, field.primitive()).map_err(|e| {
                SearchError::ingestion(format!("document '{uuid}', field '{}': {e}", field.name()))
            })?;
            row.push(value);
        }
        rows.push(row);
    }

    if !ignored.is_empty() {
        log::warn!(
            "ignoring fields not declared in schema '{}': {:?}",
            schema.name(),
            ignored
        );
    }
    Ok(rows)
}

/// Bulk insert rows into the primary table.
pub fn insert_rows(conn: &Connection, schema: &Schema, rows: &[Row]) -> Result<usize> {
    let mut stmt = conn.prepare(&schema.primary_table().insert_sql())?;
    for row in rows {
        stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(rows.len())
}

/// Scan `(uuid, value)` over the whole primary table and build the inverted
/// index of one keyword field.
pub fn build_inverted_index(conn: &Connection, schema: &Schema, field: &str) -> Result<InvertedIndex> {
    let sql = format!(
        "SELECT {}, {} FROM {}",
        quote_ident(schema.uuid_field().name()),
        quote_ident(field),
        quote_ident(schema.name())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;

    let mut index = InvertedIndex::new();
    while let Some(row) = rows.next()? {
        let uuid: String = row.get(0)?;
        let value: Option<String> = row.get(1)?;
        let Some(value) = value else { continue };
        for keyword in codec::split_tokens(&value) {
            index
                .entry(keyword.to_string())
                .or_default()
                .insert(uuid.clone());
        }
    }
    Ok(index)
}

/// Bulk insert an inverted index into the field's index table.
///
/// Rows are written in keyword order. A keyword already present in the table
/// is reported as an ingestion error.
pub fn write_inverted_index(
    conn: &Connection,
    schema: &Schema,
    field: &str,
    index: &InvertedIndex,
) -> Result<usize> {
    let table = schema.index_table_name(field);
    let sql = format!(
        "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
        quote_ident(&table),
        quote_ident(INDEX_KEYWORD_COLUMN),
        quote_ident(INDEX_UUID_SET_COLUMN)
    );
    let mut stmt = conn.prepare(&sql)?;

    let mut keywords: Vec<&String> = index.keys().collect();
    keywords.sort();
    for keyword in keywords {
        let uuid_set = codec::join_tokens(&index[keyword]);
        stmt.execute(rusqlite::params![keyword, uuid_set]).map_err(|e| {
            let err = SearchError::from(e);
            if err.is_constraint_violation() {
                SearchError::ingestion(format!(
                    "keyword {keyword:?} is already indexed in '{table}'; \
                     clear the index tables before ingesting again"
                ))
            } else {
                err
            }
        })?;
    }
    Ok(index.len())
}

pub fn clear_inverted_index(conn: &Connection, schema: &Schema, field: &str) -> Result<usize> {
    let sql = format!("DELETE FROM {}", quote_ident(&schema.index_table_name(field)));
    Ok(conn.execute(&sql, [])?)
}

/// Fetch the decoded UUID set stored for one keyword. An absent keyword
/// yields the empty set.
pub fn lookup_uuid_set(conn: &Connection, statement: &Statement) -> Result<AHashSet<String>> {
    let mut stmt = conn.prepare_cached(&statement.sql)?;
    let encoded: Option<String> = stmt
        .query_row(params_from_iter(statement.params.iter()), |row| row.get(0))
        .optional()?;
    Ok(encoded
        .as_deref()
        .map(|s| codec::split_tokens(s).map(str::to_string).collect())
        .unwrap_or_default())
}

/// Run a UUID-only scan.
pub fn scan_uuids(conn: &Connection, statement: &Statement) -> Result<AHashSet<String>> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let uuids = stmt
        .query_map(params_from_iter(statement.params.iter()), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<AHashSet<String>>>()?;
    Ok(uuids)
}

/// Run a full-row scan and decode every row.
pub fn scan_rows(conn: &Connection, schema: &Schema, statement: &Statement) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(decode_row(schema, row)?);
    }
    Ok(out)
}

/// All keywords of a field's index table, sorted.
pub fn read_keywords(conn: &Connection, schema: &Schema, field: &str) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        quote_ident(INDEX_KEYWORD_COLUMN),
        quote_ident(&schema.index_table_name(field)),
        quote_ident(INDEX_KEYWORD_COLUMN)
    );
    let mut stmt = conn.prepare(&sql)?;
    let keywords = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(keywords)
}

pub fn count_rows(conn: &Connection, schema: &Schema) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(schema.name()));
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::field::{Field, SearchableType};

    fn schema() -> Schema {
        Schema::build(
            "movie",
            [
                Field::builder("movie_id")
                    .searchable(SearchableType::Uuid)
                    .primary_key(true)
                    .build()
                    .unwrap(),
                Field::new("year", [SearchableType::Integer]).unwrap(),
                Field::new("genres", [SearchableType::Keyword]).unwrap(),
            ],
        )
        .unwrap()
    }

    fn doc(id: &str, year: i64, genres: &str) -> Document {
        Document::new()
            .add_field("movie_id", id)
            .add_field("year", year)
            .add_field("genres", genres)
    }

    fn loaded() -> (Connection, Schema) {
        let schema = schema();
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn, &schema).unwrap();
        let rows = prepare_rows(
            &schema,
            &[
                doc("0", 1995, "Drama&Romance"),
                doc("1", 2005, "Action"),
                doc("2", 1999, "Drama"),
            ],
        )
        .unwrap();
        insert_rows(&conn, &schema, &rows).unwrap();
        (conn, schema)
    }

    #[test]
    fn test_prepare_rows_rejects_bad_documents() {
        let schema = schema();
        let missing_uuid = Document::new().add_field("year", 1);
        assert!(matches!(
            prepare_rows(&schema, &[missing_uuid]),
            Err(SearchError::Ingestion(_))
        ));

        let delimited_uuid = doc("a&b", 1, "x");
        assert!(prepare_rows(&schema, &[delimited_uuid]).is_err());

        let bad_year = doc("0", 0, "x").add_field("year", "soon");
        assert!(prepare_rows(&schema, &[bad_year]).is_err());

        let numeric_keywords = doc("0", 0, "x").add_field("genres", 3);
        assert!(prepare_rows(&schema, &[numeric_keywords]).is_err());
    }

    #[test]
    fn test_prepare_rows_fills_nulls_in_schema_order() {
        let schema = schema();
        let rows = prepare_rows(
            &schema,
            &[Document::new()
                .add_field("genres", "Drama")
                .add_field("movie_id", "7")
                .add_field("director", "ignored")],
        )
        .unwrap();
        assert_eq!(
            rows[0],
            vec![
                DataValue::Text("7".into()),
                DataValue::Null,
                DataValue::Text("Drama".into())
            ]
        );
    }

    #[test]
    fn test_inverted_index_is_member_exact() {
        let (conn, schema) = loaded();
        let index = build_inverted_index(&conn, &schema, "genres").unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index["Drama"],
            BTreeSet::from(["0".to_string(), "2".to_string()])
        );
        assert_eq!(index["Action"], BTreeSet::from(["1".to_string()]));
    }

    #[test]
    fn test_write_and_lookup() {
        let (conn, schema) = loaded();
        let index = build_inverted_index(&conn, &schema, "genres").unwrap();
        assert_eq!(write_inverted_index(&conn, &schema, "genres", &index).unwrap(), 3);

        let lookup = |keyword: &str| Statement {
            sql: r#"SELECT "uuid_set" FROM "movie__genres" WHERE "keyword" = ?"#.into(),
            params: vec![DataValue::Text(keyword.into())],
        };
        let drama = lookup_uuid_set(&conn, &lookup("Drama")).unwrap();
        assert_eq!(drama.len(), 2);
        assert!(drama.contains("0") && drama.contains("2"));
        assert!(lookup_uuid_set(&conn, &lookup("Western")).unwrap().is_empty());

        assert_eq!(
            read_keywords(&conn, &schema, "genres").unwrap(),
            vec!["Action", "Drama", "Romance"]
        );
    }

    #[test]
    fn test_rewrite_without_clear_fails() {
        let (conn, schema) = loaded();
        let index = build_inverted_index(&conn, &schema, "genres").unwrap();
        write_inverted_index(&conn, &schema, "genres", &index).unwrap();

        let err = write_inverted_index(&conn, &schema, "genres", &index).unwrap_err();
        assert!(matches!(err, SearchError::Ingestion(_)));

        assert_eq!(clear_inverted_index(&conn, &schema, "genres").unwrap(), 3);
        assert!(write_inverted_index(&conn, &schema, "genres", &index).is_ok());
    }

    #[test]
    fn test_duplicate_uuid_is_storage_error() {
        let (conn, schema) = loaded();
        let rows = prepare_rows(&schema, &[doc("0", 2000, "x")]).unwrap();
        let err = insert_rows(&conn, &schema, &rows).unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(count_rows(&conn, &schema).unwrap(), 3);
    }
}

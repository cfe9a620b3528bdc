pub mod config;
pub mod field;
pub mod query;
pub mod schema;
pub mod search;

use std::path::PathBuf;
use std::time::Instant;

use ahash::AHashSet;
use rusqlite::Connection;

use crate::data::Document;
use crate::error::{Result, SearchError};
use crate::store;

use self::config::{DatabaseLocation, EngineConfig, IndexRebuild};
use self::field::Field;
use self::query::{CompiledQuery, Query};
use self::schema::Schema;
use self::search::{DocumentResults, SearchResults};

/// Outcome of one [`SearchEngine::ingest`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents written to the primary table.
    pub documents: usize,
    /// Distinct keywords written per keyword field, in schema order.
    pub keywords: Vec<(String, usize)>,
}

/// Document search engine over a SQLite primary table and per-field
/// inverted keyword indices.
///
/// The engine owns its connection exclusively. Ingestion takes `&mut self`,
/// so it can never overlap an in-flight search or another ingestion.
pub struct SearchEngine {
    conn: Connection,
    schema: Schema,
    config: EngineConfig,
}

impl SearchEngine {
    /// Open the configured database and create any missing tables.
    pub fn new(config: EngineConfig, schema: Schema) -> Result<Self> {
        config.validate()?;

        let conn = match &config.database {
            DatabaseLocation::File(path) => Connection::open(path)?,
            DatabaseLocation::Memory => Connection::open_in_memory()?,
        };
        if let Some(mode) = &config.journal_mode {
            // journal_mode returns the resulting mode as a row.
            let applied: String =
                conn.query_row(&format!("PRAGMA journal_mode = {mode}"), [], |row| row.get(0))?;
            log::debug!("journal_mode set to {applied}");
        }

        store::create_tables(&conn, &schema)?;

        Ok(Self {
            conn,
            schema,
            config,
        })
    }

    /// Open (or create) a file-backed engine with default settings.
    pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        Self::new(EngineConfig::file(path), schema)
    }

    pub fn in_memory(schema: Schema) -> Result<Self> {
        Self::new(EngineConfig::memory(), schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Primary table name.
    pub fn table_name(&self) -> &str {
        self.schema.name()
    }

    pub fn uuid_field(&self) -> &str {
        self.schema.uuid_field().name()
    }

    pub fn keyword_fields(&self) -> &[String] {
        self.schema.keyword_fields()
    }

    /// Fields that can be targeted by at least one criterion.
    pub fn searchable_fields(&self) -> Vec<&Field> {
        self.schema
            .fields()
            .iter()
            .filter(|f| f.is_searchable())
            .collect()
    }

    /// A new empty query bound to this engine's schema.
    pub fn create_query(&self) -> Query<'_> {
        Query::new(&self.schema)
    }

    /// Number of documents in the primary table.
    pub fn count(&self) -> Result<usize> {
        store::count_rows(&self.conn, &self.schema)
    }

    /// Write a batch of documents and rebuild the inverted indices.
    ///
    /// The batch is validated up front and inserted in one transaction, so a
    /// failing batch leaves no primary rows behind. Each keyword index is then
    /// rebuilt from a full scan of the primary table. With the default
    /// [`IndexRebuild::BuildOnce`] policy, a second call fails as soon as it
    /// reproduces a keyword that is already indexed.
    pub fn ingest(&mut self, documents: &[Document]) -> Result<IngestReport> {
        let started = Instant::now();
        let rows = store::prepare_rows(&self.schema, documents)?;

        let report = if self.config.transactional_ingest {
            let tx = self.conn.transaction()?;
            let written = store::insert_rows(&tx, &self.schema, &rows)?;
            log::info!(
                "inserted {written} documents into '{}'",
                self.schema.name()
            );
            let keywords = Self::rebuild_indices(&tx, &self.schema, self.config.rebuild)?;
            tx.commit()?;
            IngestReport {
                documents: written,
                keywords,
            }
        } else {
            let tx = self.conn.transaction()?;
            let written = store::insert_rows(&tx, &self.schema, &rows)?;
            tx.commit()?;
            log::info!(
                "inserted {written} documents into '{}'",
                self.schema.name()
            );

            // Primary rows are committed; a failure below leaves them unindexed.
            let tx = self.conn.transaction()?;
            let keywords = Self::rebuild_indices(&tx, &self.schema, self.config.rebuild)?;
            tx.commit()?;
            IngestReport {
                documents: written,
                keywords,
            }
        };

        log::info!(
            "ingestion of {} documents finished in {:?}",
            report.documents,
            started.elapsed()
        );
        Ok(report)
    }

    fn rebuild_indices(
        conn: &Connection,
        schema: &Schema,
        rebuild: IndexRebuild,
    ) -> Result<Vec<(String, usize)>> {
        if !schema.keyword_fields().is_empty() {
            log::info!("building inverted indices for {:?}", schema.keyword_fields());
        }

        let mut counts = Vec::with_capacity(schema.keyword_fields().len());
        for field in schema.keyword_fields() {
            if rebuild == IndexRebuild::ClearAndRebuild {
                let cleared = store::clear_inverted_index(conn, schema, field)?;
                log::debug!("cleared {cleared} index rows of '{field}'");
            }
            let index = store::build_inverted_index(conn, schema, field)?;
            let written = store::write_inverted_index(conn, schema, field, &index)?;
            log::debug!("indexed {written} keywords for '{field}'");
            counts.push((field.clone(), written));
        }
        Ok(counts)
    }

    /// Empty every inverted index table. Primary rows are untouched.
    pub fn clear_indices(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for field in self.schema.keyword_fields() {
            store::clear_inverted_index(&tx, &self.schema, field)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Execute a query and return the matching rows.
    ///
    /// The plan depends on which kinds of criteria the query holds:
    ///
    /// - keyword and relational: the UUID sets of every keyword token are
    ///   intersected, then intersected with the UUIDs of the relational scan,
    ///   and each remaining document is fetched lazily by UUID;
    /// - keyword only: as above without the relational scan;
    /// - relational only: one full-row scan of the primary table, read in
    ///   full before the results are returned;
    /// - no criteria: an empty result.
    ///
    /// Keyword plans yield rows in ascending UUID order; relational-only plans
    /// yield them in table scan order.
    pub fn search(&self, query: &Query<'_>) -> Result<SearchResults<'_>> {
        self.check_schema(query)?;
        let compiled = query.compile();

        match (compiled.has_keyword(), compiled.has_relational()) {
            (false, false) => {
                log::debug!("query without criteria matches nothing");
                Ok(SearchResults::empty())
            }
            (false, true) => {
                let rows = store::scan_rows(&self.conn, &self.schema, &compiled.row_scan)?;
                Ok(SearchResults::from_rows(rows))
            }
            (true, with_relational) => {
                let mut uuids = self.keyword_uuids(&compiled)?;
                if with_relational && !uuids.is_empty() {
                    let relational = store::scan_uuids(&self.conn, &compiled.uuid_scan)?;
                    uuids.retain(|uuid| relational.contains(uuid));
                }
                let mut uuids: Vec<String> = uuids.into_iter().collect();
                uuids.sort();
                Ok(SearchResults::from_uuids(&self.conn, &self.schema, uuids))
            }
        }
    }

    /// Execute a query and return the matching documents, with fields in
    /// schema declaration order.
    pub fn search_document(&self, query: &Query<'_>) -> Result<DocumentResults<'_>> {
        let rows = self.search(query)?;
        Ok(DocumentResults::new(&self.schema, rows))
    }

    /// Intersection of the UUID sets of every keyword lookup.
    fn keyword_uuids(&self, compiled: &CompiledQuery) -> Result<AHashSet<String>> {
        let mut lookups = compiled.keyword_lookups.iter();
        let Some(first) = lookups.next() else {
            return Ok(AHashSet::new());
        };

        let mut uuids = store::lookup_uuid_set(&self.conn, &first.statement)?;
        for lookup in lookups {
            if uuids.is_empty() {
                break;
            }
            let other = store::lookup_uuid_set(&self.conn, &lookup.statement)?;
            uuids.retain(|uuid| other.contains(uuid));
        }
        Ok(uuids)
    }

    fn check_schema(&self, query: &Query<'_>) -> Result<()> {
        let theirs = query.schema();
        if std::ptr::eq(theirs, &self.schema)
            || (theirs.name() == self.schema.name()
                && theirs.field_names() == self.schema.field_names())
        {
            Ok(())
        } else {
            Err(SearchError::query(format!(
                "query is bound to schema '{}', engine serves '{}'",
                theirs.name(),
                self.schema.name()
            )))
        }
    }

    /// All distinct keywords indexed for a keyword field, sorted.
    pub fn keywords(&self, field: &str) -> Result<Vec<String>> {
        self.require_keyword_field(field)?;
        store::read_keywords(&self.conn, &self.schema, field)
    }

    /// Indexed keywords of a field containing `pattern` as a substring, sorted.
    pub fn search_keywords(&self, field: &str, pattern: &str) -> Result<Vec<String>> {
        let mut keywords = self.keywords(field)?;
        keywords.retain(|k| k.contains(pattern));
        Ok(keywords)
    }

    fn require_keyword_field(&self, field: &str) -> Result<()> {
        if self.schema.is_keyword_field(field) {
            Ok(())
        } else {
            Err(SearchError::not_found(format!(
                "'{field}' is not a keyword field; keyword fields are {:?}",
                self.schema.keyword_fields()
            )))
        }
    }
}

//! # Docsift
//!
//! A schema-driven document store over SQLite with per-field inverted
//! keyword indices.
//!
//! ## Features
//!
//! - Typed schemas with exactly one UUID field per table
//! - Batch ingestion into a primary table plus one index table per keyword field
//! - Relational criteria (equality, ranges, prefix/suffix/substring matching)
//! - Set-membership criteria over `&`-delimited keyword fields
//! - Single-pass result sequences; keyword searches fetch each document on demand
//!
//! ```
//! use docsift::{Criterion, Document, Field, Schema, SearchEngine, SearchableType};
//!
//! let schema = Schema::build(
//!     "movie",
//!     [
//!         Field::new("movie_id", [SearchableType::Uuid]).unwrap(),
//!         Field::new("title", [SearchableType::Text]).unwrap(),
//!         Field::new("genres", [SearchableType::Keyword]).unwrap(),
//!     ],
//! )
//! .unwrap();
//! let mut engine = SearchEngine::in_memory(schema).unwrap();
//!
//! engine
//!     .ingest(&[Document::new()
//!         .add_field("movie_id", "0")
//!         .add_field("title", "Heat")
//!         .add_field("genres", "Crime&Drama")])
//!     .unwrap();
//!
//! let query = engine
//!     .create_query()
//!     .with(Criterion::contains("genres", ["Drama"]))
//!     .unwrap();
//! let found: Vec<Document> = engine
//!     .search_document(&query)
//!     .unwrap()
//!     .collect::<docsift::Result<_>>()
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! ```

mod data;
pub mod engine;
mod error;
pub mod store;

pub use data::{DataValue, Document};
pub use engine::config::{DatabaseLocation, EngineConfig, IndexRebuild};
pub use engine::field::{Field, FieldBuilder, MatchSemantic, SearchableType, StoragePrimitive};
pub use engine::query::{CompiledQuery, Criterion, CriterionKind, Query};
pub use engine::schema::{Schema, SchemaBuilder};
pub use engine::search::{DocumentResults, Row, SearchResults};
pub use engine::{IngestReport, SearchEngine};
pub use error::{Result, SearchError};
pub use store::codec::DELIMITER;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

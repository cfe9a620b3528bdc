//! Type catalog and schema fields.
//!
//! This module defines:
//! - [`SearchableType`] - the closed set of type tags a field can be searched under
//! - [`StoragePrimitive`] - the column type each tag is bound to
//! - [`MatchSemantic`] - how values of a tag are matched
//! - [`Field`] - one schema column carrying a set of type tags
//!
//! # Consistency
//!
//! A field may carry several type tags (e.g. `UUID` and `TEXT`), but all of
//! them must be bound to the same storage primitive, because the field is a
//! single column:
//!
//! ```
//! use docsift::engine::field::{Field, SearchableType};
//!
//! let id = Field::new("movie_id", [SearchableType::Uuid, SearchableType::Text]);
//! assert!(id.is_ok());
//!
//! let bad = Field::new("bad", [SearchableType::Uuid, SearchableType::Date]);
//! assert!(bad.is_err());
//! ```

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Check that `name` can be used verbatim as a SQLite table or column name.
///
/// Identifiers cannot be bound as statement parameters, so every name that
/// ends up in generated SQL is restricted to this character set.
pub(crate) fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SearchError::schema(format!(
            "{kind} name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}

/// Column type a searchable type is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoragePrimitive {
    Text,
    /// Stored as `YYYY-MM-DD` text.
    Date,
    /// Stored as `YYYY-MM-DD HH:MM:SS.ffffff` text.
    DateTime,
    Integer,
    Real,
    Blob,
}

impl StoragePrimitive {
    /// Declared SQLite column type.
    ///
    /// Dates are declared `TEXT` so that SQLite's type affinity never tries to
    /// reinterpret the ISO strings as numbers.
    pub fn sql_type(&self) -> &'static str {
        match self {
            StoragePrimitive::Text | StoragePrimitive::Date | StoragePrimitive::DateTime => {
                "TEXT"
            }
            StoragePrimitive::Integer => "INTEGER",
            StoragePrimitive::Real => "REAL",
            StoragePrimitive::Blob => "BLOB",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoragePrimitive::Text => "text",
            StoragePrimitive::Date => "date",
            StoragePrimitive::DateTime => "datetime",
            StoragePrimitive::Integer => "integer",
            StoragePrimitive::Real => "real",
            StoragePrimitive::Blob => "blob",
        }
    }
}

/// How values of a searchable type are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchSemantic {
    /// Exact string equality.
    Exact,
    /// Substring / prefix / suffix matching.
    Fuzzy,
    /// Membership of a token in a set, answered by an inverted index.
    SetMembership,
    /// Ordered comparison (equality, bounds, ranges).
    Ordered,
    /// Stored only.
    Unsearchable,
}

/// The closed set of searchable type tags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SearchableType {
    /// Document identity. Exactly one field per schema carries it.
    Uuid,
    Id,
    Text,
    /// Multi-valued: a set of tokens joined by `&`.
    Keyword,
    Date,
    DateTime,
    Integer,
    Real,
    UnsearchableObject,
}

impl SearchableType {
    pub const ALL: [SearchableType; 9] = [
        SearchableType::Uuid,
        SearchableType::Id,
        SearchableType::Text,
        SearchableType::Keyword,
        SearchableType::Date,
        SearchableType::DateTime,
        SearchableType::Integer,
        SearchableType::Real,
        SearchableType::UnsearchableObject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SearchableType::Uuid => "UUID",
            SearchableType::Id => "ID",
            SearchableType::Text => "TEXT",
            SearchableType::Keyword => "KEYWORD",
            SearchableType::Date => "DATE",
            SearchableType::DateTime => "DATETIME",
            SearchableType::Integer => "INTEGER",
            SearchableType::Real => "REAL",
            SearchableType::UnsearchableObject => "UNSEARCHABLE_OBJECT",
        }
    }

    pub fn primitive(&self) -> StoragePrimitive {
        match self {
            SearchableType::Uuid
            | SearchableType::Id
            | SearchableType::Text
            | SearchableType::Keyword => StoragePrimitive::Text,
            SearchableType::Date => StoragePrimitive::Date,
            SearchableType::DateTime => StoragePrimitive::DateTime,
            SearchableType::Integer => StoragePrimitive::Integer,
            SearchableType::Real => StoragePrimitive::Real,
            SearchableType::UnsearchableObject => StoragePrimitive::Blob,
        }
    }

    pub fn semantic(&self) -> MatchSemantic {
        match self {
            SearchableType::Uuid | SearchableType::Id => MatchSemantic::Exact,
            SearchableType::Text => MatchSemantic::Fuzzy,
            SearchableType::Keyword => MatchSemantic::SetMembership,
            SearchableType::Date
            | SearchableType::DateTime
            | SearchableType::Integer
            | SearchableType::Real => MatchSemantic::Ordered,
            SearchableType::UnsearchableObject => MatchSemantic::Unsearchable,
        }
    }
}

impl fmt::Display for SearchableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One schema column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    name: String,
    /// Sorted and deduplicated.
    types: Vec<SearchableType>,
    primitive: StoragePrimitive,
    primary_key: bool,
    nullable: bool,
}

impl Field {
    /// Create a nullable, non-primary-key field.
    pub fn new(
        name: impl Into<String>,
        types: impl IntoIterator<Item = SearchableType>,
    ) -> Result<Self> {
        Self::builder(name).types(types).build()
    }

    pub fn builder(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder {
            name: name.into(),
            types: Vec::new(),
            primary_key: false,
            nullable: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[SearchableType] {
        &self.types
    }

    pub fn has_type(&self, ty: SearchableType) -> bool {
        self.types.contains(&ty)
    }

    pub fn primitive(&self) -> StoragePrimitive {
        self.primitive
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_uuid(&self) -> bool {
        self.has_type(SearchableType::Uuid)
    }

    pub fn is_keyword(&self) -> bool {
        self.has_type(SearchableType::Keyword)
    }

    /// True if at least one tag allows the field to be searched.
    pub fn is_searchable(&self) -> bool {
        self.types
            .iter()
            .any(|t| t.semantic() != MatchSemantic::Unsearchable)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.types.iter().map(|t| t.name()).collect();
        write!(
            f,
            "Field({}, [{}], primary_key={}, nullable={})",
            self.name,
            tags.join(", "),
            self.primary_key,
            self.nullable
        )
    }
}

pub struct FieldBuilder {
    name: String,
    types: Vec<SearchableType>,
    primary_key: bool,
    nullable: bool,
}

impl FieldBuilder {
    pub fn searchable(mut self, ty: SearchableType) -> Self {
        self.types.push(ty);
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = SearchableType>) -> Self {
        self.types.extend(types);
        self
    }

    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Validate the tags and build the field.
    ///
    /// Fails if the name is not a plain identifier, if no tag was given, or if
    /// the tags are bound to different storage primitives.
    pub fn build(self) -> Result<Field> {
        validate_identifier("field", &self.name)?;

        let mut types = self.types;
        types.sort();
        types.dedup();

        let Some(first) = types.first() else {
            return Err(SearchError::schema(format!(
                "field '{}' has no searchable type",
                self.name
            )));
        };
        let primitive = first.primitive();

        if types.iter().any(|t| t.primitive() != primitive) {
            let described: Vec<String> = types
                .iter()
                .map(|t| format!("{} ({})", t.name(), t.primitive().name()))
                .collect();
            return Err(SearchError::schema(format!(
                "field '{}' has type tags with different storage primitives: {}",
                self.name,
                described.join(", ")
            )));
        }

        Ok(Field {
            name: self.name,
            types,
            primitive,
            primary_key: self.primary_key,
            nullable: self.nullable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_bindings() {
        assert_eq!(SearchableType::Keyword.primitive(), StoragePrimitive::Text);
        assert_eq!(
            SearchableType::Keyword.semantic(),
            MatchSemantic::SetMembership
        );
        assert_eq!(SearchableType::Date.primitive(), StoragePrimitive::Date);
        assert_eq!(SearchableType::Real.semantic(), MatchSemantic::Ordered);
        assert_eq!(SearchableType::Text.semantic(), MatchSemantic::Fuzzy);
        assert_eq!(
            SearchableType::UnsearchableObject.primitive(),
            StoragePrimitive::Blob
        );
    }

    #[test]
    fn test_compatible_tags() {
        let field = Field::new(
            "movie_id",
            [SearchableType::Text, SearchableType::Uuid, SearchableType::Text],
        )
        .unwrap();
        assert_eq!(field.types(), &[SearchableType::Uuid, SearchableType::Text]);
        assert_eq!(field.primitive(), StoragePrimitive::Text);
        assert!(field.is_uuid());
        assert!(!field.is_keyword());
    }

    #[test]
    fn test_conflicting_tags_rejected() {
        let err = Field::new("when", [SearchableType::Date, SearchableType::DateTime])
            .unwrap_err();
        match err {
            SearchError::SchemaDefinition(msg) => {
                assert!(msg.contains("DATE"));
                assert!(msg.contains("DATETIME"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(Field::new("n", [SearchableType::Integer, SearchableType::Real]).is_err());
    }

    #[test]
    fn test_empty_tags_rejected() {
        assert!(Field::new("nothing", []).is_err());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(Field::new("release_date", [SearchableType::Date]).is_ok());
        assert!(Field::new("1st", [SearchableType::Text]).is_err());
        assert!(Field::new("title; DROP TABLE x", [SearchableType::Text]).is_err());
        assert!(Field::new("", [SearchableType::Text]).is_err());
    }

    #[test]
    fn test_builder_flags_and_display() {
        let field = Field::builder("movie_id")
            .searchable(SearchableType::Uuid)
            .primary_key(true)
            .nullable(false)
            .build()
            .unwrap();
        assert!(field.is_primary_key());
        assert!(!field.is_nullable());
        assert_eq!(
            field.to_string(),
            "Field(movie_id, [UUID], primary_key=true, nullable=false)"
        );
    }

    #[test]
    fn test_unsearchable() {
        let blob = Field::new("poster", [SearchableType::UnsearchableObject]).unwrap();
        assert!(!blob.is_searchable());
        assert!(Field::new("title", [SearchableType::Text]).unwrap().is_searchable());
    }
}

use ahash::AHashMap;

use crate::engine::field::{Field, StoragePrimitive, validate_identifier};
use crate::error::{Result, SearchError};
use crate::store::table::{ColumnDef, TableLayout};

/// Column names of every inverted index table.
pub const INDEX_KEYWORD_COLUMN: &str = "keyword";
pub const INDEX_UUID_SET_COLUMN: &str = "uuid_set";

/// Document schema bound to a search engine.
///
/// Declares the fields of the primary table in order, and derives the UUID
/// field, the keyword fields and the table layouts from them. A schema is
/// validated once at construction and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    positions: AHashMap<String, usize>,
    uuid: usize,
    keyword_fields: Vec<String>,
}

impl Schema {
    /// Validate `fields` and build a schema named `name`.
    ///
    /// Fails if the name is not a plain identifier, if two fields share a
    /// name, or if the number of UUID-tagged fields is not exactly one.
    pub fn build(name: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        let name = name.into();
        validate_identifier("schema", &name)?;

        let fields: Vec<Field> = fields.into_iter().collect();
        let mut positions = AHashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if positions.insert(field.name().to_string(), i).is_some() {
                return Err(SearchError::schema(format!(
                    "schema '{name}' declares field '{}' more than once",
                    field.name()
                )));
            }
        }

        let uuid_fields: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_uuid())
            .map(|(i, _)| i)
            .collect();
        let uuid = match uuid_fields.as_slice() {
            [only] => *only,
            [] => {
                return Err(SearchError::schema(format!(
                    "schema '{name}' has no UUID field; exactly one is required"
                )));
            }
            many => {
                let names: Vec<&str> = many.iter().map(|&i| fields[i].name()).collect();
                return Err(SearchError::schema(format!(
                    "schema '{name}' has {} UUID fields ({}); exactly one is required",
                    many.len(),
                    names.join(", ")
                )));
            }
        };

        let keyword_fields = fields
            .iter()
            .filter(|f| f.is_keyword())
            .map(|f| f.name().to_string())
            .collect();

        Ok(Self {
            name,
            fields,
            positions,
            uuid,
            keyword_fields,
        })
    }

    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Schema name; also the primary table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.positions.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn uuid_field(&self) -> &Field {
        &self.fields[self.uuid]
    }

    /// Names of the keyword fields in declaration order.
    pub fn keyword_fields(&self) -> &[String] {
        &self.keyword_fields
    }

    pub fn is_keyword_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(Field::is_keyword)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    /// Primary table: one column per field, typed by its storage primitive.
    ///
    /// The UUID column is always `NOT NULL UNIQUE`, whether or not it is
    /// declared as the primary key.
    pub fn primary_table(&self) -> TableLayout {
        TableLayout {
            name: self.name.clone(),
            columns: self
                .fields
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let is_uuid = i == self.uuid;
                    ColumnDef {
                        name: f.name().to_string(),
                        primitive: f.primitive(),
                        primary_key: f.is_primary_key(),
                        nullable: f.is_nullable() && !is_uuid,
                        unique: is_uuid,
                    }
                })
                .collect(),
        }
    }

    /// Name of the inverted index table of a keyword field.
    pub fn index_table_name(&self, field: &str) -> String {
        format!("{}__{}", self.name, field)
    }

    /// Inverted index table of a keyword field, or `None` for other fields.
    pub fn index_table(&self, field: &str) -> Option<TableLayout> {
        if !self.is_keyword_field(field) {
            return None;
        }
        Some(TableLayout {
            name: self.index_table_name(field),
            columns: vec![
                ColumnDef {
                    name: INDEX_KEYWORD_COLUMN.to_string(),
                    primitive: StoragePrimitive::Text,
                    primary_key: false,
                    nullable: false,
                    unique: true,
                },
                ColumnDef {
                    name: INDEX_UUID_SET_COLUMN.to_string(),
                    primitive: StoragePrimitive::Text,
                    primary_key: false,
                    nullable: false,
                    unique: false,
                },
            ],
        })
    }

    /// All index tables, in keyword field order.
    pub fn index_tables(&self) -> Vec<TableLayout> {
        self.keyword_fields
            .iter()
            .filter_map(|f| self.index_table(f))
            .collect()
    }
}

pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<Schema> {
        Schema::build(self.name, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::field::SearchableType;

    fn movie_schema() -> Schema {
        Schema::builder("movie")
            .add_field(
                Field::builder("movie_id")
                    .searchable(SearchableType::Uuid)
                    .primary_key(true)
                    .build()
                    .unwrap(),
            )
            .add_field(Field::new("title", [SearchableType::Text]).unwrap())
            .add_field(Field::new("year", [SearchableType::Integer]).unwrap())
            .add_field(Field::new("genres", [SearchableType::Keyword]).unwrap())
            .add_field(Field::new("tags", [SearchableType::Keyword, SearchableType::Text]).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_derived_metadata() {
        let schema = movie_schema();
        assert_eq!(schema.name(), "movie");
        assert_eq!(schema.uuid_field().name(), "movie_id");
        assert_eq!(schema.keyword_fields(), &["genres", "tags"]);
        assert_eq!(schema.field("year").map(Field::primitive), Some(StoragePrimitive::Integer));
        assert!(schema.contains("title"));
        assert!(!schema.contains("rating"));
        assert!(schema.is_keyword_field("genres"));
        assert!(!schema.is_keyword_field("title"));
    }

    #[test]
    fn test_primary_layout() {
        let layout = movie_schema().primary_table();
        assert_eq!(layout.name, "movie");
        assert_eq!(
            layout.column_names(),
            vec!["movie_id", "title", "year", "genres", "tags"]
        );
        assert!(layout.columns[0].primary_key);
        assert!(layout.columns[0].unique);
        assert!(!layout.columns[0].nullable);
        assert!(!layout.columns[1].unique);
        assert_eq!(layout.columns[2].primitive, StoragePrimitive::Integer);
    }

    #[test]
    fn test_index_layouts() {
        let schema = movie_schema();
        let index = schema.index_table("genres").unwrap();
        assert_eq!(index.name, "movie__genres");
        assert_eq!(index.column_names(), vec!["keyword", "uuid_set"]);
        assert!(index.columns[0].unique);
        assert!(schema.index_table("title").is_none());
        assert_eq!(schema.index_tables().len(), 2);
    }

    #[test]
    fn test_no_uuid_field() {
        let err = Schema::build(
            "movie",
            [Field::new("title", [SearchableType::Text]).unwrap()],
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::SchemaDefinition(_)));
    }

    #[test]
    fn test_two_uuid_fields() {
        let err = Schema::build(
            "movie",
            [
                Field::new("a", [SearchableType::Uuid]).unwrap(),
                Field::new("b", [SearchableType::Uuid, SearchableType::Text]).unwrap(),
            ],
        )
        .unwrap_err();
        match err {
            SearchError::SchemaDefinition(msg) => assert!(msg.contains("a, b")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_field_names() {
        let result = Schema::build(
            "movie",
            [
                Field::new("id", [SearchableType::Uuid]).unwrap(),
                Field::new("id", [SearchableType::Text]).unwrap(),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_schema_name() {
        let result = Schema::build(
            "movie table",
            [Field::new("id", [SearchableType::Uuid]).unwrap()],
        );
        assert!(matches!(result, Err(SearchError::SchemaDefinition(_))));
    }
}

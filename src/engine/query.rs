//! Search criteria and their compilation into SQL.
//!
//! A [`Query`] accumulates [`Criterion`] values against a bound [`Schema`].
//! Criteria are AND-combined. Compilation splits them into two groups:
//!
//! - **relational** criteria become predicates on the primary table;
//! - **keyword** criteria (`Contains`) become one lookup per token against
//!   the field's inverted index table.
//!
//! Every operand is bound as a statement parameter; generated SQL text only
//! ever contains validated identifiers and placeholders.
//!
//! # Examples
//!
//! ```
//! use docsift::engine::field::{Field, SearchableType};
//! use docsift::engine::query::{Criterion, Query};
//! use docsift::engine::schema::Schema;
//!
//! let schema = Schema::build(
//!     "movie",
//!     [
//!         Field::new("movie_id", [SearchableType::Uuid]).unwrap(),
//!         Field::new("year", [SearchableType::Integer]).unwrap(),
//!         Field::new("genres", [SearchableType::Keyword]).unwrap(),
//!     ],
//! )
//! .unwrap();
//!
//! let mut query = Query::new(&schema);
//! query.add(Criterion::between("year", 1993, 2000)).unwrap();
//! query.add(Criterion::contains("genres", ["Drama"])).unwrap();
//!
//! let compiled = query.compile();
//! assert!(compiled.has_relational());
//! assert_eq!(compiled.keyword_lookups.len(), 1);
//! ```

use std::fmt;

use crate::data::DataValue;
use crate::engine::field::{Field, StoragePrimitive};
use crate::engine::schema::{INDEX_KEYWORD_COLUMN, INDEX_UUID_SET_COLUMN, Schema};
use crate::error::{Result, SearchError};
use crate::store::codec;
use crate::store::table::quote_ident;

/// The supported criterion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriterionKind {
    Equal,
    Greater,
    Smaller,
    Between,
    StartsWith,
    EndsWith,
    Like,
    Contains,
}

impl CriterionKind {
    pub const ALL: [CriterionKind; 8] = [
        CriterionKind::Equal,
        CriterionKind::Greater,
        CriterionKind::Smaller,
        CriterionKind::Between,
        CriterionKind::StartsWith,
        CriterionKind::EndsWith,
        CriterionKind::Like,
        CriterionKind::Contains,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CriterionKind::Equal => "Equal",
            CriterionKind::Greater => "Greater",
            CriterionKind::Smaller => "Smaller",
            CriterionKind::Between => "Between",
            CriterionKind::StartsWith => "StartsWith",
            CriterionKind::EndsWith => "EndsWith",
            CriterionKind::Like => "Like",
            CriterionKind::Contains => "Contains",
        }
    }

    /// True for kinds answered by the inverted index rather than the primary table.
    pub fn is_keyword(&self) -> bool {
        matches!(self, CriterionKind::Contains)
    }
}

impl fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A predicate over one field.
///
/// Bounds are inclusive: `Greater` means `>=`, `Smaller` means `<=`, and
/// `Between` includes both ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Equal {
        field: String,
        value: DataValue,
    },
    Greater {
        field: String,
        lower: DataValue,
    },
    Smaller {
        field: String,
        upper: DataValue,
    },
    Between {
        field: String,
        lower: DataValue,
        upper: DataValue,
    },
    StartsWith {
        field: String,
        prefix: String,
    },
    EndsWith {
        field: String,
        suffix: String,
    },
    Like {
        field: String,
        piece: String,
    },
    /// Every token must be a member of the field's keyword set.
    Contains {
        field: String,
        tokens: Vec<String>,
    },
}

impl Criterion {
    pub fn equal(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Criterion::Equal {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn greater(field: impl Into<String>, lower: impl Into<DataValue>) -> Self {
        Criterion::Greater {
            field: field.into(),
            lower: lower.into(),
        }
    }

    pub fn smaller(field: impl Into<String>, upper: impl Into<DataValue>) -> Self {
        Criterion::Smaller {
            field: field.into(),
            upper: upper.into(),
        }
    }

    pub fn between(
        field: impl Into<String>,
        lower: impl Into<DataValue>,
        upper: impl Into<DataValue>,
    ) -> Self {
        Criterion::Between {
            field: field.into(),
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Criterion::StartsWith {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Criterion::EndsWith {
            field: field.into(),
            suffix: suffix.into(),
        }
    }

    pub fn like(field: impl Into<String>, piece: impl Into<String>) -> Self {
        Criterion::Like {
            field: field.into(),
            piece: piece.into(),
        }
    }

    pub fn contains<I, S>(field: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Criterion::Contains {
            field: field.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Target field name.
    pub fn field(&self) -> &str {
        match self {
            Criterion::Equal { field, .. }
            | Criterion::Greater { field, .. }
            | Criterion::Smaller { field, .. }
            | Criterion::Between { field, .. }
            | Criterion::StartsWith { field, .. }
            | Criterion::EndsWith { field, .. }
            | Criterion::Like { field, .. }
            | Criterion::Contains { field, .. } => field,
        }
    }

    pub fn kind(&self) -> CriterionKind {
        match self {
            Criterion::Equal { .. } => CriterionKind::Equal,
            Criterion::Greater { .. } => CriterionKind::Greater,
            Criterion::Smaller { .. } => CriterionKind::Smaller,
            Criterion::Between { .. } => CriterionKind::Between,
            Criterion::StartsWith { .. } => CriterionKind::StartsWith,
            Criterion::EndsWith { .. } => CriterionKind::EndsWith,
            Criterion::Like { .. } => CriterionKind::Like,
            Criterion::Contains { .. } => CriterionKind::Contains,
        }
    }

    pub fn is_keyword(&self) -> bool {
        self.kind().is_keyword()
    }

    /// Compile a relational criterion into a primary-table predicate.
    ///
    /// Returns `None` for keyword criteria.
    pub fn to_predicate(&self) -> Option<Predicate> {
        let column = quote_ident(self.field());
        let predicate = match self {
            Criterion::Equal { value, .. } => Predicate {
                sql: format!("{column} = ?"),
                params: vec![value.clone()],
            },
            Criterion::Greater { lower, .. } => Predicate {
                sql: format!("{column} >= ?"),
                params: vec![lower.clone()],
            },
            Criterion::Smaller { upper, .. } => Predicate {
                sql: format!("{column} <= ?"),
                params: vec![upper.clone()],
            },
            Criterion::Between { lower, upper, .. } => Predicate {
                sql: format!("{column} BETWEEN ? AND ?"),
                params: vec![lower.clone(), upper.clone()],
            },
            Criterion::StartsWith { prefix, .. } => {
                Predicate::like(&column, format!("{}%", escape_like(prefix)))
            }
            Criterion::EndsWith { suffix, .. } => {
                Predicate::like(&column, format!("%{}", escape_like(suffix)))
            }
            Criterion::Like { piece, .. } => {
                Predicate::like(&column, format!("%{}%", escape_like(piece)))
            }
            Criterion::Contains { .. } => return None,
        };
        Some(predicate)
    }

    /// Check this criterion against `field` and bring its operands to the
    /// field's storage primitive.
    fn bind_to(self, field: &Field) -> Result<Criterion> {
        if !field.is_searchable() {
            return Err(SearchError::query(format!(
                "field '{}' is not searchable",
                field.name()
            )));
        }

        let primitive = field.primitive();
        let operand = |value: DataValue| -> Result<DataValue> {
            if value.is_null() {
                return Err(SearchError::query(format!(
                    "criterion on '{}' compares against null",
                    field.name()
                )));
            }
            codec::coerce(value, primitive)
                .map_err(|e| SearchError::query(format!("field '{}': {e}", field.name())))
        };
        // SQLite orders INTEGER and REAL values numerically against each other,
        // so a fractional bound on an integer field is kept as is.
        let bound = |value: DataValue| -> Result<DataValue> {
            match value {
                DataValue::Real(f) if primitive == StoragePrimitive::Integer && f.is_finite() => {
                    Ok(DataValue::Real(f))
                }
                other => operand(other),
            }
        };

        Ok(match self {
            Criterion::Equal { field: f, value } => Criterion::Equal {
                field: f,
                value: operand(value)?,
            },
            Criterion::Greater { field: f, lower } => Criterion::Greater {
                field: f,
                lower: bound(lower)?,
            },
            Criterion::Smaller { field: f, upper } => Criterion::Smaller {
                field: f,
                upper: bound(upper)?,
            },
            Criterion::Between {
                field: f,
                lower,
                upper,
            } => Criterion::Between {
                field: f,
                lower: bound(lower)?,
                upper: bound(upper)?,
            },
            Criterion::StartsWith { .. } | Criterion::EndsWith { .. } | Criterion::Like { .. } => {
                if primitive == StoragePrimitive::Blob {
                    return Err(SearchError::query(format!(
                        "{} cannot be applied to blob field '{}'",
                        self.kind(),
                        field.name()
                    )));
                }
                self
            }
            Criterion::Contains { field: f, tokens } => {
                if !field.is_keyword() {
                    return Err(SearchError::query(format!(
                        "Contains requires a KEYWORD field; '{f}' is not one"
                    )));
                }
                if tokens.is_empty() {
                    return Err(SearchError::query(format!(
                        "Contains on '{f}' needs at least one token"
                    )));
                }
                let mut unique: Vec<String> = Vec::with_capacity(tokens.len());
                for token in tokens {
                    if token.is_empty() || codec::contains_delimiter(&token) {
                        return Err(SearchError::query(format!(
                            "keyword token {token:?} for '{f}' must be non-empty and must not contain '{}'",
                            codec::DELIMITER
                        )));
                    }
                    if !unique.contains(&token) {
                        unique.push(token);
                    }
                }
                Criterion::Contains {
                    field: f,
                    tokens: unique,
                }
            }
        })
    }
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `\` as escape character.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A SQL fragment plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<DataValue>,
}

impl Predicate {
    fn like(column: &str, pattern: String) -> Self {
        Predicate {
            sql: format!("{column} LIKE ? ESCAPE '\\'"),
            params: vec![DataValue::Text(pattern)],
        }
    }
}

/// A complete statement ready to be prepared and executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DataValue>,
}

/// Lookup of one token's UUID set in a keyword field's index table.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordLookup {
    pub field: String,
    pub keyword: String,
    pub statement: Statement,
}

/// Output of [`Query::compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Primary-table scan returning only UUIDs under the relational predicates.
    pub uuid_scan: Statement,
    /// Primary-table scan returning full rows under the relational predicates.
    pub row_scan: Statement,
    /// One lookup per (keyword criterion, token), in criterion order.
    pub keyword_lookups: Vec<KeywordLookup>,
    relational_count: usize,
}

impl CompiledQuery {
    pub fn has_relational(&self) -> bool {
        self.relational_count > 0
    }

    pub fn has_keyword(&self) -> bool {
        !self.keyword_lookups.is_empty()
    }
}

/// An AND-combination of criteria bound to a schema.
///
/// A query is built per search request and consumed by the engine; it is
/// never shared between requests.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    schema: &'a Schema,
    criteria: Vec<Criterion>,
}

impl<'a> Query<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            criteria: Vec::new(),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Add a criterion.
    ///
    /// Fails if the target field is not part of the schema, if the criterion
    /// kind does not apply to the field, or if an operand cannot be converted
    /// to the field's storage primitive.
    pub fn add(&mut self, criterion: Criterion) -> Result<&mut Self> {
        let Some(field) = self.schema.field(criterion.field()) else {
            return Err(SearchError::query(format!(
                "criterion has to be applied to one of the schema fields; got '{}', valid fields are [{}]",
                criterion.field(),
                self.schema.field_names().join(", ")
            )));
        };
        let bound = criterion.bind_to(field)?;
        self.criteria.push(bound);
        Ok(self)
    }

    /// Builder-style variant of [`Query::add`].
    pub fn with(mut self, criterion: Criterion) -> Result<Self> {
        self.add(criterion)?;
        Ok(self)
    }

    /// Split the criteria into (relational, keyword), each in insertion order.
    pub fn partition(&self) -> (Vec<&Criterion>, Vec<&Criterion>) {
        self.criteria.iter().partition(|c| !c.is_keyword())
    }

    /// Compile into the relational scans and keyword lookups.
    pub fn compile(&self) -> CompiledQuery {
        let (relational, keyword) = self.partition();

        let predicates: Vec<Predicate> = relational
            .iter()
            .filter_map(|c| c.to_predicate())
            .collect();
        let where_clause = if predicates.is_empty() {
            String::new()
        } else {
            let parts: Vec<&str> = predicates.iter().map(|p| p.sql.as_str()).collect();
            format!(" WHERE {}", parts.join(" AND "))
        };
        let params: Vec<DataValue> = predicates
            .iter()
            .flat_map(|p| p.params.iter().cloned())
            .collect();

        let uuid_scan = Statement {
            sql: format!(
                "SELECT {} FROM {}{where_clause}",
                quote_ident(self.schema.uuid_field().name()),
                quote_ident(self.schema.name())
            ),
            params: params.clone(),
        };
        let row_scan = Statement {
            sql: format!("{}{where_clause}", self.schema.primary_table().select_all_sql()),
            params,
        };

        let mut keyword_lookups = Vec::new();
        for criterion in keyword {
            if let Criterion::Contains { field, tokens } = criterion {
                let sql = format!(
                    "SELECT {} FROM {} WHERE {} = ?",
                    quote_ident(INDEX_UUID_SET_COLUMN),
                    quote_ident(&self.schema.index_table_name(field)),
                    quote_ident(INDEX_KEYWORD_COLUMN)
                );
                for token in tokens {
                    keyword_lookups.push(KeywordLookup {
                        field: field.clone(),
                        keyword: token.clone(),
                        statement: Statement {
                            sql: sql.clone(),
                            params: vec![DataValue::Text(token.clone())],
                        },
                    });
                }
            }
        }

        log::trace!("compiled uuid scan: {}", uuid_scan.sql);
        log::trace!("compiled {} keyword lookups", keyword_lookups.len());

        CompiledQuery {
            uuid_scan,
            row_scan,
            keyword_lookups,
            relational_count: predicates.len(),
        }
    }
}

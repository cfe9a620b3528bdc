//! Table layouts and the SQL text generated from them.
//!
//! Only identifiers that passed schema validation ever reach these builders;
//! values are always bound as parameters.

use serde::Serialize;

use crate::engine::field::StoragePrimitive;

/// Quote an identifier for inclusion in SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub primitive: StoragePrimitive,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
}

impl ColumnDef {
    fn ddl(&self) -> String {
        let mut out = format!("{} {}", quote_ident(&self.name), self.primitive.sql_type());
        if self.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            out.push_str(" UNIQUE");
        }
        out
    }
}

/// The shape of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLayout {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableLayout {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(ColumnDef::ddl).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.name),
            columns.join(", ")
        )
    }

    pub fn insert_sql(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.name),
            names.join(", "),
            placeholders.join(", ")
        )
    }

    pub fn select_all_sql(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        format!("SELECT {} FROM {}", names.join(", "), quote_ident(&self.name))
    }
}

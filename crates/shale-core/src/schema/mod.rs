//! Table schemas, constraints, and the system catalog.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{validate_and_convert, ColumnType, TypeError, Value};

/// A stored row: column name (canonical case) to value, in schema order.
pub type Row = IndexMap<String, Value>;

/// A schema-level error: catalog and table-definition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A table with this name is already registered.
    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    /// The named table is not in the catalog.
    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    /// The named column is not part of the table.
    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownColumn {
        /// Table that was probed.
        table: String,
        /// Missing column name.
        column: String,
    },

    /// A column with this name is already part of the table.
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    /// The table already declares a primary key.
    #[error("table '{0}' already has a primary key")]
    DuplicatePrimaryKey(String),
}

/// A row-validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    /// A NOT NULL column received no value.
    #[error("column '{0}' cannot be NULL")]
    NotNull(String),

    /// A value failed type validation.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// A column definition within a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name in its declared case.
    pub name: String,
    /// Declared type.
    pub col_type: ColumnType,
    /// PRIMARY KEY constraint.
    #[serde(default)]
    pub primary_key: bool,
    /// UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// NOT NULL constraint.
    #[serde(default)]
    pub not_null: bool,
    /// Default value used when an insert omits the column.
    #[serde(default)]
    pub default: Option<Value>,
}

impl Column {
    /// Creates an unconstrained column.
    #[must_use]
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            primary_key: false,
            unique: false,
            not_null: false,
            default: None,
        }
    }
}

/// The schema of a single table: named, ordered columns plus constraint
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name in its declared case.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Name of the primary-key column, if one is declared.
    pub primary_key: Option<String>,
    /// Names of all UNIQUE columns (the primary key included).
    pub unique_columns: BTreeSet<String>,
}

impl TableSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            unique_columns: BTreeSet::new(),
        }
    }

    /// Appends a column.
    ///
    /// A primary-key column is implicitly NOT NULL and UNIQUE.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] on a duplicate column name or a second
    /// primary key.
    pub fn add_column(&mut self, mut column: Column) -> Result<(), SchemaError> {
        if self.column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn(column.name));
        }
        if column.primary_key {
            if self.primary_key.is_some() {
                return Err(SchemaError::DuplicatePrimaryKey(self.name.clone()));
            }
            column.not_null = true;
            column.unique = true;
            self.primary_key = Some(column.name.clone());
        }
        if column.unique {
            self.unique_columns.insert(column.name.clone());
        }
        self.columns.push(column);
        Ok(())
    }

    /// Looks up a column by name (case-insensitive).
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Validates a row against the schema.
    ///
    /// Column matching is case-insensitive; missing values take the column
    /// default (NOT NULL violations are rejected), and every value is
    /// coerced to its declared type. The returned row carries every schema
    /// column, in declaration order, under its canonical name. Keys that do
    /// not match any column are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`RowError`] on a NOT NULL violation or a failed type
    /// coercion.
    pub fn validate_row(&self, row: &Row) -> Result<Row, RowError> {
        let mut validated = Row::with_capacity(self.columns.len());

        for col in &self.columns {
            let supplied = row
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&col.name))
                .map(|(_, value)| value.clone())
                .filter(|value| !value.is_null());

            let value = match supplied {
                Some(value) => {
                    validate_and_convert(value, &col.col_type)
                        .map_err(|e| e.for_column(&col.name))?
                }
                None => match &col.default {
                    Some(default) if !default.is_null() => {
                        validate_and_convert(default.clone(), &col.col_type)
                            .map_err(|e| e.for_column(&col.name))?
                    }
                    _ if col.not_null => return Err(RowError::NotNull(col.name.clone())),
                    _ => Value::Null,
                },
            };

            validated.insert(col.name.clone(), value);
        }

        Ok(validated)
    }
}

/// The system catalog: the single source of truth for which tables exist.
///
/// Keys are lowercase table names; schemas keep the declared case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Lowercase table name to schema.
    pub tables: BTreeMap<String, TableSchema>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new table schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateTable`] when the name is taken.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<(), SchemaError> {
        let key = schema.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(SchemaError::DuplicateTable(schema.name));
        }
        self.tables.insert(key, schema);
        Ok(())
    }

    /// Removes a table schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTable`] when the table is missing.
    pub fn drop_table(&mut self, name: &str) -> Result<(), SchemaError> {
        self.tables
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    /// Looks up a table schema by name (case-insensitive).
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_lowercase())
    }

    /// Returns true if the table exists.
    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    /// Lists all table names (lowercase, sorted).
    #[must_use]
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

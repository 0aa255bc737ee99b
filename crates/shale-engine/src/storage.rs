//! Row storage: one JSON file per table plus the catalog file.
//!
//! Every mutating operation rewrites the affected table file before
//! returning, so a statement's effects are observable by the next one even
//! across processes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shale_core::schema::{Catalog, Row, TableSchema};
use shale_core::types::validate_and_convert;
use shale_core::Value;
use tracing::debug;

use crate::error::{EngineError, Result};

/// File name of the persisted catalog, inside the data directory.
const CATALOG_FILE: &str = "_catalog.json";

/// On-disk representation of a table.
#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    /// Rows keyed by row id.
    rows: BTreeMap<u64, Row>,
    /// The next row id to hand out.
    next_row_id: u64,
}

/// Storage manager for a single table.
///
/// Rows live in a `BTreeMap` keyed by row id, so scans are always in
/// ascending row-id order.
#[derive(Debug)]
pub struct TableStorage {
    schema: TableSchema,
    path: PathBuf,
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
}

impl TableStorage {
    /// Opens (or initializes) storage for a table inside `data_dir`.
    ///
    /// # Errors
    ///
    /// Fails when an existing table file cannot be read or decoded.
    pub fn open(schema: TableSchema, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(format!("{}.json", schema.name));
        let mut storage = Self {
            schema,
            path,
            rows: BTreeMap::new(),
            next_row_id: 1,
        };
        storage.load()?;
        Ok(storage)
    }

    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let text = fs::read_to_string(&self.path)?;
        let file: TableFile = serde_json::from_str(&text)?;
        self.next_row_id = file.next_row_id;
        let mut rows = BTreeMap::new();
        for (id, raw) in file.rows {
            rows.insert(id, self.decode_row(&raw)?);
        }
        self.rows = rows;
        Ok(())
    }

    /// Re-types a freshly deserialized row against the schema.
    ///
    /// JSON strings come back as TEXT; running each value through the
    /// column's type restores VARCHAR tags and keeps the columns in
    /// declaration order.
    fn decode_row(&self, raw: &Row) -> Result<Row> {
        let mut row = Row::with_capacity(self.schema.columns.len());
        for col in &self.schema.columns {
            let value = match raw.get(&col.name) {
                Some(value) => validate_and_convert(value.clone(), &col.col_type)
                    .map_err(|e| e.for_column(&col.name))?,
                None => Value::Null,
            };
            row.insert(col.name.clone(), value);
        }
        Ok(row)
    }

    fn save(&self) -> Result<()> {
        let file = TableFile {
            rows: self.rows.clone(),
            next_row_id: self.next_row_id,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// The table's schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Validates and inserts a row, returning its new row id.
    ///
    /// Row ids increase strictly and are never reused.
    ///
    /// # Errors
    ///
    /// Fails on validation errors, UNIQUE violations, or I/O failure; no
    /// row is stored in that case.
    pub fn insert(&mut self, row: &Row) -> Result<u64> {
        let validated = self.schema.validate_row(row)?;
        self.check_unique(&validated, None)?;

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(row_id, validated);
        self.save()?;
        Ok(row_id)
    }

    /// Checks every UNIQUE column of `row` against all stored rows,
    /// skipping NULL values and the excluded row id.
    fn check_unique(&self, row: &Row, exclude_id: Option<u64>) -> Result<()> {
        for col_name in &self.schema.unique_columns {
            let Some(value) = row.get(col_name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            for (&row_id, existing) in &self.rows {
                if exclude_id == Some(row_id) {
                    continue;
                }
                if existing
                    .get(col_name)
                    .is_some_and(|existing| existing.loosely_equals(value))
                {
                    return Err(EngineError::UniqueViolation {
                        column: col_name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the row with the given id, if present.
    #[must_use]
    pub fn get(&self, row_id: u64) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    /// Merges `updates` into the row (case-insensitive column matching),
    /// re-validates, and overwrites it.
    ///
    /// Returns false when no row has the given id.
    ///
    /// # Errors
    ///
    /// Fails on validation errors, UNIQUE violations (the updated row
    /// itself excluded), or I/O failure.
    pub fn update(&mut self, row_id: u64, updates: &Row) -> Result<bool> {
        let Some(current) = self.rows.get(&row_id) else {
            return Ok(false);
        };

        let mut merged = current.clone();
        for (key, value) in updates {
            if let Some(col) = self.schema.column(key) {
                merged.insert(col.name.clone(), value.clone());
            }
        }

        let validated = self.schema.validate_row(&merged)?;
        self.check_unique(&validated, Some(row_id))?;

        self.rows.insert(row_id, validated);
        self.save()?;
        Ok(true)
    }

    /// Removes a row. The row id is not recycled.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    pub fn delete(&mut self, row_id: u64) -> Result<bool> {
        if self.rows.remove(&row_id).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Iterates all rows in ascending row-id order.
    pub fn scan(&self) -> impl Iterator<Item = (u64, &Row)> {
        self.rows.iter().map(|(&id, row)| (id, row))
    }

    /// Number of stored rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Removes all rows and resets the row-id counter to 1.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    pub fn truncate(&mut self) -> Result<()> {
        self.rows.clear();
        self.next_row_id = 1;
        self.save()
    }

    /// Deletes the table file from disk.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    pub fn drop_file(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// The storage engine: catalog plus per-table storage.
#[derive(Debug)]
pub struct StorageEngine {
    data_dir: PathBuf,
    catalog: Catalog,
    tables: BTreeMap<String, TableStorage>,
}

impl StorageEngine {
    /// Opens the storage engine over a data directory, creating the
    /// directory if needed and loading the catalog and all table files.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or persisted state cannot
    /// be read.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let catalog_path = data_dir.join(CATALOG_FILE);
        let catalog = if catalog_path.exists() {
            serde_json::from_str(&fs::read_to_string(&catalog_path)?)?
        } else {
            Catalog::new()
        };

        let mut tables = BTreeMap::new();
        for (name, schema) in &catalog.tables {
            tables.insert(name.clone(), TableStorage::open(schema.clone(), &data_dir)?);
        }

        debug!(tables = tables.len(), "storage engine opened");
        Ok(Self {
            data_dir,
            catalog,
            tables,
        })
    }

    fn save_catalog(&self) -> Result<()> {
        let path = self.data_dir.join(CATALOG_FILE);
        fs::write(&path, serde_json::to_string_pretty(&self.catalog)?)?;
        Ok(())
    }

    /// Registers a new table and creates its storage.
    ///
    /// # Errors
    ///
    /// Fails when the table already exists or persistence fails.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let key = schema.name.to_lowercase();
        self.catalog.create_table(schema.clone())?;
        self.tables
            .insert(key, TableStorage::open(schema, &self.data_dir)?);
        self.save_catalog()
    }

    /// Drops a table: its storage file and its catalog entry.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist or persistence fails.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if let Some(storage) = self.tables.remove(&name.to_lowercase()) {
            storage.drop_file()?;
        }
        self.catalog.drop_table(name)?;
        self.save_catalog()
    }

    /// Storage for a table, if it exists.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableStorage> {
        self.tables.get(&name.to_lowercase())
    }

    /// Mutable storage for a table, if it exists.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableStorage> {
        self.tables.get_mut(&name.to_lowercase())
    }

    /// Schema for a table, if it exists.
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&TableSchema> {
        self.catalog.table(name)
    }

    /// Returns true if the table exists.
    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.catalog.table_exists(name)
    }

    /// Lists all table names (lowercase, sorted).
    #[must_use]
    pub fn list_tables(&self) -> Vec<String> {
        self.catalog.list_tables()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shale_core::schema::Column;
    use shale_core::types::{ColumnType, DataType};

    fn schema() -> TableSchema {
        let mut schema = TableSchema::new("users");
        let mut id = Column::new("id", ColumnType::new(DataType::Integer));
        id.primary_key = true;
        schema.add_column(id).unwrap();
        let mut email = Column::new("email", ColumnType::varchar(255));
        email.unique = true;
        schema.add_column(email).unwrap();
        schema
    }

    fn row(id: i64, email: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::Integer(id));
        row.insert("email".into(), Value::Text(email.into()));
        row
    }

    #[test]
    fn test_insert_assigns_increasing_row_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = TableStorage::open(schema(), dir.path()).unwrap();
        assert_eq!(storage.insert(&row(1, "a@x")).unwrap(), 1);
        assert_eq!(storage.insert(&row(2, "b@x")).unwrap(), 2);
        storage.delete(2).unwrap();
        // Deleted ids are never reused.
        assert_eq!(storage.insert(&row(3, "c@x")).unwrap(), 3);
    }

    #[test]
    fn test_unique_violation_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = TableStorage::open(schema(), dir.path()).unwrap();
        storage.insert(&row(1, "a@x")).unwrap();
        let err = storage.insert(&row(2, "a@x")).unwrap_err();
        assert!(matches!(err, EngineError::UniqueViolation { .. }));
        assert_eq!(storage.count(), 1);
    }

    #[test]
    fn test_update_excludes_own_row_from_unique_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = TableStorage::open(schema(), dir.path()).unwrap();
        let id = storage.insert(&row(1, "a@x")).unwrap();

        let mut updates = Row::new();
        updates.insert("EMAIL".into(), Value::Text("a@x".into()));
        assert!(storage.update(id, &updates).unwrap());
        assert_eq!(
            storage.get(id).unwrap()["email"],
            Value::Varchar("a@x".into())
        );
    }

    #[test]
    fn test_truncate_resets_row_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = TableStorage::open(schema(), dir.path()).unwrap();
        storage.insert(&row(1, "a@x")).unwrap();
        storage.insert(&row(2, "b@x")).unwrap();
        storage.truncate().unwrap();
        assert_eq!(storage.count(), 0);
        assert_eq!(storage.insert(&row(9, "c@x")).unwrap(), 1);
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut storage = TableStorage::open(schema(), dir.path()).unwrap();
            storage.insert(&row(1, "a@x")).unwrap();
        }
        let storage = TableStorage::open(schema(), dir.path()).unwrap();
        assert_eq!(storage.count(), 1);
        let (_, stored) = storage.scan().next().unwrap();
        // VARCHAR tags are restored on load.
        assert_eq!(stored["email"], Value::Varchar("a@x".into()));
    }

    #[test]
    fn test_engine_catalog_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut engine = StorageEngine::open(dir.path()).unwrap();
            engine.create_table(schema()).unwrap();
            engine
                .table_mut("users")
                .unwrap()
                .insert(&row(1, "a@x"))
                .unwrap();
        }
        let engine = StorageEngine::open(dir.path()).unwrap();
        assert_eq!(engine.list_tables(), ["users"]);
        assert_eq!(engine.table("USERS").unwrap().count(), 1);
    }
}

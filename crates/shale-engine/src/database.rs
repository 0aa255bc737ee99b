//! The embedding façade: a [`Database`] over one data directory.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use shale_core::schema::TableSchema;
use shale_core::parser;

use crate::error::{EngineError, Result};
use crate::exec::{Executor, QueryResult};
use crate::index::{IndexInfo, IndexManager};
use crate::storage::StorageEngine;

struct Inner {
    storage: StorageEngine,
    indexes: IndexManager,
}

/// A database instance bound to a data directory.
///
/// All statements run to completion before the next begins: the engine
/// state sits behind one mutex, which makes the handle safe to share
/// across threads for simple statement-at-a-time use. There are no
/// cross-statement transactions.
pub struct Database {
    inner: Mutex<Inner>,
}

impl Database {
    /// Opens (or creates) a database in the given directory.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or persisted state
    /// cannot be loaded.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let storage = StorageEngine::open(data_dir)?;
        let indexes = IndexManager::open(data_dir)?;
        Ok(Self {
            inner: Mutex::new(Inner { storage, indexes }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parses and executes one SQL statement.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] on parse or execution failure; the
    /// statement is abandoned at the first error.
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        let statement = parser::parse(sql)?;
        let mut inner = self.lock();
        let Inner { storage, indexes } = &mut *inner;
        Executor::new(storage, indexes).execute(&statement)
    }

    /// Executes multiple `;`-separated statements in order.
    ///
    /// The split is not string-aware: a semicolon inside a string literal
    /// ends the statement. This is a known limitation.
    ///
    /// # Errors
    ///
    /// Stops at the first failing statement and returns its error.
    pub fn execute_many(&self, sql: &str) -> Result<Vec<QueryResult>> {
        let mut results = Vec::new();
        for statement in sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            results.push(self.execute(statement)?);
        }
        Ok(results)
    }

    /// Lists all table names.
    #[must_use]
    pub fn tables(&self) -> Vec<String> {
        self.lock().storage.list_tables()
    }

    /// Returns the stored schema for a table.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist.
    pub fn describe(&self, table: &str) -> Result<TableSchema> {
        self.lock()
            .storage
            .schema(table)
            .cloned()
            .ok_or_else(|| shale_core::SchemaError::UnknownTable(table.to_string()).into())
    }

    /// Returns the number of rows in a table.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist.
    pub fn count(&self, table: &str) -> Result<usize> {
        self.lock()
            .storage
            .table(table)
            .map(crate::storage::TableStorage::count)
            .ok_or_else(|| {
                EngineError::from(shale_core::SchemaError::UnknownTable(table.to_string()))
            })
    }

    /// Lists the indexes on a table.
    #[must_use]
    pub fn indexes(&self, table: &str) -> Vec<IndexInfo> {
        self.lock().indexes.table_index_infos(table)
    }

    /// Closes the database. All writes are eager, so this is a no-op
    /// provided for API symmetry.
    pub fn close(self) {}
}

//! Index registry: which indexes exist, per table and column.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::btree::BTreeIndex;
use crate::error::{EngineError, Result};

/// File name of the persisted index metadata, inside the data directory.
const INDEX_META_FILE: &str = "_indexes.json";

/// Persisted metadata for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMeta {
    name: String,
    unique: bool,
}

/// A summary of one index, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Indexed column (lowercase).
    pub column: String,
    /// Whether the index is unique.
    pub unique: bool,
}

/// Manages every index in the database: a two-level map from lowercase
/// table name to lowercase column name to B-tree.
#[derive(Debug)]
pub struct IndexManager {
    data_dir: PathBuf,
    indexes: BTreeMap<String, BTreeMap<String, BTreeIndex>>,
}

impl IndexManager {
    /// Opens the manager over a data directory, loading all indexes listed
    /// in the metadata file.
    ///
    /// # Errors
    ///
    /// Fails when persisted metadata or an index file cannot be read.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let meta_path = data_dir.join(INDEX_META_FILE);

        let mut indexes: BTreeMap<String, BTreeMap<String, BTreeIndex>> = BTreeMap::new();
        if meta_path.exists() {
            let meta: BTreeMap<String, BTreeMap<String, IndexMeta>> =
                serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
            for (table, columns) in meta {
                let mut loaded = BTreeMap::new();
                for (column, info) in columns {
                    loaded.insert(
                        column.clone(),
                        BTreeIndex::open(info.name, &table, &column, &data_dir, info.unique)?,
                    );
                }
                indexes.insert(table, loaded);
            }
        }

        Ok(Self { data_dir, indexes })
    }

    fn save_meta(&self) -> Result<()> {
        let meta: BTreeMap<&String, BTreeMap<&String, IndexMeta>> = self
            .indexes
            .iter()
            .map(|(table, columns)| {
                let columns = columns
                    .iter()
                    .map(|(column, index)| {
                        (
                            column,
                            IndexMeta {
                                name: index.name.clone(),
                                unique: index.unique,
                            },
                        )
                    })
                    .collect();
                (table, columns)
            })
            .collect();
        let path = self.data_dir.join(INDEX_META_FILE);
        fs::write(&path, serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }

    /// Creates a new index on `table.column`.
    ///
    /// # Errors
    ///
    /// Fails when an index already covers the pair or persistence fails.
    pub fn create_index(
        &mut self,
        name: impl Into<String>,
        table: &str,
        column: &str,
        unique: bool,
    ) -> Result<&mut BTreeIndex> {
        let table_key = table.to_lowercase();
        let column_key = column.to_lowercase();

        let columns = self.indexes.entry(table_key.clone()).or_default();
        if columns.contains_key(&column_key) {
            return Err(EngineError::DuplicateIndex {
                table: table_key,
                column: column_key,
            });
        }

        let index = BTreeIndex::open(name, &table_key, &column_key, &self.data_dir, unique)?;
        debug!(table = %table_key, column = %column_key, unique, "index created");
        columns.insert(column_key.clone(), index);
        self.save_meta()?;

        Ok(self
            .indexes
            .get_mut(&table_key)
            .and_then(|columns| columns.get_mut(&column_key))
            .expect("index was just inserted"))
    }

    /// Drops the index on `table.column`, if one exists.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    pub fn drop_index(&mut self, table: &str, column: &str) -> Result<()> {
        let table_key = table.to_lowercase();
        let column_key = column.to_lowercase();

        if let Some(columns) = self.indexes.get_mut(&table_key) {
            if let Some(index) = columns.remove(&column_key) {
                index.drop_file()?;
                if columns.is_empty() {
                    self.indexes.remove(&table_key);
                }
                self.save_meta()?;
            }
        }
        Ok(())
    }

    /// The index on `table.column`, if one exists.
    #[must_use]
    pub fn index(&self, table: &str, column: &str) -> Option<&BTreeIndex> {
        self.indexes
            .get(&table.to_lowercase())
            .and_then(|columns| columns.get(&column.to_lowercase()))
    }

    /// All indexes on a table.
    #[must_use]
    pub fn table_indexes(&self, table: &str) -> Vec<&BTreeIndex> {
        self.indexes
            .get(&table.to_lowercase())
            .map(|columns| columns.values().collect())
            .unwrap_or_default()
    }

    /// All indexes on a table, mutably.
    pub fn table_indexes_mut(&mut self, table: &str) -> Vec<&mut BTreeIndex> {
        self.indexes
            .get_mut(&table.to_lowercase())
            .map(|columns| columns.values_mut().collect())
            .unwrap_or_default()
    }

    /// Summaries of all indexes on a table.
    #[must_use]
    pub fn table_index_infos(&self, table: &str) -> Vec<IndexInfo> {
        self.table_indexes(table)
            .into_iter()
            .map(|index| IndexInfo {
                name: index.name.clone(),
                column: index.column.clone(),
                unique: index.unique,
            })
            .collect()
    }

    /// Drops every index on a table.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    pub fn drop_table_indexes(&mut self, table: &str) -> Result<()> {
        if let Some(columns) = self.indexes.remove(&table.to_lowercase()) {
            for index in columns.values() {
                index.drop_file()?;
            }
            self.save_meta()?;
        }
        Ok(())
    }
}

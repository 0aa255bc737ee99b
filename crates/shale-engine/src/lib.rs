//! # shale-engine
//!
//! A minimal embeddable relational database engine: SQL text in, tabular
//! results out, with durable JSON-file storage and B-tree secondary
//! indexes kept in sync with every mutation.
//!
//! ```rust
//! use shale_engine::Database;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let db = Database::open(dir.path()).unwrap();
//!
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100))")
//!     .unwrap();
//! db.execute("INSERT INTO users VALUES (1, 'Alice'), (2, 'Bob')").unwrap();
//!
//! let result = db.execute("SELECT name FROM users ORDER BY id DESC").unwrap();
//! assert_eq!(result.columns, vec!["name"]);
//! assert_eq!(result.rows.len(), 2);
//! ```

pub mod database;
pub mod error;
pub mod exec;
pub mod index;
pub mod storage;

pub use database::Database;
pub use error::{EngineError, Result};
pub use exec::{Executor, QueryResult};
pub use index::{BTreeIndex, IndexInfo, IndexManager};
pub use storage::{StorageEngine, TableStorage};

pub use shale_core::{Row, Value};

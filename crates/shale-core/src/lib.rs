//! # shale-core
//!
//! The SQL front-end of the shale database engine: a hand-written lexer, a
//! recursive-descent parser with Pratt expression parsing, the typed AST,
//! the runtime value/type system, and the schema catalog.
//!
//! ```rust
//! use shale_core::ast::Statement;
//! use shale_core::parser;
//!
//! let statement = parser::parse("SELECT name FROM users WHERE id = 1").unwrap();
//! assert!(matches!(statement, Statement::Select(_)));
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod types;

pub use ast::{Expr, Statement};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use schema::{Catalog, Column, Row, RowError, SchemaError, TableSchema};
pub use types::{ColumnType, DataType, TypeError, Value};

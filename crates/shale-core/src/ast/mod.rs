//! Abstract Syntax Tree (AST) types for SQL statements.

mod expression;
mod statement;

pub use expression::{AggregateFunc, BinaryOp, Expr, FunctionCall, Literal, UnaryOp};
pub use statement::{
    Assignment, ColumnDef, CreateIndexStatement, CreateTableStatement, DeleteStatement,
    DropIndexStatement, DropTableStatement, InsertStatement, Join, JoinType, OrderBy,
    OrderDirection, SelectItem, SelectStatement, Statement, TableRef, UpdateStatement,
};

//! Query execution: expression evaluation and statement dispatch.

mod eval;
mod executor;

pub use eval::{literal_value, Evaluator};
pub use executor::{Executor, QueryResult};

pub(crate) use eval::get_column;

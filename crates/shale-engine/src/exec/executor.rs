//! Statement execution: AST dispatch, the SELECT pipeline, DML with index
//! upkeep, and DDL.

use std::cmp::Ordering;
use std::collections::HashSet;

use indexmap::IndexMap;
use shale_core::ast::{
    AggregateFunc, Expr, FunctionCall, Join, JoinType, OrderBy, OrderDirection, SelectItem,
    SelectStatement, Statement,
};
use shale_core::schema::{Column, Row, SchemaError, TableSchema};
use shale_core::Value;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::exec::eval::{get_column, literal_value, Evaluator};
use crate::index::IndexManager;
use crate::storage::StorageEngine;

/// Result of executing one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Result-column names, in projection order.
    pub columns: Vec<String>,
    /// Result rows as flat column-to-value maps.
    pub rows: Vec<Row>,
    /// Rows touched by a DML statement.
    pub affected_rows: usize,
    /// Human-readable outcome for DDL and DML statements.
    pub message: String,
}

impl QueryResult {
    fn result_set(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    fn dml(affected_rows: usize, message: String) -> Self {
        Self {
            affected_rows,
            message,
            ..Self::default()
        }
    }

    fn ddl(message: String) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }
}

/// The executor's working representation of an in-flight row: one row per
/// table alias, plus the source row id for single-table scans.
#[derive(Debug, Clone)]
struct Envelope {
    tables: IndexMap<String, Row>,
    #[allow(dead_code)]
    row_id: Option<u64>,
}

impl Envelope {
    fn single(alias: &str, row: Row, row_id: u64) -> Self {
        let mut tables = IndexMap::new();
        tables.insert(alias.to_string(), row);
        Self {
            tables,
            row_id: Some(row_id),
        }
    }

    /// Wraps an already-flat row (the output of the aggregation stage).
    fn flat(row: Row) -> Self {
        let mut tables = IndexMap::new();
        tables.insert(String::new(), row);
        Self {
            tables,
            row_id: None,
        }
    }

    /// Merges all per-alias rows into one flat view. Duplicate column names
    /// keep their first position and take the last alias's value.
    fn flatten(&self) -> Row {
        let mut flat = Row::new();
        for row in self.tables.values() {
            for (key, value) in row {
                flat.insert(key.clone(), value.clone());
            }
        }
        flat
    }
}

/// Executes parsed statements against storage and indexes.
pub struct Executor<'a> {
    storage: &'a mut StorageEngine,
    indexes: &'a mut IndexManager,
}

impl<'a> Executor<'a> {
    /// Creates an executor over the engine's storage and index manager.
    pub fn new(storage: &'a mut StorageEngine, indexes: &'a mut IndexManager) -> Self {
        Self { storage, indexes }
    }

    /// Executes a single statement.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] describing the first failure; the
    /// statement is abandoned at that point.
    pub fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        debug!(kind = statement.kind(), "executing statement");
        match statement {
            Statement::Select(stmt) => self.execute_select(stmt),
            Statement::Insert(stmt) => self.execute_insert(stmt),
            Statement::Update(stmt) => self.execute_update(stmt),
            Statement::Delete(stmt) => self.execute_delete(stmt),
            Statement::CreateTable(stmt) => self.execute_create_table(stmt),
            Statement::DropTable(stmt) => self.execute_drop_table(stmt),
            Statement::CreateIndex(stmt) => self.execute_create_index(stmt),
            Statement::DropIndex(stmt) => self.execute_drop_index(stmt),
            Statement::ShowTables => self.execute_show_tables(),
            Statement::Describe(table) => self.execute_describe(table),
            Statement::Truncate(table) => self.execute_truncate(table),
        }
    }

    // ===============================================================
    // SELECT
    // ===============================================================

    fn execute_select(&self, stmt: &SelectStatement) -> Result<QueryResult> {
        let Some(from) = &stmt.from else {
            return Self::select_without_from(stmt);
        };

        let table = self
            .storage
            .table(&from.name)
            .ok_or_else(|| SchemaError::UnknownTable(from.name.clone()))?;
        let alias = from.effective_alias();

        let mut envelopes: Vec<Envelope> = table
            .scan()
            .map(|(row_id, row)| Envelope::single(alias, row.clone(), row_id))
            .collect();

        for join in &stmt.joins {
            envelopes = self.process_join(envelopes, join)?;
        }

        if let Some(predicate) = &stmt.where_clause {
            envelopes = filter_envelopes(envelopes, predicate)?;
        }

        if !stmt.group_by.is_empty() || has_aggregates(&stmt.columns) {
            let rows = aggregate(&envelopes, stmt)?;
            envelopes = rows.into_iter().map(Envelope::flat).collect();
        }

        if let Some(predicate) = &stmt.having {
            envelopes = filter_envelopes(envelopes, predicate)?;
        }

        if stmt.distinct {
            envelopes = distinct_envelopes(envelopes, &stmt.columns)?;
        }

        if !stmt.order_by.is_empty() {
            envelopes = order_envelopes(envelopes, &stmt.order_by)?;
        }

        let offset = stmt.offset.unwrap_or(0) as usize;
        let mut envelopes: Vec<Envelope> = envelopes.into_iter().skip(offset).collect();
        if let Some(limit) = stmt.limit {
            envelopes.truncate(limit as usize);
        }

        let (columns, rows) = project(&envelopes, &stmt.columns)?;
        Ok(QueryResult::result_set(columns, rows))
    }

    fn select_without_from(stmt: &SelectStatement) -> Result<QueryResult> {
        let empty = Row::new();
        let evaluator = Evaluator::new(&empty);
        let mut columns = Vec::new();
        let mut row = Row::new();
        for item in &stmt.columns {
            match item {
                SelectItem::Wildcard => {
                    return Err(EngineError::Execution(
                        "SELECT * requires a FROM clause".to_string(),
                    ));
                }
                SelectItem::Expr { expr, alias } => {
                    let name = alias.clone().unwrap_or_else(|| expr.result_name());
                    let value = evaluator.eval(expr)?;
                    if !columns.contains(&name) {
                        columns.push(name.clone());
                    }
                    row.insert(name, value);
                }
            }
        }
        Ok(QueryResult::result_set(columns, vec![row]))
    }

    fn process_join(&self, left: Vec<Envelope>, join: &Join) -> Result<Vec<Envelope>> {
        let right_table = self
            .storage
            .table(&join.table.name)
            .ok_or_else(|| SchemaError::UnknownTable(join.table.name.clone()))?;
        let right_alias = join.table.effective_alias();
        let right_schema = right_table.schema().clone();
        let right_rows: Vec<(u64, Row)> = right_table
            .scan()
            .map(|(row_id, row)| (row_id, row.clone()))
            .collect();

        let mut result = Vec::new();
        let mut matched_right: HashSet<u64> = HashSet::new();

        for left_env in &left {
            let mut matched = false;
            for (right_id, right_row) in &right_rows {
                let mut combined = left_env.clone();
                combined
                    .tables
                    .insert(right_alias.to_string(), right_row.clone());

                if let Some(condition) = &join.on {
                    let flat = combined.flatten();
                    let evaluator = Evaluator::with_tables(&flat, &combined.tables);
                    if !evaluator.eval_predicate(condition)? {
                        continue;
                    }
                }

                matched = true;
                matched_right.insert(*right_id);
                result.push(combined);
            }

            if !matched && join.join_type == JoinType::Left {
                let mut combined = left_env.clone();
                combined
                    .tables
                    .insert(right_alias.to_string(), null_row(&right_schema));
                result.push(combined);
            }
        }

        // RIGHT JOIN additionally emits right rows that matched no left row,
        // with NULL left-side columns. An empty left side yields nothing.
        if join.join_type == JoinType::Right {
            if let Some(first) = left.first() {
                for (right_id, right_row) in &right_rows {
                    if matched_right.contains(right_id) {
                        continue;
                    }
                    let mut tables = IndexMap::new();
                    for (alias, row) in &first.tables {
                        let nulls: Row = row
                            .keys()
                            .map(|key| (key.clone(), Value::Null))
                            .collect();
                        tables.insert(alias.clone(), nulls);
                    }
                    tables.insert(right_alias.to_string(), right_row.clone());
                    result.push(Envelope {
                        tables,
                        row_id: None,
                    });
                }
            }
        }

        Ok(result)
    }

    // ===============================================================
    // DML
    // ===============================================================

    fn execute_insert(&mut self, stmt: &shale_core::ast::InsertStatement) -> Result<QueryResult> {
        let schema_columns = {
            let table = self
                .storage
                .table(&stmt.table)
                .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
            table.schema().column_names()
        };

        let empty = Row::new();
        let mut inserted = 0;
        for value_exprs in &stmt.values {
            let evaluator = Evaluator::new(&empty);
            let mut values = Vec::with_capacity(value_exprs.len());
            for expr in value_exprs {
                values.push(evaluator.eval(expr)?);
            }

            let names: &[String] = if stmt.columns.is_empty() {
                if schema_columns.len() != values.len() {
                    return Err(EngineError::Execution(
                        "value count does not match table columns".to_string(),
                    ));
                }
                &schema_columns
            } else {
                if stmt.columns.len() != values.len() {
                    return Err(EngineError::Execution(
                        "column count does not match value count".to_string(),
                    ));
                }
                &stmt.columns
            };

            let row: Row = names.iter().cloned().zip(values).collect();

            let (row_id, stored) = {
                let table = self
                    .storage
                    .table_mut(&stmt.table)
                    .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
                let row_id = table.insert(&row)?;
                let stored = table.get(row_id).cloned().ok_or_else(|| {
                    EngineError::Execution("row not found after insert".to_string())
                })?;
                (row_id, stored)
            };

            // Indexes carry the values as stored, after validation.
            for index in self.indexes.table_indexes_mut(&stmt.table) {
                if let Some(value) = get_column(&stored, &index.column) {
                    if !value.is_null() {
                        let value = value.clone();
                        index.insert(&value, row_id)?;
                    }
                }
            }

            inserted += 1;
        }

        debug!(table = %stmt.table, rows = inserted, "insert");
        Ok(QueryResult::dml(
            inserted,
            format!("Inserted {inserted} row(s)"),
        ))
    }

    fn execute_update(&mut self, stmt: &shale_core::ast::UpdateStatement) -> Result<QueryResult> {
        let targets: Vec<(u64, Row)> = {
            let table = self
                .storage
                .table(&stmt.table)
                .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
            let mut targets = Vec::new();
            for (row_id, row) in table.scan() {
                if let Some(predicate) = &stmt.where_clause {
                    if !Evaluator::new(row).eval_predicate(predicate)? {
                        continue;
                    }
                }
                targets.push((row_id, row.clone()));
            }
            targets
        };

        let mut updated = 0;
        for (row_id, old_row) in targets {
            // Every right-hand side sees the row as it was before this
            // statement touched it.
            let evaluator = Evaluator::new(&old_row);
            let mut updates = Row::new();
            for assignment in &stmt.assignments {
                updates.insert(assignment.column.clone(), evaluator.eval(&assignment.value)?);
            }

            for index in self.indexes.table_indexes_mut(&stmt.table) {
                if get_column(&updates, &index.column).is_some() {
                    if let Some(old_value) = get_column(&old_row, &index.column) {
                        if !old_value.is_null() {
                            let old_value = old_value.clone();
                            index.delete(&old_value, row_id)?;
                        }
                    }
                }
            }

            let stored = {
                let table = self
                    .storage
                    .table_mut(&stmt.table)
                    .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
                table.update(row_id, &updates)?;
                table.get(row_id).cloned()
            };

            if let Some(stored) = stored {
                for index in self.indexes.table_indexes_mut(&stmt.table) {
                    if get_column(&updates, &index.column).is_some() {
                        if let Some(new_value) = get_column(&stored, &index.column) {
                            if !new_value.is_null() {
                                let new_value = new_value.clone();
                                index.insert(&new_value, row_id)?;
                            }
                        }
                    }
                }
            }

            updated += 1;
        }

        debug!(table = %stmt.table, rows = updated, "update");
        Ok(QueryResult::dml(updated, format!("Updated {updated} row(s)")))
    }

    fn execute_delete(&mut self, stmt: &shale_core::ast::DeleteStatement) -> Result<QueryResult> {
        let targets: Vec<(u64, Row)> = {
            let table = self
                .storage
                .table(&stmt.table)
                .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
            let mut targets = Vec::new();
            for (row_id, row) in table.scan() {
                if let Some(predicate) = &stmt.where_clause {
                    if !Evaluator::new(row).eval_predicate(predicate)? {
                        continue;
                    }
                }
                targets.push((row_id, row.clone()));
            }
            targets
        };

        let mut deleted = 0;
        for (row_id, row) in targets {
            for index in self.indexes.table_indexes_mut(&stmt.table) {
                if let Some(value) = get_column(&row, &index.column) {
                    if !value.is_null() {
                        let value = value.clone();
                        index.delete(&value, row_id)?;
                    }
                }
            }

            self.storage
                .table_mut(&stmt.table)
                .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?
                .delete(row_id)?;
            deleted += 1;
        }

        debug!(table = %stmt.table, rows = deleted, "delete");
        Ok(QueryResult::dml(deleted, format!("Deleted {deleted} row(s)")))
    }

    // ===============================================================
    // DDL
    // ===============================================================

    fn execute_create_table(
        &mut self,
        stmt: &shale_core::ast::CreateTableStatement,
    ) -> Result<QueryResult> {
        if self.storage.table_exists(&stmt.table) {
            if stmt.if_not_exists {
                return Ok(QueryResult::ddl(format!(
                    "Table '{}' already exists",
                    stmt.table
                )));
            }
            return Err(SchemaError::DuplicateTable(stmt.table.clone()).into());
        }

        let mut schema = TableSchema::new(stmt.table.as_str());
        for def in &stmt.columns {
            let mut column = Column::new(def.name.clone(), def.col_type);
            column.primary_key = def.primary_key;
            column.unique = def.unique;
            column.not_null = def.not_null;
            column.default = def.default.as_ref().map(literal_value);
            schema.add_column(column)?;
        }

        self.storage.create_table(schema.clone())?;

        if let Some(pk) = &schema.primary_key {
            self.indexes
                .create_index(format!("pk_{}_{}", stmt.table, pk), &stmt.table, pk, true)?;
        }
        for column in &schema.columns {
            if column.unique && !column.primary_key {
                self.indexes.create_index(
                    format!("unique_{}_{}", stmt.table, column.name),
                    &stmt.table,
                    &column.name,
                    true,
                )?;
            }
        }

        info!(table = %stmt.table, "table created");
        Ok(QueryResult::ddl(format!("Table '{}' created", stmt.table)))
    }

    fn execute_drop_table(
        &mut self,
        stmt: &shale_core::ast::DropTableStatement,
    ) -> Result<QueryResult> {
        if !self.storage.table_exists(&stmt.table) {
            if stmt.if_exists {
                return Ok(QueryResult::ddl(format!(
                    "Table '{}' does not exist",
                    stmt.table
                )));
            }
            return Err(SchemaError::UnknownTable(stmt.table.clone()).into());
        }

        self.indexes.drop_table_indexes(&stmt.table)?;
        self.storage.drop_table(&stmt.table)?;

        info!(table = %stmt.table, "table dropped");
        Ok(QueryResult::ddl(format!("Table '{}' dropped", stmt.table)))
    }

    fn execute_create_index(
        &mut self,
        stmt: &shale_core::ast::CreateIndexStatement,
    ) -> Result<QueryResult> {
        let schema = self
            .storage
            .schema(&stmt.table)
            .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
        if schema.column(&stmt.column).is_none() {
            return Err(SchemaError::UnknownColumn {
                table: stmt.table.clone(),
                column: stmt.column.clone(),
            }
            .into());
        }

        let entries: Vec<(Value, u64)> = {
            let table = self
                .storage
                .table(&stmt.table)
                .ok_or_else(|| SchemaError::UnknownTable(stmt.table.clone()))?;
            table
                .scan()
                .filter_map(|(row_id, row)| {
                    get_column(row, &stmt.column)
                        .filter(|value| !value.is_null())
                        .map(|value| (value.clone(), row_id))
                })
                .collect()
        };

        let index =
            self.indexes
                .create_index(stmt.name.clone(), &stmt.table, &stmt.column, stmt.unique)?;
        for (value, row_id) in entries {
            index.insert(&value, row_id)?;
        }

        info!(index = %stmt.name, table = %stmt.table, "index created");
        Ok(QueryResult::ddl(format!("Index '{}' created", stmt.name)))
    }

    fn execute_drop_index(
        &mut self,
        stmt: &shale_core::ast::DropIndexStatement,
    ) -> Result<QueryResult> {
        // The identifier names an index first, a column second.
        let column = self
            .indexes
            .table_indexes(&stmt.table)
            .iter()
            .find(|index| index.name.eq_ignore_ascii_case(&stmt.name))
            .map(|index| index.column.clone())
            .unwrap_or_else(|| stmt.name.to_lowercase());

        self.indexes.drop_index(&stmt.table, &column)?;
        Ok(QueryResult::ddl(format!("Index '{}' dropped", stmt.name)))
    }

    fn execute_show_tables(&self) -> Result<QueryResult> {
        let rows = self
            .storage
            .list_tables()
            .into_iter()
            .map(|name| {
                let mut row = Row::new();
                row.insert("table_name".to_string(), Value::Text(name));
                row
            })
            .collect();
        Ok(QueryResult::result_set(vec!["table_name".to_string()], rows))
    }

    fn execute_describe(&self, table: &str) -> Result<QueryResult> {
        let schema = self
            .storage
            .schema(table)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?;

        let columns = ["column_name", "data_type", "nullable", "key", "default"]
            .map(String::from)
            .to_vec();
        let rows = schema
            .columns
            .iter()
            .map(|col| {
                let key = if col.primary_key {
                    "PRI"
                } else if col.unique {
                    "UNI"
                } else {
                    ""
                };
                let mut row = Row::new();
                row.insert("column_name".to_string(), Value::Text(col.name.clone()));
                row.insert(
                    "data_type".to_string(),
                    Value::Text(col.col_type.to_string()),
                );
                row.insert(
                    "nullable".to_string(),
                    Value::Text(if col.not_null { "NO" } else { "YES" }.to_string()),
                );
                row.insert("key".to_string(), Value::Text(key.to_string()));
                row.insert(
                    "default".to_string(),
                    col.default.clone().unwrap_or(Value::Null),
                );
                row
            })
            .collect();

        Ok(QueryResult::result_set(columns, rows))
    }

    fn execute_truncate(&mut self, table: &str) -> Result<QueryResult> {
        if !self.storage.table_exists(table) {
            return Err(SchemaError::UnknownTable(table.to_string()).into());
        }

        // Rebuild every index empty, keeping its name and uniqueness.
        let infos = self.indexes.table_index_infos(table);
        for info in &infos {
            self.indexes.drop_index(table, &info.column)?;
        }

        self.storage
            .table_mut(table)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?
            .truncate()?;

        for info in &infos {
            self.indexes
                .create_index(info.name.clone(), table, &info.column, info.unique)?;
        }

        info!(table, "table truncated");
        Ok(QueryResult::ddl(format!("Table '{table}' truncated")))
    }
}

// ===================================================================
// SELECT pipeline stages
// ===================================================================

fn null_row(schema: &TableSchema) -> Row {
    schema
        .columns
        .iter()
        .map(|col| (col.name.clone(), Value::Null))
        .collect()
}

fn has_aggregates(items: &[SelectItem]) -> bool {
    items
        .iter()
        .any(|item| matches!(item, SelectItem::Expr { expr: Expr::Function(_), .. }))
}

fn filter_envelopes(envelopes: Vec<Envelope>, predicate: &Expr) -> Result<Vec<Envelope>> {
    let mut kept = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        let flat = envelope.flatten();
        let evaluator = Evaluator::with_tables(&flat, &envelope.tables);
        if evaluator.eval_predicate(predicate)? {
            kept.push(envelope);
        }
    }
    Ok(kept)
}

/// Partitions envelopes by the GROUP BY key tuple (one catch-all group when
/// there is none) and computes one flat row per group.
fn aggregate(envelopes: &[Envelope], stmt: &SelectStatement) -> Result<Vec<Row>> {
    let mut groups: IndexMap<Vec<String>, (Vec<Value>, Vec<&Envelope>)> = IndexMap::new();

    if stmt.group_by.is_empty() {
        groups.insert(Vec::new(), (Vec::new(), envelopes.iter().collect()));
    } else {
        for envelope in envelopes {
            let flat = envelope.flatten();
            let evaluator = Evaluator::with_tables(&flat, &envelope.tables);
            let mut key_values = Vec::with_capacity(stmt.group_by.len());
            for expr in &stmt.group_by {
                key_values.push(evaluator.eval(expr)?);
            }
            let key: Vec<String> = key_values.iter().map(Value::canonical_key).collect();
            let entry = groups
                .entry(key)
                .or_insert_with(|| (key_values.clone(), Vec::new()));
            entry.1.push(envelope);
        }
    }

    let mut result = Vec::with_capacity(groups.len());
    for (key_values, group) in groups.values() {
        let mut row = Row::new();

        for (i, expr) in stmt.group_by.iter().enumerate() {
            if let Expr::Column { name, .. } = expr {
                row.insert(name.clone(), key_values[i].clone());
            }
        }

        for item in &stmt.columns {
            let SelectItem::Expr { expr, alias } = item else {
                continue;
            };
            match expr {
                Expr::Function(call) => {
                    let value = compute_aggregate(call, group)?;
                    let name = alias.clone().unwrap_or_else(|| call.canonical_name());
                    row.insert(name, value);
                }
                other => {
                    let name = alias.clone().unwrap_or_else(|| other.result_name());
                    if !row.contains_key(&name) {
                        if let Some(first) = group.first() {
                            let flat = first.flatten();
                            let evaluator = Evaluator::with_tables(&flat, &first.tables);
                            row.insert(name, evaluator.eval(other)?);
                        }
                    }
                }
            }
        }

        result.push(row);
    }

    Ok(result)
}

fn compute_aggregate(call: &FunctionCall, group: &[&Envelope]) -> Result<Value> {
    let mut values = Vec::new();
    for envelope in group {
        let flat = envelope.flatten();
        let evaluator = Evaluator::with_tables(&flat, &envelope.tables);
        for arg in &call.args {
            if matches!(arg, Expr::Wildcard) {
                values.push(Value::Integer(1));
            } else {
                let value = evaluator.eval(arg)?;
                if !value.is_null() {
                    values.push(value);
                }
            }
        }
    }

    if call.distinct {
        let mut seen = HashSet::new();
        values.retain(|value| seen.insert(value.canonical_key()));
    }

    match call.func {
        AggregateFunc::Count => Ok(Value::Integer(values.len() as i64)),
        AggregateFunc::Sum => sum_values(&values, call),
        AggregateFunc::Avg => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let mut total = 0.0;
            for value in &values {
                total += numeric_aggregate_input(value, call)?;
            }
            Ok(Value::Float(total / values.len() as f64))
        }
        AggregateFunc::Min => Ok(fold_extreme(&values, Ordering::Less)),
        AggregateFunc::Max => Ok(fold_extreme(&values, Ordering::Greater)),
    }
}

fn sum_values(values: &[Value], call: &FunctionCall) -> Result<Value> {
    if values.is_empty() {
        return Ok(Value::Integer(0));
    }
    if values.iter().all(|value| value.as_i64().is_some()) {
        let mut total: i64 = 0;
        for value in values {
            total = total
                .checked_add(value.as_i64().unwrap_or(0))
                .ok_or_else(|| {
                    EngineError::Execution(format!("integer overflow in {}", call.canonical_name()))
                })?;
        }
        return Ok(Value::Integer(total));
    }

    let mut total = 0.0;
    for value in values {
        total += numeric_aggregate_input(value, call)?;
    }
    Ok(Value::Float(total))
}

fn numeric_aggregate_input(value: &Value, call: &FunctionCall) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        EngineError::Execution(format!(
            "{} over non-numeric {} value",
            call.canonical_name(),
            value.type_name()
        ))
    })
}

fn fold_extreme(values: &[Value], keep: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for value in values {
        best = match best {
            None => Some(value),
            Some(current) if value.compare(current) == keep => Some(value),
            Some(current) => Some(current),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

/// Keeps the first envelope for each distinct projected tuple.
fn distinct_envelopes(envelopes: Vec<Envelope>, items: &[SelectItem]) -> Result<Vec<Envelope>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for envelope in envelopes {
        let (_, rows) = project(std::slice::from_ref(&envelope), items)?;
        let key = rows
            .first()
            .map(|row| {
                row.values()
                    .map(Value::canonical_key)
                    .collect::<Vec<_>>()
                    .join("\u{1}")
            })
            .unwrap_or_default();
        if seen.insert(key) {
            unique.push(envelope);
        }
    }
    Ok(unique)
}

/// Stable sort by successive keys. NULLs sort before non-NULLs regardless
/// of direction.
fn order_envelopes(envelopes: Vec<Envelope>, order_by: &[OrderBy]) -> Result<Vec<Envelope>> {
    let mut keyed: Vec<(Vec<Value>, Envelope)> = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        let flat = envelope.flatten();
        let evaluator = Evaluator::with_tables(&flat, &envelope.tables);
        let mut keys = Vec::with_capacity(order_by.len());
        for item in order_by {
            keys.push(evaluator.eval(&item.expr)?);
        }
        keyed.push((keys, envelope));
    }

    keyed.sort_by(|(a, _), (b, _)| {
        for (i, item) in order_by.iter().enumerate() {
            let ordering = match (a[i].is_null(), b[i].is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => {
                    let ordering = a[i].compare(&b[i]);
                    if item.direction == OrderDirection::Desc {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(keyed.into_iter().map(|(_, envelope)| envelope).collect())
}

/// Projects the select list over each envelope. Result-column order is
/// first-appearance order across all rows.
fn project(envelopes: &[Envelope], items: &[SelectItem]) -> Result<(Vec<String>, Vec<Row>)> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(envelopes.len());

    for envelope in envelopes {
        let flat = envelope.flatten();
        let evaluator = Evaluator::with_tables(&flat, &envelope.tables);
        let mut row = Row::new();

        for item in items {
            match item {
                SelectItem::Wildcard => {
                    for (key, value) in &flat {
                        row.insert(key.clone(), value.clone());
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                SelectItem::Expr { expr, alias } => {
                    let name = alias.clone().unwrap_or_else(|| expr.result_name());
                    let value = match expr {
                        // Aggregates were computed by the grouping stage and
                        // stored under this result name.
                        Expr::Function(_) => {
                            get_column(&flat, &name).cloned().unwrap_or(Value::Null)
                        }
                        other => evaluator.eval(other)?,
                    };
                    if !columns.contains(&name) {
                        columns.push(name.clone());
                    }
                    row.insert(name, value);
                }
            }
        }

        rows.push(row);
    }

    Ok((columns, rows))
}

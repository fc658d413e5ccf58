//! Transactional upsert-by-resource-key.
//!
//! For every distinct resource key in a batch the engine deletes the
//! previously stored rows, then inserts the batch's rows for that key.
//! The whole call runs in one transaction: a database failure mid-call
//! rolls everything back and the caller accounts the batch as errored.
//! Rows without a resource-key value are rejected up front, one error
//! each, without touching the transaction.

use duckdb::types::Value as DbValue;
use duckdb::{params, params_from_iter};
use serde_json::Value;
use tracing::{debug, warn};

use mallard_views::Row;

use crate::error::StoreError;
use crate::pool::ConnectionPool;
use crate::sql::quote_ident;

/// Outcome counters for one upsert call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub deleted: usize,
    pub updated: usize,
    pub errors: usize,
}

impl UpsertSummary {
    pub fn merge(&mut self, other: &UpsertSummary) {
        self.inserted += other.inserted;
        self.deleted += other.deleted;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}

/// Writes materialized rows into a destination table.
#[derive(Debug, Clone)]
pub struct UpsertEngine {
    pool: ConnectionPool,
}

impl UpsertEngine {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Upsert `rows` (values aligned with `columns`, the plan's column
    /// names) into `table_name`, keyed by `resource_key_column`.
    ///
    /// Binding is driven by the table's actual column list: the engine
    /// introspects the table (excluding the surrogate `id` and system
    /// columns), and any table column absent from `columns` binds null.
    pub fn upsert(
        &self,
        table_name: &str,
        columns: &[String],
        rows: &[Row],
        resource_key_column: &str,
    ) -> Result<UpsertSummary, StoreError> {
        let mut summary = UpsertSummary::default();
        if rows.is_empty() {
            return Ok(summary);
        }

        let key_index = columns.iter().position(|c| c == resource_key_column);

        // Group rows by key value, preserving first-seen key order.
        let mut groups: Vec<(&Value, Vec<&Row>)> = Vec::new();
        for row in rows {
            let key = key_index.and_then(|i| row.values.get(i)).and_then(Option::as_ref);
            let key = match key {
                Some(k) => k,
                None => {
                    summary.errors += 1;
                    warn!(
                        table = table_name,
                        key_column = resource_key_column,
                        "row has no resource key, skipping"
                    );
                    continue;
                }
            };
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(row),
                None => groups.push((key, vec![row])),
            }
        }
        if groups.is_empty() {
            return Ok(summary);
        }

        let mut connection = self.pool.acquire()?;
        let table_columns = introspect_columns(&connection, table_name)?;

        let tx = connection.transaction()?;
        {
            let quoted_table = quote_ident(table_name);
            let quoted_key = quote_ident(resource_key_column);
            let count_sql = format!(
                "SELECT count(*) FROM {} WHERE {} = ?",
                quoted_table, quoted_key
            );
            let delete_sql = format!("DELETE FROM {} WHERE {} = ?", quoted_table, quoted_key);
            let mut count = tx.prepare(&count_sql)?;
            let mut delete = tx.prepare(&delete_sql)?;
            let mut insert = tx.prepare(&build_insert_sql(&quoted_table, &table_columns))?;

            for (key, group) in &groups {
                let key_param = to_db_value(Some(key));
                let before: i64 =
                    count.query_row(params![key_param.clone()], |row| row.get(0))?;
                delete.execute(params![key_param.clone()])?;
                let after: i64 = count.query_row(params![key_param], |row| row.get(0))?;

                let removed = (before - after).max(0) as usize;
                summary.deleted += removed;
                if before > 0 {
                    // Replaced rows are reported as updates as well.
                    summary.updated += removed;
                }

                for row in group {
                    let bound = bind_row(row, columns, &table_columns);
                    insert.execute(params_from_iter(bound))?;
                    summary.inserted += 1;
                }
            }
        }
        tx.commit()?;

        debug!(
            table = table_name,
            inserted = summary.inserted,
            deleted = summary.deleted,
            updated = summary.updated,
            errors = summary.errors,
            "batch upserted"
        );
        Ok(summary)
    }
}

/// A destination column: name plus declared storage type.
#[derive(Debug, Clone)]
struct TableColumn {
    name: String,
    storage_type: String,
}

fn introspect_columns(
    connection: &duckdb::Connection,
    table_name: &str,
) -> Result<Vec<TableColumn>, StoreError> {
    let mut stmt = connection.prepare(
        "SELECT column_name, data_type FROM information_schema.columns \
         WHERE table_name = ? ORDER BY ordinal_position",
    )?;
    let mut columns = Vec::new();
    let rows = stmt.query_map(params![table_name], |row| {
        Ok(TableColumn {
            name: row.get(0)?,
            storage_type: row.get(1)?,
        })
    })?;
    for column in rows {
        let column = column?;
        let lowered = column.name.to_lowercase();
        if lowered == "id" || lowered == "last_updated" {
            continue;
        }
        columns.push(column);
    }
    Ok(columns)
}

fn build_insert_sql(quoted_table: &str, table_columns: &[TableColumn]) -> String {
    let names: Vec<String> = table_columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect();
    let placeholders: Vec<String> = table_columns
        .iter()
        .map(|c| {
            // Array columns arrive as JSON text and are cast by the engine.
            if c.storage_type.ends_with("[]") {
                format!("CAST(? AS {})", c.storage_type)
            } else {
                "?".to_string()
            }
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted_table,
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Bind a row to the table's column tuple; plan columns missing from the
/// table are ignored, table columns missing from the plan bind null.
fn bind_row(row: &Row, columns: &[String], table_columns: &[TableColumn]) -> Vec<DbValue> {
    table_columns
        .iter()
        .map(|table_column| {
            let value = columns
                .iter()
                .position(|c| c == &table_column.name)
                .and_then(|i| row.values.get(i))
                .and_then(Option::as_ref);
            to_db_value(value)
        })
        .collect()
}

fn to_db_value(value: Option<&Value>) -> DbValue {
    match value {
        None | Some(Value::Null) => DbValue::Null,
        Some(Value::Bool(b)) => DbValue::Boolean(*b),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                DbValue::BigInt(i)
            } else {
                DbValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Some(Value::String(s)) => DbValue::Text(s.clone()),
        // Arrays and objects are serialized as JSON text; array-typed
        // destination columns cast the text back to a list.
        Some(other) => DbValue::Text(other.to_string()),
    }
}

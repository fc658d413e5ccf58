//! Table creation: semantic type mapping and idempotent DDL.

use mallard_views::Column;
use tracing::debug;

use crate::error::StoreError;
use crate::pool::ConnectionPool;
use crate::sql::{quote_ident, quote_str};

/// Creates destination tables from plan column descriptors.
#[derive(Debug, Clone)]
pub struct TableManager {
    pool: ConnectionPool,
}

impl TableManager {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Idempotently create `table_name` with a surrogate `id` primary key
    /// backed by a `<table>_id_seq` sequence, followed by the declared
    /// columns in order. An existing table is left untouched, whatever its
    /// schema.
    pub fn ensure_table(&self, table_name: &str, columns: &[Column]) -> Result<(), StoreError> {
        let connection = self.pool.acquire()?;

        let sequence = format!("{}_id_seq", table_name);
        let mut ddl = format!("CREATE SEQUENCE IF NOT EXISTS {};\n", quote_ident(&sequence));

        let mut column_defs = vec![format!(
            "id INTEGER PRIMARY KEY DEFAULT nextval({})",
            quote_str(&sequence)
        )];
        for column in columns {
            column_defs.push(format!(
                "{} {}",
                quote_ident(&column.name),
                storage_type(column)
            ));
        }
        ddl.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            quote_ident(table_name),
            column_defs.join(", ")
        ));

        debug!(table = table_name, "ensuring destination table");
        connection.execute_batch(&ddl)?;
        Ok(())
    }
}

/// Map a column's semantic type to its storage type. An `ansi/type` tag
/// overrides the table; `collection` wraps the result as an array.
pub fn storage_type(column: &Column) -> String {
    let base = match column.tag("ansi/type") {
        Some(storage) => storage.to_string(),
        None => semantic_storage_type(&column.r#type).to_string(),
    };
    if column.collection {
        format!("{}[]", base)
    } else {
        base
    }
}

fn semantic_storage_type(semantic: &str) -> &'static str {
    match semantic {
        "boolean" => "BOOLEAN",
        "integer" | "positiveInt" | "unsignedInt" => "INTEGER",
        "integer64" => "BIGINT",
        "decimal" => "DOUBLE",
        "date" => "DATE",
        "dateTime" | "instant" => "TIMESTAMP",
        "time" => "TIME",
        "base64Binary" => "BLOB",
        // string, uri, code, markdown, id, url, uuid and anything unknown
        _ => "VARCHAR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(r#type: &str, collection: bool) -> Column {
        Column {
            name: "c".to_string(),
            path: "c".to_string(),
            expr: mallard_fhir_path::Expression::parse("c").unwrap(),
            r#type: r#type.to_string(),
            collection,
            description: None,
            tags: Vec::new(),
            select_path: "0".to_string(),
        }
    }

    #[test]
    fn test_semantic_type_map() {
        assert_eq!(storage_type(&column("boolean", false)), "BOOLEAN");
        assert_eq!(storage_type(&column("integer", false)), "INTEGER");
        assert_eq!(storage_type(&column("positiveInt", false)), "INTEGER");
        assert_eq!(storage_type(&column("integer64", false)), "BIGINT");
        assert_eq!(storage_type(&column("decimal", false)), "DOUBLE");
        assert_eq!(storage_type(&column("date", false)), "DATE");
        assert_eq!(storage_type(&column("dateTime", false)), "TIMESTAMP");
        assert_eq!(storage_type(&column("instant", false)), "TIMESTAMP");
        assert_eq!(storage_type(&column("time", false)), "TIME");
        assert_eq!(storage_type(&column("base64Binary", false)), "BLOB");
        assert_eq!(storage_type(&column("string", false)), "VARCHAR");
        assert_eq!(storage_type(&column("mystery", false)), "VARCHAR");
    }

    #[test]
    fn test_collection_wraps_as_array() {
        assert_eq!(storage_type(&column("string", true)), "VARCHAR[]");
        assert_eq!(storage_type(&column("integer", true)), "INTEGER[]");
    }

    #[test]
    fn test_ansi_tag_overrides() {
        let mut c = column("string", false);
        c.tags.push(("ansi/type".to_string(), "TEXT".to_string()));
        assert_eq!(storage_type(&c), "TEXT");
    }
}

//! Canonical plaintext encoding of a whole database.
//!
//! Tables are written in name order and rows in id order, so the same state
//! always produces the same bytes. Reading re-validates every row against its
//! schema; anything that does not fit is reported as a malformed database.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::column::ColumnDefinition;
use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::table::{RowId, Table};
use crate::value::Value;

pub const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    format: u32,
    name: &'a str,
    tables: Vec<TableOut<'a>>,
}

#[derive(Serialize)]
struct TableOut<'a> {
    name: &'a str,
    created_at: DateTime<Utc>,
    next_id: RowId,
    columns: &'a [ColumnDefinition],
    rows: Vec<RowOut<'a>>,
}

#[derive(Serialize)]
struct RowOut<'a> {
    id: RowId,
    values: &'a [Value],
}

#[derive(Deserialize)]
struct SnapshotIn {
    format: u32,
    name: String,
    tables: Vec<TableIn>,
}

#[derive(Deserialize)]
struct TableIn {
    name: String,
    created_at: DateTime<Utc>,
    next_id: RowId,
    columns: Vec<ColumnDefinition>,
    rows: Vec<RowIn>,
}

#[derive(Deserialize)]
struct RowIn {
    id: RowId,
    values: Vec<Value>,
}

/// Decoded database contents, ready to be adopted by a [`Database`].
#[derive(Debug)]
pub struct Snapshot {
    pub name: String,
    pub tables: Vec<Table>,
}

pub fn serialize(db: &Database) -> Result<Vec<u8>> {
    let doc = SnapshotOut {
        format: SNAPSHOT_FORMAT,
        name: db.name(),
        tables: db
            .tables()
            .map(|table| TableOut {
                name: table.name(),
                created_at: table.created_at(),
                next_id: table.next_id(),
                columns: table.columns(),
                rows: table
                    .raw_rows()
                    .map(|(id, values)| RowOut { id, values })
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_vec(&doc).map_err(|e| DatabaseError::Malformed(format!("serialize: {e}")))
}

pub fn deserialize(bytes: &[u8]) -> Result<Snapshot> {
    let doc: SnapshotIn = serde_json::from_slice(bytes)
        .map_err(|e| DatabaseError::Malformed(format!("parse snapshot: {e}")))?;
    if doc.format != SNAPSHOT_FORMAT {
        return Err(DatabaseError::Malformed(format!(
            "unsupported snapshot format {}",
            doc.format
        )));
    }

    let mut seen = HashSet::new();
    let mut tables = Vec::with_capacity(doc.tables.len());
    for table in doc.tables {
        if !seen.insert(table.name.clone()) {
            return Err(DatabaseError::Malformed(format!(
                "duplicate table '{}'",
                table.name
            )));
        }
        let name = table.name.clone();
        let rows = table.rows.into_iter().map(|r| (r.id, r.values)).collect();
        let restored = Table::restore(table.name, table.columns, table.next_id, table.created_at, rows)
            .map_err(|e| match e {
                DatabaseError::Malformed(_) => e,
                other => DatabaseError::Malformed(format!("table '{name}': {other}")),
            })?;
        tables.push(restored);
    }
    Ok(Snapshot {
        name: doc.name,
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_garbage_and_unknown_format() {
        assert_eq!(deserialize(b"not json").unwrap_err().kind(), ErrorKind::Database);
        let doc = br#"{"format": 7, "name": "x", "tables": []}"#;
        assert_eq!(deserialize(doc).unwrap_err().kind(), ErrorKind::Database);
    }

    #[test]
    fn rows_breaking_the_schema_are_malformed() {
        let doc = serde_json::json!({
            "format": SNAPSHOT_FORMAT,
            "name": "db",
            "tables": [{
                "name": "users",
                "created_at": "2024-01-01T00:00:00Z",
                "next_id": 2,
                "columns": [{"name": "age", "data_type": "integer", "nullable": false}],
                "rows": [{"id": 1, "values": [{"type": "string", "value": "old"}]}]
            }]
        });
        let bytes = serde_json::to_vec(&doc).unwrap();
        let err = deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }

    #[test]
    fn accepts_a_valid_document() {
        let doc = serde_json::json!({
            "format": SNAPSHOT_FORMAT,
            "name": "db",
            "tables": [{
                "name": "users",
                "created_at": "2024-01-01T00:00:00Z",
                "next_id": 3,
                "columns": [{"name": "age", "data_type": "integer"}],
                "rows": [
                    {"id": 2, "values": [{"type": "integer", "value": 41}]},
                    {"id": 1, "values": [{"type": "null"}]}
                ]
            }]
        });
        let snapshot = deserialize(&serde_json::to_vec(&doc).unwrap()).unwrap();
        let table = &snapshot.tables[0];
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(2).unwrap().get("age"), Some(&Value::Integer(41)));
        assert_eq!(table.get(1).unwrap().get("age"), Some(&Value::Null));
    }
}

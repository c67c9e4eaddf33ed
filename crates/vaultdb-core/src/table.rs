//! In-memory table: a fixed schema plus rows keyed by permanent ids.
//!
//! Every query is a linear scan in ascending id order. Ids come from a
//! monotonic counter starting at 1 and are never handed out twice, even after
//! the row that held one is deleted.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::column::ColumnDefinition;
use crate::error::{DatabaseError, Result};
use crate::value::Value;

pub type RowId = u64;

const FIRST_ROW_ID: RowId = 1;

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<ColumnDefinition>,
    next_id: RowId,
    rows: BTreeMap<RowId, Vec<Value>>,
    created_at: DateTime<Utc>,
}

/// Borrowed view of a stored row, handed to predicates.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    id: RowId,
    columns: &'a [ColumnDefinition],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .map(|idx| &self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let columns = self.columns;
        let values = self.values;
        columns.iter().map(|c| c.name.as_str()).zip(values.iter())
    }
}

/// Owned projection of a row returned by [`Table::select`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RowId,
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub column_count: usize,
    pub data_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Table {
    pub fn create(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Result<Self> {
        let name = name.into();
        check_schema(&name, &columns)?;
        debug!(table = %name, columns = columns.len(), "table created");
        Ok(Self {
            name,
            columns,
            next_id: FIRST_ROW_ID,
            rows: BTreeMap::new(),
            created_at: Utc::now(),
        })
    }

    /// Rebuild a table from persisted parts, re-checking every invariant.
    pub(crate) fn restore(
        name: String,
        columns: Vec<ColumnDefinition>,
        next_id: RowId,
        created_at: DateTime<Utc>,
        rows: Vec<(RowId, Vec<Value>)>,
    ) -> Result<Self> {
        check_schema(&name, &columns)?;
        if next_id < FIRST_ROW_ID || next_id == RowId::MAX {
            return Err(DatabaseError::Malformed(format!(
                "table '{name}' has invalid id counter {next_id}"
            )));
        }
        let mut stored = BTreeMap::new();
        for (id, values) in rows {
            if id < FIRST_ROW_ID || id >= next_id {
                return Err(DatabaseError::Malformed(format!(
                    "table '{name}' row id {id} outside allocated range"
                )));
            }
            if values.len() != columns.len() {
                return Err(DatabaseError::Malformed(format!(
                    "table '{name}' row {id} has {} values for {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            for (column, value) in columns.iter().zip(&values) {
                column.validate(value)?;
            }
            if stored.insert(id, values).is_some() {
                return Err(DatabaseError::Malformed(format!(
                    "table '{name}' has duplicate row id {id}"
                )));
            }
        }
        Ok(Self {
            name,
            columns,
            next_id,
            rows: stored,
            created_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn next_id(&self) -> RowId {
        self.next_id
    }

    pub(crate) fn raw_rows(&self) -> impl Iterator<Item = (RowId, &[Value])> {
        self.rows.iter().map(|(id, values)| (*id, values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn insert<I, K>(&mut self, values: I) -> Result<RowId>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let input = self.collect_input(values)?;
        let row = self
            .columns
            .iter()
            .map(|column| column.resolve(input.get(&column.name)))
            .collect::<Result<Vec<_>>>()?;

        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .filter(|next| *next < RowId::MAX)
            .ok_or_else(|| {
                DatabaseError::Validation(format!("table '{}' has run out of row ids", self.name))
            })?;
        self.rows.insert(id, row);
        debug!(table = %self.name, id, "row inserted");
        Ok(id)
    }

    pub fn get(&self, id: RowId) -> Option<Row> {
        self.rows.get(&id).map(|values| Row {
            id,
            fields: self
                .columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values.iter().cloned())
                .collect(),
        })
    }

    /// Rows matching `predicate` (all rows when `None`), projected onto
    /// `columns` (the whole schema when `None`).
    pub fn select(
        &self,
        predicate: Option<&dyn Fn(&RowView<'_>) -> bool>,
        columns: Option<&[&str]>,
    ) -> Result<Vec<Row>> {
        let projection: Vec<(String, usize)> = match columns {
            Some(names) => names
                .iter()
                .map(|name| Ok((name.to_string(), self.column_index(name)?)))
                .collect::<Result<_>>()?,
            None => self
                .columns
                .iter()
                .enumerate()
                .map(|(idx, c)| (c.name.clone(), idx))
                .collect(),
        };

        let rows = self
            .rows
            .iter()
            .filter(|(id, values)| predicate.map_or(true, |p| p(&self.view(**id, values))))
            .map(|(id, values)| Row {
                id: *id,
                fields: projection
                    .iter()
                    .map(|(name, idx)| (name.clone(), values[*idx].clone()))
                    .collect(),
            })
            .collect();
        Ok(rows)
    }

    /// Apply `values` to every row matching `predicate`.
    ///
    /// All merged rows are validated before any is written; if one fails the
    /// table is left untouched and the error is returned.
    pub fn update<F, I, K>(&mut self, predicate: F, values: I) -> Result<usize>
    where
        F: Fn(&RowView<'_>) -> bool,
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        // Unknown columns fail up front; values are only checked against the
        // rows they land in, so an update matching nothing changes nothing.
        let changes: Vec<(usize, Value)> = self
            .collect_input(values)?
            .into_iter()
            .map(|(name, value)| Ok((self.column_index(&name)?, value)))
            .collect::<Result<_>>()?;

        let mut staged = Vec::new();
        for (id, current) in &self.rows {
            if !predicate(&self.view(*id, current)) {
                continue;
            }
            let mut merged = current.clone();
            for (idx, value) in &changes {
                merged[*idx] = value.clone();
            }
            for (column, value) in self.columns.iter().zip(&merged) {
                column.validate(value)?;
            }
            staged.push((*id, merged));
        }

        let count = staged.len();
        for (id, merged) in staged {
            self.rows.insert(id, merged);
        }
        debug!(table = %self.name, count, "rows updated");
        Ok(count)
    }

    pub fn delete<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&RowView<'_>) -> bool,
    {
        let before = self.rows.len();
        let columns = &self.columns;
        self.rows.retain(|id, values| {
            !predicate(&RowView {
                id: *id,
                columns,
                values,
            })
        });
        let count = before - self.rows.len();
        debug!(table = %self.name, count, "rows deleted");
        count
    }

    pub fn get_table_info(&self) -> TableInfo {
        TableInfo {
            column_count: self.columns.len(),
            data_count: self.rows.len(),
            created_at: self.created_at,
        }
    }

    pub fn get_column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn view<'a>(&'a self, id: RowId, values: &'a [Value]) -> RowView<'a> {
        RowView {
            id,
            columns: &self.columns,
            values,
        }
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                DatabaseError::Column(format!("unknown column '{name}' in table '{}'", self.name))
            })
    }

    fn collect_input<I, K>(&self, values: I) -> Result<HashMap<String, Value>>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let input: HashMap<String, Value> =
            values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some(unknown) = input.keys().find(|k| !self.columns.iter().any(|c| &c.name == *k)) {
            return Err(DatabaseError::Column(format!(
                "unknown column '{unknown}' in table '{}'",
                self.name
            )));
        }
        Ok(input)
    }
}

fn check_schema(table: &str, columns: &[ColumnDefinition]) -> Result<()> {
    if table.trim().is_empty() {
        return Err(DatabaseError::Table("table name must not be empty".into()));
    }
    if columns.is_empty() {
        return Err(DatabaseError::Column(format!(
            "table '{table}' needs at least one column"
        )));
    }
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.name.as_str()) {
            return Err(DatabaseError::Column(format!(
                "duplicate column '{}' in table '{table}'",
                column.name
            )));
        }
        column.check_definition()?;
    }
    Ok(())
}

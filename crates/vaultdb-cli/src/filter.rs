//! `column=value` WHERE expressions.

use anyhow::{anyhow, Result};
use vaultdb_core::{RowView, Table, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: String,
    pub value: Value,
}

impl WhereClause {
    pub fn parse(input: &str) -> Result<Self> {
        let (column, raw) = input
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid where clause '{input}', expected column=value"))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(anyhow!("invalid where clause '{input}', column is empty"));
        }
        Ok(Self {
            column: column.to_string(),
            value: parse_literal(raw.trim()),
        })
    }

    /// Build a predicate for `table`, rejecting columns it does not have.
    pub fn predicate(&self, table: &Table) -> Result<impl Fn(&RowView<'_>) -> bool> {
        if !table.columns().iter().any(|c| c.name == self.column) {
            return Err(anyhow!(
                "unknown column '{}' in table '{}'",
                self.column,
                table.name()
            ));
        }
        let column = self.column.clone();
        let expected = self.value.clone();
        Ok(move |row: &RowView<'_>| {
            row.get(&column)
                .map_or(false, |actual| loosely_equal(actual, &expected))
        })
    }
}

fn parse_literal(raw: &str) -> Value {
    match raw.to_ascii_lowercase().as_str() {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        "null" | "none" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}

// Numbers compare across Integer and Float, everything else must match exactly.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            (*a as f64) == *b
        }
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultdb_core::{ColumnDefinition, DataType};

    #[test]
    fn literals_are_typed() {
        assert_eq!(parse_literal("TRUE"), Value::Boolean(true));
        assert_eq!(parse_literal("null"), Value::Null);
        assert_eq!(parse_literal("42"), Value::Integer(42));
        assert_eq!(parse_literal("-1.5"), Value::Float(-1.5));
        assert_eq!(parse_literal("Alice"), Value::from("Alice"));
        assert_eq!(parse_literal("'42'"), Value::from("42"));
        assert_eq!(parse_literal("inf"), Value::from("inf"));
    }

    #[test]
    fn clause_requires_equals() {
        assert!(WhereClause::parse("age>3").is_err());
        assert!(WhereClause::parse("=3").is_err());
        let clause = WhereClause::parse(" name = Bob Smith ").unwrap();
        assert_eq!(clause.column, "name");
        assert_eq!(clause.value, Value::from("Bob Smith"));
    }

    #[test]
    fn predicate_matches_numbers_loosely() {
        let mut table = Table::create(
            "t",
            vec![ColumnDefinition::new("price", DataType::Float)],
        )
        .unwrap();
        table.insert(vec![("price", Value::Float(3.0))]).unwrap();
        table.insert(vec![("price", Value::Float(3.5))]).unwrap();

        let clause = WhereClause::parse("price=3").unwrap();
        let predicate = clause.predicate(&table).unwrap();
        let rows = table.select(Some(&predicate), None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), 1);

        assert!(WhereClause::parse("cost=3").unwrap().predicate(&table).is_err());
    }
}

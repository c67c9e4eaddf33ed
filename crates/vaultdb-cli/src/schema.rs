//! JSON arguments: column definitions and row data.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use vaultdb_core::{ColumnDefinition, DataType, Value};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnArg {
    Short(String),
    Full(ColumnSpec),
}

#[derive(Debug, Deserialize)]
struct ColumnSpec {
    #[serde(rename = "type", default = "default_type")]
    data_type: String,
    #[serde(default)]
    nullable: Option<bool>,
    #[serde(default)]
    min_length: usize,
    #[serde(default)]
    max_length: usize,
    #[serde(default)]
    default_value: Option<serde_json::Value>,
}

fn default_type() -> String {
    "string".to_string()
}

/// Parse `{"name": "string", "age": {"type": "int", "nullable": false}}`,
/// keeping the key order as column order.
pub fn parse_columns(json: &str) -> Result<Vec<ColumnDefinition>> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).context("invalid column definition JSON")?;
    if map.is_empty() {
        return Err(anyhow!("at least one column is required"));
    }
    map.into_iter()
        .map(|(name, raw)| {
            let arg: ColumnArg = serde_json::from_value(raw)
                .with_context(|| format!("invalid definition for column '{name}'"))?;
            column_from_arg(name, arg)
        })
        .collect()
}

fn column_from_arg(name: String, arg: ColumnArg) -> Result<ColumnDefinition> {
    match arg {
        ColumnArg::Short(type_name) => {
            let data_type: DataType = type_name.parse()?;
            Ok(ColumnDefinition::new(name, data_type))
        }
        ColumnArg::Full(spec) => {
            let data_type: DataType = spec.data_type.parse()?;
            let mut column = ColumnDefinition::new(name, data_type)
                .nullable(spec.nullable.unwrap_or(true))
                .min_length(spec.min_length)
                .max_length(spec.max_length);
            if let Some(default) = spec.default_value {
                column = column.default_value(Value::try_from(&default)?);
            }
            Ok(column)
        }
    }
}

/// Parse a JSON object of `column: value` pairs.
pub fn parse_row(json: &str) -> Result<Vec<(String, Value)>> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).context("invalid data JSON, expected an object")?;
    map.iter()
        .map(|(name, raw)| {
            let value = Value::try_from(raw)
                .with_context(|| format!("invalid value for column '{name}'"))?;
            Ok((name.clone(), value))
        })
        .collect()
}

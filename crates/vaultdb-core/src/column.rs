use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};
use crate::value::{DataType, Value};

/// Schema of a single column.
///
/// Length bounds only apply to `String` values and use `0` for "unbounded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub min_length: usize,
    #[serde(default)]
    pub max_length: usize,
    #[serde(default)]
    pub default_value: Option<Value>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: default_nullable(),
            min_length: 0,
            max_length: 0,
            default_value: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Check one candidate value against nullability, kind and length bounds,
    /// in that order.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(DatabaseError::Validation(format!(
                "column '{}' is not nullable",
                self.name
            )));
        }
        if !self.data_type.accepts(value) {
            return Err(DatabaseError::Type {
                column: self.name.clone(),
                expected: self.data_type,
                found: value.data_type(),
            });
        }
        if let Some(length) = value.text_len() {
            let too_short = self.min_length > 0 && length < self.min_length;
            let too_long = self.max_length > 0 && length > self.max_length;
            if too_short || too_long {
                return Err(DatabaseError::Length {
                    column: self.name.clone(),
                    length,
                    min: self.min_length,
                    max: self.max_length,
                });
            }
        }
        Ok(())
    }

    /// Pick the value stored for this column on insert: explicit input, then
    /// the default, then null.
    pub fn resolve(&self, input: Option<&Value>) -> Result<Value> {
        let value = match (input, &self.default_value) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) if self.nullable => Value::Null,
            (None, None) => {
                return Err(DatabaseError::Validation(format!(
                    "column '{}' is required",
                    self.name
                )))
            }
        };
        self.validate(&value)?;
        Ok(value)
    }

    /// Schema-level invariants, checked when a table is created or restored.
    pub(crate) fn check_definition(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DatabaseError::Column("column name must not be empty".into()));
        }
        if self.data_type == DataType::Null && !self.nullable {
            return Err(DatabaseError::Validation(format!(
                "column '{}' of type null must be nullable",
                self.name
            )));
        }
        if self.max_length > 0 && self.min_length > self.max_length {
            return Err(DatabaseError::Validation(format!(
                "column '{}' has min_length {} greater than max_length {}",
                self.name, self.min_length, self.max_length
            )));
        }
        if let Some(default) = &self.default_value {
            self.validate(default).map_err(|e| {
                DatabaseError::Validation(format!(
                    "default value of column '{}' is invalid: {e}",
                    self.name
                ))
            })?;
        }
        Ok(())
    }
}

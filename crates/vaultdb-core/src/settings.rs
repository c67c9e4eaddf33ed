use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};

/// Argon2id cost parameters. Written into every container header so a file
/// always opens with the cost it was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub time_cost: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

pub const MAX_KDF_TIME_COST: u32 = 16;
pub const MAX_KDF_MEMORY_KIB: u32 = 1024 * 1024; // 1 GiB
pub const MAX_KDF_PARALLELISM: u32 = 16;

impl KdfParams {
    /// Bounds check applied both to configuration and to untrusted headers.
    pub fn validate(&self) -> Result<()> {
        if self.time_cost == 0 || self.time_cost > MAX_KDF_TIME_COST {
            return Err(DatabaseError::Validation(format!(
                "kdf time_cost {} outside 1..={MAX_KDF_TIME_COST}",
                self.time_cost
            )));
        }
        if self.parallelism == 0 || self.parallelism > MAX_KDF_PARALLELISM {
            return Err(DatabaseError::Validation(format!(
                "kdf parallelism {} outside 1..={MAX_KDF_PARALLELISM}",
                self.parallelism
            )));
        }
        if self.memory_kib < 8 * self.parallelism || self.memory_kib > MAX_KDF_MEMORY_KIB {
            return Err(DatabaseError::Validation(format!(
                "kdf memory_kib {} outside {}..={MAX_KDF_MEMORY_KIB}",
                self.memory_kib,
                8 * self.parallelism
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_kib: 65536, // 64MB
            parallelism: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(DatabaseError::Password("password must not be empty".into()));
        }
        if password.chars().count() < self.min_length {
            return Err(DatabaseError::Password(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        Ok(())
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    /// Serialized snapshots larger than this are zstd-compressed before sealing.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
}

fn default_compression_threshold() -> usize {
    4 * 1024 // 4 KiB
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            password_policy: PasswordPolicy::default(),
            compression_threshold: default_compression_threshold(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .map_err(|e| DatabaseError::path(path, format!("read config: {e}")))?;
        let config: DatabaseConfig = serde_json::from_slice(&raw)
            .map_err(|e| DatabaseError::Validation(format!("parse config: {e}")))?;
        config.kdf.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn partial_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, br#"{"password_policy": {"min_length": 8}}"#).unwrap();
        let config = DatabaseConfig::from_file(&path).unwrap();
        assert_eq!(config.password_policy.min_length, 8);
        assert_eq!(config.kdf, KdfParams::default());
        assert_eq!(config.compression_threshold, 4096);
    }

    #[test]
    fn kdf_bounds_are_enforced() {
        let mut params = KdfParams::default();
        assert!(params.validate().is_ok());
        params.memory_kib = MAX_KDF_MEMORY_KIB + 1;
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::Validation);
        params = KdfParams {
            time_cost: 0,
            ..KdfParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn password_policy() {
        let policy = PasswordPolicy { min_length: 4 };
        assert_eq!(policy.check("").unwrap_err().kind(), ErrorKind::Password);
        assert_eq!(policy.check("abc").unwrap_err().kind(), ErrorKind::Password);
        assert!(policy.check("abcd").is_ok());
    }
}

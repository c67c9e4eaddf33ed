use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::column::ColumnDefinition;
use crate::container;
use crate::error::{DatabaseError, Result};
use crate::settings::DatabaseConfig;
use crate::snapshot;
use crate::storage;
use crate::table::{Table, TableInfo};

pub const DB_FILE_EXTENSION: &str = "pydb";

/// An open database session.
///
/// Owns its tables and the session password. The password lives only in
/// memory, is zeroized on drop and never appears in `Debug` output.
pub struct Database {
    name: String,
    file_path: PathBuf,
    tables: BTreeMap<String, Table>,
    password: Zeroizing<String>,
    config: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub file_path: PathBuf,
    pub table_count: usize,
    pub encrypted: bool,
    pub tables: BTreeMap<String, TableInfo>,
}

impl Database {
    pub fn create_new(
        name: &str,
        password: &str,
        storage_path: impl AsRef<Path>,
    ) -> Result<Self> {
        Self::create_new_with_config(name, password, storage_path, DatabaseConfig::default())
    }

    /// Create `<storage_path>/<name>.pydb` and write the empty database to it.
    pub fn create_new_with_config(
        name: &str,
        password: &str,
        storage_path: impl AsRef<Path>,
        config: DatabaseConfig,
    ) -> Result<Self> {
        let storage_path = storage_path.as_ref();
        if name.trim().is_empty() || name.contains(&['/', '\\'][..]) {
            return Err(DatabaseError::path(
                storage_path.join(name),
                "database name must be a plain, non-empty file stem",
            ));
        }
        config.password_policy.check(password)?;
        if !storage_path.is_dir() {
            return Err(DatabaseError::path(storage_path, "storage path is not a directory"));
        }
        let file_path = storage_path.join(format!("{name}.{DB_FILE_EXTENSION}"));
        if file_path.exists() {
            return Err(DatabaseError::path(&file_path, "database already exists"));
        }

        let db = Self {
            name: name.to_string(),
            file_path,
            tables: BTreeMap::new(),
            password: Zeroizing::new(password.to_string()),
            config,
        };
        db.write_to(&db.file_path, &db.password)?;
        info!(name = %db.name, path = %db.file_path.display(), "database created");
        Ok(db)
    }

    pub fn load_from_file(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        Self::load_from_file_with_config(path, password, DatabaseConfig::default())
    }

    /// Open an existing file. `config` governs later saves only; decryption
    /// uses the parameters recorded in the file header.
    pub fn load_from_file_with_config(
        path: impl AsRef<Path>,
        password: &str,
        config: DatabaseConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = storage::read_file(path)?;
        let plaintext = container::decrypt(&bytes, password)?;
        let snapshot = snapshot::deserialize(&plaintext)?;

        let mut tables = BTreeMap::new();
        for table in snapshot.tables {
            tables.insert(table.name().to_string(), table);
        }
        info!(
            name = %snapshot.name,
            path = %path.display(),
            tables = tables.len(),
            "database loaded"
        );
        Ok(Self {
            name: snapshot.name,
            file_path: path.to_path_buf(),
            tables,
            password: Zeroizing::new(password.to_string()),
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Directory holding the database file.
    pub fn storage_path(&self) -> &Path {
        match self.file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnDefinition>,
    ) -> Result<&mut Table> {
        if self.tables.contains_key(name) {
            return Err(DatabaseError::Table(format!("table '{name}' already exists")));
        }
        let table = Table::create(name, columns)?;
        debug!(database = %self.name, table = name, "table added");
        Ok(self.tables.entry(name.to_string()).or_insert(table))
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DatabaseError::Table(format!("table '{name}' not found")))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DatabaseError::Table(format!("table '{name}' not found")))
    }

    /// Persist under `password`, which becomes the session password on
    /// success. Saving with a different password rotates it.
    pub fn save(&mut self, password: &str) -> Result<()> {
        self.config.password_policy.check(password)?;
        self.write_to(&self.file_path, password)?;
        self.password = Zeroizing::new(password.to_string());
        Ok(())
    }

    /// Persist under the current session password.
    pub fn flush(&self) -> Result<()> {
        self.write_to(&self.file_path, &self.password)
    }

    /// Write a full copy to `path`, under `password` or the session password.
    /// The primary file and session password are left untouched.
    pub fn backup(&self, path: impl AsRef<Path>, password: Option<&str>) -> Result<()> {
        let path = path.as_ref();
        if storage::same_file(path, &self.file_path) {
            return Err(DatabaseError::path(path, "backup target is the database file itself"));
        }
        let password = match password {
            Some(p) => {
                self.config.password_policy.check(p)?;
                p
            }
            None => self.password.as_str(),
        };
        self.write_to(path, password)?;
        info!(name = %self.name, path = %path.display(), "backup written");
        Ok(())
    }

    pub fn get_database_info(&self) -> DatabaseInfo {
        DatabaseInfo {
            name: self.name.clone(),
            file_path: self.file_path.clone(),
            table_count: self.tables.len(),
            encrypted: true,
            tables: self
                .tables
                .iter()
                .map(|(name, table)| (name.clone(), table.get_table_info()))
                .collect(),
        }
    }

    /// End the session; the password is wiped as the handle drops.
    pub fn close(self) {
        debug!(name = %self.name, "database closed");
    }

    fn write_to(&self, path: &Path, password: &str) -> Result<()> {
        let plaintext = Zeroizing::new(snapshot::serialize(self)?);
        let sealed = container::encrypt(&plaintext, password, &self.config)?;
        storage::write_atomic(path, &sealed)?;
        info!(
            path = %path.display(),
            tables = self.tables.len(),
            bytes = sealed.len(),
            "database saved"
        );
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("file_path", &self.file_path)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::settings::KdfParams;
    use crate::value::{DataType, Value};
    use tempfile::tempdir;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            kdf: KdfParams {
                time_cost: 1,
                memory_kib: 64,
                parallelism: 1,
            },
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn create_writes_file_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let db = Database::create_new_with_config("shop", "pw", dir.path(), config()).unwrap();
        assert!(db.file_path().is_file());
        assert_eq!(db.file_path(), dir.path().join("shop.pydb"));
        let err = Database::create_new_with_config("shop", "pw", dir.path(), config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn create_checks_password_and_path() {
        let dir = tempdir().unwrap();
        let err = Database::create_new_with_config("a", "", dir.path(), config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Password);
        let missing = dir.path().join("missing");
        let err = Database::create_new_with_config("a", "pw", &missing, config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
        let err = Database::create_new_with_config("../a", "pw", dir.path(), config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn duplicate_and_missing_tables() {
        let dir = tempdir().unwrap();
        let mut db = Database::create_new_with_config("db", "pw", dir.path(), config()).unwrap();
        let cols = vec![ColumnDefinition::new("a", DataType::Integer)];
        db.create_table("t", cols.clone()).unwrap();
        assert_eq!(db.create_table("t", cols).unwrap_err().kind(), ErrorKind::Table);
        assert_eq!(db.get_table("nope").unwrap_err().kind(), ErrorKind::Table);
    }

    #[test]
    fn info_reports_tables() {
        let dir = tempdir().unwrap();
        let mut db = Database::create_new_with_config("db", "pw", dir.path(), config()).unwrap();
        let table = db
            .create_table("t", vec![ColumnDefinition::new("a", DataType::Integer)])
            .unwrap();
        table.insert(vec![("a", Value::Integer(1))]).unwrap();
        let info = db.get_database_info();
        assert_eq!(info.table_count, 1);
        assert!(info.encrypted);
        assert_eq!(info.tables["t"].data_count, 1);
        assert_eq!(info.file_path, dir.path().join("db.pydb"));
    }

    #[test]
    fn debug_output_hides_password() {
        let dir = tempdir().unwrap();
        let db = Database::create_new_with_config("db", "hunter22", dir.path(), config()).unwrap();
        let rendered = format!("{db:?}");
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("<redacted>"));
    }
}

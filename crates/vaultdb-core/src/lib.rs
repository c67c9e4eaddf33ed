//! vaultdb-core: embedded, single-file, password-protected table store
//!
//! # Encryption strategy
//! The whole database is one container file. On save every table, schema and
//! row is serialized into a canonical JSON snapshot, zstd-compressed when it
//! is large, and sealed with XChaCha20-Poly1305 under a key derived from the
//! password via Argon2id. Salt and nonce are fresh on every save. The file is
//! replaced with a staged write and rename so a crash never leaves a torn file.
//!
//! A wrong password and a tampered ciphertext are indistinguishable and both
//! surface as [`DatabaseError::Password`]. A file that is not a container at
//! all (bad magic, unknown version) is [`DatabaseError::Malformed`].
//!
//! # Module layout
//! - `value`    : `Value` sum type and `DataType`
//! - `column`   : `ColumnDefinition` and per-value validation
//! - `table`    : in-memory rows, CRUD and predicate scans
//! - `database` : session handle: tables, password, save/load/backup
//! - `snapshot` : canonical plaintext encoding
//! - `container`: header layout, encrypt/decrypt
//! - `crypto`   : Argon2id + XChaCha20-Poly1305 primitives
//! - `storage`  : atomic file replacement
//! - `settings` : KDF cost, password policy, compression threshold
//! - `error`    : unified error type

pub mod column;
pub mod container;
pub mod crypto;
pub mod database;
pub mod error;
pub mod settings;
pub mod snapshot;
pub mod storage;
pub mod table;
pub mod value;

pub use column::ColumnDefinition;
pub use database::{Database, DatabaseInfo, DB_FILE_EXTENSION};
pub use error::{DatabaseError, ErrorKind, Result};
pub use settings::{DatabaseConfig, KdfParams, PasswordPolicy};
pub use table::{Row, RowId, RowView, Table, TableInfo};
pub use value::{DataType, Value};

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("vaultdb.json");
    let config = serde_json::json!({
        "kdf": { "time_cost": 1, "memory_kib": 64, "parallelism": 1 }
    });
    fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
    path
}

fn vaultdb(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vaultdb").unwrap();
    cmd.arg("--config").arg(config);
    cmd.env_remove("VAULTDB_CONFIG");
    cmd
}

/// Creates `shop.pydb` with a `users` table holding Alice and Bob.
fn seeded(dir: &Path, config: &Path) -> PathBuf {
    vaultdb(config)
        .args(["create", "database", "shop", "--password", "secret", "--path"])
        .arg(dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Database created"));
    let db = dir.join("shop.pydb");
    assert!(db.exists());

    vaultdb(config)
        .args(["create", "table"])
        .arg(&db)
        .args([
            "--password",
            "secret",
            "--name",
            "users",
            "--columns",
            r#"{"name": {"type": "string", "nullable": false, "min_length": 1}, "age": "int"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Columns: name, age"));

    for (data, id) in [
        (r#"{"name": "Alice", "age": 30}"#, 1),
        (r#"{"name": "Bob", "age": 22}"#, 2),
    ] {
        vaultdb(config)
            .arg("insert")
            .arg(&db)
            .args(["--password", "secret", "--table", "users", "--data", data])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("id: {id}")));
    }
    db
}

fn select_json(config: &Path, db: &Path, password: &str, extra: &[&str]) -> serde_json::Value {
    let output = vaultdb(config)
        .arg("select")
        .arg(db)
        .args(["--password", password, "--table", "users", "--format", "json"])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn create_insert_select_roundtrip() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let db = seeded(dir.path(), &config);

    let rows = select_json(&config, &db, "secret", &[]);
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["name"], "Alice");
    assert_eq!(rows[1]["age"], 22);

    let filtered = select_json(&config, &db, "secret", &["--where", "name=Bob", "--columns", "age"]);
    assert_eq!(filtered, serde_json::json!([{ "id": 2, "age": 22 }]));

    vaultdb(&config)
        .arg("select")
        .arg(&db)
        .args(["--password", "secret", "--table", "users", "--format", "csv"])
        .assert()
        .success()
        .stdout("id,name,age\n1,Alice,30\n2,Bob,22\n");

    vaultdb(&config)
        .arg("select")
        .arg(&db)
        .args(["--password", "secret", "--table", "users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 2 row(s)"));
}

#[test]
fn wrong_password_fails_without_touching_file() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let db = seeded(dir.path(), &config);
    let before = fs::read(&db).unwrap();

    vaultdb(&config)
        .arg("insert")
        .arg(&db)
        .args(["--password", "nope", "--table", "users", "--data", r#"{"name": "Eve"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication failed"));
    assert_eq!(fs::read(&db).unwrap(), before);
}

#[test]
fn validation_errors_are_reported() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let db = seeded(dir.path(), &config);

    vaultdb(&config)
        .arg("insert")
        .arg(&db)
        .args(["--password", "secret", "--table", "users", "--data", r#"{"name": "", "age": 5}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name"));

    vaultdb(&config)
        .arg("insert")
        .arg(&db)
        .args(["--password", "secret", "--table", "users", "--data", r#"{"name": "Carl", "age": "old"}"#])
        .assert()
        .failure();

    vaultdb(&config)
        .arg("select")
        .arg(&db)
        .args(["--password", "secret", "--table", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));

    assert_eq!(select_json(&config, &db, "secret", &[]).as_array().unwrap().len(), 2);
}

#[test]
fn update_and_delete_report_counts() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let db = seeded(dir.path(), &config);

    vaultdb(&config)
        .arg("update")
        .arg(&db)
        .args(["--password", "secret", "--table", "users"])
        .args(["--data", r#"{"age": 31}"#, "--where", "name=Alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 row(s) updated"));

    vaultdb(&config)
        .arg("delete")
        .arg(&db)
        .args(["--password", "secret", "--table", "users", "--where", "age=22"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 row(s) deleted"));

    let rows = select_json(&config, &db, "secret", &[]);
    assert_eq!(rows, serde_json::json!([{ "id": 1, "name": "Alice", "age": 31 }]));

    vaultdb(&config)
        .arg("delete")
        .arg(&db)
        .args(["--password", "secret", "--table", "users", "--where", "nickname=x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nickname"));
}

#[test]
fn password_change_and_backup() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let db = seeded(dir.path(), &config);

    vaultdb(&config)
        .arg("password")
        .arg(&db)
        .args(["--old-password", "secret", "--new-password", "rotated"])
        .assert()
        .success();

    vaultdb(&config)
        .arg("info")
        .arg(&db)
        .args(["--password", "secret"])
        .assert()
        .failure();

    let backup = dir.path().join("shop-backup.pydb");
    vaultdb(&config)
        .arg("backup")
        .arg(&db)
        .args(["--password", "rotated", "--backup-password", "offsite"])
        .arg("--backup-file")
        .arg(&backup)
        .assert()
        .success();

    assert_eq!(select_json(&config, &backup, "offsite", &[]).as_array().unwrap().len(), 2);

    vaultdb(&config)
        .arg("info")
        .arg(&db)
        .args(["--password", "rotated"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tables: 1"))
        .stdout(predicate::str::contains("users: 2 row(s)"));

    vaultdb(&config)
        .arg("info")
        .arg(&db)
        .args(["--password", "rotated", "--table", "users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Column names: name, age"));
}

#[test]
fn create_database_refuses_to_overwrite() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    seeded(dir.path(), &config);

    vaultdb(&config)
        .args(["create", "database", "shop.pydb", "--password", "other", "--path"])
        .arg(dir.path())
        .assert()
        .failure();
    assert_eq!(select_json(&config, &dir.path().join("shop.pydb"), "secret", &[])[0]["name"], "Alice");
}

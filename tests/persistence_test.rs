#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const USER: &str = "1b4e28ba-2fa1-41d2-883f-0016d3cca427";
const KEY: &str = "6f1c2a9e-3b4d-4c5e-8f6a-7b8c9d0e1f2a";

fn run(db_path: &std::path::Path, rows: &[String]) -> String {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type,user,currency,target_currency,amount,idempotency_key,email,name").unwrap();
    for row in rows {
        writeln!(csv, "{row}").unwrap();
    }

    let output = Command::new(cargo_bin!("remittance-engine"))
        .arg(csv.path())
        .arg("--db-path")
        .arg(db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: keyed deposit
    let stdout1 = run(&db_path, &[format!("deposit,{USER},CLP,,100.0,{KEY},,")]);
    assert!(stdout1.contains(&format!(",{USER},CLP,100.0000,0.0000,100.0000,true")));

    // 2. Second run: the same key is replayed from disk, a new deposit applies
    let stdout2 = run(
        &db_path,
        &[
            format!("deposit,{USER},CLP,,100.0,{KEY},,"),
            format!("deposit,{USER},CLP,,50.0,,,"),
        ],
    );
    assert!(stdout2.contains(&format!(",{USER},CLP,150.0000,0.0000,150.0000,true")));
    assert_eq!(stdout2.lines().count(), 2);
}

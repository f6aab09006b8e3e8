mod application;
mod case;
mod catalog;

use std::fs;
use std::sync::Arc;

use super::config::DbConfig;
use super::factory::DbFactory;
use super::Database;
use crate::config::{CommonConfig, PathSet};

pub fn run_all_tests(db: &Database) {
    application::run_secret_tests(db);
    application::run_application_tests(db);
    application::run_grant_tests(db);

    catalog::run_catalog_grant_tests(db);
    catalog::run_type_tests(db);

    case::run_case_tests(db);
    case::run_status_tests(db);
}

#[test]
fn test_memory() {
    let db = Database::new_test();
    run_all_tests(&db);
}

#[test]
fn test_file() {
    let ps = PathSet::new_test();
    fs::create_dir_all(&ps.data_path).unwrap();
    let path = ps.data_path.join("db-test.db");
    if path.exists() {
        fs::remove_file(&path).unwrap();
    }

    let mut cfg = DbConfig::default();
    cfg.sqlite.path = format!("{}", path.display());
    cfg.complete(&ps).unwrap();
    let db: Arc<Database> = DbFactory::new().build_db(&cfg).unwrap();
    run_all_tests(&db);

    drop(db);
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_rollback() {
    use crate::types::Application;
    use std::collections::BTreeSet;

    let db = Database::new_test();
    let app = Application {
        uuid: "rollback".to_string(),
        label: "rollback".to_string(),
        client_ids: BTreeSet::from(["rollback-client".to_string()]),
        has_all_permissions: false,
    };

    let result: anyhow::Result<()> = db.with_transaction(|tx, _cache| {
        tx.create_application(&app)?;
        anyhow::bail!("abort");
    });
    assert!(result.is_err());

    let found = db
        .with_transaction(|tx, _cache| tx.get_application("rollback"))
        .unwrap();
    assert_eq!(found, None);
}

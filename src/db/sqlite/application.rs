use std::collections::BTreeSet;

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::types::Application;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS application (
    uuid TEXT PRIMARY KEY NOT NULL,
    label TEXT NOT NULL,
    has_all_permissions INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS application_client (
    client_id TEXT PRIMARY KEY NOT NULL,
    application TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_application_client_app ON application_client(application);
"#;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create_application(tx: &Transaction, app: &Application) -> Result<()> {
    let sql = "INSERT INTO application (uuid, label, has_all_permissions) VALUES (?, ?, ?)";
    debug!("Database create_application: {sql}, {app:?}");
    tx.execute(sql, params![app.uuid, app.label, app.has_all_permissions])?;

    insert_client_ids(tx, &app.uuid, &app.client_ids)
}

pub fn update_application(tx: &Transaction, app: &Application) -> Result<()> {
    let sql = "UPDATE application SET label = ?, has_all_permissions = ? WHERE uuid = ?";
    debug!("Database update_application: {sql}, {app:?}");
    tx.execute(sql, params![app.label, app.has_all_permissions, app.uuid])?;

    delete_client_ids(tx, &app.uuid)?;
    insert_client_ids(tx, &app.uuid, &app.client_ids)
}

pub fn delete_application(tx: &Transaction, uuid: &str) -> Result<()> {
    delete_client_ids(tx, uuid)?;

    let sql = "DELETE FROM application WHERE uuid = ?";
    debug!("Database delete_application: {sql}, {uuid}");
    tx.execute(sql, params![uuid])?;
    Ok(())
}

pub fn get_application(tx: &Transaction, uuid: &str) -> Result<Option<Application>> {
    let sql = "SELECT uuid, label, has_all_permissions FROM application WHERE uuid = ?";
    debug!("Database get_application: {sql}, {uuid}");
    let app = tx
        .query_row(sql, params![uuid], |row| {
            Ok(Application {
                uuid: row.get(0)?,
                label: row.get(1)?,
                has_all_permissions: row.get(2)?,
                client_ids: BTreeSet::new(),
            })
        })
        .optional()?;

    match app {
        Some(mut app) => {
            app.client_ids = list_client_ids(tx, &app.uuid)?;
            Ok(Some(app))
        }
        None => Ok(None),
    }
}

pub fn list_applications(tx: &Transaction) -> Result<Vec<Application>> {
    let sql = "SELECT uuid, label, has_all_permissions FROM application ORDER BY label, uuid";
    debug!("Database list_applications: {sql}");
    let mut stmt = tx.prepare(sql)?;
    let mut apps = stmt
        .query_map([], |row| {
            Ok(Application {
                uuid: row.get(0)?,
                label: row.get(1)?,
                has_all_permissions: row.get(2)?,
                client_ids: BTreeSet::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for app in apps.iter_mut() {
        app.client_ids = list_client_ids(tx, &app.uuid)?;
    }
    Ok(apps)
}

pub fn list_client_applications(tx: &Transaction, client_id: &str) -> Result<Vec<Application>> {
    let Some(uuid) = find_client_owner(tx, client_id)? else {
        return Ok(Vec::new());
    };
    Ok(get_application(tx, &uuid)?.into_iter().collect())
}

pub fn find_client_owner(tx: &Transaction, client_id: &str) -> Result<Option<String>> {
    let sql = "SELECT application FROM application_client WHERE client_id = ?";
    debug!("Database find_client_owner: {sql}, {client_id}");
    let owner = tx
        .query_row(sql, params![client_id], |row| row.get(0))
        .optional()?;
    Ok(owner)
}

fn list_client_ids(tx: &Transaction, uuid: &str) -> Result<BTreeSet<String>> {
    let sql = "SELECT client_id FROM application_client WHERE application = ?";
    debug!("Database list_client_ids: {sql}, {uuid}");
    let mut stmt = tx.prepare(sql)?;
    let ids = stmt
        .query_map(params![uuid], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(ids)
}

fn insert_client_ids(tx: &Transaction, uuid: &str, client_ids: &BTreeSet<String>) -> Result<()> {
    let sql = "INSERT INTO application_client (client_id, application) VALUES (?, ?)";
    for client_id in client_ids {
        debug!("Database insert_client_id: {sql}, {client_id}, {uuid}");
        tx.execute(sql, params![client_id, uuid])?;
    }
    Ok(())
}

fn delete_client_ids(tx: &Transaction, uuid: &str) -> Result<()> {
    let sql = "DELETE FROM application_client WHERE application = ?";
    debug!("Database delete_client_ids: {sql}, {uuid}");
    tx.execute(sql, params![uuid])?;
    Ok(())
}

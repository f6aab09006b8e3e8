use anyhow::{Context, Result};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use crate::db::sql::Select;
use crate::types::{Component, Confidentiality, Grant, ScopeSet, TypeRef};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS app_grant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    application TEXT NOT NULL,
    component TEXT NOT NULL,
    scopes TEXT NOT NULL,
    type_ref TEXT,
    max_confidentiality TEXT
);
CREATE INDEX IF NOT EXISTS idx_app_grant_lookup ON app_grant(application, component);
"#;

const FIELDS: [&str; 6] = [
    "id",
    "application",
    "component",
    "scopes",
    "type_ref",
    "max_confidentiality",
];

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create_grant(tx: &Transaction, grant: &Grant) -> Result<Grant> {
    let sql = r#"
    INSERT INTO app_grant (application, component, scopes, type_ref, max_confidentiality)
    VALUES (?, ?, ?, ?, ?)
    "#;
    debug!("Database create_grant: {sql}, {grant:?}");
    let scopes = serde_json::to_string(&grant.scopes)?;
    tx.execute(
        sql,
        params![
            grant.application,
            grant.component.as_str(),
            scopes,
            grant.type_ref.as_ref().map(|r| r.key()),
            grant.max_confidentiality.map(|c| c.as_str()),
        ],
    )?;

    let mut created = grant.clone();
    created.id = tx.last_insert_rowid() as u64;
    Ok(created)
}

pub fn delete_grant(tx: &Transaction, id: u64) -> Result<Option<Grant>> {
    let mut select = Select::new(FIELDS.to_vec(), "app_grant");
    select.add_where("id = ?", Value::Integer(id as i64));
    let (sql, values) = select.build();
    debug!("Database delete_grant: {sql}, {values:?}");
    let raw = tx
        .query_row(&sql, params_from_iter(values), RawGrant::from_row)
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let sql = "DELETE FROM app_grant WHERE id = ?";
    tx.execute(sql, params![id as i64])?;
    Ok(Some(raw.into_grant()?))
}

pub fn delete_application_grants(tx: &Transaction, application: &str) -> Result<usize> {
    let sql = "DELETE FROM app_grant WHERE application = ?";
    debug!("Database delete_application_grants: {sql}, {application}");
    let count = tx.execute(sql, params![application])?;
    Ok(count)
}

pub fn list_grants(
    tx: &Transaction,
    application: &str,
    component: Option<Component>,
) -> Result<Vec<Grant>> {
    let mut select = Select::new(FIELDS.to_vec(), "app_grant");
    select.add_where("application = ?", Value::Text(application.to_string()));
    if let Some(component) = component {
        select.add_where("component = ?", Value::Text(component.as_str().to_string()));
    }
    select.add_order_by("id");

    let (sql, values) = select.build();
    debug!("Database list_grants: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let raws = stmt
        .query_map(params_from_iter(values), RawGrant::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raws.into_iter().map(RawGrant::into_grant).collect()
}

struct RawGrant {
    id: i64,
    application: String,
    component: String,
    scopes: String,
    type_ref: Option<String>,
    max_confidentiality: Option<String>,
}

impl RawGrant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            application: row.get(1)?,
            component: row.get(2)?,
            scopes: row.get(3)?,
            type_ref: row.get(4)?,
            max_confidentiality: row.get(5)?,
        })
    }

    fn into_grant(self) -> Result<Grant> {
        let scopes: ScopeSet =
            serde_json::from_str(&self.scopes).context("decode grant scopes")?;
        let max_confidentiality = match self.max_confidentiality {
            Some(raw) => Some(raw.parse::<Confidentiality>()?),
            None => None,
        };
        Ok(Grant {
            id: self.id as u64,
            application: self.application,
            component: self.component.parse()?,
            scopes,
            type_ref: self.type_ref.as_deref().map(TypeRef::from_key),
            max_confidentiality,
        })
    }
}

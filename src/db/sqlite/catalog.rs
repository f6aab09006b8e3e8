use anyhow::{Context, Result};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use crate::catalog::{TypeDefinition, TypeRelations};
use crate::db::sql::Select;
use crate::types::{CatalogGrant, Component, Confidentiality, ScopeSet, TypeRef};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_grant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    application TEXT NOT NULL,
    component TEXT NOT NULL,
    catalog TEXT NOT NULL,
    scopes TEXT NOT NULL,
    max_confidentiality TEXT,
    UNIQUE(application, component, catalog)
);
CREATE INDEX IF NOT EXISTS idx_catalog_grant_catalog ON catalog_grant(catalog, component);
CREATE TABLE IF NOT EXISTS type_definition (
    reference TEXT PRIMARY KEY NOT NULL,
    component TEXT NOT NULL,
    catalog TEXT,
    relations TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_type_definition_catalog ON type_definition(catalog, component);
"#;

const GRANT_FIELDS: [&str; 6] = [
    "id",
    "application",
    "component",
    "catalog",
    "scopes",
    "max_confidentiality",
];

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create_catalog_grant(tx: &Transaction, grant: &CatalogGrant) -> Result<CatalogGrant> {
    let sql = r#"
    INSERT INTO catalog_grant (application, component, catalog, scopes, max_confidentiality)
    VALUES (?, ?, ?, ?, ?)
    "#;
    debug!("Database create_catalog_grant: {sql}, {grant:?}");
    let scopes = serde_json::to_string(&grant.scopes)?;
    tx.execute(
        sql,
        params![
            grant.application,
            grant.component.as_str(),
            grant.catalog.key(),
            scopes,
            grant.max_confidentiality.map(|c| c.as_str()),
        ],
    )?;

    let mut created = grant.clone();
    created.id = tx.last_insert_rowid() as u64;
    Ok(created)
}

pub fn delete_catalog_grant(tx: &Transaction, id: u64) -> Result<Option<CatalogGrant>> {
    let mut select = Select::new(GRANT_FIELDS.to_vec(), "catalog_grant");
    select.add_where("id = ?", Value::Integer(id as i64));
    let (sql, values) = select.build();
    debug!("Database delete_catalog_grant: {sql}, {values:?}");
    let raw = tx
        .query_row(&sql, params_from_iter(values), RawCatalogGrant::from_row)
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    tx.execute("DELETE FROM catalog_grant WHERE id = ?", params![id as i64])?;
    Ok(Some(raw.into_grant()?))
}

pub fn delete_application_catalog_grants(tx: &Transaction, application: &str) -> Result<usize> {
    let sql = "DELETE FROM catalog_grant WHERE application = ?";
    debug!("Database delete_application_catalog_grants: {sql}, {application}");
    let count = tx.execute(sql, params![application])?;
    Ok(count)
}

pub fn list_catalog_grants(
    tx: &Transaction,
    application: &str,
    component: Option<Component>,
) -> Result<Vec<CatalogGrant>> {
    let mut select = Select::new(GRANT_FIELDS.to_vec(), "catalog_grant");
    select.add_where("application = ?", Value::Text(application.to_string()));
    if let Some(component) = component {
        select.add_where("component = ?", Value::Text(component.as_str().to_string()));
    }
    select.add_order_by("id");

    let (sql, values) = select.build();
    debug!("Database list_catalog_grants: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let raws = stmt
        .query_map(params_from_iter(values), RawCatalogGrant::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raws.into_iter().map(RawCatalogGrant::into_grant).collect()
}

pub fn list_catalog_grant_holders(
    tx: &Transaction,
    catalog: &TypeRef,
    component: Component,
) -> Result<Vec<String>> {
    let sql = r#"
    SELECT DISTINCT application FROM catalog_grant
    WHERE catalog = ? AND component = ?
    ORDER BY application
    "#;
    debug!("Database list_catalog_grant_holders: {sql}, {catalog}, {component}");
    let mut stmt = tx.prepare(sql)?;
    let holders = stmt
        .query_map(params![catalog.key(), component.as_str()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(holders)
}

pub fn create_type(tx: &Transaction, def: &TypeDefinition) -> Result<()> {
    let sql = r#"
    INSERT INTO type_definition (reference, component, catalog, relations)
    VALUES (?, ?, ?, ?)
    "#;
    debug!("Database create_type: {sql}, {}", def.reference);
    let relations = serde_json::to_string(&def.relations)?;
    tx.execute(
        sql,
        params![
            def.reference.key(),
            def.component.as_str(),
            def.catalog.as_ref().map(|c| c.key()),
            relations,
        ],
    )?;
    Ok(())
}

pub fn get_type(tx: &Transaction, reference: &TypeRef) -> Result<Option<TypeDefinition>> {
    let sql = "SELECT component, catalog, relations FROM type_definition WHERE reference = ?";
    debug!("Database get_type: {sql}, {reference}");
    let raw = tx
        .query_row(sql, params![reference.key()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .optional()?;

    let Some((component, catalog, relations)) = raw else {
        return Ok(None);
    };
    let relations: TypeRelations =
        serde_json::from_str(&relations).context("decode type relations")?;
    Ok(Some(TypeDefinition {
        reference: reference.clone(),
        component: component.parse()?,
        catalog: catalog.as_deref().map(TypeRef::from_key),
        relations,
    }))
}

pub fn list_catalog_types(
    tx: &Transaction,
    catalog: &TypeRef,
    component: Component,
) -> Result<Vec<TypeRef>> {
    let mut select = Select::new(vec!["reference"], "type_definition");
    select.add_where("catalog = ?", Value::Text(catalog.key().to_string()));
    select.add_where("component = ?", Value::Text(component.as_str().to_string()));
    select.add_order_by("reference");

    let (sql, values) = select.build();
    debug!("Database list_catalog_types: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let keys = stmt
        .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys.iter().map(|k| TypeRef::from_key(k)).collect())
}

struct RawCatalogGrant {
    id: i64,
    application: String,
    component: String,
    catalog: String,
    scopes: String,
    max_confidentiality: Option<String>,
}

impl RawCatalogGrant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            application: row.get(1)?,
            component: row.get(2)?,
            catalog: row.get(3)?,
            scopes: row.get(4)?,
            max_confidentiality: row.get(5)?,
        })
    }

    fn into_grant(self) -> Result<CatalogGrant> {
        let scopes: ScopeSet =
            serde_json::from_str(&self.scopes).context("decode catalog grant scopes")?;
        let max_confidentiality = match self.max_confidentiality {
            Some(raw) => Some(raw.parse::<Confidentiality>()?),
            None => None,
        };
        Ok(CatalogGrant {
            id: self.id as u64,
            application: self.application,
            component: self.component.parse()?,
            catalog: TypeRef::from_key(&self.catalog),
            scopes,
            max_confidentiality,
        })
    }
}

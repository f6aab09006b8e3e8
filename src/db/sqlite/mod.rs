mod application;
mod case;
mod catalog;
mod grant;
mod secret;

pub mod config;
pub mod factory;

use std::path::Path;

use anyhow::Result;
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;

use crate::catalog::TypeDefinition;
use crate::types::{Application, CatalogGrant, Component, Grant, TypeRef};

use super::{CaseRecord, Connection, ResultRecord, StatusRecord, Transaction};

/// SQLite-based database implementation, file-backed or in-memory.
pub struct Sqlite {
    conn: RawConnection,
}

/// SQLite transaction for executing database operations
pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl Sqlite {
    /// Opens a SQLite database file. Creates one if it doesn't exist.
    /// Also initializes all required database tables.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates a new in-memory database. Content is lost when the program exits.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    fn init_tables(conn: &RawConnection) -> Result<()> {
        secret::create_tables(conn)?;
        application::create_tables(conn)?;
        grant::create_tables(conn)?;
        catalog::create_tables(conn)?;
        case::create_tables(conn)?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for Sqlite {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn save_secret(&self, client_id: &str, secret: &str) -> Result<()> {
        secret::save_secret(&self.tx, client_id, secret)
    }

    fn get_secret(&self, client_id: &str) -> Result<Option<String>> {
        secret::get_secret(&self.tx, client_id)
    }

    fn create_application(&self, app: &Application) -> Result<()> {
        application::create_application(&self.tx, app)
    }

    fn update_application(&self, app: &Application) -> Result<()> {
        application::update_application(&self.tx, app)
    }

    fn delete_application(&self, uuid: &str) -> Result<()> {
        grant::delete_application_grants(&self.tx, uuid)?;
        catalog::delete_application_catalog_grants(&self.tx, uuid)?;
        application::delete_application(&self.tx, uuid)
    }

    fn get_application(&self, uuid: &str) -> Result<Option<Application>> {
        application::get_application(&self.tx, uuid)
    }

    fn list_applications(&self) -> Result<Vec<Application>> {
        application::list_applications(&self.tx)
    }

    fn list_client_applications(&self, client_id: &str) -> Result<Vec<Application>> {
        application::list_client_applications(&self.tx, client_id)
    }

    fn find_client_owner(&self, client_id: &str) -> Result<Option<String>> {
        application::find_client_owner(&self.tx, client_id)
    }

    fn create_grant(&self, grant: &Grant) -> Result<Grant> {
        grant::create_grant(&self.tx, grant)
    }

    fn delete_grant(&self, id: u64) -> Result<Option<Grant>> {
        grant::delete_grant(&self.tx, id)
    }

    fn delete_application_grants(&self, application: &str) -> Result<usize> {
        grant::delete_application_grants(&self.tx, application)
    }

    fn list_grants(&self, application: &str, component: Option<Component>) -> Result<Vec<Grant>> {
        grant::list_grants(&self.tx, application, component)
    }

    fn create_catalog_grant(&self, grant: &CatalogGrant) -> Result<CatalogGrant> {
        catalog::create_catalog_grant(&self.tx, grant)
    }

    fn delete_catalog_grant(&self, id: u64) -> Result<Option<CatalogGrant>> {
        catalog::delete_catalog_grant(&self.tx, id)
    }

    fn delete_application_catalog_grants(&self, application: &str) -> Result<usize> {
        catalog::delete_application_catalog_grants(&self.tx, application)
    }

    fn list_catalog_grants(
        &self,
        application: &str,
        component: Option<Component>,
    ) -> Result<Vec<CatalogGrant>> {
        catalog::list_catalog_grants(&self.tx, application, component)
    }

    fn list_catalog_grant_holders(
        &self,
        catalog: &TypeRef,
        component: Component,
    ) -> Result<Vec<String>> {
        catalog::list_catalog_grant_holders(&self.tx, catalog, component)
    }

    fn create_type(&self, def: &TypeDefinition) -> Result<()> {
        catalog::create_type(&self.tx, def)
    }

    fn get_type(&self, reference: &TypeRef) -> Result<Option<TypeDefinition>> {
        catalog::get_type(&self.tx, reference)
    }

    fn list_catalog_types(
        &self,
        catalog: &TypeRef,
        component: Component,
    ) -> Result<Vec<TypeRef>> {
        catalog::list_catalog_types(&self.tx, catalog, component)
    }

    fn create_case(&self, case: &CaseRecord) -> Result<()> {
        case::create_case(&self.tx, case)
    }

    fn update_case(&self, case: &CaseRecord) -> Result<()> {
        case::update_case(&self.tx, case)
    }

    fn get_case(&self, id: &str) -> Result<Option<CaseRecord>> {
        case::get_case(&self.tx, id)
    }

    fn list_sub_cases(&self, main_case: &str) -> Result<Vec<CaseRecord>> {
        case::list_sub_cases(&self.tx, main_case)
    }

    fn create_status(&self, status: &StatusRecord) -> Result<StatusRecord> {
        case::create_status(&self.tx, status)
    }

    fn list_statuses(&self, case_id: &str) -> Result<Vec<StatusRecord>> {
        case::list_statuses(&self.tx, case_id)
    }

    fn save_result(&self, result: &ResultRecord) -> Result<()> {
        case::save_result(&self.tx, result)
    }

    fn get_result(&self, case_id: &str) -> Result<Option<ResultRecord>> {
        case::get_result(&self.tx, case_id)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

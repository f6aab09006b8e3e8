mod sql;
mod sqlite;

#[cfg(test)]
mod tests;

pub mod cache;
pub mod config;
pub mod factory;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use cache::{Cache, DisableCache, UnionCache};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlite::{Sqlite, SqliteTransaction};

use crate::catalog::TypeDefinition;
use crate::guard::lifecycle::Lifecycle;
use crate::types::{Application, CatalogGrant, Component, Confidentiality, Grant, TypeRef};

/// Database connection trait that can create transactions
pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    /// Creates a new transaction from the connection
    fn transaction(&'a mut self) -> Result<T>;
}

/// Database transaction trait that defines all database operations
pub trait Transaction {
    // Client secret operations
    /// Stores (or replaces) the shared secret of a client
    fn save_secret(&self, client_id: &str, secret: &str) -> Result<()>;
    /// Looks up the shared secret of a client
    fn get_secret(&self, client_id: &str) -> Result<Option<String>>;

    // Application operations
    /// Creates an application together with its client ids
    fn create_application(&self, app: &Application) -> Result<()>;
    /// Replaces label, flags and client ids of an application
    fn update_application(&self, app: &Application) -> Result<()>;
    /// Deletes an application with all of its grants and catalog grants
    fn delete_application(&self, uuid: &str) -> Result<()>;
    /// Retrieves an application by uuid
    fn get_application(&self, uuid: &str) -> Result<Option<Application>>;
    /// Lists all applications
    fn list_applications(&self) -> Result<Vec<Application>>;
    /// Lists the applications a client id belongs to
    fn list_client_applications(&self, client_id: &str) -> Result<Vec<Application>>;
    /// Returns the uuid of the application owning a client id
    fn find_client_owner(&self, client_id: &str) -> Result<Option<String>>;

    // Grant operations
    /// Creates a grant, returning it with its assigned id
    fn create_grant(&self, grant: &Grant) -> Result<Grant>;
    /// Deletes a grant by id, returning the deleted grant
    fn delete_grant(&self, id: u64) -> Result<Option<Grant>>;
    /// Deletes all grants of an application
    fn delete_application_grants(&self, application: &str) -> Result<usize>;
    /// Lists the grants of an application, optionally for one component
    fn list_grants(&self, application: &str, component: Option<Component>) -> Result<Vec<Grant>>;

    // Catalog grant operations
    /// Creates a catalog grant, returning it with its assigned id
    fn create_catalog_grant(&self, grant: &CatalogGrant) -> Result<CatalogGrant>;
    /// Deletes a catalog grant by id, returning the deleted grant
    fn delete_catalog_grant(&self, id: u64) -> Result<Option<CatalogGrant>>;
    /// Deletes all catalog grants of an application
    fn delete_application_catalog_grants(&self, application: &str) -> Result<usize>;
    /// Lists the catalog grants of an application, optionally for one component
    fn list_catalog_grants(
        &self,
        application: &str,
        component: Option<Component>,
    ) -> Result<Vec<CatalogGrant>>;
    /// Lists the applications holding a catalog grant on (catalog, component)
    fn list_catalog_grant_holders(
        &self,
        catalog: &TypeRef,
        component: Component,
    ) -> Result<Vec<String>>;

    // Type operations
    /// Stores a local type definition
    fn create_type(&self, def: &TypeDefinition) -> Result<()>;
    /// Retrieves a local type definition
    fn get_type(&self, reference: &TypeRef) -> Result<Option<TypeDefinition>>;
    /// Lists the types of one component within a catalog
    fn list_catalog_types(&self, catalog: &TypeRef, component: Component)
        -> Result<Vec<TypeRef>>;

    // Case operations
    /// Creates a case state record
    fn create_case(&self, case: &CaseRecord) -> Result<()>;
    /// Replaces a case state record
    fn update_case(&self, case: &CaseRecord) -> Result<()>;
    /// Retrieves a case state record
    fn get_case(&self, id: &str) -> Result<Option<CaseRecord>>;
    /// Lists the sub-cases of a main case
    fn list_sub_cases(&self, main_case: &str) -> Result<Vec<CaseRecord>>;
    /// Records a status, returning it with its assigned id
    fn create_status(&self, status: &StatusRecord) -> Result<StatusRecord>;
    /// Lists the statuses of a case, oldest first
    fn list_statuses(&self, case_id: &str) -> Result<Vec<StatusRecord>>;
    /// Attaches (or replaces) the result of a case
    fn save_result(&self, result: &ResultRecord) -> Result<()>;
    /// Retrieves the result of a case
    fn get_result(&self, case_id: &str) -> Result<Option<ResultRecord>>;

    /// Commits the transaction
    fn commit(self) -> Result<()>;
    /// Rolls back the transaction
    fn rollback(self) -> Result<()>;
}

/// Persisted state of a case, the part of a case the state guard reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub case_type: TypeRef,
    pub confidentiality: Confidentiality,
    pub lifecycle: Lifecycle,
    /// Set exactly when the case is closed.
    pub end_date: Option<NaiveDate>,
    pub main_case: Option<String>,
    pub suspended: bool,
    pub suspension_reason: Option<String>,
    /// Sticky: stays set after the suspension is lifted.
    pub ever_suspended: bool,
    pub archive_nomination: Option<String>,
    pub archive_action_date: Option<NaiveDate>,
    /// Case properties (eigenschappen) by name.
    pub properties: BTreeMap<String, String>,
    /// Dates of decisions taken on the case.
    pub decisions: Vec<DecisionDates>,
    /// End dates of related cases.
    pub related_end_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionDates {
    pub effective_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

/// Record structure for a recorded status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub id: u64,
    pub case_id: String,
    pub status_type: TypeRef,
    /// When the status was set, unique per case.
    pub set_at: DateTime<Utc>,
    /// Copied from the status-type when recorded.
    pub is_final: bool,
}

/// Record structure for the result attached to a case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub case_id: String,
    pub result_type: TypeRef,
}

/// Grants of one application for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    pub grants: Vec<Grant>,
    pub catalog_grants: Vec<CatalogGrant>,
}

impl CaseRecord {
    pub fn new(id: impl Into<String>, case_type: TypeRef, confidentiality: Confidentiality) -> Self {
        Self {
            id: id.into(),
            case_type,
            confidentiality,
            lifecycle: Lifecycle::New,
            end_date: None,
            main_case: None,
            suspended: false,
            suspension_reason: None,
            ever_suspended: false,
            archive_nomination: None,
            archive_action_date: None,
            properties: BTreeMap::new(),
            decisions: Vec::new(),
            related_end_dates: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_date.is_some()
    }
}

/// Main database structure supporting multiple backend implementations
pub struct Database {
    ctx: Mutex<DatabaseContext>,
}

/// Enum representing different supported database connections
pub enum UnionConnection {
    /// SQLite database connection
    Sqlite(Sqlite),
}

/// Transaction of a [`UnionConnection`]
pub enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

struct DatabaseContext {
    conn: RefCell<UnionConnection>,
    cache: Option<UnionCache>,
    no_cache: DisableCache,
}

impl Database {
    /// Creates a new database instance with optional caching
    pub fn new(conn: UnionConnection, cache: Option<UnionCache>) -> Self {
        Self {
            ctx: Mutex::new(DatabaseContext {
                conn: RefCell::new(conn),
                cache,
                no_cache: DisableCache,
            }),
        }
    }

    /// In-memory SQLite database with the memory cache enabled.
    pub fn memory() -> Result<Self> {
        let conn = UnionConnection::Sqlite(Sqlite::memory()?);
        let cache = UnionCache::Memory(cache::MemoryCache::new());
        Ok(Self::new(conn, Some(cache)))
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::memory().unwrap()
    }

    /// Executes a function within a transaction context.
    ///
    /// The transaction is committed when `f` returns `Ok` and rolled back
    /// otherwise. `f` receives the transaction and the cache; when caching is
    /// disabled it receives a no-op cache.
    ///
    /// All reads inside one call observe the same snapshot: the connection is
    /// held exclusively for the whole closure.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction, &dyn Cache) -> Result<T>,
    {
        let ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        let mut conn = ctx.conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = if let Some(ref cache) = ctx.cache {
            f(&tx, cache)
        } else {
            f(&tx, &ctx.no_cache)
        };

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(sqlite) => sqlite.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn save_secret(&self, client_id: &str, secret: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.save_secret(client_id, secret),
        }
    }

    fn get_secret(&self, client_id: &str) -> Result<Option<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_secret(client_id),
        }
    }

    fn create_application(&self, app: &Application) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_application(app),
        }
    }

    fn update_application(&self, app: &Application) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_application(app),
        }
    }

    fn delete_application(&self, uuid: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_application(uuid),
        }
    }

    fn get_application(&self, uuid: &str) -> Result<Option<Application>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_application(uuid),
        }
    }

    fn list_applications(&self) -> Result<Vec<Application>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_applications(),
        }
    }

    fn list_client_applications(&self, client_id: &str) -> Result<Vec<Application>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_client_applications(client_id),
        }
    }

    fn find_client_owner(&self, client_id: &str) -> Result<Option<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.find_client_owner(client_id),
        }
    }

    fn create_grant(&self, grant: &Grant) -> Result<Grant> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_grant(grant),
        }
    }

    fn delete_grant(&self, id: u64) -> Result<Option<Grant>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_grant(id),
        }
    }

    fn delete_application_grants(&self, application: &str) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_application_grants(application),
        }
    }

    fn list_grants(&self, application: &str, component: Option<Component>) -> Result<Vec<Grant>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_grants(application, component),
        }
    }

    fn create_catalog_grant(&self, grant: &CatalogGrant) -> Result<CatalogGrant> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_catalog_grant(grant),
        }
    }

    fn delete_catalog_grant(&self, id: u64) -> Result<Option<CatalogGrant>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_catalog_grant(id),
        }
    }

    fn delete_application_catalog_grants(&self, application: &str) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_application_catalog_grants(application),
        }
    }

    fn list_catalog_grants(
        &self,
        application: &str,
        component: Option<Component>,
    ) -> Result<Vec<CatalogGrant>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_catalog_grants(application, component),
        }
    }

    fn list_catalog_grant_holders(
        &self,
        catalog: &TypeRef,
        component: Component,
    ) -> Result<Vec<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_catalog_grant_holders(catalog, component),
        }
    }

    fn create_type(&self, def: &TypeDefinition) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_type(def),
        }
    }

    fn get_type(&self, reference: &TypeRef) -> Result<Option<TypeDefinition>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_type(reference),
        }
    }

    fn list_catalog_types(
        &self,
        catalog: &TypeRef,
        component: Component,
    ) -> Result<Vec<TypeRef>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_catalog_types(catalog, component),
        }
    }

    fn create_case(&self, case: &CaseRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_case(case),
        }
    }

    fn update_case(&self, case: &CaseRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_case(case),
        }
    }

    fn get_case(&self, id: &str) -> Result<Option<CaseRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_case(id),
        }
    }

    fn list_sub_cases(&self, main_case: &str) -> Result<Vec<CaseRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_sub_cases(main_case),
        }
    }

    fn create_status(&self, status: &StatusRecord) -> Result<StatusRecord> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_status(status),
        }
    }

    fn list_statuses(&self, case_id: &str) -> Result<Vec<StatusRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_statuses(case_id),
        }
    }

    fn save_result(&self, result: &ResultRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.save_result(result),
        }
    }

    fn get_result(&self, case_id: &str) -> Result<Option<ResultRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_result(case_id),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}

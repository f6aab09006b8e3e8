use std::sync::Arc;

use anyhow::Result;

use super::cache::factory::CacheFactory;
use super::config::{DbConfig, DbType};
use super::sqlite::factory::SqliteFactory;
use super::{Database, UnionConnection};

pub struct DbFactory;

impl DbFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the database and, when enabled, its cache.
    pub fn build_db(&self, cfg: &DbConfig) -> Result<Arc<Database>> {
        let conn = match cfg.name {
            DbType::Sqlite => {
                let sqlite = SqliteFactory::new().build_sqlite(&cfg.sqlite)?;
                UnionConnection::Sqlite(sqlite)
            }
        };

        let cache = CacheFactory::new().build_cache(&cfg.cache)?;
        Ok(Arc::new(Database::new(conn, cache)))
    }
}

mod memory;

#[cfg(test)]
mod tests;

pub mod config;
pub mod factory;

use anyhow::Result;
pub use memory::MemoryCache;

use crate::types::{Application, Component};

use super::GrantSet;

/// Read-through cache in front of the authorization tables.
///
/// Entries are written by readers after a miss and dropped by writers inside
/// the same transaction that changes the underlying rows.
pub trait Cache {
    fn get_client_applications(&self, client_id: &str) -> Result<Option<Vec<Application>>>;
    fn save_client_applications(&self, client_id: &str, apps: Vec<Application>) -> Result<()>;

    fn get_grant_set(&self, application: &str, component: Component) -> Result<Option<GrantSet>>;
    fn save_grant_set(&self, application: &str, component: Component, set: GrantSet)
        -> Result<()>;

    /// Drops everything derived from one application: its grant sets for all
    /// components and every client lookup.
    fn invalidate_application(&self, application: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

pub enum UnionCache {
    Memory(MemoryCache),
}

impl Cache for UnionCache {
    fn get_client_applications(&self, client_id: &str) -> Result<Option<Vec<Application>>> {
        match self {
            Self::Memory(cache) => cache.get_client_applications(client_id),
        }
    }

    fn save_client_applications(&self, client_id: &str, apps: Vec<Application>) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_client_applications(client_id, apps),
        }
    }

    fn get_grant_set(&self, application: &str, component: Component) -> Result<Option<GrantSet>> {
        match self {
            Self::Memory(cache) => cache.get_grant_set(application, component),
        }
    }

    fn save_grant_set(
        &self,
        application: &str,
        component: Component,
        set: GrantSet,
    ) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_grant_set(application, component, set),
        }
    }

    fn invalidate_application(&self, application: &str) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.invalidate_application(application),
        }
    }

    fn clear(&self) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.clear(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DisableCache;

impl Cache for DisableCache {
    fn get_client_applications(&self, _client_id: &str) -> Result<Option<Vec<Application>>> {
        Ok(None)
    }

    fn save_client_applications(&self, _client_id: &str, _apps: Vec<Application>) -> Result<()> {
        Ok(())
    }

    fn get_grant_set(
        &self,
        _application: &str,
        _component: Component,
    ) -> Result<Option<GrantSet>> {
        Ok(None)
    }

    fn save_grant_set(
        &self,
        _application: &str,
        _component: Component,
        _set: GrantSet,
    ) -> Result<()> {
        Ok(())
    }

    fn invalidate_application(&self, _application: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;

use crate::db::GrantSet;
use crate::types::{Application, Component};

use super::Cache;

/// Plain maps guarded by the database lock. Entries never expire; writers
/// invalidate them.
pub struct MemoryCache {
    client_apps: RefCell<HashMap<String, Vec<Application>>>,
    grant_sets: RefCell<HashMap<(String, Component), GrantSet>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            client_apps: RefCell::new(HashMap::new()),
            grant_sets: RefCell::new(HashMap::new()),
        }
    }
}

impl Cache for MemoryCache {
    fn get_client_applications(&self, client_id: &str) -> Result<Option<Vec<Application>>> {
        Ok(self.client_apps.borrow().get(client_id).cloned())
    }

    fn save_client_applications(&self, client_id: &str, apps: Vec<Application>) -> Result<()> {
        self.client_apps
            .borrow_mut()
            .insert(client_id.to_string(), apps);
        Ok(())
    }

    fn get_grant_set(&self, application: &str, component: Component) -> Result<Option<GrantSet>> {
        let key = (application.to_string(), component);
        Ok(self.grant_sets.borrow().get(&key).cloned())
    }

    fn save_grant_set(
        &self,
        application: &str,
        component: Component,
        set: GrantSet,
    ) -> Result<()> {
        self.grant_sets
            .borrow_mut()
            .insert((application.to_string(), component), set);
        Ok(())
    }

    fn invalidate_application(&self, application: &str) -> Result<()> {
        self.grant_sets
            .borrow_mut()
            .retain(|(app, _), _| app != application);
        // Client ids may have moved between applications.
        self.client_apps.borrow_mut().clear();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.grant_sets.borrow_mut().clear();
        self.client_apps.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::cache::tests::run_all_cache_tests;

    use super::*;

    #[test]
    fn test_memory() {
        let cache = MemoryCache::new();
        run_all_cache_tests(&cache);
    }
}

use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::db::Database;
use crate::types::Application;

/// Maps a verified client id to the applications carrying it.
pub struct ApplicationResolver {
    db: Arc<Database>,
}

impl ApplicationResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn resolve(&self, client_id: &str) -> Result<Vec<Application>> {
        self.db.with_transaction(|tx, cache| {
            if let Some(apps) = cache.get_client_applications(client_id)? {
                return Ok(apps);
            }

            let apps = tx.list_client_applications(client_id)?;
            debug!(
                "Client {client_id} resolved to applications {:?}",
                apps.iter().map(|a| a.uuid.as_str()).collect::<Vec<_>>()
            );
            cache.save_client_applications(client_id, apps.clone())?;
            Ok(apps)
        })
    }
}

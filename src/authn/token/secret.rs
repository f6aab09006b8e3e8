use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::db::Database;

/// Lookup of the symmetric secret bound to a client id.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, client_id: &str) -> Result<Option<String>>;
}

pub struct DbSecretStore {
    db: Arc<Database>,
}

impl DbSecretStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl SecretStore for DbSecretStore {
    fn get_secret(&self, client_id: &str) -> Result<Option<String>> {
        self.db
            .with_transaction(|tx, _cache| tx.get_secret(client_id))
    }
}

impl SecretStore for BTreeMap<String, String> {
    fn get_secret(&self, client_id: &str) -> Result<Option<String>> {
        Ok(self.get(client_id).cloned())
    }
}

/// Writes the configured secrets into storage, replacing stored ones.
pub fn seed_secrets(db: &Database, secrets: &BTreeMap<String, String>) -> Result<()> {
    if secrets.is_empty() {
        return Ok(());
    }
    db.with_transaction(|tx, _cache| {
        for (client_id, secret) in secrets.iter() {
            tx.save_secret(client_id, secret)?;
        }
        Ok(())
    })?;
    info!("Seeded {} client secret(s) from config", secrets.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_secret_store() {
        let db = Arc::new(Database::new_test());
        let secrets = BTreeMap::from([
            ("client-a".to_string(), "secret-a".to_string()),
            ("client-b".to_string(), "secret-b".to_string()),
        ]);
        seed_secrets(&db, &secrets).unwrap();

        let store = DbSecretStore::new(db);
        assert_eq!(
            store.get_secret("client-a").unwrap(),
            Some("secret-a".to_string())
        );
        assert_eq!(store.get_secret("client-c").unwrap(), None);
    }
}

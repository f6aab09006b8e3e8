use std::sync::{Arc, RwLock};

use log::info;

use crate::authn::config::AuthnConfig;
use crate::authz::config::AuthzConfig;
use crate::guard::config::GuardConfig;
use crate::server::config::ServerConfig;

/// The runtime-tunable part of the server config, frozen for the lifetime of
/// one request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub public_base_url: String,
    pub authn: AuthnConfig,
    pub authz: AuthzConfig,
    pub guard: GuardConfig,
}

impl Settings {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self {
            public_base_url: cfg.public_base_url.clone(),
            authn: cfg.authn.clone(),
            authz: cfg.authz.clone(),
            guard: cfg.guard.clone(),
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        use crate::config::{CommonConfig, PathSet};

        let ps = PathSet::new_test();
        let mut authn = AuthnConfig::default();
        authn.complete(&ps).unwrap();
        let mut authz = AuthzConfig::default();
        authz.complete(&ps).unwrap();
        let mut guard = GuardConfig::default();
        guard.complete(&ps).unwrap();

        Self {
            public_base_url: String::from("http://localhost:8000"),
            authn,
            authz,
            guard,
        }
    }
}

/// Holds the current [`Settings`]. Readers take a snapshot; a reload swaps
/// the snapshot without touching the ones already handed out.
pub struct SettingsHandle {
    current: RwLock<Arc<Settings>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        let current = match self.current.read() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&current)
    }

    pub fn replace(&self, settings: Settings) {
        let mut current = match self.current.write() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = Arc::new(settings);
        info!("Settings replaced");
    }
}

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TypesConfig {
    /// Lifetime of a fetched remote type. Default 600.
    #[serde(default = "TypesConfig::default_type_cache_ttl_seconds")]
    pub type_cache_ttl_seconds: u64,

    /// Hard timeout of one remote fetch. Default 5.
    #[serde(default = "TypesConfig::default_type_fetch_timeout_seconds")]
    pub type_fetch_timeout_seconds: u64,

    /// Remote catalog APIs types may be fetched from. URLs outside every
    /// `api_root` are never fetched.
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_root: String,

    /// Credentials used to sign the bearer token sent to this service.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

const MAX_TYPE_CACHE_TTL_SECONDS: u64 = 60 * 60 * 24;
const MIN_TYPE_FETCH_TIMEOUT_SECONDS: u64 = 1;
const MAX_TYPE_FETCH_TIMEOUT_SECONDS: u64 = 60;

impl CommonConfig for TypesConfig {
    fn default() -> Self {
        Self {
            type_cache_ttl_seconds: Self::default_type_cache_ttl_seconds(),
            type_fetch_timeout_seconds: Self::default_type_fetch_timeout_seconds(),
            services: Vec::new(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.type_cache_ttl_seconds > MAX_TYPE_CACHE_TTL_SECONDS {
            bail!("type_cache_ttl_seconds should be at most {MAX_TYPE_CACHE_TTL_SECONDS}");
        }
        if self.type_fetch_timeout_seconds < MIN_TYPE_FETCH_TIMEOUT_SECONDS
            || self.type_fetch_timeout_seconds > MAX_TYPE_FETCH_TIMEOUT_SECONDS
        {
            bail!(
                "type_fetch_timeout_seconds should be in range [{MIN_TYPE_FETCH_TIMEOUT_SECONDS}, {MAX_TYPE_FETCH_TIMEOUT_SECONDS}]"
            );
        }

        for (idx, service) in self.services.iter_mut().enumerate() {
            service
                .complete()
                .with_context(|| format!("services[{idx}]"))?;
        }

        Ok(())
    }
}

impl TypesConfig {
    fn default_type_cache_ttl_seconds() -> u64 {
        600
    }

    fn default_type_fetch_timeout_seconds() -> u64 {
        5
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.type_cache_ttl_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.type_fetch_timeout_seconds)
    }
}

impl ServiceConfig {
    fn complete(&mut self) -> Result<()> {
        let url = Url::parse(&self.api_root).context("parse api_root")?;
        if url.cannot_be_a_base() {
            bail!("api_root '{}' cannot be a base url", self.api_root);
        }
        self.api_root = url.to_string();
        if !self.api_root.ends_with('/') {
            self.api_root.push('/');
        }

        if let Some(secret) = self.secret.as_mut() {
            *secret = expandenv("secret", secret.as_str())?;
        }
        match (&self.client_id, &self.secret) {
            (Some(_), Some(_)) | (None, None) => Ok(()),
            _ => bail!("client_id and secret should be set together"),
        }
    }
}

/// The URL-to-service map: finds the service whose `api_root` prefixes a URL.
#[derive(Debug, Clone, Default)]
pub struct ServiceMap {
    services: Vec<ServiceConfig>,
}

impl ServiceMap {
    pub fn new(mut services: Vec<ServiceConfig>) -> Self {
        // Longest root first so nested roots win.
        services.sort_by(|a, b| b.api_root.len().cmp(&a.api_root.len()));
        Self { services }
    }

    pub fn find(&self, url: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| url.starts_with(&s.api_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(api_root: &str) -> ServiceConfig {
        ServiceConfig {
            api_root: api_root.to_string(),
            client_id: None,
            secret: None,
        }
    }

    #[test]
    fn test_complete() {
        let ps = PathSet::new_test();

        let mut cfg = TypesConfig::default();
        cfg.services.push(service("https://ztc.example.com/catalogi/api/v1"));
        cfg.complete(&ps).unwrap();
        assert_eq!(
            cfg.services[0].api_root,
            "https://ztc.example.com/catalogi/api/v1/"
        );
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(5));

        let mut cfg = TypesConfig::default();
        cfg.type_fetch_timeout_seconds = 0;
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = TypesConfig::default();
        let mut half = service("https://ztc.example.com/");
        half.client_id = Some("client".to_string());
        cfg.services.push(half);
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = TypesConfig::default();
        cfg.services.push(service("not a url"));
        assert!(cfg.complete(&ps).is_err());
    }

    #[test]
    fn test_service_map() {
        let map = ServiceMap::new(vec![
            service("https://ztc.example.com/"),
            service("https://ztc.example.com/catalogi/api/v1/"),
        ]);

        let found = map
            .find("https://ztc.example.com/catalogi/api/v1/zaaktypen/1")
            .unwrap();
        assert_eq!(found.api_root, "https://ztc.example.com/catalogi/api/v1/");

        let found = map.find("https://ztc.example.com/other/1").unwrap();
        assert_eq!(found.api_root, "https://ztc.example.com/");

        assert!(map.find("https://unknown.example.com/zaaktypen/1").is_none());
    }
}

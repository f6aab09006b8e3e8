use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::authn::config::AuthnConfig;
use crate::authz::config::AuthzConfig;
use crate::catalog::config::TypesConfig;
use crate::config::{expandenv, CommonConfig, PathSet};
use crate::db::config::DbConfig;
use crate::guard::config::GuardConfig;
use crate::logs::config::LogsConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default = "ServerConfig::default_ssl")]
    pub ssl: bool,

    #[serde(default = "ServerConfig::default_cert_path")]
    pub cert_path: String,

    #[serde(default = "ServerConfig::default_key_path")]
    pub key_path: String,

    #[serde(default = "ServerConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "ServerConfig::default_workers")]
    pub workers: u64,

    #[serde(default = "ServerConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    /// Base of the URLs this installation hands out, e.g. in notifications
    /// and problem types.
    #[serde(default = "ServerConfig::default_public_base_url")]
    pub public_base_url: String,

    /// URLs under these bases point at types held by this installation.
    #[serde(default)]
    pub local_base_urls: Vec<String>,

    #[serde(default = "AuthnConfig::default")]
    pub authn: AuthnConfig,

    #[serde(default = "AuthzConfig::default")]
    pub authz: AuthzConfig,

    #[serde(default = "GuardConfig::default")]
    pub guard: GuardConfig,

    #[serde(default = "TypesConfig::default")]
    pub types: TypesConfig,

    #[serde(default = "DbConfig::default")]
    pub db: DbConfig,

    #[serde(default = "LogsConfig::default")]
    pub logs: LogsConfig,
}

impl CommonConfig for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: Self::default_ssl(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            payload_limit_mib: Self::default_payload_limit_mib(),
            public_base_url: Self::default_public_base_url(),
            local_base_urls: Vec::new(),
            authn: AuthnConfig::default(),
            authz: AuthzConfig::default(),
            guard: GuardConfig::default(),
            types: TypesConfig::default(),
            db: DbConfig::default(),
            logs: LogsConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            let path = ps.pki_path.join("server.crt");
            self.cert_path = format!("{}", path.display());
        }

        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            let path = ps.pki_path.join("server.key");
            self.key_path = format!("{}", path.display());
        }

        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be greater than or equal to {}",
                Self::MIN_PAYLOAD_LIMIT_MIB
            );
        }
        if self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB {
            bail!(
                "payload_limit_mib must be less than or equal to {}",
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        self.public_base_url = expandenv("public_base_url", &self.public_base_url)?;
        Url::parse(&self.public_base_url).context("parse public_base_url")?;
        self.public_base_url = self.public_base_url.trim_end_matches('/').to_string();

        for url in self.local_base_urls.iter_mut() {
            *url = expandenv("local_base_urls", url.as_str())?;
            Url::parse(url).with_context(|| format!("parse local base url '{url}'"))?;
        }

        self.authn.complete(ps).context("authn")?;
        self.authz.complete(ps).context("authz")?;
        self.guard.complete(ps).context("guard")?;
        self.types.complete(ps).context("types")?;
        self.db.complete(ps).context("db")?;
        self.logs.complete(ps).context("logs")?;

        Ok(())
    }
}

impl ServerConfig {
    const MAX_PAYLOAD_LIMIT_MIB: usize = 10;
    const MIN_PAYLOAD_LIMIT_MIB: usize = 1;

    pub fn default_bind() -> String {
        String::from("127.0.0.1:8000")
    }

    pub fn default_ssl() -> bool {
        false
    }

    pub fn default_cert_path() -> String {
        String::new()
    }

    pub fn default_key_path() -> String {
        String::new()
    }

    pub fn default_keep_alive_secs() -> u64 {
        0
    }

    pub fn default_workers() -> u64 {
        0
    }

    pub fn default_payload_limit_mib() -> usize {
        3
    }

    pub fn default_public_base_url() -> String {
        String::from("http://localhost:8000")
    }

    /// Bases whose URLs name local types: the configured ones plus the
    /// catalog API this installation serves itself.
    pub fn local_type_bases(&self) -> Vec<String> {
        let own = format!("{}/catalogi/api/v1/", self.public_base_url);
        let mut bases = self.local_base_urls.clone();
        if !bases.contains(&own) {
            bases.push(own);
        }
        bases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let ps = PathSet::new_test();

        let mut cfg = <ServerConfig as CommonConfig>::default();
        cfg.db.sqlite.memory = true;
        cfg.complete(&ps).unwrap();
        assert!(cfg.cert_path.ends_with("server.crt"));
        assert_eq!(cfg.authn.token_expiry_seconds, 3600);
        assert_eq!(cfg.types.type_fetch_timeout_seconds, 5);

        let mut cfg: ServerConfig = toml::from_str(
            r#"
            public_base_url = "https://zaken.example.nl/"
            local_base_urls = ["https://zaken.example.nl/catalogi/api/v1/"]

            [authn]
            token_leeway_seconds = 30

            [guard]
            status_scope = "zaken.statussen.toevoegen"

            [db.sqlite]
            memory = true
            "#,
        )
        .unwrap();
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.public_base_url, "https://zaken.example.nl");
        assert_eq!(
            cfg.local_type_bases(),
            vec!["https://zaken.example.nl/catalogi/api/v1/".to_string()]
        );
        assert_eq!(cfg.authn.token_leeway_seconds, 30);
        assert_eq!(
            cfg.guard.status_scope.as_deref(),
            Some("zaken.statussen.toevoegen")
        );

        let mut cfg = <ServerConfig as CommonConfig>::default();
        cfg.payload_limit_mib = 0;
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = <ServerConfig as CommonConfig>::default();
        cfg.public_base_url = String::from("not a url");
        assert!(cfg.complete(&ps).is_err());
    }
}

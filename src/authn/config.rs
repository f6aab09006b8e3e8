use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

/// Upper bound for both the token expiry and the leeway: one day.
pub const MAX_TOKEN_WINDOW_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthnConfig {
    /// How long a token is accepted after its `iat`. Default 3600.
    #[serde(default = "AuthnConfig::default_token_expiry_seconds")]
    pub token_expiry_seconds: u64,

    /// Clock skew tolerated between issuer and verifier. Default 0.
    #[serde(default = "AuthnConfig::default_token_leeway_seconds")]
    pub token_leeway_seconds: u64,

    /// Client secrets seeded into storage at startup, `client_id = "secret"`.
    /// Values are expanded with environment variables.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

impl CommonConfig for AuthnConfig {
    fn default() -> Self {
        Self {
            token_expiry_seconds: Self::default_token_expiry_seconds(),
            token_leeway_seconds: Self::default_token_leeway_seconds(),
            secrets: BTreeMap::new(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.token_expiry_seconds == 0 {
            bail!("token_expiry_seconds should not be 0");
        }
        if self.token_expiry_seconds > MAX_TOKEN_WINDOW_SECONDS {
            bail!("token_expiry_seconds should not exceed {MAX_TOKEN_WINDOW_SECONDS}");
        }
        if self.token_leeway_seconds >= self.token_expiry_seconds {
            bail!("token_leeway_seconds should be less than token_expiry_seconds");
        }

        for (client_id, secret) in self.secrets.iter_mut() {
            if client_id.is_empty() {
                bail!("client id of a secret cannot be empty");
            }
            *secret = expandenv(client_id, secret.as_str())?;
            if secret.is_empty() {
                bail!("secret of client '{client_id}' cannot be empty");
            }
        }

        Ok(())
    }
}

impl AuthnConfig {
    fn default_token_expiry_seconds() -> u64 {
        60 * 60
    }

    fn default_token_leeway_seconds() -> u64 {
        0
    }
}

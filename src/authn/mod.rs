pub mod bearer;
pub mod config;
pub mod token;

use std::sync::OnceLock;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{ApiError, ErrorKind};
use crate::types::Application;

use config::AuthnConfig;
use token::TokenValidator;

/// Identity carried by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub client_id: String,
    /// `iat` claim, seconds since the epoch.
    pub issued_at: i64,
    pub issuer: Option<String>,
    pub user_id: Option<String>,
    pub user_representation: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("no bearer token presented")]
    Missing,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("no secret known for client '{0}'")]
    UnknownClient(String),
    #[error("token signature does not verify")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "missing-token",
            Self::Malformed(_) => "malformed-token",
            Self::UnknownClient(_) => "unknown-client",
            Self::SignatureInvalid => "signature-invalid",
            Self::Expired => "token-expired",
            Self::NotYetValid => "token-not-yet-valid",
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        let kind = match err {
            TokenError::Missing => ErrorKind::NotAuthenticated,
            _ => ErrorKind::TokenInvalid,
        };
        ApiError::new(kind, err.code(), err.to_string())
    }
}

/// Verifies the `Authorization` header value of a request.
///
/// Token failures pre-empt everything else, so this is the first thing a
/// handler calls.
pub fn authenticate<V: TokenValidator + ?Sized>(
    header: Option<&str>,
    validator: &V,
    now: i64,
    cfg: &AuthnConfig,
) -> Result<Credential, TokenError> {
    let token = bearer::extract_bearer(header)?;
    validator.validate_token(token, now, cfg)
}

/// The authenticated caller of one request. Applications are resolved at most
/// once per request.
#[derive(Debug)]
pub struct RequestAuth {
    pub credential: Credential,
    applications: OnceLock<Vec<Application>>,
}

impl RequestAuth {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            applications: OnceLock::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.credential.client_id
    }

    /// Returns the caller's applications, running `resolve` only on first use.
    pub fn applications<F>(&self, resolve: F) -> Result<&[Application]>
    where
        F: FnOnce(&str) -> Result<Vec<Application>>,
    {
        if let Some(apps) = self.applications.get() {
            return Ok(apps);
        }
        let apps = resolve(&self.credential.client_id)?;
        Ok(self.applications.get_or_init(|| apps))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_token_error_kinds() {
        let err: ApiError = TokenError::Missing.into();
        assert_eq!(err.kind, ErrorKind::NotAuthenticated);
        assert_eq!(err.code, "missing-token");

        let errs = [
            TokenError::Malformed("x".to_string()),
            TokenError::UnknownClient("c".to_string()),
            TokenError::SignatureInvalid,
            TokenError::Expired,
            TokenError::NotYetValid,
        ];
        for err in errs {
            let code = err.code();
            let api: ApiError = err.into();
            assert_eq!(api.kind, ErrorKind::TokenInvalid);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_request_auth_resolves_once() {
        let auth = RequestAuth::new(Credential {
            client_id: "client".to_string(),
            issued_at: 0,
            issuer: None,
            user_id: None,
            user_representation: None,
        });

        let calls = Cell::new(0);
        let resolve = |client_id: &str| {
            calls.set(calls.get() + 1);
            Ok(vec![Application {
                uuid: "app".to_string(),
                label: client_id.to_string(),
                client_ids: BTreeSet::from([client_id.to_string()]),
                has_all_permissions: false,
            }])
        };

        let apps = auth.applications(resolve).unwrap();
        assert_eq!(apps.len(), 1);
        let apps = auth.applications(resolve).unwrap();
        assert_eq!(apps[0].label, "client");
        assert_eq!(calls.get(), 1);
    }
}

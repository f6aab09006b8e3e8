use std::sync::Arc;

use anyhow::{bail, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::authn::config::AuthnConfig;
use crate::authn::{Credential, TokenError};

use super::secret::SecretStore;
use super::TokenValidator;

type HmacSha256 = Hmac<Sha256>;

/// Payload of a ZGW bearer token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_representation: Option<String>,
}

/// Verifies HS256 tokens whose header names the client in
/// `client_identifier`.
pub struct JwtTokenValidator {
    secrets: Arc<dyn SecretStore>,
}

impl JwtTokenValidator {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate_token(
        &self,
        token: &str,
        now: i64,
        cfg: &AuthnConfig,
    ) -> Result<Credential, TokenError> {
        let client_id = identify_client(token)?;

        let secret = match self.secrets.get_secret(&client_id) {
            Ok(Some(secret)) => secret,
            Ok(None) => return Err(TokenError::UnknownClient(client_id)),
            Err(e) => {
                warn!("Lookup secret for client '{client_id}' failed: {e:#}");
                return Err(TokenError::UnknownClient(client_id));
            }
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let key = DecodingKey::from_secret(secret.as_bytes());
        let claims = match decode::<Claims>(token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(match e.kind() {
                    JwtErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                    _ => TokenError::Malformed(e.to_string()),
                })
            }
        };

        let iat = match claims.iat {
            Some(iat) => iat,
            None => return Err(TokenError::Malformed("missing 'iat' claim".to_string())),
        };
        check_issued_at(iat, now, cfg)?;

        Ok(Credential {
            client_id,
            issued_at: iat,
            issuer: claims.iss,
            user_id: claims.user_id,
            user_representation: claims.user_representation,
        })
    }
}

/// Accepts `iat` in `[now - expiry - leeway, now + leeway]`.
fn check_issued_at(iat: i64, now: i64, cfg: &AuthnConfig) -> Result<(), TokenError> {
    let expiry = i64::try_from(cfg.token_expiry_seconds).unwrap_or(i64::MAX);
    let leeway = i64::try_from(cfg.token_leeway_seconds).unwrap_or(i64::MAX);

    if iat > now.saturating_add(leeway) {
        return Err(TokenError::NotYetValid);
    }
    if iat < now.saturating_sub(expiry).saturating_sub(leeway) {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Reads the client from the unverified token: the header's
/// `client_identifier`, or the payload's `client_id` for older issuers.
fn identify_client(token: &str) -> Result<String, TokenError> {
    let mut parts = token.split('.');
    let (header, payload) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(_), None) => (header, payload),
        _ => {
            return Err(TokenError::Malformed(
                "token should have three segments".to_string(),
            ))
        }
    };

    let header = decode_segment(header)?;
    if let Some(client_id) = header.get("client_identifier").and_then(Value::as_str) {
        if !client_id.is_empty() {
            return Ok(client_id.to_string());
        }
    }

    let payload = decode_segment(payload)?;
    match payload.get("client_id").and_then(Value::as_str) {
        Some(client_id) if !client_id.is_empty() => Ok(client_id.to_string()),
        _ => Err(TokenError::Malformed(
            "token does not identify a client".to_string(),
        )),
    }
}

fn decode_segment(segment: &str) -> Result<Value, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(format!("decode base64: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| TokenError::Malformed(format!("decode json: {e}")))
}

/// Signs tokens for one client, the way ZGW consumers do.
pub struct JwtTokenGenerator {
    client_id: String,
    secret: String,
}

impl JwtTokenGenerator {
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let secret = secret.into();
        if client_id.is_empty() {
            bail!("client id for token generation cannot be empty");
        }
        if secret.is_empty() {
            bail!("secret for token generation cannot be empty");
        }
        Ok(Self { client_id, secret })
    }

    pub fn generate_token(
        &self,
        now: i64,
        user_id: Option<&str>,
        user_representation: Option<&str>,
    ) -> Result<String> {
        let header = serde_json::json!({
            "alg": "HS256",
            "typ": "JWT",
            "client_identifier": self.client_id,
        });
        let claims = Claims {
            iss: Some(self.client_id.clone()),
            iat: Some(now),
            client_id: Some(self.client_id.clone()),
            user_id: Some(user_id.unwrap_or_default().to_string()),
            user_representation: Some(user_representation.unwrap_or_default().to_string()),
        };

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let message = format!("{header}.{payload}");

        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(e) => bail!("init hmac for token signing failed: {e}"),
        };
        mac.update(message.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{message}.{signature}"))
    }
}

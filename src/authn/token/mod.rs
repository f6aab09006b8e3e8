pub mod jwt;
pub mod secret;

use super::config::AuthnConfig;
use super::{Credential, TokenError};

pub trait TokenValidator {
    /// Verifies `token` against the secret of the client it names and checks
    /// its `iat` against `now` (seconds since the epoch).
    fn validate_token(
        &self,
        token: &str,
        now: i64,
        cfg: &AuthnConfig,
    ) -> Result<Credential, TokenError>;
}

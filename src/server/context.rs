use std::sync::Arc;

use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use chrono::Utc;

use crate::authn::token::jwt::JwtTokenValidator;
use crate::authn::{self, RequestAuth};
use crate::authz::admin::AdminService;
use crate::authz::applications::ApplicationResolver;
use crate::authz::evaluator::{AuthzRequest, PermissionEvaluator};
use crate::errors::ApiError;
use crate::settings::{Settings, SettingsHandle};
use crate::types::{Component, ScopeSet};

/// Shared state of the request handlers.
pub struct ServerContext {
    pub settings: Arc<SettingsHandle>,
    pub validator: JwtTokenValidator,
    pub resolver: ApplicationResolver,
    pub evaluator: Arc<PermissionEvaluator>,
    pub admin: AdminService,
}

impl ServerContext {
    /// Verifies the bearer token of `req`.
    pub fn authenticate(&self, req: &HttpRequest, settings: &Settings) -> Result<RequestAuth, ApiError> {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        let now = Utc::now().timestamp();
        let credential = authn::authenticate(header, &self.validator, now, &settings.authn)?;
        Ok(RequestAuth::new(credential))
    }

    /// Checks that the caller holds `scopes` on the Authorizations API.
    pub async fn authorize(&self, auth: &RequestAuth, scopes: ScopeSet) -> Result<(), ApiError> {
        let apps = auth.applications(|client_id| self.resolver.resolve(client_id))?;
        let req = AuthzRequest::new(Component::Ac, scopes);
        self.evaluator.check(apps, &req).await
    }
}

use std::sync::Arc;

use actix_web::http::Method;
use actix_web::HttpRequest;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::errors::ApiError;
use crate::server::context::ServerContext;
use crate::server::response::Response;
use crate::settings::Settings;
use crate::types::payload::{ApplicationBody, ApplicationPatch};
use crate::types::Component;

use super::Handler;

const CONSUMER_PATH: &str = "consumer";

/// Serves the `applicaties` collection of the Authorizations API.
pub struct ApplicationsHandler {
    ctx: Arc<ServerContext>,
}

#[derive(Debug, PartialEq, Eq)]
enum Operation {
    List,
    Create,
    Consumer,
    Read(String),
    Replace(String),
    Patch(String),
    Delete(String),
}

impl Operation {
    fn parse(method: &Method, path: &str) -> Option<Self> {
        let path = path.trim_matches('/');
        if path.contains('/') {
            return None;
        }

        let op = match (path, method.as_str()) {
            ("", "GET") => Self::List,
            ("", "POST") => Self::Create,
            (CONSUMER_PATH, "GET") => Self::Consumer,
            (uuid, "GET") if !uuid.is_empty() => Self::Read(uuid.to_string()),
            (uuid, "PUT") if !uuid.is_empty() => Self::Replace(uuid.to_string()),
            (uuid, "PATCH") if !uuid.is_empty() => Self::Patch(uuid.to_string()),
            (uuid, "DELETE") if !uuid.is_empty() => Self::Delete(uuid.to_string()),
            _ => return None,
        };
        Some(op)
    }

    fn is_read(&self) -> bool {
        matches!(self, Self::List | Self::Consumer | Self::Read(_))
    }
}

impl ApplicationsHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    async fn serve(
        &self,
        op: Operation,
        req: &HttpRequest,
        body: Option<Vec<u8>>,
        settings: &Settings,
    ) -> Result<Response, ApiError> {
        let auth = self.ctx.authenticate(req, settings)?;
        let scopes = if op.is_read() {
            settings.authz.read_scopes()
        } else {
            settings.authz.create_scope(Component::Ac)
        };
        self.ctx.authorize(&auth, scopes).await?;

        let admin = &self.ctx.admin;
        let resp = match op {
            Operation::List => Response::json(admin.list_applications(settings)?),
            Operation::Create => {
                let body: ApplicationBody = parse_body(body)?;
                Response::created(admin.create_application(settings, body)?)
            }
            Operation::Consumer => {
                let client_id = query_value(req, "clientId").ok_or_else(|| {
                    ApiError::invalid_param("clientId", "required", "clientId is required")
                })?;
                Response::json(admin.find_consumer(settings, &client_id)?)
            }
            Operation::Read(uuid) => Response::json(admin.get_application(settings, &uuid)?),
            Operation::Replace(uuid) => {
                let body: ApplicationBody = parse_body(body)?;
                Response::json(admin.replace_application(settings, &uuid, body)?)
            }
            Operation::Patch(uuid) => {
                let patch: ApplicationPatch = parse_body(body)?;
                Response::json(admin.patch_application(settings, &uuid, patch)?)
            }
            Operation::Delete(uuid) => {
                admin.delete_application(settings, &uuid)?;
                Response::no_content()
            }
        };
        Ok(resp)
    }
}

#[async_trait(?Send)]
impl Handler for ApplicationsHandler {
    async fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let settings = self.ctx.settings.snapshot();
        let base = settings.public_base_url.as_str();

        let op = match Operation::parse(req.method(), path) {
            Some(op) => op,
            None => return Response::method_not_allowed(base),
        };

        match self.serve(op, &req, body, &settings).await {
            Ok(resp) => resp,
            Err(err) => Response::error(&err, base),
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: Option<Vec<u8>>) -> Result<T, ApiError> {
    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => return Err(ApiError::invalid_param("body", "required", "request body is required")),
    };
    serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_param("body", "parse_error", format!("invalid json: {e}")))
}

fn query_value(req: &HttpRequest, key: &str) -> Option<String> {
    url::form_urlencoded::parse(req.query_string().as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operation() {
        let cases = [
            (Method::GET, "", Some(Operation::List)),
            (Method::POST, "/", Some(Operation::Create)),
            (Method::GET, "consumer", Some(Operation::Consumer)),
            (Method::GET, "a1", Some(Operation::Read("a1".to_string()))),
            (Method::PUT, "a1/", Some(Operation::Replace("a1".to_string()))),
            (Method::PATCH, "a1", Some(Operation::Patch("a1".to_string()))),
            (Method::DELETE, "a1", Some(Operation::Delete("a1".to_string()))),
            (Method::DELETE, "", None),
            (Method::POST, "a1", None),
            (Method::GET, "a1/grants", None),
        ];
        for (method, path, expect) in cases {
            assert_eq!(Operation::parse(&method, path), expect, "{method} {path}");
        }
    }
}

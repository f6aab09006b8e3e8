use std::time::SystemTime;

use actix_web::HttpRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::server::response::Response;

use super::Handler;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthzResponse {
    pub status: String,
    pub now: String,
    pub client_ip: Option<String>,
    pub version: String,
}

pub struct HealthzHandler;

impl HealthzHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl Handler for HealthzHandler {
    async fn handle(&self, _path: &str, req: HttpRequest, _body: Option<Vec<u8>>) -> Response {
        let response = HealthzResponse {
            status: String::from("ok"),
            now: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            client_ip: req.connection_info().peer_addr().map(|a| a.to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Response::json(response)
    }
}

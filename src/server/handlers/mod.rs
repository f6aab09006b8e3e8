use actix_web::HttpRequest;
use async_trait::async_trait;

use super::response::Response;

pub mod applications;
pub mod healthz;

#[async_trait(?Send)]
pub trait Handler {
    async fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response;
}

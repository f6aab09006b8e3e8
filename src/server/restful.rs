use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::web::{self, Bytes, Data, PayloadConfig};
use actix_web::{App, Error, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::errors::ApiError;

use super::handlers::applications::ApplicationsHandler;
use super::handlers::healthz::HealthzHandler;
use super::handlers::Handler;
use super::response::Response;

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<RestfulContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,

    payload_limit_mib: usize,
}

pub struct RestfulContext {
    pub applications_handler: ApplicationsHandler,
    pub healthz_handler: HealthzHandler,

    /// Used for problems raised before a handler takes its settings
    /// snapshot.
    pub public_base_url: String,
}

impl RestfulServer {
    pub const APPLICATIONS_PATH: &str = "/autorisaties/api/v1/applicaties";
    pub const HEALTHZ_PATH: &str = "/healthz";

    pub fn new(
        bind: String,
        ssl: Option<SslAcceptorBuilder>,
        ctx: Arc<RestfulContext>,
        payload_limit_mib: usize,
    ) -> Self {
        Self {
            ssl,
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
            payload_limit_mib,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    /// Builds the application with every route registered. Also used by the
    /// handler tests.
    pub fn build_app(
        ctx: Arc<RestfulContext>,
        payload_limit_mib: usize,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(Data::new(ctx))
            .app_data(PayloadConfig::new(payload_limit_mib * 1024 * 1024))
            .service(
                web::scope(Self::APPLICATIONS_PATH)
                    .route("", web::route().to(Self::handle_applications))
                    .route("/{path:.*}", web::route().to(Self::handle_applications)),
            )
            .service(web::resource(Self::HEALTHZ_PATH).route(web::get().to(Self::handle_healthz)))
            .default_service(web::route().to(Self::default_handler))
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let payload_limit_mib = self.payload_limit_mib;
        let mut srv = HttpServer::new(move || Self::build_app(ctx.clone(), payload_limit_mib));

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }

    async fn handle_applications(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let path = Self::parse_path(Self::APPLICATIONS_PATH, &req);
        let body = Self::parse_body(body);

        ctx.applications_handler.handle(&path, req, body).await.into()
    }

    async fn handle_healthz(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let body = Self::parse_body(body);

        ctx.healthz_handler.handle("", req, body).await.into()
    }

    async fn default_handler(req: HttpRequest, ctx: Data<Arc<RestfulContext>>) -> HttpResponse {
        let path = req.uri().path().to_string();
        let method = req.method().as_str().to_string();
        let err = ApiError::not_found(format!("No route to {method} {path}"));
        Response::error(&err, &ctx.public_base_url).into()
    }

    fn parse_path(route: &str, req: &HttpRequest) -> String {
        let path = req.uri().path();
        let path = path.strip_prefix(route).unwrap_or(path);
        path.trim_matches('/').to_string()
    }

    fn parse_body(body: Option<Bytes>) -> Option<Vec<u8>> {
        body.filter(|b| !b.is_empty()).map(|b| b.to_vec())
    }
}

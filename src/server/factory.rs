use std::sync::Arc;

use anyhow::{Context, Result};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};

use crate::authn::token::jwt::JwtTokenValidator;
use crate::authn::token::secret::{seed_secrets, DbSecretStore};
use crate::authz::admin::AdminService;
use crate::authz::applications::ApplicationResolver;
use crate::authz::evaluator::PermissionEvaluator;
use crate::authz::index::GrantIndex;
use crate::catalog::remote::{HttpTypeFetcher, RemoteTypeFetcher};
use crate::catalog::resolver::TypeResolver;
use crate::db::factory::DbFactory;
use crate::db::Database;
use crate::events::notify::Notifier;
use crate::guard::cases::CaseService;
use crate::settings::{Settings, SettingsHandle};
use crate::types::RefParser;

use super::config::ServerConfig;
use super::context::ServerContext;
use super::handlers::applications::ApplicationsHandler;
use super::handlers::healthz::HealthzHandler;
use super::restful::{RestfulContext, RestfulServer};

pub struct ServerFactory {
    db: Arc<Database>,
    cfg: ServerConfig,
    settings: Arc<SettingsHandle>,
    notifier: Notifier,
    evaluator: Arc<PermissionEvaluator>,
}

impl ServerFactory {
    /// Opens storage and builds the shared services. Must be called inside a
    /// tokio runtime, the notifier spawns its dispatcher.
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        let fetcher = HttpTypeFetcher::new(cfg.types.fetch_timeout()).context("init fetcher")?;
        Self::with_fetcher(cfg, Arc::new(fetcher))
    }

    pub fn with_fetcher(cfg: ServerConfig, fetcher: Arc<dyn RemoteTypeFetcher>) -> Result<Self> {
        let db_factory = DbFactory::new();
        let db = db_factory.build_db(&cfg.db).context("init database")?;
        seed_secrets(&db, &cfg.authn.secrets).context("seed secrets")?;

        let parser = Self::build_parser(&cfg)?;
        let resolver = TypeResolver::new(db.clone(), &cfg.types, parser, fetcher);
        let evaluator = Arc::new(PermissionEvaluator::new(
            GrantIndex::new(db.clone()),
            Arc::new(resolver),
        ));

        let settings = Arc::new(SettingsHandle::new(Settings::from_config(&cfg)));
        Ok(Self {
            db,
            cfg,
            settings,
            notifier: Notifier::start(),
            evaluator,
        })
    }

    pub fn settings(&self) -> Arc<SettingsHandle> {
        self.settings.clone()
    }

    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    pub fn evaluator(&self) -> Arc<PermissionEvaluator> {
        self.evaluator.clone()
    }

    pub fn build_server(&self) -> Result<RestfulServer> {
        let ssl = self.build_ssl()?;
        let ctx = self.build_context()?;

        let mut srv =
            RestfulServer::new(self.cfg.bind.clone(), ssl, ctx, self.cfg.payload_limit_mib);
        if self.cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(self.cfg.keep_alive_secs);
        }
        if self.cfg.workers > 0 {
            srv.set_workers(self.cfg.workers);
        }

        Ok(srv)
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&self.cfg.key_path, SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&self.cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }

    pub fn build_context(&self) -> Result<Arc<RestfulContext>> {
        let admin = AdminService::new(
            self.db.clone(),
            Self::build_parser(&self.cfg)?,
            self.notifier.clone(),
        );
        let server_ctx = Arc::new(ServerContext {
            settings: self.settings.clone(),
            validator: JwtTokenValidator::new(Arc::new(DbSecretStore::new(self.db.clone()))),
            resolver: ApplicationResolver::new(self.db.clone()),
            evaluator: self.evaluator.clone(),
            admin,
        });

        let ctx = RestfulContext {
            applications_handler: ApplicationsHandler::new(server_ctx),
            healthz_handler: HealthzHandler::new(),
            public_base_url: self.cfg.public_base_url.clone(),
        };
        Ok(Arc::new(ctx))
    }

    /// The write path for cases, for embedding code.
    pub fn build_case_service(&self) -> CaseService {
        CaseService::new(self.db.clone(), self.evaluator.clone(), self.notifier.clone())
    }

    fn build_parser(cfg: &ServerConfig) -> Result<RefParser> {
        RefParser::new(&cfg.local_type_bases()).context("init reference parser")
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use log::{error, info};
use tokio::signal::unix::{signal, SignalKind};

use crate::authn::token::secret::seed_secrets;
use crate::config::{CommonConfig, PathSet};
use crate::db::Database;
use crate::logs;
use crate::server::config::ServerConfig;
use crate::server::factory::ServerFactory;
use crate::settings::{Settings, SettingsHandle};

use super::{ConfigArgs, RunCommand};

/// Start the Authorizations API server. Send SIGHUP to re-read `server.toml`;
/// only the authn, authz and guard sections and the public base URL are
/// applied without a restart.
#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait(?Send)]
impl RunCommand for ServeArgs {
    async fn run(&self) -> Result<()> {
        let ps = self.config.build_path_set()?;
        let cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;
        logs::init(&ps.data_path, "server", &cfg.logs)?;

        let factory = ServerFactory::new(cfg).context("init server")?;
        let srv = factory.build_server()?;

        let mut hangup = signal(SignalKind::hangup()).context("listen for SIGHUP")?;
        let settings = factory.settings();
        let db = factory.db();
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!("Received SIGHUP, reloading config");
                if let Err(e) = reload(&ps, &settings, &db) {
                    error!("Reload config failed, keeping the current one: {e:#}");
                }
            }
        });

        srv.run().await.context("run restful server")
    }
}

fn reload(ps: &PathSet, settings: &SettingsHandle, db: &Arc<Database>) -> Result<()> {
    let cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;
    seed_secrets(db, &cfg.authn.secrets)?;
    settings.replace(Settings::from_config(&cfg));
    Ok(())
}

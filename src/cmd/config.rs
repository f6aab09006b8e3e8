use anyhow::Result;
use async_trait::async_trait;
use clap::Args;

use crate::config::CommonConfig;
use crate::server::config::ServerConfig;

use super::{ConfigArgs, RunCommand};

/// Print the effective server configuration (JSON), with defaults filled in
/// and environment variables expanded.
#[derive(Args)]
pub struct ConfigCommandArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait(?Send)]
impl RunCommand for ConfigCommandArgs {
    async fn run(&self) -> Result<()> {
        let ps = self.config.build_path_set()?;
        let mut cfg: ServerConfig = ps.load_config("server", ServerConfig::default)?;
        // Secrets never leave the process.
        for secret in cfg.authn.secrets.values_mut() {
            *secret = String::from("******");
        }
        for service in cfg.types.services.iter_mut() {
            if service.secret.is_some() {
                service.secret = Some(String::from("******"));
            }
        }

        let json = serde_json::to_string_pretty(&cfg)?;
        println!("{json}");
        Ok(())
    }
}

mod config;
mod serve;
mod token;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};

use crate::config::PathSet;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// The config directory, default is `/etc/zgw-authz` for root and
    /// `~/.config/zgw-authz` otherwise.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// The data directory, default is `/var/lib/zgw-authz` for root and
    /// `~/.local/share/zgw-authz` otherwise.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn build_path_set(&self) -> Result<PathSet> {
        PathSet::new(self.config_dir.clone(), self.data_dir.clone())
    }
}

#[async_trait(?Send)]
pub trait RunCommand {
    async fn run(&self) -> Result<()>;
}

#[derive(Parser)]
#[command(author, about, version)]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Config(config::ConfigCommandArgs),
    Serve(serve::ServeArgs),
    Token(token::TokenArgs),
}

#[async_trait(?Send)]
impl RunCommand for App {
    async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Config(args) => args.run().await,
            Commands::Serve(args) => args.run().await,
            Commands::Token(args) => args.run().await,
        }
    }
}

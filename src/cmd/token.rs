use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use clap::Args;

use crate::authn::token::jwt::JwtTokenGenerator;

use super::RunCommand;

/// Generate a bearer token for a client, signed with its secret.
#[derive(Args)]
pub struct TokenArgs {
    /// The client id, written to the `client_identifier` header field and the
    /// `client_id` claim.
    #[arg(long)]
    pub client_id: String,

    /// The secret shared with the server.
    #[arg(long)]
    pub secret: String,

    /// Optional `user_id` claim.
    #[arg(long)]
    pub user_id: Option<String>,

    /// Optional `user_representation` claim.
    #[arg(long)]
    pub user_representation: Option<String>,

    /// Issue time as a unix timestamp, default is now.
    #[arg(long)]
    pub issued_at: Option<i64>,
}

#[async_trait(?Send)]
impl RunCommand for TokenArgs {
    async fn run(&self) -> Result<()> {
        let generator = JwtTokenGenerator::new(self.client_id.as_str(), self.secret.as_str())?;
        let now = self.issued_at.unwrap_or_else(|| Utc::now().timestamp());
        let token = generator.generate_token(
            now,
            self.user_id.as_deref(),
            self.user_representation.as_deref(),
        )?;
        println!("{token}");
        Ok(())
    }
}

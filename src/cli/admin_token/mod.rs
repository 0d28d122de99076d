//! Admin token command

use clap::Args;

use crate::infrastructure::auth::{JwtConfig, JwtService};

#[derive(Debug, Args)]
pub struct AdminTokenArgs {
    /// Administrator identity recorded as the token subject
    #[arg(long)]
    pub subject: String,

    /// Token lifetime, defaults to admin.token_expiration_hours
    #[arg(long)]
    pub hours: Option<u64>,
}

/// Print a signed administrator token
pub async fn run(args: AdminTokenArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;

    let secret = config
        .admin
        .jwt_secret
        .clone()
        .ok_or_else(|| anyhow::anyhow!("admin.jwt_secret must be set to mint admin tokens"))?;
    let hours = args.hours.unwrap_or(config.admin.token_expiration_hours);

    let jwt = JwtService::new(JwtConfig::new(secret, hours));
    println!("{}", jwt.generate_admin_token(&args.subject)?);

    Ok(())
}

//! Create key command

use chrono::{Duration, Utc};
use clap::Args;
use tracing::warn;

use crate::config::StorageBackend;

#[derive(Debug, Args)]
pub struct CreateKeyArgs {
    /// Human label for the key
    #[arg(long)]
    pub name: String,

    /// Principal recorded as the issuer
    #[arg(long)]
    pub issuer: String,

    /// Expire the key after this many days
    #[arg(long)]
    pub expires_in_days: Option<u32>,
}

/// Issue a key and print the secret once
pub async fn run(args: CreateKeyArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;

    if config.storage.backend == StorageBackend::Memory {
        warn!("Storage backend is 'memory'; the key disappears when this command exits");
    }

    let state = crate::create_app_state_with_config(&config).await?;
    let expires_at = args
        .expires_in_days
        .map(|days| Utc::now() + Duration::days(i64::from(days)));

    let created = state
        .api_key_service
        .create(&args.name, &args.issuer, expires_at)
        .await?;

    println!("id:      {}", created.api_key.id());
    println!("prefix:  {}", created.api_key.key_prefix());
    if let Some(expires_at) = created.api_key.expires_at() {
        println!("expires: {}", expires_at.to_rfc3339());
    }
    println!("secret:  {}", created.secret);
    println!();
    println!("Store the secret now. It cannot be shown again.");

    Ok(())
}

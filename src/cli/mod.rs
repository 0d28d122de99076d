//! Command line interface
//!
//! - `serve`: run the HTTP server
//! - `create-key`: issue an API key against the configured store
//! - `admin-token`: mint an administrator bearer token

pub mod admin_token;
pub mod create_key;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Pet clinic API with machine client API keys
#[derive(Parser)]
#[command(name = "petclinic-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,

    /// Create an API key and print its secret once
    CreateKey(create_key::CreateKeyArgs),

    /// Mint a bearer token for the admin API
    AdminToken(admin_token::AdminTokenArgs),
}

/// Load `.env`, the layered configuration and the log subscriber
fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_key() {
        let cli = Cli::try_parse_from([
            "petclinic-api",
            "create-key",
            "--name",
            "lab-sync",
            "--issuer",
            "ops@clinic",
            "--expires-in-days",
            "30",
        ])
        .unwrap();

        match cli.command {
            Command::CreateKey(args) => {
                assert_eq!(args.name, "lab-sync");
                assert_eq!(args.issuer, "ops@clinic");
                assert_eq!(args.expires_in_days, Some(30));
            }
            _ => panic!("expected create-key"),
        }
    }

    #[test]
    fn test_parse_admin_token_defaults() {
        let cli = Cli::try_parse_from(["petclinic-api", "admin-token", "--subject", "root"]).unwrap();

        match cli.command {
            Command::AdminToken(args) => {
                assert_eq!(args.subject, "root");
                assert!(args.hours.is_none());
            }
            _ => panic!("expected admin-token"),
        }
    }
}

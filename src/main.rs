use clap::Parser;
use petclinic_api::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::CreateKey(args) => cli::create_key::run(args).await,
        Command::AdminToken(args) => cli::admin_token::run(args).await,
    }
}

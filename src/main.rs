use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use import_tokens::{
    AccessToken, DataImportSource, FileTokenStorage, ManagerConfig, ProviderRegistry, TokenError,
    TokenManager,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "import-tokens",
    about = "Mint, refresh and inspect OAuth tokens for data imports. Tokens are printed as JSON."
)]
struct Cli {
    /// JSON file holding persisted tokens.
    #[arg(long, global = true, env = "IMPORT_TOKENS_STORE", default_value = "tokens.json")]
    store: PathBuf,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Return the cached token or mint one from an authorization code.
    Mint {
        source: DataImportSource,
        #[arg(long)]
        code: String,
    },
    /// Refresh the stored token.
    Refresh { source: DataImportSource },
    /// Print the stored token.
    Show { source: DataImportSource },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), TokenError> {
    let registry = Arc::new(ProviderRegistry::from_env()?);
    let config = ManagerConfig::from_env()?;
    let storage = Arc::new(FileTokenStorage::new(cli.store));
    let manager = TokenManager::new(registry, storage, config)?;

    match cli.command {
        Command::Mint { source, code } => {
            let token = manager.get_access_token(source, &code).await.into_result()?;
            print_token(&token)
        }
        Command::Refresh { source } => {
            let current = stored_token(&manager, source).await?;
            let token = manager.refresh_and_save(source, &current).await?;
            print_token(&token)
        }
        Command::Show { source } => {
            let token = stored_token(&manager, source).await?;
            print_token(&token)
        }
    }
}

async fn stored_token(
    manager: &TokenManager,
    source: DataImportSource,
) -> Result<AccessToken, TokenError> {
    manager
        .store()
        .get(source)
        .await?
        .ok_or(TokenError::MissingToken(source))
}

fn print_token(token: &AccessToken) -> Result<(), TokenError> {
    let output = serde_json::to_string_pretty(token)?;
    println!("{output}");
    Ok(())
}

mod commands;
mod settings;

use clap::{Parser, Subcommand};
use openfb::{FileTokenStore, HttpMethod};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "openfb", version, about = "Facebook login and Graph API from the terminal")]
struct Cli {
    /// Config file (defaults to ~/.openfb/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Token file (defaults to ~/.openfb/tokens.json)
    #[arg(long, global = true)]
    tokens: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser and store the access token
    Login {
        /// Permissions to request, e.g. "email,public_profile"
        #[arg(short, long)]
        scope: Option<String>,

        /// Hide the location bar in the login window
        #[arg(long)]
        no_location: bool,
    },

    /// Forget the stored token
    Logout,

    /// Show the login status of the stored token
    Status {
        /// Check the token against the Graph API
        #[arg(long)]
        validate: bool,
    },

    /// Call a Graph API endpoint with the stored token
    Api {
        /// Endpoint path, e.g. /me
        path: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: HttpMethod,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Revoke the app's permissions and forget the token
    Revoke,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openfb=info,openfb_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(settings::default_path);
    let mut params = settings::load(&config_path)?;
    if let Commands::Status { validate: true } = cli.command {
        params.validate_status = true;
    }
    let store = match cli.tokens {
        Some(path) => FileTokenStore::new(path),
        None => FileTokenStore::default_path(),
    };
    let session = commands::Session::new(params, Arc::new(store));

    match cli.command {
        Commands::Login { scope, no_location } => {
            commands::run_login(&session, scope, !no_location).await?;
        }
        Commands::Logout => {
            commands::run_logout(&session).await?;
        }
        Commands::Status { .. } => {
            commands::run_status(&session).await?;
        }
        Commands::Api {
            path,
            method,
            params,
        } => {
            commands::run_api(&session, &path, method, &params).await?;
        }
        Commands::Revoke => {
            commands::run_revoke(&session).await?;
        }
    }

    Ok(())
}

//! onenote-sync - OneNote notebooks for course hosts
//!
#![doc = "Main entry point for the onenote-sync reference host."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use onenote_sync::cli::{Cli, Commands};
use onenote_sync::commands;
use onenote_sync::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose, cli.json_logs);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    let user = cli.user.as_str();
    match cli.command {
        Commands::LoginUrl => commands::login_url(&config),
        Commands::Login { ref code } => commands::login(&config, user, code).await,
        Commands::Status => commands::status(&config, user).await,
        Commands::List {
            ref path,
            ref courses,
            json,
        } => {
            tracing::info!(path = %path, "Listing items");
            commands::list(&config, user, path, courses.clone(), json).await
        }
        Commands::Name { ref id } => commands::name(&config, user, id).await,
        Commands::Download {
            ref page_id,
            ref output,
        } => {
            tracing::info!(page_id = %page_id, "Downloading page");
            commands::download(&config, user, page_id, output).await
        }
        Commands::Mappings => commands::mappings(&config, user),
        Commands::Forget => commands::forget(&config, user),
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "onenote_sync=debug"
    } else {
        "onenote_sync=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

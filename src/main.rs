use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Mixtape: share-to-library bridge bot.
///
/// Watches a Deezer bot account for shared tracks, albums, and playlists,
/// downloads them into a Jellyfin music library, and mirrors shared
/// playlists as native Jellyfin playlists. Follows back every follower.
#[derive(Parser)]
#[command(name = "mixtape", version, about)]
struct Cli {
    /// Path to the TOML config file (falls back to $MIXTAPE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both loops: download pipeline and follower reconciliation
    Run,

    /// Validate the config and both remote sessions, then exit
    Check,

    /// Run one download-pipeline pass, then exit
    Poll,

    /// Run one follower-reconciliation pass, then exit
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mixtape=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = mixtape::config::Config::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Run => {
            let bot = Arc::new(mixtape::scheduler::Bot::connect(config).await?);
            mixtape::scheduler::run(bot).await
        }

        Commands::Check => {
            let bot = mixtape::scheduler::Bot::connect(config).await?;
            println!("Deezer session OK (bot user id {})", bot.deezer.user_id());

            let users = bot.jellyfin.users().await?;
            println!("Jellyfin OK ({} user accounts visible)", users.len());
            Ok(())
        }

        Commands::Poll => {
            let bot = mixtape::scheduler::Bot::connect(config).await?;
            mixtape::pipeline::run_download_pass(
                &bot.deezer,
                &bot.jellyfin,
                bot.engine.as_ref(),
                &bot.config,
            )
            .await?;
            println!("Download pass complete.");
            Ok(())
        }

        Commands::Reconcile => {
            let bot = mixtape::scheduler::Bot::connect(config).await?;
            let followed = mixtape::pipeline::friends::reconcile(&bot.deezer).await?;
            println!("Followed back {followed} users.");
            Ok(())
        }
    }
}

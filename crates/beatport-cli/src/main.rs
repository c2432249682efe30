// Copyright 2026 beatport-rs contributors
// SPDX-License-Identifier: MIT

//! `beatport`: command-line access to a Beatport account.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use std::path::PathBuf;

use beatport_cli::{credentials_from_env, load_config};
use beatport_client::{connect, Beatport, Page};

#[derive(Parser)]
#[command(
    name = "beatport",
    about = "Beatport account client for carts, listings and purchased downloads",
    version,
    after_help = "Credentials are read from BEATPORT_USERNAME/BEATPORT_PASSWORD \
                  or BEATPORT_SESSION/BEATPORT_CSRF_TOKEN."
)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Page size for listing commands (overrides the config).
    #[arg(long, global = true)]
    per_page: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print a token for resuming the session later.
    Login,
    /// Show the account summary.
    Account,
    /// List tracks on the account feed.
    Feed {
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Print the ids of all items in all carts.
    Cart {
        /// Group item ids by cart.
        #[arg(long)]
        by_cart: bool,
    },
    /// Add a track to a cart.
    CartAdd { track_id: u64, cart_id: u64 },
    /// Remove a track from a cart.
    CartRemove { track_id: u64, cart_id: u64 },
    /// Show track details.
    Track { track_id: u64 },
    /// Show the preview clip of a track.
    Clip { track_id: u64 },
    /// List download ids of purchased tracks not yet downloaded.
    Available {
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// List purchased tracks already downloaded.
    Downloaded {
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Download a purchased track.
    Download {
        download_id: u64,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List an artist's tracks.
    Artist {
        artist_id: u64,
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// List a label's tracks.
    Label {
        label_id: u64,
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// List the tracks embedded in any listing page.
    Listing { uri: String },
    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "beatport", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(size) = cli.per_page {
        config.page_size = size;
    }
    let credentials = credentials_from_env()?;
    let session = connect(config, &credentials)
        .await
        .context("could not establish a Beatport session")?;

    if let Commands::Login = cli.command {
        let token = session
            .primitive()
            .resume_token()
            .context("the storefront did not issue a session cookie")?;
        return print_json(&token);
    }

    let beatport = Beatport::new(session);
    run(&beatport, cli.command).await
}

async fn run(beatport: &Beatport, command: Commands) -> Result<()> {
    match command {
        Commands::Account => print_json(&beatport.get_account_summary().await?),
        Commands::Feed { page } => {
            print_json(&beatport.get_account_track_page(page_of(beatport, page)?).await?)
        }
        Commands::Cart { by_cart } => {
            if by_cart {
                print_json(&beatport.get_cart_snapshot().await?)
            } else {
                print_json(&beatport.get_cart_item_ids().await?)
            }
        }
        Commands::CartAdd { track_id, cart_id } => {
            print_json(&beatport.add_item_to_cart(track_id, cart_id).await?)
        }
        Commands::CartRemove { track_id, cart_id } => {
            print_json(&beatport.remove_item_from_cart(track_id, cart_id).await?)
        }
        Commands::Track { track_id } => print_json(&beatport.get_track(track_id).await?),
        Commands::Clip { track_id } => print_json(&beatport.get_preview_clip(track_id).await?),
        Commands::Available { page } => print_json(
            &beatport
                .get_available_download_ids(page_of(beatport, page)?)
                .await?,
        ),
        Commands::Downloaded { page } => {
            print_json(&beatport.get_downloaded_tracks(page_of(beatport, page)?).await?)
        }
        Commands::Download {
            download_id,
            output,
        } => {
            let download = beatport.download_by_id(download_id).await?;
            let mut file = tokio::fs::File::create(&output)
                .await
                .with_context(|| format!("cannot create {}", output.display()))?;
            let written = download.write_to(&mut file).await?;
            tracing::info!("wrote {written} bytes to {}", output.display());
            Ok(())
        }
        Commands::Artist { artist_id, page } => print_json(
            &beatport
                .get_artist_tracks(artist_id, page_of(beatport, page)?)
                .await?,
        ),
        Commands::Label { label_id, page } => print_json(
            &beatport
                .get_label_tracks(label_id, page_of(beatport, page)?)
                .await?,
        ),
        Commands::Listing { uri } => {
            print_json(&beatport.get_tracks_from_listing_page(&uri).await?)
        }
        Commands::Login | Commands::Completions { .. } => Ok(()),
    }
}

fn page_of(beatport: &Beatport, number: u32) -> Result<Page> {
    Ok(beatport.page(number)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

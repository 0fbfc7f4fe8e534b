/// Social Downloader - Terminal Entry Point
///
/// Previews social media videos and downloads them through the Social
/// Downloader backend, showing a progress bar that blends backend-reported
/// progress with a client-side tail.
mod commands;
mod render;
mod selection;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use socialdl_shared::config::ClientConfig;
use socialdl_shared::models::TargetType;

use commands::Session;

#[derive(Parser, Debug)]
#[command(name = "socialdl", version, about = "Download video or audio from social media links")]
struct Cli {
    /// Backend base URL (overrides SOCIALDL_BACKEND_URL)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Directory for finished files (overrides SOCIALDL_DOWNLOAD_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Only print the file URL instead of saving the file
    #[arg(long, global = true)]
    no_save: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show title, duration and available qualities
    Info { url: String },
    /// Download a video or its audio track
    Download {
        url: String,
        /// video or audio
        #[arg(long = "type", default_value = "video")]
        target: TargetType,
        /// Video height, e.g. 720 (defaults to the best available)
        #[arg(long)]
        quality: Option<String>,
    },
    /// Interactive shell (default)
    Shell,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(backend) = &self.backend {
            config.backend_url = backend.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.download_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing (stderr, so progress output stays clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialdl=info,socialdl_shared=warn,socialdl_downloader=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    cli.apply(&mut config);
    debug!("Configuration: {:?}", config);
    info!("Backend: {}", config.backend_url);

    let mut session = Session::new(&config, !cli.no_save)?;

    let result = match cli.command.unwrap_or(Command::Shell) {
        Command::Info { url } => session.info(Some(url)).await.map(|_| ()),
        Command::Download { url, target, quality } => {
            session.selection_mut().target = target;
            session.download(url, quality).await
        }
        Command::Shell => session.run_shell().await,
    };

    session.shutdown().await;
    result
}

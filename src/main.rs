use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod config;
mod export;
mod mirror;
mod opml;
mod sync;
mod telemetry;

#[derive(Parser)]
#[command(name = "podcached", about = "Mirror podcast feeds to local storage")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror every configured feed and write the subscription list
    Sync(sync::SyncCmd),
    /// Render the configured feed list as OPML without fetching anything
    Export(export::ExportCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and PODCACHED_LOG_FORMAT
    telemetry::init_tracing();

    match cli.command {
        Commands::Sync(args) => sync::run(args).await?,
        Commands::Export(args) => export::run(args)?,
    }

    Ok(())
}

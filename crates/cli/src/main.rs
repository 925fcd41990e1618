use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "shelf", version, about = "Book catalog and review service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Insert the demo catalog when no books exist yet
        #[arg(long)]
        seed: bool,
    },
    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load SHELF settings")?;

    match cli.command {
        Command::Serve { seed } => shelf_app::run(settings, seed).await,
        Command::Openapi => {
            let document = shelf_app::openapi_document(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}

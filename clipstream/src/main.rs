mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use clipstream_core::messaging::ConnectionRegistry;
use clipstream_core::storage::MediaStore;
use clipstream_core::{logging, Config};

use server::{ClipstreamServer, Services};

#[derive(Parser, Debug)]
#[command(name = "clipstream")]
#[command(about = "Clipstream video sharing backend", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, env = "CLIPSTREAM_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(args.config.as_deref())?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Clipstream server starting...");
    info!("gRPC address: {}", config.grpc_address());
    info!("HTTP address: {}", config.http_address());

    // 4. Prepare the media store. This creates the upload directory and
    //    sweeps staging files left behind by a crash.
    let store = MediaStore::new(&config.storage.upload_dir);
    store.ensure_root().await?;
    info!(upload_dir = %store.root().display(), "Media store ready");

    // 5. Initialize the connection registry
    let registry = ConnectionRegistry::new();
    info!("Connection registry initialized");

    // 6. Start all servers
    let services = Services { store, registry };
    let server = ClipstreamServer::new(config, services);

    server.start().await?;

    Ok(())
}

/// ferrite-digits inference server
///
/// Loads the best checkpoint once and answers single-image requests:
///
///   GET /predict?input=<path or URL>   class probabilities as a bar chart
///   GET /health                        epoch and accuracy being served
///
/// Run with:
///   cargo run --bin serve --release -- --checkpoint checkpoints/best.ckpt
mod form;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tiny_http::Server;
use tracing::info;

use ferrite_digits::{ConvNet, FileCheckpointStore, InferenceGateway, SharedGateway, TrainConfig};

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Serve the best stored checkpoint over HTTP", version)]
struct Args {
    /// Checkpoint file written by `ferrite-digits train`
    #[arg(long, default_value = "checkpoints/best.ckpt")]
    checkpoint: PathBuf,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1:7878")]
    addr: String,

    /// TOML configuration describing the model architecture
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ferrite_digits=info,serve=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(p) => TrainConfig::from_toml_file(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => TrainConfig::default(),
    };

    let model = ConvNet::new(config.model, config.learning_rate, &mut StdRng::seed_from_u64(config.seed));
    let store = FileCheckpointStore::new(&args.checkpoint);
    let gateway = InferenceGateway::open(&store, model)
        .with_context(|| format!("Cannot serve checkpoint {}", args.checkpoint.display()))?;
    let served = gateway.checkpoint();

    let server = Server::http(&args.addr)
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", args.addr, e))?;
    info!(addr = %args.addr, epoch = served.epoch, accuracy = served.accuracy, "Serving checkpoint");

    let shared = Arc::new(SharedGateway::new(gateway));

    // Each request is handled on its own thread.
    for request in server.incoming_requests() {
        let gateway = shared.clone();
        std::thread::spawn(move || {
            routes::dispatch(request, gateway);
        });
    }
    Ok(())
}

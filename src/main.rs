// ferrite-digits: train the digit classifier to convergence, or run one
// prediction against the best checkpoint.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};

use ferrite_digits::data::load_idx_pair;
use ferrite_digits::{
    ConvNet, FileCheckpointStore, GatewayResponse, InferenceGateway, TrainConfig, TrainingController,
};

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

#[derive(Parser, Debug)]
#[command(name = "ferrite-digits")]
#[command(about = "Train a digit classifier to convergence and query its best checkpoint", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on an MNIST-format directory and print the run report as JSON
    Train {
        /// Directory holding the IDX files
        #[arg(long)]
        data_dir: PathBuf,

        /// TOML training configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Evaluate on the last N shuffled training examples instead of the
        /// t10k files, which are then not read
        #[arg(long, value_name = "N")]
        holdout: Option<usize>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Classify one image (local path or http(s) URL) with a stored checkpoint
    Predict {
        /// Checkpoint file written by `train`
        #[arg(long)]
        checkpoint: PathBuf,

        /// TOML configuration describing the model architecture
        #[arg(long)]
        config: Option<PathBuf>,

        /// Image path or URL; empty prints the placeholder response
        #[arg(default_value = "")]
        input: String,
    },
}

/// Command-line values that win over the configuration file.
#[derive(Args, Debug)]
struct Overrides {
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    max_epochs: Option<usize>,
    #[arg(long)]
    target_accuracy: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut TrainConfig) {
        if let Some(v) = self.batch_size { config.batch_size = v; }
        if let Some(v) = self.learning_rate { config.learning_rate = v; }
        if let Some(v) = self.max_epochs { config.max_epochs = v; }
        if let Some(v) = self.target_accuracy { config.target_accuracy = v; }
        if let Some(v) = self.seed { config.seed = v; }
        if let Some(v) = self.checkpoint { config.checkpoint_path = v; }
    }
}

fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Train { data_dir, config, holdout, overrides } => {
            run_train(&data_dir, config.as_deref(), holdout, overrides)
        }
        Command::Predict { checkpoint, config, input } => run_predict(&checkpoint, config.as_deref(), &input),
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ferrite_digits=info"));
    // Logs go to stderr so stdout stays clean JSON.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TrainConfig> {
    match path {
        Some(p) => TrainConfig::from_toml_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(TrainConfig::default()),
    }
}

fn run_train(data_dir: &Path, config_path: Option<&Path>, holdout: Option<usize>, overrides: Overrides) -> Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    config.validate().context("Invalid training configuration")?;

    let classes = config.model.num_classes;
    let mut train = load_idx_pair(&data_dir.join(TRAIN_IMAGES), &data_dir.join(TRAIN_LABELS), classes)
        .with_context(|| format!("Failed to load training set from {}", data_dir.display()))?
        .shuffled(config.seed);
    let test = match holdout {
        Some(n) => {
            if n == 0 || n >= train.len() {
                anyhow::bail!("--holdout must be between 1 and {} for this training set", train.len().saturating_sub(1));
            }
            info!(holdout = n, remaining = train.len() - n, "Evaluating on a held-out tail of the training set");
            train.split_off(n)
        }
        None => load_idx_pair(&data_dir.join(TEST_IMAGES), &data_dir.join(TEST_LABELS), classes)
            .with_context(|| format!("Failed to load test set from {}", data_dir.display()))?,
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = ConvNet::new(config.model, config.learning_rate, &mut rng);
    let store = FileCheckpointStore::new(&config.checkpoint_path);
    info!(checkpoint = %config.checkpoint_path.display(), "Checkpoints will be written here");

    let mut controller = TrainingController::new(model, store, config)?;
    let report = controller.run(&train, &test).context("Training run failed")?;

    if !report.persistence_failures.is_empty() {
        warn!(
            failures = report.persistence_failures.len(),
            best_persisted = report.best_is_persisted(),
            "Some checkpoint writes failed during the run"
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_predict(checkpoint: &Path, config_path: Option<&Path>, input: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = ConvNet::new(config.model, config.learning_rate, &mut rng);

    let store = FileCheckpointStore::new(checkpoint);
    let mut gateway = InferenceGateway::open(&store, model)
        .with_context(|| format!("Cannot serve checkpoint {}", checkpoint.display()))?;

    let response = gateway.handle_request(input);
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let GatewayResponse::InvalidInput { message } = response {
        anyhow::bail!("Invalid input: {message}");
    }
    Ok(())
}

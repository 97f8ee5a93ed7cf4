pub mod controller;
pub mod epoch_stats;
pub mod report;
pub mod state;
pub mod train_config;

pub use controller::TrainingController;
pub use epoch_stats::EpochStats;
pub use report::{PersistenceFailure, TrainingReport};
pub use state::{EpochDecision, RunState, TrainingState};
pub use train_config::TrainConfig;

pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod network;
pub mod model;
pub mod data;
pub mod metrics;
pub mod checkpoint;
pub mod train;
pub mod inference;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{ConvNet, ConvNetSpec, Network};
pub use optim::sgd::Sgd;
pub use model::Model;
pub use data::{Dataset, Image, ImageShape, Minibatch};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use train::{RunState, TrainConfig, TrainingController, TrainingReport};
pub use inference::{GatewayResponse, InferenceGateway, SharedGateway};
pub use error::{Error, Result};

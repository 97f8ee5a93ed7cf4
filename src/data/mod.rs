pub mod batcher;
pub mod dataset;
pub mod idx;

pub use batcher::{make_minibatch, partition, Minibatch, Minibatches};
pub use dataset::{Dataset, Image, ImageShape};
pub use idx::{load_idx_pair, parse_idx_pair};

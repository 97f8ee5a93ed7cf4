pub mod conv;
pub mod dense;

pub use conv::{max_pool_2x2, Conv2d, ConvGradients};
pub use dense::{Layer, LayerGradients};

//! Single-image serving path over the latest stored checkpoint.

pub mod gateway;
pub mod preprocess;

pub use gateway::{load_input, BarChart, GatewayResponse, InferenceGateway, SharedGateway, SUPPORTED_EXTENSIONS};
pub use preprocess::decode_image;

pub mod convnet;
pub mod network;
pub mod spec;

pub use convnet::ConvNet;
pub use network::Network;
pub use spec::ConvNetSpec;

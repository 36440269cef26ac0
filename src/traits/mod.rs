pub mod broker;
pub mod codec;
pub mod collaborators;

pub use broker::{Broker, BrokerSession, Delivery};
pub use codec::{Codec, WIRE_VERSION};
pub use collaborators::{Renderer, Transform};

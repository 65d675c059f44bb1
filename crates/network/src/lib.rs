//! The Transport contract (spec §4.3) and a libp2p-backed implementation.

pub mod behavior;
pub mod libp2p_transport;
pub mod mock;
pub mod transport;

pub use libp2p_transport::LibP2pTransport;
pub use mock::InMemoryTransport;
pub use transport::{StreamHandler, Transport};

//! Hub connection management: state machine, transports, and recovery.

pub mod manager;
pub mod memory;
pub mod state;
pub mod transport;
pub mod websocket;

pub use manager::{ConnectOptions, ConnectionManager, HubSignal};
pub use memory::MemoryTransport;
pub use state::{ConnectionState, ConnectionStatus};
pub use transport::{HubLink, HubTransport};
pub use websocket::WebSocketTransport;

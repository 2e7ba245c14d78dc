// sv241-api: Async Rust client for the SV241 proxy (REST + live log WebSocket)

pub mod error;
pub mod models;
pub mod proxy;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use proxy::client::ProxyClient;
pub use transport::TransportConfig;

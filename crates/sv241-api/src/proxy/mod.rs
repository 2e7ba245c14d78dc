// Proxy REST client
//
// `client` holds transport mechanics; every other module adds endpoint
// methods to `ProxyClient` through its own `impl` block.

pub mod client;
mod device;
mod power;
mod settings;
mod system;
mod telemetry;

pub mod client;
mod error;
#[cfg(test)]
pub mod fake;
pub mod http_client;
pub mod types;

pub use client::{ClientFactory, DeviceClient};
pub use error::ClientError;

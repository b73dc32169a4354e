pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod security;
pub mod thread;
pub mod transport;
pub mod utils;

pub use client::IdeasHub;
pub use transport::{ApiError, ApiRequest, GatewayClient, UploadFile};

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod types;
pub mod config;
pub mod channel;
pub mod store;
pub mod provider;
pub mod agent;
pub mod service;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

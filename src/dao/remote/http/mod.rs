mod client;
mod config;
mod error;
mod models;

pub use client::HttpBackend;
pub use config::HttpBackendConfig;
pub use error::{HttpDaoError, HttpResult};

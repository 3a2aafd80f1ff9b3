//! Log API host service: configuration, router and server loop.

pub mod config;
pub mod http;

pub use config::AppConfig;
pub use http::{AppState, ServeConfig, build_router, serve};

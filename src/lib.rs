pub mod alert;
pub mod api;
pub mod config;
pub mod engine;
pub mod monitor;
pub mod normalize;
pub mod reporter;
pub mod state;
pub mod types;

/// Polymarket data API base URL (public, no auth required)
pub const DATA_API_BASE: &str = "https://data-api.polymarket.com";

/// Polymarket Gamma API base URL (events and market metadata)
pub const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

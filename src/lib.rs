//! `tenki` - server-rendered viewer for JMA overview weather forecasts
//!
//! This library provides the region catalog, the JMA forecast client, the
//! per-region forecast cache with reload support, and the HTML views served
//! by the web frontend.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod store;
pub mod telemetry;
pub mod web;

// Re-export core types for public API
pub use api::{ForecastSource, JmaClient};
pub use config::TenkiConfig;
pub use error::{FetchError, TenkiError};
pub use models::{RegionCatalog, RegionCode, RegionEntry, RegionLink, WeatherReport};
pub use render::PageRenderer;
pub use store::{FetchState, ForecastStore};
pub use web::AppState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TenkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

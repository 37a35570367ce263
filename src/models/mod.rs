//! Data models for the tenki application
//!
//! - Region: region codes and the catalog listed on the index page
//! - Report: the overview forecast document served by JMA

pub mod region;
pub mod report;

pub use region::{RegionCatalog, RegionCode, RegionEntry, RegionLink};
pub use report::WeatherReport;

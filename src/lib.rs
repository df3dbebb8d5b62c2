//! Filtering, aggregation and choropleth styling for per-locality
//! school-enrollment data loaded from a GeoJSON `FeatureCollection`.

pub mod charts;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod map;
pub mod processing;
pub mod render;
pub mod request;
pub mod server;
pub mod stats;
pub mod types;

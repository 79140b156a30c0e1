//! # aeroread
//!
//! A data-location and ingestion engine for gridded model output and
//! station observations.
//!
//! This library locates model data directories under configured search
//! roots, decodes AeroCom file naming conventions, assembles multi-year
//! NetCDF model output into in-memory gridded datasets, and parses
//! station observation networks with a fingerprinted binary read-cache.
//!
//! ## Key Features
//!
//! - **Convention-aware file discovery**: aerocom2/aerocom3 filename parsing
//!   with per-directory inference
//! - **Multi-year assembly**: time-concatenation of per-year NetCDF files
//!   with overlap detection
//! - **Batch reads**: parallel multi-model reads with per-model failure
//!   isolation
//! - **Observation ingestion**: per-station archives with a content-hashed
//!   binary cache
//!
//! ## Architecture
//!
//! - **Location Layer**: search roots, naming conventions, region registry
//! - **Grid Layer**: NetCDF loading, gridded datasets, spatiotemporal subsetting
//! - **Reader Layer**: single and multi-model readers, observation networks,
//!   read-cache

pub mod config;
pub mod convention;
pub mod error;
pub mod griddata;
pub mod loader;
pub mod logging;
pub mod obsdata;
pub mod reader;
pub mod region;
pub mod subset;

pub use config::Config;
pub use convention::{FileConvention, FileInfo, TsType};
pub use error::{AeroreadError, Result};
pub use griddata::{GriddedDataset, LonConvention};
pub use logging::{init_tracing, log_error, log_read_stats, log_timed_operation};
pub use obsdata::{ObsDataset, StationSeries, StationValues};
pub use reader::{
    import_data, read_daily, CacheStrategy, MultiReadResult, ObsNetwork, ReadGridded,
    ReadGriddedMulti,
};
pub use region::{Region, RegionRegistry};
pub use subset::{crop, crop_region, GeoBounds, TimeWindow};

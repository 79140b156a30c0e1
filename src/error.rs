//! Error types for the aeroread engine.
//!
//! This module defines a comprehensive error enum that covers all possible
//! error conditions in the ingestion and subsetting pipeline.

use thiserror::Error;

/// The main error type for aeroread operations.
#[derive(Error, Debug)]
pub enum AeroreadError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A model id resolved to zero or several directories under the search roots
    #[error("Model directory not found for '{data_id}': {message}")]
    ModelDirNotFound { data_id: String, message: String },

    /// An observation network name is not supported by any registered reader
    #[error("Unsupported observation network: {network}")]
    UnsupportedNetwork { network: String },

    /// A named file convention is not registered
    #[error("Unknown file convention: {name}")]
    UnknownConvention { name: String },

    /// No unambiguous convention could be inferred from an example filename
    #[error("Convention inference failed for '{filename}': {message}")]
    ConventionInference { filename: String, message: String },

    /// A filename does not match the shape expected by a resolved convention
    #[error("Filename '{filename}' does not match convention '{convention}': {message}")]
    FilenameMismatch {
        filename: String,
        convention: String,
        message: String,
    },

    /// Two input files cover overlapping time ranges for the same variable
    #[error("Overlapping time ranges between '{first}' and '{second}'")]
    OverlappingData { first: String, second: String },

    /// A requested spatial subset does not overlap the dataset extent
    #[error("Empty intersection: {message}")]
    EmptyIntersection { message: String },

    /// A time window was requested with start after stop
    #[error("Invalid time range: start {start} is after stop {stop}")]
    InvalidTimeRange { start: String, stop: String },

    /// A region id is not present in the registry
    #[error("Unknown region: {name}")]
    UnknownRegion { name: String },

    /// Data not found errors
    #[error("Data not found: {message}")]
    DataNotFound { message: String },

    /// Coordinate axes or array shapes are inconsistent
    #[error("Dimension mismatch: {message}")]
    DimensionMismatch { message: String },

    /// Observation cache read/write errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ndarray shape errors from concatenation and reshaping
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Convenience type alias for Results with AeroreadError
pub type Result<T> = std::result::Result<T, AeroreadError>;

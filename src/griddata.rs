//! The in-memory representation of one model variable's gridded field.
//!
//! A [`GriddedDataset`] holds a single variable for a single model over a
//! (possibly concatenated) time range, with explicit latitude, longitude and
//! time coordinate axes. It is created by read operations and narrowed only
//! through explicit crop/extract steps that return new datasets.

use chrono::{DateTime, Utc};
use ndarray::Array3;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::convention::TsType;
use crate::error::{AeroreadError, Result};
use crate::loader::AttributeValue;

/// The longitude convention a dataset's axis is currently expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LonConvention {
    /// -180..180 degrees east (the system's canonical convention)
    Canonical,
    /// 0..360 degrees east
    ZeroTo360,
}

/// One variable's gridded field for one model, ordered (time, lat, lon).
#[derive(Debug, Clone)]
pub struct GriddedDataset {
    /// Model / dataset identifier
    pub data_id: String,
    /// Variable name
    pub var_name: String,
    /// Physical units, if declared in the source files
    pub units: Option<String>,
    /// Time resolution of the samples
    pub ts_type: TsType,
    /// Field values, shape (time, lat, lon)
    pub data: Array3<f32>,
    /// Latitude axis, degrees north
    pub lats: Vec<f64>,
    /// Longitude axis, degrees east
    pub lons: Vec<f64>,
    /// Time axis, strictly increasing
    pub times: Vec<DateTime<Utc>>,
    /// Convention the longitude axis is currently expressed in
    pub lon_convention: LonConvention,
    /// Variable attributes carried over from the source files
    pub attrs: HashMap<String, AttributeValue>,
    /// Files this dataset was assembled from, in time order
    pub source_files: Vec<PathBuf>,
}

/// Detect the longitude convention of an axis.
pub fn detect_lon_convention(lons: &[f64]) -> LonConvention {
    if lons.iter().any(|&lon| lon > 180.0) {
        LonConvention::ZeroTo360
    } else {
        LonConvention::Canonical
    }
}

impl GriddedDataset {
    /// Validate the coordinate-axis invariants against the data shape.
    pub fn validate(&self) -> Result<()> {
        let shape = self.data.shape();
        if shape != [self.times.len(), self.lats.len(), self.lons.len()] {
            return Err(AeroreadError::DimensionMismatch {
                message: format!(
                    "{} {}: data shape {:?} does not match axes (time {}, lat {}, lon {})",
                    self.data_id,
                    self.var_name,
                    shape,
                    self.times.len(),
                    self.lats.len(),
                    self.lons.len()
                ),
            });
        }
        if self.times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AeroreadError::DimensionMismatch {
                message: format!(
                    "{} {}: time axis is not strictly increasing",
                    self.data_id, self.var_name
                ),
            });
        }
        if self.lons.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AeroreadError::DimensionMismatch {
                message: format!(
                    "{} {}: longitude axis is not strictly increasing",
                    self.data_id, self.var_name
                ),
            });
        }
        Ok(())
    }

    /// First timestamp on the time axis.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.times.first().copied()
    }

    /// Last timestamp on the time axis.
    pub fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.times.last().copied()
    }

    /// Latitude extent (min, max).
    pub fn lat_bounds(&self) -> (f64, f64) {
        axis_bounds(&self.lats)
    }

    /// Longitude extent (min, max) in the current convention.
    pub fn lon_bounds(&self) -> (f64, f64) {
        axis_bounds(&self.lons)
    }

    /// Number of time samples.
    pub fn num_timestamps(&self) -> usize {
        self.times.len()
    }

    /// Report gaps on the time axis.
    ///
    /// A gap is a pair of consecutive timestamps spaced further apart than
    /// 1.5x the nominal step of the dataset's time resolution. Gaps are
    /// reported, never filled.
    pub fn time_gaps(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let threshold = self.ts_type.nominal_step() * 3 / 2;
        self.times
            .windows(2)
            .filter(|w| w[1] - w[0] > threshold)
            .map(|w| (w[0], w[1]))
            .collect()
    }

    /// One-line human summary for logs and the CLI.
    pub fn short_str(&self) -> String {
        let time_range = match (self.start_time(), self.stop_time()) {
            (Some(start), Some(stop)) => {
                format!("{} .. {}", start.format("%Y-%m-%d"), stop.format("%Y-%m-%d"))
            }
            _ => "empty".to_string(),
        };
        format!(
            "{} {} [{}] {} samples, grid {}x{}, {}",
            self.data_id,
            self.var_name,
            self.ts_type,
            self.times.len(),
            self.lats.len(),
            self.lons.len(),
            time_range
        )
    }
}

fn axis_bounds(axis: &[f64]) -> (f64, f64) {
    axis.iter().fold((f64::MAX, f64::MIN), |(min, max), &v| {
        (min.min(v), max.max(v))
    })
}

//! Station-based observation datasets.
//!
//! Observation networks deliver one file per station; the parsed result is a
//! flat list of [`StationSeries`] entries. The series payload is an explicit
//! tagged variant ([`StationValues`]) rather than duck-typed attribute
//! lookup: surface series carry one value per timestamp, profile series one
//! value per timestamp and vertical level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::convention::TsType;

/// The per-timestamp payload of one station's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StationValues {
    /// One value per timestamp
    Surface(Vec<f32>),
    /// One value per timestamp and vertical level
    Profile {
        /// Vertical levels, meters above ground
        levels: Vec<f32>,
        /// Outer index: timestamp; inner index: level
        samples: Vec<Vec<f32>>,
    },
}

impl StationValues {
    /// Number of time samples in the payload.
    pub fn len(&self) -> usize {
        match self {
            StationValues::Surface(values) => values.len(),
            StationValues::Profile { samples, .. } => samples.len(),
        }
    }

    /// Whether the payload holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A time-stamped value series for one station.
///
/// One station identity maps to exactly one coordinate pair within a
/// dataset; stations without any valid timestamp are dropped at parse time
/// instead of being kept as empty stubs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSeries {
    /// Station identifier
    pub station: String,
    /// Station latitude, degrees north
    pub latitude: f64,
    /// Station longitude, degrees east (-180..180)
    pub longitude: f64,
    /// Station altitude, meters
    pub altitude: f64,
    /// Sample timestamps, strictly increasing
    pub times: Vec<DateTime<Utc>>,
    /// Sample values, aligned with `times`
    pub values: StationValues,
}

/// One observation network's parsed data for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsDataset {
    /// Network name (e.g. "AeronetSunV3")
    pub network: String,
    /// Variable name
    pub var_name: String,
    /// Time resolution of the series
    pub ts_type: TsType,
    /// Per-station series
    pub stations: Vec<StationSeries>,
    /// Content fingerprint of the source files this parse covered
    pub fingerprint: u32,
}

impl ObsDataset {
    /// Total number of samples across all stations.
    pub fn num_samples(&self) -> usize {
        self.stations.iter().map(|s| s.values.len()).sum()
    }

    /// Station coordinates as (lat, lon) pairs, in station order.
    pub fn coords(&self) -> Vec<(f64, f64)> {
        self.stations
            .iter()
            .map(|s| (s.latitude, s.longitude))
            .collect()
    }

    /// Retain only stations inside a bounding box.
    pub fn filter_by_bounds(&self, bounds: &crate::subset::GeoBounds) -> ObsDataset {
        ObsDataset {
            network: self.network.clone(),
            var_name: self.var_name.clone(),
            ts_type: self.ts_type,
            stations: self
                .stations
                .iter()
                .filter(|s| bounds.contains(s.latitude, s.longitude))
                .cloned()
                .collect(),
            fingerprint: self.fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subset::GeoBounds;
    use chrono::TimeZone;

    fn station(name: &str, lat: f64, lon: f64) -> StationSeries {
        StationSeries {
            station: name.to_string(),
            latitude: lat,
            longitude: lon,
            altitude: 100.0,
            times: vec![Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap()],
            values: StationValues::Surface(vec![0.25]),
        }
    }

    #[test]
    fn test_num_samples_and_coords() {
        let dataset = ObsDataset {
            network: "AeronetSunV3".to_string(),
            var_name: "od550aer".to_string(),
            ts_type: TsType::Daily,
            stations: vec![station("alpha", 48.0, 11.0), station("beta", -20.0, 140.0)],
            fingerprint: 0,
        };
        assert_eq!(dataset.num_samples(), 2);
        assert_eq!(dataset.coords(), vec![(48.0, 11.0), (-20.0, 140.0)]);
    }

    #[test]
    fn test_filter_by_bounds() {
        let dataset = ObsDataset {
            network: "AeronetSunV3".to_string(),
            var_name: "od550aer".to_string(),
            ts_type: TsType::Daily,
            stations: vec![station("alpha", 48.0, 11.0), station("beta", -20.0, 140.0)],
            fingerprint: 0,
        };
        let europe = GeoBounds::new((40.0, 72.0), (-10.0, 40.0)).unwrap();
        let filtered = dataset.filter_by_bounds(&europe);
        assert_eq!(filtered.stations.len(), 1);
        assert_eq!(filtered.stations[0].station, "alpha");
    }

    #[test]
    fn test_profile_values_len() {
        let values = StationValues::Profile {
            levels: vec![100.0, 200.0],
            samples: vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]],
        };
        assert_eq!(values.len(), 3);
        assert!(!values.is_empty());
    }
}

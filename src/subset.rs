//! Spatial and temporal subsetting primitives.
//!
//! Shared by the model and observation readers: longitude normalization to
//! the canonical -180..180 convention, bounding-box cropping, extent
//! intersection and time-window construction.

use chrono::{DateTime, Utc};
use ndarray::Axis;
use tracing::debug;

use crate::error::{AeroreadError, Result};
use crate::griddata::{GriddedDataset, LonConvention};
use crate::region::Region;

/// A latitude/longitude bounding box in the canonical lon convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Latitude range (min, max)
    pub lat_range: (f64, f64),
    /// Longitude range (min, max), -180..180
    pub lon_range: (f64, f64),
}

impl GeoBounds {
    /// Create a bounding box; ranges must be ordered min <= max.
    pub fn new(lat_range: (f64, f64), lon_range: (f64, f64)) -> Result<Self> {
        if lat_range.0 > lat_range.1 || lon_range.0 > lon_range.1 {
            return Err(AeroreadError::Config {
                message: format!(
                    "Bounding box ranges must be ordered: lat {:?}, lon {:?}",
                    lat_range, lon_range
                ),
            });
        }
        Ok(Self {
            lat_range,
            lon_range,
        })
    }

    /// The overlap of two boxes, or None if they are disjoint.
    pub fn intersect(&self, other: &GeoBounds) -> Option<GeoBounds> {
        let lat = (
            self.lat_range.0.max(other.lat_range.0),
            self.lat_range.1.min(other.lat_range.1),
        );
        let lon = (
            self.lon_range.0.max(other.lon_range.0),
            self.lon_range.1.min(other.lon_range.1),
        );
        if lat.0 > lat.1 || lon.0 > lon.1 {
            None
        } else {
            Some(GeoBounds {
                lat_range: lat,
                lon_range: lon,
            })
        }
    }

    /// Whether a coordinate pair falls inside the box (inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_range.0
            && lat <= self.lat_range.1
            && lon >= self.lon_range.0
            && lon <= self.lon_range.1
    }
}

impl From<&Region> for GeoBounds {
    fn from(region: &Region) -> Self {
        Self {
            lat_range: region.lat_range,
            lon_range: region.lon_range,
        }
    }
}

/// An inclusive time window usable as a reusable predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Window start (inclusive)
    pub start: DateTime<Utc>,
    /// Window stop (inclusive)
    pub stop: DateTime<Utc>,
}

impl TimeWindow {
    /// Whether a timestamp falls inside the window.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.stop
    }
}

/// Build a time-window predicate covering `start..=stop`.
pub fn get_time_constraint(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<TimeWindow> {
    if start > stop {
        return Err(AeroreadError::InvalidTimeRange {
            start: start.to_rfc3339(),
            stop: stop.to_rfc3339(),
        });
    }
    Ok(TimeWindow { start, stop })
}

/// Rewrap a 0..360 longitude axis to the canonical -180..180 convention.
///
/// Longitudes above 180 are shifted down by 360 and the axis (with the data
/// along it) is re-sorted monotonically. Applying this twice is a no-op and
/// the multiset of data values is preserved; only coordinate labels and
/// their order change.
pub fn check_and_regrid_lons(dataset: &mut GriddedDataset) -> bool {
    if dataset.lon_convention == LonConvention::Canonical
        && dataset.lons.iter().all(|&lon| lon <= 180.0)
    {
        return false;
    }

    let wrapped: Vec<f64> = dataset
        .lons
        .iter()
        .map(|&lon| if lon > 180.0 { lon - 360.0 } else { lon })
        .collect();

    let mut order: Vec<usize> = (0..wrapped.len()).collect();
    order.sort_by(|&a, &b| {
        wrapped[a]
            .partial_cmp(&wrapped[b])
            .expect("longitude values are finite")
    });

    dataset.lons = order.iter().map(|&i| wrapped[i]).collect();
    dataset.data = dataset.data.select(Axis(2), &order);
    dataset.lon_convention = LonConvention::Canonical;

    debug!(
        data_id = %dataset.data_id,
        var = %dataset.var_name,
        "Rewrapped longitude axis to -180..180"
    );
    true
}

/// Crop a dataset to a bounding box, optionally also to a time window.
///
/// Returns a new, narrower dataset; the input is untouched. Fails with
/// `EmptyIntersection` if the box does not overlap the dataset's spatial
/// extent, or if the time window selects no samples.
pub fn crop(
    dataset: &GriddedDataset,
    bounds: &GeoBounds,
    time_window: Option<&TimeWindow>,
) -> Result<GriddedDataset> {
    let lat_idx: Vec<usize> = dataset
        .lats
        .iter()
        .enumerate()
        .filter(|(_, &lat)| lat >= bounds.lat_range.0 && lat <= bounds.lat_range.1)
        .map(|(i, _)| i)
        .collect();
    let lon_idx: Vec<usize> = dataset
        .lons
        .iter()
        .enumerate()
        .filter(|(_, &lon)| lon >= bounds.lon_range.0 && lon <= bounds.lon_range.1)
        .map(|(i, _)| i)
        .collect();

    if lat_idx.is_empty() || lon_idx.is_empty() {
        return Err(AeroreadError::EmptyIntersection {
            message: format!(
                "{} {}: box lat {:?} lon {:?} does not overlap grid extent lat {:?} lon {:?}",
                dataset.data_id,
                dataset.var_name,
                bounds.lat_range,
                bounds.lon_range,
                dataset.lat_bounds(),
                dataset.lon_bounds()
            ),
        });
    }

    let time_idx: Vec<usize> = match time_window {
        Some(window) => dataset
            .times
            .iter()
            .enumerate()
            .filter(|(_, &t)| window.contains(t))
            .map(|(i, _)| i)
            .collect(),
        None => (0..dataset.times.len()).collect(),
    };
    if time_idx.is_empty() {
        return Err(AeroreadError::EmptyIntersection {
            message: format!(
                "{} {}: time window selects no samples",
                dataset.data_id, dataset.var_name
            ),
        });
    }

    let data = dataset
        .data
        .select(Axis(0), &time_idx)
        .select(Axis(1), &lat_idx)
        .select(Axis(2), &lon_idx);

    Ok(GriddedDataset {
        data_id: dataset.data_id.clone(),
        var_name: dataset.var_name.clone(),
        units: dataset.units.clone(),
        ts_type: dataset.ts_type,
        data,
        lats: lat_idx.iter().map(|&i| dataset.lats[i]).collect(),
        lons: lon_idx.iter().map(|&i| dataset.lons[i]).collect(),
        times: time_idx.iter().map(|&i| dataset.times[i]).collect(),
        lon_convention: dataset.lon_convention,
        attrs: dataset.attrs.clone(),
        source_files: dataset.source_files.clone(),
    })
}

/// Crop a dataset to a named region from a registry-resolved [`Region`].
pub fn crop_region(dataset: &GriddedDataset, region: &Region) -> Result<GriddedDataset> {
    crop(dataset, &GeoBounds::from(region), None)
}

/// Spatial (and, when both carry time axes, temporal) overlap of two
/// datasets' coordinate extents.
///
/// Works purely on extents, so it is independent of which dataset has the
/// coarser grid resolution.
pub fn intersection(
    a: &GriddedDataset,
    b: &GriddedDataset,
) -> Result<(GeoBounds, Option<TimeWindow>)> {
    let bounds_a = canonical_extent(a);
    let bounds_b = canonical_extent(b);

    let bounds = bounds_a
        .intersect(&bounds_b)
        .ok_or_else(|| AeroreadError::EmptyIntersection {
            message: format!(
                "{} and {} have disjoint spatial extents",
                a.data_id, b.data_id
            ),
        })?;

    let time_overlap = match (a.start_time(), a.stop_time(), b.start_time(), b.stop_time()) {
        (Some(start_a), Some(stop_a), Some(start_b), Some(stop_b)) => {
            let start = start_a.max(start_b);
            let stop = stop_a.min(stop_b);
            if start <= stop {
                Some(TimeWindow { start, stop })
            } else {
                None
            }
        }
        _ => None,
    };

    Ok((bounds, time_overlap))
}

/// A dataset's lat/lon extent with longitudes wrapped to -180..180.
fn canonical_extent(dataset: &GriddedDataset) -> GeoBounds {
    let (lon_min, lon_max) = dataset
        .lons
        .iter()
        .map(|&lon| if lon > 180.0 { lon - 360.0 } else { lon })
        .fold((f64::MAX, f64::MIN), |(min, max), v| {
            (min.min(v), max.max(v))
        });
    GeoBounds {
        lat_range: dataset.lat_bounds(),
        lon_range: (lon_min, lon_max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::TsType;
    use chrono::TimeZone;
    use ndarray::Array3;
    use std::collections::HashMap;

    fn dataset_with_lons(lons: Vec<f64>) -> GriddedDataset {
        let times: Vec<DateTime<Utc>> = (0..2)
            .map(|d| Utc.with_ymd_and_hms(2010, 1, 1 + d, 0, 0, 0).unwrap())
            .collect();
        let num_lons = lons.len();
        GriddedDataset {
            data_id: "TESTMODEL".to_string(),
            var_name: "od550aer".to_string(),
            units: None,
            ts_type: TsType::Daily,
            data: Array3::from_shape_fn((2, 3, num_lons), |(t, y, x)| {
                (t * 3 * num_lons + y * num_lons + x) as f32
            }),
            lats: vec![-30.0, 0.0, 30.0],
            lon_convention: crate::griddata::detect_lon_convention(&lons),
            lons,
            times,
            attrs: HashMap::new(),
            source_files: vec![],
        }
    }

    fn sorted_values(dataset: &GriddedDataset) -> Vec<f32> {
        let mut values: Vec<f32> = dataset.data.iter().copied().collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values
    }

    #[test]
    fn test_regrid_lons_rewraps_and_sorts() {
        let mut dataset = dataset_with_lons(vec![0.0, 90.0, 180.0, 270.0]);
        let before = sorted_values(&dataset);

        assert!(check_and_regrid_lons(&mut dataset));
        assert_eq!(dataset.lons, vec![-90.0, 0.0, 90.0, 180.0]);
        assert_eq!(dataset.lon_convention, LonConvention::Canonical);
        // Only labels and order changed, never the values themselves
        assert_eq!(sorted_values(&dataset), before);
        dataset.validate().unwrap();

        // Column previously at lon=270 now leads the axis at lon=-90
        assert_eq!(dataset.data[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_regrid_lons_idempotent() {
        let mut dataset = dataset_with_lons(vec![0.0, 90.0, 180.0, 270.0]);
        check_and_regrid_lons(&mut dataset);
        let lons = dataset.lons.clone();
        let data = dataset.data.clone();

        assert!(!check_and_regrid_lons(&mut dataset));
        assert_eq!(dataset.lons, lons);
        assert_eq!(dataset.data, data);
    }

    #[test]
    fn test_crop_subset_property() {
        let dataset = dataset_with_lons(vec![-120.0, -60.0, 0.0, 60.0, 120.0]);
        let bounds = GeoBounds::new((-10.0, 40.0), (-70.0, 70.0)).unwrap();
        let cropped = crop(&dataset, &bounds, None).unwrap();

        assert_eq!(cropped.lats, vec![0.0, 30.0]);
        assert_eq!(cropped.lons, vec![-60.0, 0.0, 60.0]);
        assert_eq!(cropped.data.shape(), &[2, 2, 3]);

        let (lat_min, lat_max) = cropped.lat_bounds();
        assert!(lat_min >= bounds.lat_range.0 && lat_max <= bounds.lat_range.1);
        let (lon_min, lon_max) = cropped.lon_bounds();
        assert!(lon_min >= bounds.lon_range.0 && lon_max <= bounds.lon_range.1);

        // Spot-check one value survived the crop at its new position
        assert_eq!(cropped.data[[0, 0, 0]], dataset.data[[0, 1, 1]]);
    }

    #[test]
    fn test_crop_disjoint_box() {
        let dataset = dataset_with_lons(vec![-120.0, -60.0, 0.0]);
        let bounds = GeoBounds::new((50.0, 60.0), (100.0, 110.0)).unwrap();
        assert!(matches!(
            crop(&dataset, &bounds, None),
            Err(AeroreadError::EmptyIntersection { .. })
        ));
    }

    #[test]
    fn test_crop_with_time_window() {
        let dataset = dataset_with_lons(vec![-120.0, -60.0, 0.0]);
        let window = get_time_constraint(
            Utc.with_ymd_and_hms(2010, 1, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2010, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let bounds = GeoBounds::new((-90.0, 90.0), (-180.0, 180.0)).unwrap();
        let cropped = crop(&dataset, &bounds, Some(&window)).unwrap();
        assert_eq!(cropped.times.len(), 1);
        assert_eq!(
            cropped.times[0],
            Utc.with_ymd_and_hms(2010, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_crop_region() {
        let dataset = dataset_with_lons(vec![-120.0, -60.0, 0.0, 60.0, 120.0]);
        let region = Region::new("EUROPEISH", (30.0, 70.0), (-10.0, 40.0)).unwrap();
        let cropped = crop_region(&dataset, &region).unwrap();
        assert_eq!(cropped.lats, vec![30.0]);
        assert_eq!(cropped.lons, vec![0.0]);
    }

    #[test]
    fn test_time_constraint_rejects_reversed_range() {
        let start = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            get_time_constraint(start, stop),
            Err(AeroreadError::InvalidTimeRange { .. })
        ));
        assert!(get_time_constraint(stop, start).is_ok());
    }

    #[test]
    fn test_intersection_extents() {
        let a = dataset_with_lons(vec![-120.0, -60.0, 0.0, 60.0]);
        // Finer grid on a different extent, 0..360 convention
        let b = dataset_with_lons(vec![300.0, 330.0, 350.0]);

        let (bounds, time_overlap) = intersection(&a, &b).unwrap();
        assert_eq!(bounds.lat_range, (-30.0, 30.0));
        assert_eq!(bounds.lon_range, (-60.0, -10.0));
        assert!(time_overlap.is_some());
    }

    #[test]
    fn test_intersection_disjoint() {
        let mut a = dataset_with_lons(vec![-120.0, -110.0]);
        a.lats = vec![60.0, 70.0, 80.0];
        let mut b = dataset_with_lons(vec![-120.0, -110.0]);
        b.lats = vec![-80.0, -70.0, -60.0];
        assert!(matches!(
            intersection(&a, &b),
            Err(AeroreadError::EmptyIntersection { .. })
        ));
    }
}

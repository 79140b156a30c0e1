//! Named geographic regions used for spatial subsetting.
//!
//! Regions are simple bounding boxes in the canonical -180..180 longitude
//! convention. A default set of continental-scale regions is built once at
//! process start; readers and tests can also construct isolated registries.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AeroreadError, Result};

/// A named geographic bounding box.
///
/// `lat_range` and `lon_range` define the subsetting box; the `_plot`
/// ranges are slightly wider and only used by downstream plotting tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Unique region id
    pub name: String,
    /// Latitude range (min, max), degrees north
    pub lat_range: (f64, f64),
    /// Longitude range (min, max), degrees east in -180..180
    pub lon_range: (f64, f64),
    /// Latitude range used for map display
    pub lat_range_plot: (f64, f64),
    /// Longitude range used for map display
    pub lon_range_plot: (f64, f64),
}

impl Region {
    /// Create a region with identical subset and plot ranges.
    pub fn new(name: &str, lat_range: (f64, f64), lon_range: (f64, f64)) -> Result<Self> {
        let region = Self {
            name: name.to_string(),
            lat_range,
            lon_range,
            lat_range_plot: lat_range,
            lon_range_plot: lon_range,
        };
        region.validate()?;
        Ok(region)
    }

    /// Check the axis ordering and longitude convention invariants.
    pub fn validate(&self) -> Result<()> {
        if self.lat_range.0 > self.lat_range.1 {
            return Err(AeroreadError::Config {
                message: format!(
                    "Region {}: latitude range min {} exceeds max {}",
                    self.name, self.lat_range.0, self.lat_range.1
                ),
            });
        }
        if self.lon_range.0 > self.lon_range.1 {
            return Err(AeroreadError::Config {
                message: format!(
                    "Region {}: longitude range min {} exceeds max {}",
                    self.name, self.lon_range.0, self.lon_range.1
                ),
            });
        }
        if self.lon_range.0 < -180.0 || self.lon_range.1 > 180.0 {
            return Err(AeroreadError::Config {
                message: format!(
                    "Region {}: longitude range {:?} outside -180..180",
                    self.name, self.lon_range
                ),
            });
        }
        if self.lat_range.0 < -90.0 || self.lat_range.1 > 90.0 {
            return Err(AeroreadError::Config {
                message: format!(
                    "Region {}: latitude range {:?} outside -90..90",
                    self.name, self.lat_range
                ),
            });
        }
        Ok(())
    }
}

/// Static table backing the default registry.
///
/// Ranges follow the AeroCom continental region definitions.
const DEFAULT_REGIONS: &[(&str, (f64, f64), (f64, f64))] = &[
    ("WORLD", (-90.0, 90.0), (-180.0, 180.0)),
    ("EUROPE", (40.0, 72.0), (-10.0, 40.0)),
    ("ASIA", (0.0, 72.0), (50.0, 150.0)),
    ("AUSTRALIA", (-50.0, -10.0), (110.0, 155.0)),
    ("CHINA", (20.0, 50.0), (90.0, 130.0)),
    ("INDIA", (5.0, 35.0), (65.0, 90.0)),
    ("NAFRICA", (0.0, 40.0), (-17.0, 50.0)),
    ("SAFRICA", (-35.0, 0.0), (10.0, 40.0)),
    ("NAMERICA", (20.0, 80.0), (-150.0, -45.0)),
    ("SAMERICA", (-60.0, 20.0), (-105.0, -30.0)),
];

static DEFAULT_REGISTRY: Lazy<RegionRegistry> = Lazy::new(|| {
    let mut registry = RegionRegistry::empty();
    for (name, lat_range, lon_range) in DEFAULT_REGIONS {
        let region =
            Region::new(name, *lat_range, *lon_range).expect("default region table is valid");
        registry.insert(region);
    }
    registry
});

/// An immutable-after-construction mapping from region id to [`Region`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionRegistry {
    regions: BTreeMap<String, Region>,
}

impl RegionRegistry {
    /// An empty registry, for tests and custom region sets.
    pub fn empty() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }

    /// The process-wide default region set.
    pub fn default_set() -> &'static RegionRegistry {
        &DEFAULT_REGISTRY
    }

    /// Add or replace a region.
    pub fn insert(&mut self, region: Region) {
        self.regions.insert(region.name.clone(), region);
    }

    /// Look up a region by id.
    pub fn get(&self, name: &str) -> Result<&Region> {
        self.regions
            .get(name)
            .ok_or_else(|| AeroreadError::UnknownRegion {
                name: name.to_string(),
            })
    }

    /// All region ids in the registry, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    /// Number of registered regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the registry holds no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterate over the registered regions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Import a whole registry from a JSON table of regions.
    pub fn from_json(json: &str) -> Result<Self> {
        let regions: Vec<Region> = serde_json::from_str(json)?;
        let mut registry = Self::empty();
        for region in regions {
            region.validate()?;
            registry.insert(region);
        }
        Ok(registry)
    }
}

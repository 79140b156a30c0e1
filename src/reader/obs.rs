//! Observation network readers.
//!
//! Station archives deliver one delimited text file per station: a short
//! `# key: value` header block (station name and coordinates) followed by a
//! column-header row and daily data rows. Which column holds which variable
//! is a per-network mapping, so callers always ask for variables by their
//! canonical names (e.g. `od550aer`).
//!
//! Raw parsing is the slow path; [`import_data`] prefers the binary
//! read-cache keyed by the source directory's content fingerprint and falls
//! back to a raw parse (refreshing the cache) when the fingerprint changed.

use chrono::{NaiveDate, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::cache::{compute_fingerprint, read_cache, save_cache};
use super::{dir_names, is_hidden, matching_data_dirs};
use crate::config::Config;
use crate::convention::TsType;
use crate::error::{AeroreadError, Result};
use crate::obsdata::{ObsDataset, StationSeries, StationValues};

/// Values at or below this threshold mark missing samples in the archives.
const MISSING_VALUE: f32 = -990.0;

/// Column layout and conventions of one network's station files.
#[derive(Debug)]
struct NetworkSpec {
    dir_name: &'static str,
    col_delim: char,
    file_ext: &'static str,
    ts_type: TsType,
    /// Canonical variable name -> file column name
    var_columns: &'static [(&'static str, &'static str)],
}

const AERONET_SUN_V3: NetworkSpec = NetworkSpec {
    dir_name: "AeronetSunV3",
    col_delim: ',',
    file_ext: "csv",
    ts_type: TsType::Daily,
    var_columns: &[
        ("od550aer", "AOD_550nm"),
        ("od440aer", "AOD_440nm"),
        ("ang4487aer", "Angstrom_Exponent_440-870nm"),
    ],
};

const AERONET_SDA_V3: NetworkSpec = NetworkSpec {
    dir_name: "AeronetSdaV3",
    col_delim: ',',
    file_ext: "csv",
    ts_type: TsType::Daily,
    var_columns: &[
        ("od550lt1aer", "FineModeAOD_550nm"),
        ("od550gt1aer", "CoarseModeAOD_550nm"),
    ],
};

/// A supported observation network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObsNetwork {
    /// AERONET sun photometer direct-sun product, version 3
    AeronetSunV3,
    /// AERONET spectral deconvolution product, version 3
    AeronetSdaV3,
}

impl ObsNetwork {
    /// Parse a network name; unknown names fail before any I/O happens.
    pub fn parse(name: &str) -> Result<Self> {
        name.parse().map_err(|_| AeroreadError::UnsupportedNetwork {
            network: name.to_string(),
        })
    }

    fn spec(&self) -> &'static NetworkSpec {
        match self {
            ObsNetwork::AeronetSunV3 => &AERONET_SUN_V3,
            ObsNetwork::AeronetSdaV3 => &AERONET_SDA_V3,
        }
    }

    /// Directory name of the network under the observation roots.
    pub fn dir_name(&self) -> &'static str {
        self.spec().dir_name
    }

    /// The file column holding a canonical variable, if the network
    /// provides it.
    fn var_column(&self, var_name: &str) -> Result<&'static str> {
        self.spec()
            .var_columns
            .iter()
            .find(|(var, _)| *var == var_name)
            .map(|(_, column)| *column)
            .ok_or_else(|| AeroreadError::DataNotFound {
                message: format!(
                    "variable {} is not provided by network {}",
                    var_name,
                    self.dir_name()
                ),
            })
    }

    /// Canonical variable names the network provides.
    pub fn vars_provided(&self) -> Vec<&'static str> {
        self.spec().var_columns.iter().map(|(var, _)| *var).collect()
    }
}

impl FromStr for ObsNetwork {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "AeronetSunV3" => Ok(ObsNetwork::AeronetSunV3),
            "AeronetSdaV3" => Ok(ObsNetwork::AeronetSdaV3),
            _ => Err(()),
        }
    }
}

/// Cache usage policy for [`import_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Use a fresh cache entry when present, else parse raw and refresh
    PreferCache,
    /// Always parse raw; do not touch the cache
    ForceRaw,
    /// Always parse raw and overwrite the cache entry
    ForceRefresh,
}

/// Parse the raw per-station source files of a network for one variable.
pub fn read_daily(network_name: &str, var_name: &str, config: &Config) -> Result<ObsDataset> {
    let network = ObsNetwork::parse(network_name)?;
    let column = network.var_column(var_name)?;
    let dir = resolve_network_dir(network, config)?;
    let fingerprint = compute_fingerprint(&dir)?;
    parse_network_dir(network, &dir, var_name, column, fingerprint)
}

/// Load a network's data for one variable, preferring the read-cache.
///
/// The default policy is: use a cache entry whose fingerprint matches the
/// current source files; otherwise parse raw and refresh the cache. The
/// strategy parameter makes the raw re-parse explicit instead of an ambient
/// flag.
pub fn import_data(
    network_name: &str,
    var_name: &str,
    config: &Config,
    strategy: CacheStrategy,
) -> Result<ObsDataset> {
    let network = ObsNetwork::parse(network_name)?;
    let column = network.var_column(var_name)?;
    let dir = resolve_network_dir(network, config)?;
    let fingerprint = compute_fingerprint(&dir)?;
    let cache_dir = &config.paths.cache_dir;

    if strategy == CacheStrategy::PreferCache {
        if let Some(dataset) = read_cache(cache_dir, network.dir_name(), var_name, fingerprint)? {
            info!(
                network = network.dir_name(),
                var = var_name,
                stations = dataset.stations.len(),
                "Loaded observations from cache"
            );
            return Ok(dataset);
        }
    }

    let dataset = parse_network_dir(network, &dir, var_name, column, fingerprint)?;
    match strategy {
        CacheStrategy::ForceRaw => {}
        CacheStrategy::PreferCache | CacheStrategy::ForceRefresh => {
            save_cache(cache_dir, &dataset)?;
        }
    }
    Ok(dataset)
}

/// Resolve a network to exactly one directory under the observation roots.
fn resolve_network_dir(network: ObsNetwork, config: &Config) -> Result<PathBuf> {
    let matches = matching_data_dirs(&config.paths.obs_roots, network.dir_name())?;
    match matches.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(AeroreadError::DataNotFound {
            message: format!(
                "no directory for network {} under roots {:?}",
                network.dir_name(),
                config.paths.obs_roots
            ),
        }),
        many => Err(AeroreadError::DataNotFound {
            message: format!(
                "ambiguous directories for network {}: {}",
                network.dir_name(),
                dir_names(many)
            ),
        }),
    }
}

/// Walk a network directory and parse every station file.
fn parse_network_dir(
    network: ObsNetwork,
    dir: &Path,
    var_name: &str,
    column: &str,
    fingerprint: u32,
) -> Result<ObsDataset> {
    let spec = network.spec();
    let mut stations = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !is_hidden(e.path()))
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == spec.file_ext)
                .unwrap_or(false)
        })
    {
        match parse_station_file(entry.path(), spec, column) {
            Ok(Some(series)) => stations.push(series),
            Ok(None) => {
                // No valid samples in range: dropped, not kept as a stub
                debug!(file = %entry.path().display(), "Station has no valid samples");
            }
            Err(err) => {
                skipped += 1;
                warn!(file = %entry.path().display(), error = %err, "Skipping unreadable station file");
            }
        }
    }

    info!(
        network = network.dir_name(),
        var = var_name,
        stations = stations.len(),
        skipped_files = skipped,
        "Parsed observation network"
    );

    Ok(ObsDataset {
        network: network.dir_name().to_string(),
        var_name: var_name.to_string(),
        ts_type: spec.ts_type,
        stations,
        fingerprint,
    })
}

/// Parse one per-station file; `Ok(None)` means the station had no valid
/// samples and is to be dropped.
fn parse_station_file(
    path: &Path,
    spec: &NetworkSpec,
    column: &str,
) -> Result<Option<StationSeries>> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines();

    let mut station = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut altitude = 0.0f64;
    let mut header_row = None;

    // `# key: value` metadata block, then the column-header row
    for line in lines.by_ref() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(meta) = line.strip_prefix('#') {
            if let Some((key, value)) = meta.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "Station" => station = Some(value.to_string()),
                    "Latitude" => latitude = value.parse().ok(),
                    "Longitude" => longitude = value.parse().ok(),
                    "Altitude" => altitude = value.parse().unwrap_or(0.0),
                    _ => {}
                }
            }
            continue;
        }
        header_row = Some(line);
        break;
    }

    let bad_file = |message: String| AeroreadError::DataNotFound { message };

    let header_row =
        header_row.ok_or_else(|| bad_file(format!("{}: no column header", path.display())))?;
    let columns: Vec<&str> = header_row.split(spec.col_delim).map(str::trim).collect();
    let date_idx = columns
        .iter()
        .position(|c| *c == "date")
        .ok_or_else(|| bad_file(format!("{}: no date column", path.display())))?;
    let var_idx = columns
        .iter()
        .position(|c| *c == column)
        .ok_or_else(|| bad_file(format!("{}: no column {}", path.display(), column)))?;

    let latitude =
        latitude.ok_or_else(|| bad_file(format!("{}: missing latitude", path.display())))?;
    let longitude =
        longitude.ok_or_else(|| bad_file(format!("{}: missing longitude", path.display())))?;
    let station = station.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let mut samples: Vec<(chrono::DateTime<Utc>, f32)> = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(spec.col_delim).map(str::trim).collect();
        if fields.len() <= date_idx.max(var_idx) {
            continue;
        }
        let date = match NaiveDate::parse_from_str(fields[date_idx], "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => continue,
        };
        let value: f32 = match fields[var_idx].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !value.is_finite() || value <= MISSING_VALUE {
            continue;
        }
        let timestamp = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight"));
        samples.push((timestamp, value));
    }

    if samples.is_empty() {
        return Ok(None);
    }
    samples.sort_by_key(|(t, _)| *t);

    let (times, values): (Vec<_>, Vec<_>) = samples.into_iter().unzip();
    Ok(Some(StationSeries {
        station,
        latitude,
        longitude,
        altitude,
        times,
        values: StationValues::Surface(values),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_station_file(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn sample_network_dir(root: &Path) -> PathBuf {
        let dir = root.join("AeronetSunV3");
        std::fs::create_dir_all(&dir).unwrap();
        write_station_file(
            &dir,
            "Kuopio.csv",
            "# Station: Kuopio\n\
             # Latitude: 62.892\n\
             # Longitude: 27.634\n\
             # Altitude: 105.0\n\
             date,AOD_550nm,AOD_440nm\n\
             2019-06-01,0.123,0.150\n\
             2019-06-02,-999.0,0.140\n\
             2019-06-03,0.101,0.130\n",
        );
        write_station_file(
            &dir,
            "AllMissing.csv",
            "# Station: AllMissing\n\
             # Latitude: 10.0\n\
             # Longitude: 20.0\n\
             date,AOD_550nm\n\
             2019-06-01,-999.0\n",
        );
        dir
    }

    fn config_with_obs_root(root: &Path, cache_dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.obs_roots = vec![root.to_path_buf()];
        config.paths.cache_dir = cache_dir.to_path_buf();
        config
    }

    #[test]
    fn test_unsupported_network_fails_before_io() {
        let config = Config::default();
        assert!(matches!(
            read_daily("AeronetSunV9", "od550aer", &config),
            Err(AeroreadError::UnsupportedNetwork { .. })
        ));
    }

    #[test]
    fn test_read_daily_parses_and_drops_empty_stations() {
        let root = tempdir().unwrap();
        sample_network_dir(root.path());
        let cache = tempdir().unwrap();
        let config = config_with_obs_root(root.path(), cache.path());

        let dataset = read_daily("AeronetSunV3", "od550aer", &config).unwrap();
        assert_eq!(dataset.network, "AeronetSunV3");
        assert_eq!(dataset.ts_type, TsType::Daily);

        // AllMissing has no valid samples and is dropped entirely
        assert_eq!(dataset.stations.len(), 1);
        let kuopio = &dataset.stations[0];
        assert_eq!(kuopio.station, "Kuopio");
        assert_eq!(kuopio.latitude, 62.892);
        // The -999 sample on 2019-06-02 is filtered out
        assert_eq!(kuopio.times.len(), 2);
        assert_eq!(kuopio.values, StationValues::Surface(vec![0.123, 0.101]));
    }

    #[test]
    fn test_variable_not_provided() {
        let root = tempdir().unwrap();
        sample_network_dir(root.path());
        let cache = tempdir().unwrap();
        let config = config_with_obs_root(root.path(), cache.path());
        assert!(matches!(
            read_daily("AeronetSunV3", "concpm10", &config),
            Err(AeroreadError::DataNotFound { .. })
        ));
    }

    #[test]
    fn test_import_data_prefers_cache_and_detects_staleness() {
        let root = tempdir().unwrap();
        let dir = sample_network_dir(root.path());
        let cache = tempdir().unwrap();
        let config = config_with_obs_root(root.path(), cache.path());

        // First import parses raw and refreshes the cache
        let first = import_data(
            "AeronetSunV3",
            "od550aer",
            &config,
            CacheStrategy::PreferCache,
        )
        .unwrap();

        // Second import must hit the cache and reproduce the parse exactly
        let second = import_data(
            "AeronetSunV3",
            "od550aer",
            &config,
            CacheStrategy::PreferCache,
        )
        .unwrap();
        assert_eq!(first, second);

        // Touching the source data invalidates the fingerprint
        write_station_file(
            &dir,
            "Kuopio.csv",
            "# Station: Kuopio\n\
             # Latitude: 62.892\n\
             # Longitude: 27.634\n\
             date,AOD_550nm\n\
             2019-06-01,0.500\n",
        );
        let third = import_data(
            "AeronetSunV3",
            "od550aer",
            &config,
            CacheStrategy::PreferCache,
        )
        .unwrap();
        assert_ne!(third.fingerprint, first.fingerprint);
        assert_eq!(
            third.stations[0].values,
            StationValues::Surface(vec![0.500])
        );
    }

    #[test]
    fn test_force_raw_skips_cache_write() {
        let root = tempdir().unwrap();
        sample_network_dir(root.path());
        let cache = tempdir().unwrap();
        let config = config_with_obs_root(root.path(), cache.path());

        let dataset = import_data(
            "AeronetSunV3",
            "od550aer",
            &config,
            CacheStrategy::ForceRaw,
        )
        .unwrap();
        assert_eq!(dataset.stations.len(), 1);
        // No cache entry was published
        assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_vars_provided() {
        let network = ObsNetwork::parse("AeronetSdaV3").unwrap();
        assert_eq!(network.vars_provided(), vec!["od550lt1aer", "od550gt1aer"]);
    }
}

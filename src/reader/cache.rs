//! Binary read-cache for parsed observation datasets.
//!
//! A cache entry is keyed by (network, variable, source fingerprint). The
//! fingerprint is a crc32 over every source file's relative name, byte
//! length and content, folded in sorted path order, so a cache hit is
//! guaranteed to reflect the exact bytes a raw parse would see. Writes go
//! to a temporary file in the cache directory and are published by rename,
//! so readers never observe a half-written entry; concurrent writers of the
//! same key race at file-system granularity and last-writer-wins.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{AeroreadError, Result};
use crate::obsdata::ObsDataset;

/// Compute the content fingerprint of an observation source directory.
pub fn compute_fingerprint(dir: &Path) -> Result<u32> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !super::is_hidden(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    for path in &paths {
        let rel = path.strip_prefix(dir).unwrap_or(path);
        hasher.update(rel.to_string_lossy().as_bytes());

        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        hasher.update(&len.to_le_bytes());
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }
    Ok(hasher.finalize())
}

/// Path of the cache entry for one (network, variable, fingerprint) key.
pub fn cache_path(cache_dir: &Path, network: &str, var_name: &str, fingerprint: u32) -> PathBuf {
    cache_dir.join(format!("{}_{}_{:08x}.bin", network, var_name, fingerprint))
}

/// Persist a parsed dataset to the cache, atomically.
pub fn save_cache(cache_dir: &Path, dataset: &ObsDataset) -> Result<PathBuf> {
    std::fs::create_dir_all(cache_dir)?;
    let target = cache_path(
        cache_dir,
        &dataset.network,
        &dataset.var_name,
        dataset.fingerprint,
    );

    let tmp = NamedTempFile::new_in(cache_dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        bincode::serialize_into(&mut writer, dataset).map_err(|e| AeroreadError::Cache {
            message: format!("failed to serialize cache entry: {}", e),
        })?;
    }
    tmp.persist(&target).map_err(|e| AeroreadError::Cache {
        message: format!("failed to publish cache entry: {}", e),
    })?;

    info!(path = %target.display(), "Saved observation cache entry");
    Ok(target)
}

/// Read a cache entry, returning `None` on miss or stale fingerprint.
pub fn read_cache(
    cache_dir: &Path,
    network: &str,
    var_name: &str,
    fingerprint: u32,
) -> Result<Option<ObsDataset>> {
    let path = cache_path(cache_dir, network, var_name, fingerprint);
    if !path.exists() {
        debug!(path = %path.display(), "Cache miss");
        return Ok(None);
    }

    let reader = BufReader::new(File::open(&path)?);
    let dataset: ObsDataset =
        bincode::deserialize_from(reader).map_err(|e| AeroreadError::Cache {
            message: format!("corrupt cache entry {}: {}", path.display(), e),
        })?;

    // The fingerprint is part of the filename, but verify the embedded one
    // too: a renamed or hand-copied entry must not masquerade as fresh.
    if dataset.fingerprint != fingerprint {
        debug!(path = %path.display(), "Stale cache entry (fingerprint changed)");
        return Ok(None);
    }

    debug!(path = %path.display(), stations = dataset.stations.len(), "Cache hit");
    Ok(Some(dataset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::TsType;
    use crate::obsdata::{StationSeries, StationValues};
    use chrono::TimeZone;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_obs(fingerprint: u32) -> ObsDataset {
        ObsDataset {
            network: "AeronetSunV3".to_string(),
            var_name: "od550aer".to_string(),
            ts_type: TsType::Daily,
            stations: vec![StationSeries {
                station: "Kuopio".to_string(),
                latitude: 62.892,
                longitude: 27.634,
                altitude: 105.0,
                times: vec![Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap()],
                values: StationValues::Surface(vec![0.123]),
            }],
            fingerprint,
        }
    }

    #[test]
    fn test_save_then_read_round_trip() {
        let cache_dir = tempdir().unwrap();
        let dataset = sample_obs(0xdeadbeef);

        save_cache(cache_dir.path(), &dataset).unwrap();
        let restored = read_cache(cache_dir.path(), "AeronetSunV3", "od550aer", 0xdeadbeef)
            .unwrap()
            .expect("entry should be present");

        // Bit-identical coordinates and values after the round trip
        assert_eq!(restored, dataset);
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache_dir = tempdir().unwrap();
        let hit = read_cache(cache_dir.path(), "AeronetSunV3", "od550aer", 1).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn test_stale_embedded_fingerprint() {
        let cache_dir = tempdir().unwrap();
        let dataset = sample_obs(1);
        let saved = save_cache(cache_dir.path(), &dataset).unwrap();

        // Rename the entry to the filename of a newer fingerprint
        let forged = cache_path(cache_dir.path(), "AeronetSunV3", "od550aer", 2);
        std::fs::rename(saved, forged).unwrap();

        let hit = read_cache(cache_dir.path(), "AeronetSunV3", "od550aer", 2).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let src = tempdir().unwrap();
        std::fs::write(src.path().join("a.csv"), b"one").unwrap();
        let fp1 = compute_fingerprint(src.path()).unwrap();

        // Same content, same fingerprint
        assert_eq!(fp1, compute_fingerprint(src.path()).unwrap());

        // Changed content, new fingerprint (size preserved)
        std::fs::write(src.path().join("a.csv"), b"two").unwrap();
        let fp2 = compute_fingerprint(src.path()).unwrap();
        assert_ne!(fp1, fp2);

        // Additional file changes the fingerprint as well
        std::fs::write(src.path().join("b.csv"), b"three").unwrap();
        assert_ne!(fp2, compute_fingerprint(src.path()).unwrap());
    }
}

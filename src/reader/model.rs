//! Single-model gridded data reader.
//!
//! [`ReadGridded`] resolves one model id to a directory under the configured
//! search roots, classifies the files it finds there with a
//! [`FileConvention`], and assembles per-variable, multi-year
//! [`GriddedDataset`]s by loading and concatenating the matching files along
//! the time axis.

use ndarray::Axis;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{dir_names, matching_data_dirs};
use crate::config::Config;
use crate::convention::{FileConvention, FileInfo};
use crate::error::{AeroreadError, Result};
use crate::griddata::GriddedDataset;
use crate::loader::load_grid_file;

/// Result of reading one variable during a bulk [`ReadGridded::read_all_vars`].
#[derive(Debug)]
pub struct VarReadOutcome {
    /// Variable name the read was attempted for
    pub var_name: String,
    /// The assembled dataset, or the recorded failure
    pub result: Result<GriddedDataset>,
}

/// Reader for one model's output directory.
#[derive(Debug)]
pub struct ReadGridded {
    data_id: String,
    data_dir: PathBuf,
    convention: FileConvention,
}

impl ReadGridded {
    /// Resolve a model id against the configured search roots.
    ///
    /// The id must match exactly one subdirectory (by exact name or
    /// substring); zero or several matches are a hard error, never a silent
    /// pick. The file convention is taken from the configuration if set,
    /// otherwise inferred from one example file in the directory.
    pub fn new(data_id: &str, config: &Config) -> Result<Self> {
        let data_dir = Self::search_data_dir(data_id, config)?;

        let convention = match &config.read.convention {
            Some(name) => FileConvention::import_default(name)?,
            None => {
                let example = first_file(&data_dir).ok_or_else(|| {
                    AeroreadError::ModelDirNotFound {
                        data_id: data_id.to_string(),
                        message: format!("directory {} contains no files", data_dir.display()),
                    }
                })?;
                FileConvention::from_file(&example)?
            }
        };

        info!(
            data_id = data_id,
            dir = %data_dir.display(),
            convention = %convention.name,
            "Resolved model directory"
        );

        Ok(Self {
            data_id: data_id.to_string(),
            data_dir,
            convention,
        })
    }

    /// Like [`new`], but with an explicitly chosen convention.
    ///
    /// An explicit convention outranks both the configured and the inferred
    /// one.
    ///
    /// [`new`]: ReadGridded::new
    pub fn with_convention(
        data_id: &str,
        config: &Config,
        convention: FileConvention,
    ) -> Result<Self> {
        let data_dir = Self::search_data_dir(data_id, config)?;
        Ok(Self {
            data_id: data_id.to_string(),
            data_dir,
            convention,
        })
    }

    /// Resolve a model id to exactly one directory under the search roots.
    pub fn search_data_dir(data_id: &str, config: &Config) -> Result<PathBuf> {
        let matches = matching_data_dirs(&config.paths.model_roots, data_id)?;
        match matches.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(AeroreadError::ModelDirNotFound {
                data_id: data_id.to_string(),
                message: format!(
                    "no directory matches under roots {:?}",
                    config.paths.model_roots
                ),
            }),
            many => Err(AeroreadError::ModelDirNotFound {
                data_id: data_id.to_string(),
                message: format!("ambiguous: matches {}", dir_names(many)),
            }),
        }
    }

    /// The model id this reader serves.
    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    /// The resolved data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The convention governing filenames in the data directory.
    pub fn convention(&self) -> &FileConvention {
        &self.convention
    }

    /// Enumerate all files matching the convention's expected shape.
    ///
    /// The sequence is lazy and restartable: each call walks the directory
    /// afresh. Files that do not parse under the convention are skipped
    /// (logged at debug level), never an error; an empty directory yields an
    /// empty sequence.
    pub fn search_all_files(&self) -> impl Iterator<Item = (PathBuf, FileInfo)> + '_ {
        WalkDir::new(&self.data_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let filename = entry.file_name().to_string_lossy();
                match self.convention.get_info_from_file(&filename) {
                    Ok(info) => Some((entry.into_path(), info)),
                    Err(err) => {
                        debug!(file = %filename, error = %err, "Skipping non-matching file");
                        None
                    }
                }
            })
    }

    /// All variable names discoverable under the convention, sorted.
    pub fn vars_available(&self) -> Vec<String> {
        let vars: BTreeSet<String> = self
            .search_all_files()
            .map(|(_, info)| info.var_name)
            .collect();
        vars.into_iter().collect()
    }

    /// All years covered by files in the data directory, sorted
    /// (climatology files excluded).
    pub fn years_available(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self
            .search_all_files()
            .filter(|(_, info)| !info.is_climatology())
            .map(|(_, info)| info.year)
            .collect();
        years.into_iter().collect()
    }

    /// Load, filter by year range and concatenate all files for one variable.
    ///
    /// Files whose year falls outside `start_year..=stop_year` are excluded
    /// whole, not truncated. Files must cover pairwise disjoint time ranges;
    /// an overlap is a data-integrity failure, never resolved by picking one
    /// file. The result is ordered by time.
    pub fn read_var(
        &self,
        var_name: &str,
        start_year: i32,
        stop_year: i32,
    ) -> Result<GriddedDataset> {
        if start_year > stop_year {
            return Err(AeroreadError::InvalidTimeRange {
                start: start_year.to_string(),
                stop: stop_year.to_string(),
            });
        }

        let mut candidates: Vec<(PathBuf, FileInfo)> = self
            .search_all_files()
            .filter(|(_, info)| {
                info.var_name == var_name
                    && !info.is_climatology()
                    && (start_year..=stop_year).contains(&info.year)
            })
            .collect();
        candidates.sort_by_key(|(_, info)| info.year);

        if candidates.is_empty() {
            return Err(AeroreadError::DataNotFound {
                message: format!(
                    "{}: no files for variable {} in {}..={}",
                    self.data_id, var_name, start_year, stop_year
                ),
            });
        }

        let ts_types: BTreeSet<&str> = candidates
            .iter()
            .map(|(_, info)| info.ts_type.as_str())
            .collect();
        if ts_types.len() > 1 {
            return Err(AeroreadError::DimensionMismatch {
                message: format!(
                    "{} {}: files with mixed time resolutions ({})",
                    self.data_id,
                    var_name,
                    ts_types.into_iter().collect::<Vec<_>>().join(", ")
                ),
            });
        }

        let mut merged: Option<GriddedDataset> = None;
        for (path, info) in &candidates {
            let grid_file = load_grid_file(path)?;
            let piece = grid_file.extract_var(var_name, &self.data_id, info.ts_type)?;
            piece.validate()?;

            merged = Some(match merged {
                None => piece,
                Some(acc) => concat_time(acc, piece)?,
            });
        }

        let dataset = merged.expect("candidates is non-empty");
        dataset.validate()?;
        info!(
            data_id = %self.data_id,
            var = var_name,
            files = candidates.len(),
            samples = dataset.times.len(),
            "Assembled gridded dataset"
        );
        Ok(dataset)
    }

    /// Read every variable discoverable under the convention.
    ///
    /// Per-variable failures are collected next to the successes so that one
    /// unreadable variable never aborts the bulk read.
    pub fn read_all_vars(&self) -> Vec<VarReadOutcome> {
        let mut outcomes = Vec::new();
        for var_name in self.vars_available() {
            let years: Vec<i32> = self
                .search_all_files()
                .filter(|(_, info)| info.var_name == var_name && !info.is_climatology())
                .map(|(_, info)| info.year)
                .collect();
            let result = match (years.iter().min(), years.iter().max()) {
                (Some(&start), Some(&stop)) => self.read_var(&var_name, start, stop),
                _ => Err(AeroreadError::DataNotFound {
                    message: format!("{}: only climatology files for {}", self.data_id, var_name),
                }),
            };
            if let Err(err) = &result {
                warn!(data_id = %self.data_id, var = %var_name, error = %err, "Variable read failed");
            }
            outcomes.push(VarReadOutcome { var_name, result });
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            data_id = %self.data_id,
            succeeded = outcomes.len() - failed,
            failed = failed,
            "Bulk variable read finished"
        );
        outcomes
    }
}

/// Concatenate two datasets along the time axis, rejecting overlaps.
fn concat_time(first: GriddedDataset, second: GriddedDataset) -> Result<GriddedDataset> {
    if first.lats != second.lats || first.lons != second.lons {
        return Err(AeroreadError::DimensionMismatch {
            message: format!(
                "{} {}: lat/lon grids differ between source files",
                first.data_id, first.var_name
            ),
        });
    }

    let describe = |dataset: &GriddedDataset| {
        dataset
            .source_files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("+")
    };

    match (first.stop_time(), second.start_time()) {
        (Some(stop), Some(start)) if stop >= start => {
            return Err(AeroreadError::OverlappingData {
                first: describe(&first),
                second: describe(&second),
            });
        }
        _ => {}
    }

    let data = ndarray::concatenate(Axis(0), &[first.data.view(), second.data.view()])?;
    let mut times = first.times;
    times.extend(second.times);
    let mut source_files = first.source_files;
    source_files.extend(second.source_files);

    Ok(GriddedDataset {
        data_id: first.data_id,
        var_name: first.var_name,
        units: first.units.or(second.units),
        ts_type: first.ts_type,
        data,
        lats: first.lats,
        lons: first.lons,
        times,
        lon_convention: first.lon_convention,
        attrs: first.attrs,
        source_files,
    })
}

/// The first regular file directly under a directory (sorted order).
fn first_file(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

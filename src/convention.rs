//! File naming conventions for model output archives.
//!
//! A [`FileConvention`] describes how to pull the dataset id, variable name,
//! year and time resolution out of a delimited filename. Two historical
//! AeroCom naming generations are registered by default; additional
//! conventions round-trip through a plain key-value mapping.
//!
//! All field positions are counted from the *end* of the token list of the
//! extension-stripped filename. Vendor-specific extra tokens at the start of
//! a name therefore never shift the declared positions.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AeroreadError, Result};

/// Year token marking a climatology file rather than a single calendar year.
pub const CLIMATOLOGY_YEAR: i32 = 9999;

/// Time resolution of one model output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TsType {
    /// Hourly samples
    Hourly,
    /// 3-hourly samples
    ThreeHourly,
    /// Daily samples
    Daily,
    /// Weekly samples
    Weekly,
    /// Monthly samples
    Monthly,
    /// Yearly samples
    Yearly,
}

impl TsType {
    /// The filename token used for this resolution.
    pub fn as_str(&self) -> &'static str {
        match self {
            TsType::Hourly => "hourly",
            TsType::ThreeHourly => "3hourly",
            TsType::Daily => "daily",
            TsType::Weekly => "weekly",
            TsType::Monthly => "monthly",
            TsType::Yearly => "yearly",
        }
    }

    /// Nominal spacing between consecutive samples, used for gap reporting.
    pub fn nominal_step(&self) -> chrono::Duration {
        match self {
            TsType::Hourly => chrono::Duration::hours(1),
            TsType::ThreeHourly => chrono::Duration::hours(3),
            TsType::Daily => chrono::Duration::days(1),
            TsType::Weekly => chrono::Duration::days(7),
            // Calendar months and years vary in length; use the maximum.
            TsType::Monthly => chrono::Duration::days(31),
            TsType::Yearly => chrono::Duration::days(366),
        }
    }
}

impl FromStr for TsType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "hourly" => Ok(TsType::Hourly),
            "3hourly" => Ok(TsType::ThreeHourly),
            "daily" => Ok(TsType::Daily),
            "weekly" => Ok(TsType::Weekly),
            "monthly" => Ok(TsType::Monthly),
            "yearly" => Ok(TsType::Yearly),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata extracted from one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Dataset / model identifier
    pub data_id: String,
    /// Variable name
    pub var_name: String,
    /// Calendar year, or [`CLIMATOLOGY_YEAR`]
    pub year: i32,
    /// Time resolution
    pub ts_type: TsType,
}

impl FileInfo {
    /// Whether this file holds a multi-year climatology.
    pub fn is_climatology(&self) -> bool {
        self.year == CLIMATOLOGY_YEAR
    }
}

/// A filename convention: delimiter plus from-the-end field positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConvention {
    /// Convention id (e.g. "aerocom3")
    pub name: String,
    /// Token delimiter within the filename
    pub file_sep: char,
    /// Position of the year token, counted from the end
    pub year_pos: usize,
    /// Position of the variable token, counted from the end
    pub var_pos: usize,
    /// Position of the time-resolution token, counted from the end
    pub ts_pos: usize,
    /// Position of the dataset-id token, counted from the end
    pub data_id_pos: usize,
}

/// The registered default conventions, oldest generation first.
static DEFAULT_CONVENTIONS: Lazy<Vec<FileConvention>> = Lazy::new(|| {
    vec![
        // aerocom.<model>.<ts_type>.<var>.<year>.nc
        FileConvention {
            name: "aerocom2".to_string(),
            file_sep: '.',
            year_pos: 0,
            var_pos: 1,
            ts_pos: 2,
            data_id_pos: 3,
        },
        // aerocom3_<model>_<experiment>_<var>_<vertical>_<year>_<ts_type>.nc
        FileConvention {
            name: "aerocom3".to_string(),
            file_sep: '_',
            ts_pos: 0,
            year_pos: 1,
            var_pos: 3,
            data_id_pos: 5,
        },
    ]
});

/// Strip the storage extension from a filename, keeping interior dots.
fn strip_extension(filename: &str) -> &str {
    for ext in [".nc4", ".nc"] {
        if let Some(stripped) = filename.strip_suffix(ext) {
            return stripped;
        }
    }
    filename
}

impl FileConvention {
    /// Look up a registered convention by name.
    pub fn import_default(name: &str) -> Result<Self> {
        DEFAULT_CONVENTIONS
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| AeroreadError::UnknownConvention {
                name: name.to_string(),
            })
    }

    /// All registered default conventions.
    pub fn defaults() -> &'static [FileConvention] {
        &DEFAULT_CONVENTIONS
    }

    /// Infer the convention governing one example file.
    ///
    /// The filename is matched against every registered default; exactly one
    /// match wins. Zero or several matches are an inference error - there is
    /// no silent fallback to an arbitrary convention.
    pub fn from_file(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AeroreadError::ConventionInference {
                filename: path.display().to_string(),
                message: "path has no usable filename".to_string(),
            })?;

        let matches: Vec<&FileConvention> = DEFAULT_CONVENTIONS
            .iter()
            .filter(|c| c.get_info_from_file(filename).is_ok())
            .collect();

        match matches.as_slice() {
            [single] => {
                debug!(
                    filename = filename,
                    convention = %single.name,
                    "Inferred file convention"
                );
                Ok((*single).clone())
            }
            [] => Err(AeroreadError::ConventionInference {
                filename: filename.to_string(),
                message: "no registered convention matches".to_string(),
            }),
            many => Err(AeroreadError::ConventionInference {
                filename: filename.to_string(),
                message: format!(
                    "ambiguous: matches conventions {}",
                    many.iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }),
        }
    }

    fn mismatch(&self, filename: &str, message: impl Into<String>) -> AeroreadError {
        AeroreadError::FilenameMismatch {
            filename: filename.to_string(),
            convention: self.name.clone(),
            message: message.into(),
        }
    }

    /// Apply this convention to extract the metadata tuple from a filename.
    ///
    /// Only the declared positions are inspected; year-like tokens elsewhere
    /// in the name are ignored.
    pub fn get_info_from_file(&self, filename: &str) -> Result<FileInfo> {
        let stem = strip_extension(filename);
        let tokens: Vec<&str> = stem.split(self.file_sep).collect();

        let needed = 1 + [self.year_pos, self.var_pos, self.ts_pos, self.data_id_pos]
            .into_iter()
            .max()
            .unwrap_or(0);
        if tokens.len() < needed {
            return Err(self.mismatch(
                filename,
                format!("expected at least {} tokens, found {}", needed, tokens.len()),
            ));
        }

        let from_end = |pos: usize| tokens[tokens.len() - 1 - pos];

        let year_token = from_end(self.year_pos);
        let year = match year_token.parse::<i32>() {
            Ok(y) if year_token.len() == 4 && (y == CLIMATOLOGY_YEAR || (1000..=3000).contains(&y)) => y,
            _ => {
                return Err(self.mismatch(
                    filename,
                    format!("token '{}' at year position is not a 4-digit year", year_token),
                ))
            }
        };

        let ts_token = from_end(self.ts_pos);
        let ts_type = TsType::from_str(ts_token).map_err(|_| {
            self.mismatch(
                filename,
                format!("token '{}' is not a known time resolution", ts_token),
            )
        })?;

        let var_name = from_end(self.var_pos);
        let data_id = from_end(self.data_id_pos);
        if var_name.is_empty() || data_id.is_empty() {
            return Err(self.mismatch(filename, "empty variable or dataset-id token"));
        }

        Ok(FileInfo {
            data_id: data_id.to_string(),
            var_name: var_name.to_string(),
            year,
            ts_type,
        })
    }

    /// Serialize the convention fields to a plain key-value mapping.
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        let mut dict = BTreeMap::new();
        dict.insert("name".to_string(), self.name.clone());
        dict.insert("file_sep".to_string(), self.file_sep.to_string());
        dict.insert("year_pos".to_string(), self.year_pos.to_string());
        dict.insert("var_pos".to_string(), self.var_pos.to_string());
        dict.insert("ts_pos".to_string(), self.ts_pos.to_string());
        dict.insert("data_id_pos".to_string(), self.data_id_pos.to_string());
        dict
    }

    /// Reconstruct a convention from a mapping produced by [`to_dict`].
    ///
    /// [`to_dict`]: FileConvention::to_dict
    pub fn from_dict(dict: &BTreeMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            dict.get(key).ok_or_else(|| AeroreadError::Config {
                message: format!("convention mapping is missing key '{}'", key),
            })
        };
        let pos = |key: &str| -> Result<usize> {
            get(key)?.parse().map_err(|_| AeroreadError::Config {
                message: format!("convention key '{}' is not a valid position", key),
            })
        };

        let sep_str = get("file_sep")?;
        let mut chars = sep_str.chars();
        let file_sep = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(AeroreadError::Config {
                    message: format!("file_sep '{}' must be a single character", sep_str),
                })
            }
        };

        Ok(Self {
            name: get("name")?.clone(),
            file_sep,
            year_pos: pos("year_pos")?,
            var_pos: pos("var_pos")?,
            ts_pos: pos("ts_pos")?,
            data_id_pos: pos("data_id_pos")?,
        })
    }
}

//! NetCDF grid file loading.
//!
//! This module reads a single NetCDF file into memory as a [`GridFile`]:
//! metadata, coordinate axes (with the time axis decoded from CF-style
//! units) and the numeric variable arrays. A [`GriddedDataset`] for one
//! variable is then projected out with [`GridFile::extract_var`] without
//! copying unrelated variables.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ndarray::{Array, Dim, IxDyn};
use netcdf::{self, Attribute, Variable as NetCDFVariable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::convention::TsType;
use crate::error::{AeroreadError, Result};
use crate::griddata::{detect_lon_convention, GriddedDataset};

/// Accepted names for the latitude dimension.
const LAT_ALIASES: &[&str] = &["lat", "latitude"];
/// Accepted names for the longitude dimension.
const LON_ALIASES: &[&str] = &["lon", "longitude"];
/// Accepted names for the time dimension.
const TIME_ALIASES: &[&str] = &["time"];

/// Metadata about a NetCDF dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    /// Name of the dimension
    pub name: String,
    /// Size of the dimension
    pub size: usize,
    /// Whether this dimension is unlimited
    pub is_unlimited: bool,
}

/// Metadata about a NetCDF variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarMeta {
    /// Name of the variable
    pub name: String,
    /// Dimensions of the variable
    pub dimensions: Vec<String>,
    /// Shape of the variable (dimension sizes)
    pub shape: Vec<usize>,
    /// Variable attributes
    pub attributes: HashMap<String, AttributeValue>,
    /// Data type as string
    pub dtype: String,
}

/// Possible attribute values in NetCDF
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// String attribute
    Text(String),
    /// Numeric attribute (stored as f64 for simplicity)
    Number(f64),
    /// Array of numbers
    NumberArray(Vec<f64>),
}

/// One NetCDF file loaded into memory.
#[derive(Debug, Clone)]
pub struct GridFile {
    /// Path the file was loaded from
    pub path: PathBuf,
    /// File-level attributes
    pub global_attributes: HashMap<String, AttributeValue>,
    /// Dimensions in the file
    pub dimensions: HashMap<String, Dimension>,
    /// Variables in the file
    pub variables: HashMap<String, VarMeta>,
    /// Coordinate variables (subset of variables that match dimension names)
    pub coordinates: HashMap<String, Vec<f64>>,
    /// Decoded time axis, empty if the file has no time dimension
    pub times: Vec<DateTime<Utc>>,
    /// Loaded data arrays
    pub data: HashMap<String, Array<f32, IxDyn>>,
}

/// Load a NetCDF file into memory.
pub fn load_grid_file(path: &Path) -> Result<GridFile> {
    if !path.exists() {
        return Err(AeroreadError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }

    let file = match netcdf::open(path) {
        Ok(f) => f,
        Err(e) => {
            return Err(AeroreadError::DataNotFound {
                message: format!("Failed to open NetCDF file {}: {}", path.display(), e),
            });
        }
    };

    debug!(
        path = %path.display(),
        variables = file.variables().count(),
        dimensions = file.dimensions().count(),
        "Opened NetCDF file"
    );

    let (global_attributes, dimensions, variables, coordinates) = extract_metadata(&file)?;
    let times = decode_time_axis(&variables, &coordinates)?;
    let data = extract_data(&file, &variables)?;

    let grid_file = GridFile {
        path: path.to_path_buf(),
        global_attributes,
        dimensions,
        variables,
        coordinates,
        times,
        data,
    };
    grid_file.validate()?;
    Ok(grid_file)
}

type MetadataParts = (
    HashMap<String, AttributeValue>,
    HashMap<String, Dimension>,
    HashMap<String, VarMeta>,
    HashMap<String, Vec<f64>>,
);

/// Extract metadata from the NetCDF file
fn extract_metadata(file: &netcdf::File) -> Result<MetadataParts> {
    let mut global_attributes = HashMap::new();
    for attr in file.attributes() {
        let value = convert_attribute(&attr)?;
        global_attributes.insert(attr.name().to_string(), value);
    }

    let mut dimensions = HashMap::new();
    for dim in file.dimensions() {
        let dimension = Dimension {
            name: dim.name().to_string(),
            size: dim.len(),
            is_unlimited: dim.is_unlimited(),
        };
        dimensions.insert(dim.name().to_string(), dimension);
    }

    let mut variables = HashMap::new();
    let mut coordinates = HashMap::new();

    for var in file.variables() {
        // Skip variables we can't handle (non-numeric types)
        if !is_supported_variable(&var) {
            warn!("Skipping unsupported variable: {}", var.name());
            continue;
        }

        let var_dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|dim| dim.name().to_string())
            .collect();

        let var_shape: Vec<usize> = var_dims
            .iter()
            .map(|name| file.dimension(name).map(|d| d.len()).unwrap_or(0))
            .collect();

        let mut var_attrs = HashMap::new();
        for attr in var.attributes() {
            let value = convert_attribute(&attr)?;
            var_attrs.insert(attr.name().to_string(), value);
        }

        let meta = VarMeta {
            name: var.name().to_string(),
            dimensions: var_dims,
            shape: var_shape,
            attributes: var_attrs,
            dtype: format!("{:?}", var.vartype()),
        };

        variables.insert(var.name().to_string(), meta);

        // Coordinate variables share their dimension's name
        if file.dimension(&var.name()).is_some() {
            let coord_values = extract_coordinate_values(&var)?;
            coordinates.insert(var.name().to_string(), coord_values);
        }
    }

    Ok((global_attributes, dimensions, variables, coordinates))
}

/// Check if a variable has a supported type that we can work with
fn is_supported_variable(var: &NetCDFVariable) -> bool {
    use netcdf::types::{BasicType, VariableType};

    matches!(
        var.vartype(),
        VariableType::Basic(BasicType::Byte)
            | VariableType::Basic(BasicType::Char)
            | VariableType::Basic(BasicType::Short)
            | VariableType::Basic(BasicType::Int)
            | VariableType::Basic(BasicType::Float)
            | VariableType::Basic(BasicType::Double)
    )
}

/// Convert a NetCDF attribute to our AttributeValue enum
fn convert_attribute(attr: &Attribute) -> Result<AttributeValue> {
    use netcdf::AttributeValue as NcAttributeValue;

    let value = attr.value()?;

    match value {
        NcAttributeValue::Str(s) => Ok(AttributeValue::Text(s)),

        // Numeric types - store as f64 for simplicity
        NcAttributeValue::Uchar(v) => Ok(AttributeValue::Number(v as f64)),
        NcAttributeValue::Schar(v) => Ok(AttributeValue::Number(v as f64)),
        NcAttributeValue::Short(v) => Ok(AttributeValue::Number(v as f64)),
        NcAttributeValue::Int(v) => Ok(AttributeValue::Number(v as f64)),
        NcAttributeValue::Float(v) => Ok(AttributeValue::Number(v as f64)),
        NcAttributeValue::Double(v) => Ok(AttributeValue::Number(v)),

        // Anything else is kept as a text representation
        _ => Ok(AttributeValue::Text(format!("{:?}", value))),
    }
}

/// Extract coordinate values from a coordinate variable
fn extract_coordinate_values(var: &NetCDFVariable) -> Result<Vec<f64>> {
    use netcdf::types::{BasicType, VariableType};

    match var.vartype() {
        VariableType::Basic(BasicType::Byte) => {
            let values: Vec<i8> = var.get_values::<i8, _>(&[] as &[netcdf::Extent])?;
            Ok(values.into_iter().map(|v| v as f64).collect())
        }
        VariableType::Basic(BasicType::Short) => {
            let values: Vec<i16> = var.get_values::<i16, _>(&[] as &[netcdf::Extent])?;
            Ok(values.into_iter().map(|v| v as f64).collect())
        }
        VariableType::Basic(BasicType::Int) => {
            let values: Vec<i32> = var.get_values::<i32, _>(&[] as &[netcdf::Extent])?;
            Ok(values.into_iter().map(|v| v as f64).collect())
        }
        VariableType::Basic(BasicType::Float) => {
            let values: Vec<f32> = var.get_values::<f32, _>(&[] as &[netcdf::Extent])?;
            Ok(values.into_iter().map(|v| v as f64).collect())
        }
        VariableType::Basic(BasicType::Double) => {
            let values: Vec<f64> = var.get_values::<f64, _>(&[] as &[netcdf::Extent])?;
            Ok(values)
        }
        _ => {
            let indices: Vec<f64> = (0..var.dimensions()[0].len()).map(|i| i as f64).collect();
            warn!(
                "Unsupported coordinate variable type: {:?}, using indices instead",
                var.vartype()
            );
            Ok(indices)
        }
    }
}

/// Extract data from the NetCDF variables
fn extract_data(
    file: &netcdf::File,
    variables: &HashMap<String, VarMeta>,
) -> Result<HashMap<String, Array<f32, IxDyn>>> {
    let mut data = HashMap::new();

    for (var_name, meta) in variables {
        if let Some(var) = file.variable(var_name) {
            if !is_supported_variable(&var) {
                continue;
            }
            let array = convert_variable_to_array(&var, &meta.shape)?;
            data.insert(var_name.clone(), array);
        }
    }

    Ok(data)
}

/// Convert a NetCDF variable to an ndarray Array<f32, IxDyn>
fn convert_variable_to_array(var: &NetCDFVariable, shape: &[usize]) -> Result<Array<f32, IxDyn>> {
    use netcdf::types::{BasicType, VariableType};

    let dim = Dim(shape.to_vec());

    match var.vartype() {
        VariableType::Basic(BasicType::Byte) => {
            let data: Vec<i8> = var.get_values::<i8, _>(&[] as &[netcdf::Extent])?;
            let array = Array::from_shape_vec(dim, data.into_iter().map(|v| v as f32).collect())?;
            Ok(array)
        }
        VariableType::Basic(BasicType::Short) => {
            let data: Vec<i16> = var.get_values::<i16, _>(&[] as &[netcdf::Extent])?;
            let array = Array::from_shape_vec(dim, data.into_iter().map(|v| v as f32).collect())?;
            Ok(array)
        }
        VariableType::Basic(BasicType::Int) => {
            let data: Vec<i32> = var.get_values::<i32, _>(&[] as &[netcdf::Extent])?;
            let array = Array::from_shape_vec(dim, data.into_iter().map(|v| v as f32).collect())?;
            Ok(array)
        }
        VariableType::Basic(BasicType::Float) => {
            let data: Vec<f32> = var.get_values::<f32, _>(&[] as &[netcdf::Extent])?;
            let array = Array::from_shape_vec(dim, data)?;
            Ok(array)
        }
        VariableType::Basic(BasicType::Double) => {
            let data: Vec<f64> = var.get_values::<f64, _>(&[] as &[netcdf::Extent])?;
            let array = Array::from_shape_vec(dim, data.into_iter().map(|v| v as f32).collect())?;
            Ok(array)
        }
        _ => Err(AeroreadError::DataNotFound {
            message: format!("Unsupported variable type: {:?}", var.vartype()),
        }),
    }
}

/// Decode the time coordinate using its CF-style units attribute.
fn decode_time_axis(
    variables: &HashMap<String, VarMeta>,
    coordinates: &HashMap<String, Vec<f64>>,
) -> Result<Vec<DateTime<Utc>>> {
    let time_name = match TIME_ALIASES
        .iter()
        .find(|name| coordinates.contains_key(**name))
    {
        Some(name) => *name,
        None => return Ok(Vec::new()),
    };

    let units = variables
        .get(time_name)
        .and_then(|meta| meta.attributes.get("units"))
        .and_then(|attr| match attr {
            AttributeValue::Text(s) => Some(s.clone()),
            _ => None,
        })
        .ok_or_else(|| AeroreadError::DimensionMismatch {
            message: "time coordinate has no units attribute".to_string(),
        })?;

    let (unit_secs, epoch) = parse_time_units(&units)?;
    let values = &coordinates[time_name];
    let times = values
        .iter()
        .map(|&offset| epoch + Duration::milliseconds((offset * unit_secs * 1000.0) as i64))
        .collect();
    Ok(times)
}

/// Parse a CF time units string, e.g. "days since 2000-01-01".
///
/// Returns the unit length in seconds and the epoch.
fn parse_time_units(units: &str) -> Result<(f64, DateTime<Utc>)> {
    let mut parts = units.splitn(3, ' ');
    let (unit, since, rest) = (parts.next(), parts.next(), parts.next());

    let bad_units = || AeroreadError::DimensionMismatch {
        message: format!("unsupported time units '{}'", units),
    };

    if since != Some("since") {
        return Err(bad_units());
    }
    let unit_secs = match unit {
        Some("seconds") | Some("second") => 1.0,
        Some("minutes") | Some("minute") => 60.0,
        Some("hours") | Some("hour") => 3600.0,
        Some("days") | Some("day") => 86400.0,
        _ => return Err(bad_units()),
    };

    let epoch_str = rest.ok_or_else(bad_units)?.trim();
    let naive: NaiveDateTime = NaiveDateTime::parse_from_str(epoch_str, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(epoch_str, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(epoch_str, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        })
        .map_err(|_| bad_units())?;

    Ok((unit_secs, Utc.from_utc_datetime(&naive)))
}

/// Classify a dimension name as time, latitude or longitude.
fn classify_dim(name: &str) -> Option<usize> {
    if TIME_ALIASES.contains(&name) {
        Some(0)
    } else if LAT_ALIASES.contains(&name) {
        Some(1)
    } else if LON_ALIASES.contains(&name) {
        Some(2)
    } else {
        None
    }
}

impl GridFile {
    /// Validate the loaded file for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(AeroreadError::DataNotFound {
                message: format!("No variables found in {}", self.path.display()),
            });
        }

        for (var_name, var) in &self.variables {
            for dim_name in &var.dimensions {
                if !self.dimensions.contains_key(dim_name) {
                    return Err(AeroreadError::DimensionMismatch {
                        message: format!(
                            "Variable {} references non-existent dimension {}",
                            var_name, dim_name
                        ),
                    });
                }
            }

            if let Some(array) = self.data.get(var_name) {
                let shape = array.shape();
                if shape.len() != var.dimensions.len() {
                    return Err(AeroreadError::DimensionMismatch {
                        message: format!(
                            "Variable {} has inconsistent dimensions: metadata has {}, data has {}",
                            var_name,
                            var.dimensions.len(),
                            shape.len()
                        ),
                    });
                }
                for (i, dim_name) in var.dimensions.iter().enumerate() {
                    let expected_size = self.dimensions[dim_name].size;
                    if shape[i] != expected_size {
                        return Err(AeroreadError::DimensionMismatch {
                            message: format!(
                                "Variable {} dimension {} has inconsistent size: expected {}, got {}",
                                var_name, dim_name, expected_size, shape[i]
                            ),
                        });
                    }
                }
            } else {
                return Err(AeroreadError::DataNotFound {
                    message: format!("Data array for variable {} not found", var_name),
                });
            }
        }

        Ok(())
    }

    /// Names of the latitude and longitude coordinate axes, if present.
    fn geo_axes(&self) -> Option<(&str, &str)> {
        let lat = LAT_ALIASES
            .iter()
            .find(|name| self.coordinates.contains_key(**name))?;
        let lon = LON_ALIASES
            .iter()
            .find(|name| self.coordinates.contains_key(**name))?;
        Some((*lat, *lon))
    }

    /// Data variable names: gridded variables that are not coordinate axes.
    pub fn data_var_names(&self) -> Vec<&str> {
        self.variables
            .keys()
            .filter(|name| !self.coordinates.contains_key(*name))
            .map(String::as_str)
            .collect()
    }

    /// Project one variable out of the file as a [`GriddedDataset`].
    ///
    /// The variable must be laid out over exactly the time, latitude and
    /// longitude dimensions (in any order); its axes are permuted into
    /// (time, lat, lon). Other variables in the file are not copied.
    pub fn extract_var(
        &self,
        var_name: &str,
        data_id: &str,
        ts_type: TsType,
    ) -> Result<GriddedDataset> {
        let meta = self
            .variables
            .get(var_name)
            .ok_or_else(|| AeroreadError::DataNotFound {
                message: format!("Variable {} not found in {}", var_name, self.path.display()),
            })?;
        let array = self
            .data
            .get(var_name)
            .ok_or_else(|| AeroreadError::DataNotFound {
                message: format!("Data array for variable {} not found", var_name),
            })?;

        if meta.dimensions.len() != 3 {
            return Err(AeroreadError::DimensionMismatch {
                message: format!(
                    "Variable {} has dimensions {:?}; expected (time, lat, lon)",
                    var_name, meta.dimensions
                ),
            });
        }

        // Target slot (0=time, 1=lat, 2=lon) for each source axis
        let mut slots = [usize::MAX; 3];
        for (axis, dim_name) in meta.dimensions.iter().enumerate() {
            match classify_dim(dim_name) {
                Some(slot) if slots.contains(&slot) => {
                    return Err(AeroreadError::DimensionMismatch {
                        message: format!("Variable {} repeats dimension {}", var_name, dim_name),
                    })
                }
                Some(slot) => slots[axis] = slot,
                None => {
                    return Err(AeroreadError::DimensionMismatch {
                        message: format!(
                            "Variable {} has unrecognized dimension {}",
                            var_name, dim_name
                        ),
                    })
                }
            }
        }

        // Permutation mapping target slot -> source axis
        let mut perm = [0usize; 3];
        for (axis, slot) in slots.iter().enumerate() {
            perm[*slot] = axis;
        }

        let (lat_name, lon_name) = self.geo_axes().ok_or_else(|| {
            AeroreadError::DimensionMismatch {
                message: format!("{} has no lat/lon coordinate axes", self.path.display()),
            }
        })?;
        if self.times.is_empty() {
            return Err(AeroreadError::DimensionMismatch {
                message: format!("{} has no decodable time axis", self.path.display()),
            });
        }

        let ordered = array
            .view()
            .permuted_axes(IxDyn(&perm))
            .to_owned()
            .into_dimensionality::<ndarray::Ix3>()?;

        let lons = self.coordinates[lon_name].clone();
        let units = meta.attributes.get("units").and_then(|attr| match attr {
            AttributeValue::Text(s) => Some(s.clone()),
            _ => None,
        });

        let dataset = GriddedDataset {
            data_id: data_id.to_string(),
            var_name: var_name.to_string(),
            units,
            ts_type,
            data: ordered,
            lats: self.coordinates[lat_name].clone(),
            lon_convention: detect_lon_convention(&lons),
            lons,
            times: self.times.clone(),
            attrs: meta.attributes.clone(),
            source_files: vec![self.path.clone()],
        };

        info!(
            var = var_name,
            data_id = data_id,
            samples = dataset.times.len(),
            "Extracted variable from grid file"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    /// Write a minimal model output file for loader tests.
    fn create_test_grid_file(path: &Path) -> Result<()> {
        let mut file = netcdf::create(path)?;

        let _ = file.add_dimension("lon", 4)?;
        let _ = file.add_dimension("lat", 3)?;
        let _ = file.add_unlimited_dimension("time")?;

        file.add_attribute("title", "aeroread loader test")?;

        let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&[0.0, 90.0, 180.0, 270.0], &[..])?;

        let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&[-45.0, 0.0, 45.0], &[..])?;

        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "days since 2010-01-01")?;
        time_var.put_values(&[0.0, 1.0], &[..])?;

        let mut aod_var = file.add_variable::<f32>("od550aer", &["time", "lat", "lon"])?;
        aod_var.put_attribute("units", "1")?;
        let values: Vec<f32> = (0..24).map(|i| i as f32).collect();
        aod_var.put_values(&values, &[.., .., ..])?;

        Ok(())
    }

    #[test]
    fn test_file_not_found() {
        let result = load_grid_file(Path::new("/nonexistent/file.nc"));
        assert!(result.is_err());
        match result.unwrap_err() {
            AeroreadError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_load_and_decode_time() -> Result<()> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.nc");
        create_test_grid_file(&file_path)?;

        let grid_file = load_grid_file(&file_path)?;
        assert!(grid_file.global_attributes.contains_key("title"));
        assert_eq!(grid_file.dimensions["lon"].size, 4);
        assert_eq!(grid_file.coordinates["lat"], vec![-45.0, 0.0, 45.0]);
        assert_eq!(
            grid_file.times,
            vec![
                Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2010, 1, 2, 0, 0, 0).unwrap(),
            ]
        );
        assert_eq!(grid_file.data_var_names(), vec!["od550aer"]);
        Ok(())
    }

    #[test]
    fn test_extract_var() -> Result<()> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.nc");
        create_test_grid_file(&file_path)?;

        let grid_file = load_grid_file(&file_path)?;
        let dataset = grid_file.extract_var("od550aer", "TESTMODEL", TsType::Daily)?;
        dataset.validate()?;

        assert_eq!(dataset.data.shape(), &[2, 3, 4]);
        assert_eq!(dataset.units.as_deref(), Some("1"));
        assert_eq!(dataset.data[[0, 0, 0]], 0.0);
        assert_eq!(dataset.data[[1, 2, 3]], 23.0);
        // 0..270 axis is flagged as the 0..360 convention
        assert_eq!(
            dataset.lon_convention,
            crate::griddata::LonConvention::ZeroTo360
        );
        Ok(())
    }

    #[test]
    fn test_extract_missing_var() -> Result<()> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.nc");
        create_test_grid_file(&file_path)?;

        let grid_file = load_grid_file(&file_path)?;
        assert!(matches!(
            grid_file.extract_var("abs550aer", "TESTMODEL", TsType::Daily),
            Err(AeroreadError::DataNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_parse_time_units() {
        let (secs, epoch) = parse_time_units("days since 2000-01-01").unwrap();
        assert_eq!(secs, 86400.0);
        assert_eq!(epoch, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());

        let (secs, _) = parse_time_units("hours since 2000-01-01 06:00:00").unwrap();
        assert_eq!(secs, 3600.0);

        assert!(parse_time_units("fortnights since 2000-01-01").is_err());
        assert!(parse_time_units("days after 2000-01-01").is_err());
    }
}

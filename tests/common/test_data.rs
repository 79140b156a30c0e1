//! Test data generation utilities.
//!
//! This module provides functions to generate model output directories with
//! convention-named NetCDF year files, and observation network directories
//! with per-station text archives.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

// Use the netcdf crate's error type directly
type Result<T> = std::result::Result<T, netcdf::Error>;

/// Latitudes of the generated model grid, south to north.
pub const GRID_LATS: [f64; 4] = [-60.0, -20.0, 20.0, 60.0];

/// Longitudes of the generated model grid, 0-360 convention.
pub const GRID_LONS: [f64; 6] = [0.0, 60.0, 120.0, 180.0, 240.0, 300.0];

/// The filename one model year file gets under the aerocom3 convention.
pub fn aerocom3_name(data_id: &str, experiment: &str, var_name: &str, year: i32) -> String {
    format!(
        "aerocom3_{}_{}_{}_Column_{}_monthly.nc",
        data_id, experiment, var_name, year
    )
}

/// Day offsets of the twelve month starts relative to January 1st.
fn month_start_offsets(year: i32) -> Vec<f64> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).expect("valid date");
    (1..=12)
        .map(|month| {
            let start = NaiveDate::from_ymd_opt(year, month, 1).expect("valid date");
            (start - jan1).num_days() as f64
        })
        .collect()
}

/// Creates one monthly model year file with a known data pattern.
///
/// The value at (time t, lat j, lon i) is `base + t * 100 + j * 10 + i`, so
/// tests can check where any sample came from after concatenation, regridding
/// and cropping.
pub fn create_model_year_file(
    model_dir: &Path,
    data_id: &str,
    experiment: &str,
    var_name: &str,
    year: i32,
    base: f32,
) -> Result<PathBuf> {
    let path = model_dir.join(aerocom3_name(data_id, experiment, var_name, year));
    let mut file = netcdf::create(&path)?;

    let _ = file.add_dimension("lon", GRID_LONS.len())?;
    let _ = file.add_dimension("lat", GRID_LATS.len())?;
    let _ = file.add_unlimited_dimension("time")?;

    file.add_attribute("title", "aeroread test model output")?;

    {
        let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&GRID_LONS, &[..])?;
    }

    {
        let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&GRID_LATS, &[..])?;
    }

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", format!("days since {}-01-01", year).as_str())?;
        time_var.put_values(&month_start_offsets(year), &[..])?;
    }

    {
        let mut data_values = Vec::with_capacity(12 * GRID_LATS.len() * GRID_LONS.len());
        for t in 0..12 {
            for j in 0..GRID_LATS.len() {
                for i in 0..GRID_LONS.len() {
                    data_values.push(base + (t * 100 + j * 10 + i) as f32);
                }
            }
        }
        let mut data_var = file.add_variable::<f32>(var_name, &["time", "lat", "lon"])?;
        data_var.put_attribute("units", "1")?;
        data_var.put_values(&data_values, &[.., .., ..])?;
    }

    Ok(path)
}

/// Creates a model directory with one monthly file per requested year.
pub fn create_model_dir(root: &Path, data_id: &str, var_name: &str, years: &[i32]) -> PathBuf {
    let model_dir = root.join(data_id);
    std::fs::create_dir_all(&model_dir).expect("create model dir");
    for &year in years {
        create_model_year_file(&model_dir, data_id, "CTRL", var_name, year, year as f32)
            .expect("create year file");
    }
    model_dir
}

/// Creates an observation network directory with two stations, one of which
/// has a missing-value sample that parsing must drop.
pub fn create_obs_network_dir(root: &Path) -> PathBuf {
    let dir = root.join("AeronetSunV3");
    std::fs::create_dir_all(&dir).expect("create network dir");
    std::fs::write(
        dir.join("Kuopio.csv"),
        "# Station: Kuopio\n\
         # Latitude: 62.892\n\
         # Longitude: 27.634\n\
         # Altitude: 105.0\n\
         date,AOD_550nm,AOD_440nm\n\
         2019-06-01,0.123,0.150\n\
         2019-06-02,-999.0,0.140\n\
         2019-06-03,0.101,0.130\n",
    )
    .expect("write station file");
    std::fs::write(
        dir.join("Alta_Floresta.csv"),
        "# Station: Alta_Floresta\n\
         # Latitude: -9.871\n\
         # Longitude: -56.104\n\
         # Altitude: 277.0\n\
         date,AOD_550nm,AOD_440nm\n\
         2019-06-01,0.310,0.380\n\
         2019-06-02,0.295,0.355\n",
    )
    .expect("write station file");
    dir
}

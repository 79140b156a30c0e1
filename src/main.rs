//! aeroread - locate, read and subset gridded model output and station
//! observations
//!
//! This is the main entry point for the aeroread application.

use clap::Parser;
use tracing::{info, warn};

use aeroread::config::{Args, Command};
use aeroread::reader::{import_data, CacheStrategy, ReadGridded, ReadGriddedMulti};
use aeroread::region::{Region, RegionRegistry};
use aeroread::subset::{check_and_regrid_lons, crop_region};
use aeroread::{log_error, log_read_stats, log_timed_operation, Config, GriddedDataset, Result};

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args).map_err(|e| {
        eprintln!("Configuration error: {}", e);
        e
    })?;

    // Validate configuration
    config.validate().map_err(|e| {
        eprintln!("Invalid configuration: {}", e);
        e
    })?;

    aeroread::init_tracing(&config.log_level);

    info!("Starting aeroread v{}", env!("CARGO_PKG_VERSION"));

    let result = run(&args.command, &config);
    if let Err(e) = &result {
        log_error(e, "command");
    }
    result
}

fn run(command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Models => list_models(config),
        Command::Files { data_id } => list_files(data_id, config),
        Command::Read {
            data_ids,
            var_name,
            start_year,
            stop_year,
            region,
        } => read_models(data_ids, var_name, *start_year, *stop_year, region.as_deref(), config),
        Command::Obs {
            network,
            var_name,
            force_raw,
        } => read_obs(network, var_name, *force_raw, config),
        Command::Regions => list_regions(),
    }
}

/// List every model directory found under the configured model roots.
fn list_models(config: &Config) -> Result<()> {
    for root in &config.paths.model_roots {
        if !root.is_dir() {
            warn!(root = %root.display(), "Model root is not a directory");
            continue;
        }
        let mut names: Vec<String> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

/// Show one model's variables, years and matching data files.
fn list_files(data_id: &str, config: &Config) -> Result<()> {
    let reader = ReadGridded::new(data_id, config)?;
    println!("data_dir: {}", reader.data_dir().display());
    println!("convention: {}", reader.convention().name);
    println!("variables: {}", reader.vars_available().join(", "));
    let years: Vec<String> = reader
        .years_available()
        .iter()
        .map(|y| y.to_string())
        .collect();
    println!("years: {}", years.join(", "));
    for (path, info) in reader.search_all_files() {
        println!(
            "  {} [{} {} {}]",
            path.display(),
            info.var_name,
            info.year,
            info.ts_type
        );
    }
    Ok(())
}

/// Read one variable for one or more models and print a summary per model.
fn read_models(
    data_ids: &str,
    var_name: &str,
    start_year: i32,
    stop_year: i32,
    region: Option<&str>,
    config: &Config,
) -> Result<()> {
    let ids: Vec<&str> = data_ids.split(',').map(str::trim).collect();
    let region = match region {
        Some(name) => Some(RegionRegistry::default_set().get(name)?.clone()),
        None => None,
    };

    let multi = ReadGriddedMulti::new(config);
    let result = log_timed_operation("batch_read", || {
        multi.read(&ids, var_name, start_year, stop_year)
    });

    for (data_id, outcome) in result.iter() {
        println!("{}", summarize_entry(data_id, outcome, region.as_ref()));
    }
    Ok(())
}

/// One summary line per batch entry; a crop failure for one model is
/// reported inline like any other per-model failure.
fn summarize_entry(
    data_id: &str,
    outcome: &Result<GriddedDataset>,
    region: Option<&Region>,
) -> String {
    let cropped = outcome.as_ref().map_err(|e| e.to_string()).and_then(|dataset| {
        let mut dataset = dataset.clone();
        check_and_regrid_lons(&mut dataset);
        match region {
            Some(region) => crop_region(&dataset, region).map_err(|e| e.to_string()),
            None => Ok(dataset),
        }
    });
    match cropped {
        Ok(dataset) => {
            log_read_stats(&dataset);
            format!("{}: {}", data_id, dataset.short_str())
        }
        Err(e) => format!("{}: FAILED ({})", data_id, e),
    }
}

/// Read an observation network variable and print per-station counts.
fn read_obs(network: &str, var_name: &str, force_raw: bool, config: &Config) -> Result<()> {
    let strategy = if force_raw {
        CacheStrategy::ForceRefresh
    } else {
        CacheStrategy::PreferCache
    };
    let dataset = log_timed_operation("obs_import", || {
        import_data(network, var_name, config, strategy)
    })?;

    println!(
        "{} {} ({}): {} stations, {} samples",
        dataset.network,
        dataset.var_name,
        dataset.ts_type,
        dataset.stations.len(),
        dataset.num_samples()
    );
    for station in &dataset.stations {
        println!(
            "  {} ({:.3}, {:.3}): {} samples",
            station.station,
            station.latitude,
            station.longitude,
            station.times.len()
        );
    }
    Ok(())
}

/// Print the registered named regions with their bounds.
fn list_regions() -> Result<()> {
    for region in RegionRegistry::default_set().iter() {
        println!(
            "{}: lat [{}, {}], lon [{}, {}]",
            region.name,
            region.lat_range.0,
            region.lat_range.1,
            region.lon_range.0,
            region.lon_range.1
        );
    }
    Ok(())
}

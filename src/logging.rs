//! Logging utilities for aeroread.
//!
//! This module provides structured logging functionality to make logs more
//! searchable, analyzable, and useful for production deployments.

use std::time::Instant;
use tracing::{debug, error, info};

use uuid::Uuid;

/// Initialize the tracing subscriber with the given log level
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Log an operation with timing and result in a single statement
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let operation_id = Uuid::new_v4();

    debug!(
        operation = operation,
        operation_id = %operation_id,
        "Starting operation"
    );

    let result = f();

    let duration = start.elapsed();

    info!(
        operation = operation,
        operation_id = %operation_id,
        duration_ms = duration.as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Log detailed information about an assembled gridded dataset
pub fn log_read_stats(dataset: &crate::griddata::GriddedDataset) {
    info!(
        operation = "model_read",
        data_id = %dataset.data_id,
        var = %dataset.var_name,
        ts_type = %dataset.ts_type,
        timestamps = dataset.num_timestamps(),
        lats = dataset.lats.len(),
        lons = dataset.lons.len(),
        source_files = dataset.source_files.len(),
        memory_mb = dataset.data.len() * std::mem::size_of::<f32>() / (1024 * 1024),
        "Variable read successfully"
    );
}

/// Log an error with context
pub fn log_error(error: &crate::error::AeroreadError, context: &str) {
    error!(
        error = %error,
        context = context,
        error_type = std::any::type_name_of_val(error),
        "Error occurred"
    );
}

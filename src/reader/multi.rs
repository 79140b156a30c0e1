//! Multi-model batch reads.
//!
//! Each model id is read independently (own directory resolution, own file
//! set, own output dataset) so one bad model never aborts the batch. Reads
//! run on a dedicated rayon pool capped at the configured worker count to
//! avoid file-descriptor exhaustion when scanning many large directories.

use rayon::prelude::*;
use tracing::{info, warn};

use super::model::ReadGridded;
use crate::config::Config;
use crate::error::{AeroreadError, Result};
use crate::griddata::GriddedDataset;

/// Ordered per-model outcome of a batch read.
///
/// Exactly one entry per requested model id, in request order; each entry is
/// either the assembled dataset or the recorded failure.
#[derive(Debug)]
pub struct MultiReadResult {
    entries: Vec<(String, Result<GriddedDataset>)>,
}

impl MultiReadResult {
    /// Outcome for one model id, if it was part of the request.
    pub fn get(&self, data_id: &str) -> Option<&Result<GriddedDataset>> {
        self.entries
            .iter()
            .find(|(id, _)| id == data_id)
            .map(|(_, result)| result)
    }

    /// Number of requested model ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<GriddedDataset>)> {
        self.entries
            .iter()
            .map(|(id, result)| (id.as_str(), result))
    }

    /// The successfully read datasets, in request order.
    pub fn datasets(&self) -> impl Iterator<Item = (&str, &GriddedDataset)> {
        self.iter()
            .filter_map(|(id, result)| result.as_ref().ok().map(|dataset| (id, dataset)))
    }

    /// The recorded failures, in request order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &AeroreadError)> {
        self.iter()
            .filter_map(|(id, result)| result.as_ref().err().map(|err| (id, err)))
    }

    /// Count of successful entries.
    pub fn num_succeeded(&self) -> usize {
        self.datasets().count()
    }

    /// Count of failed entries.
    pub fn num_failed(&self) -> usize {
        self.failures().count()
    }
}

/// Reader running independent single-model reads over a batch of model ids.
#[derive(Debug)]
pub struct ReadGriddedMulti<'a> {
    config: &'a Config,
}

impl<'a> ReadGriddedMulti<'a> {
    /// Create a batch reader over the given configuration.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Read one variable for every requested model id.
    ///
    /// Failures are isolated per entry and never raised; the returned result
    /// has one entry per id in request order.
    pub fn read(
        &self,
        data_ids: &[&str],
        var_name: &str,
        start_year: i32,
        stop_year: i32,
    ) -> MultiReadResult {
        let workers = self
            .config
            .read
            .max_workers
            .min(data_ids.len().max(1))
            .max(1);

        let read_one = |data_id: &&str| -> (String, Result<GriddedDataset>) {
            let result = ReadGridded::new(data_id, self.config)
                .and_then(|reader| reader.read_var(var_name, start_year, stop_year));
            if let Err(err) = &result {
                warn!(data_id = data_id, error = %err, "Model read failed");
            }
            (data_id.to_string(), result)
        };

        let entries: Vec<(String, Result<GriddedDataset>)> =
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| data_ids.par_iter().map(read_one).collect()),
                Err(err) => {
                    warn!(error = %err, "Falling back to sequential batch read");
                    data_ids.iter().map(|id| read_one(id)).collect()
                }
            };

        let result = MultiReadResult { entries };
        info!(
            var = var_name,
            requested = result.len(),
            succeeded = result.num_succeeded(),
            failed = result.num_failed(),
            "Batch read finished"
        );
        result
    }
}

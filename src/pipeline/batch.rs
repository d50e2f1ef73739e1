//! Batch driver: runs the pipeline over a list of document ids, isolating failures per id.

use futures_util::stream::{self, StreamExt};
use std::path::Path;
use std::time::Instant;

use super::Pipeline;
use crate::error::{LoctextError, Result};

/// An id that could not be processed
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub id: String,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of one batch run, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn record(&mut self, id: String, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.succeeded.push(id),
            Err(e) => {
                log::error!("Failed to process {} ({}): {}", id, e.kind(), e);
                self.failed.push(BatchFailure {
                    id,
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Read newline-delimited ids, trimming whitespace and skipping blank lines
pub fn read_ids(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        LoctextError::InvalidInput(format!("Failed to read ids file {}: {}", path.display(), e))
    })?;
    Ok(parse_ids(&contents))
}

fn parse_ids(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Process every id, continuing past failures.
///
/// With `concurrency > 1` up to that many ids are in flight at once; the
/// report still lists them in input order. No id is retried.
pub async fn run_batch(pipeline: &Pipeline, ids: &[String], concurrency: usize) -> BatchReport {
    let start = Instant::now();
    let total = ids.len();
    let mut report = BatchReport::default();

    if concurrency <= 1 {
        for (idx, id) in ids.iter().enumerate() {
            log::info!("[{}/{}] Processing {}", idx + 1, total, id);
            let outcome = pipeline.process_document(id).await.map(|_| ());
            report.record(id.clone(), outcome);
        }
    } else {
        let outcomes: Vec<(String, Result<()>)> = stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let outcome = pipeline.process_document(&id).await.map(|_| ());
                (id, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        for (id, outcome) in outcomes {
            report.record(id, outcome);
        }
    }

    log::info!(
        "Batch complete in {:.2}s: {} succeeded, {} failed of {}",
        start.elapsed().as_secs_f64(),
        report.succeeded.len(),
        report.failed.len(),
        total
    );

    report
}

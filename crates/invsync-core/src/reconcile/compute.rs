//! Compute phase: run the rule pipeline over every record on a worker pool

use rayon::ThreadPoolBuilder;
use std::collections::BTreeMap;
use std::sync::mpsc;

use invsync_rules::Record;

use crate::Result;
use crate::pipeline::{Pipeline, RecordOutcome};

/// Evaluate `records` on `workers` threads
///
/// Workers send `(key, result)` pairs back; the caller owns the aggregate.
/// Results are keyed by record key, so the map order does not depend on
/// which worker finished first.
pub fn compute(
    records: &[Record],
    pipeline: &Pipeline<'_>,
    workers: usize,
) -> Result<BTreeMap<String, Result<RecordOutcome>>> {
    let pool = ThreadPoolBuilder::new().num_threads(workers.max(1)).build()?;
    let (tx, rx) = mpsc::channel();

    pool.scope(|scope| {
        for record in records {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let _ = tx.send((record.key.clone(), pipeline.process(record)));
            });
        }
    });
    drop(tx);

    Ok(rx.into_iter().collect())
}

use crate::histogram::Histogram;
use crate::timeline::{Snapshot, Timeline};
use crate::validity::ValidityInterval;
use moving_windows_common::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Unweighted mean of every snapshot in the run; None for an empty timeline.
///
/// Snapshots spanning unequal time contribute equally.
pub fn run_average(timeline: &Timeline, name: &str) -> Result<Option<Histogram>> {
    let Some(first) = timeline.snapshots().first() else {
        return Ok(None);
    };
    let mut total = first.histogram.empty_like(name);
    for snapshot in timeline {
        total.add(&snapshot.histogram)?;
    }
    total.scale(1.0 / timeline.len() as f64);
    Ok(Some(total))
}

/// one emitted bucket: averaged content over its merged validity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub index: usize,
    pub histogram: Histogram,
    pub validity: ValidityInterval,
    pub folds: usize,
}

/// Running accumulator for consecutive snapshots.
#[derive(Debug, Default)]
pub struct AggregateBucket {
    accumulator: Option<Histogram>,
    folds: usize,
    validity: Option<ValidityInterval>,
}

impl AggregateBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn is_empty(&self) -> bool {
        self.folds == 0
    }

    pub fn validity(&self) -> Option<ValidityInterval> {
        self.validity
    }

    pub fn fold(&mut self, snapshot: &Snapshot) -> Result<()> {
        let acc = self
            .accumulator
            .get_or_insert_with(|| snapshot.histogram.empty_like("bucket"));
        acc.add(&snapshot.histogram)?;
        self.validity = Some(match self.validity {
            Some(v) => ValidityInterval {
                from: v.from,
                until: snapshot.validity.until,
            },
            None => snapshot.validity,
        });
        self.folds += 1;
        Ok(())
    }

    /// scale by `1 / divisor`, emit, then clear content, fold count and interval
    pub fn finalize(&mut self, index: usize, divisor: usize, name: String) -> Option<Aggregate> {
        let validity = self.validity.take()?;
        let acc = self.accumulator.as_mut()?;
        let mut histogram = acc.copy_as(name);
        histogram.scale(1.0 / divisor as f64);
        acc.reset();
        let folds = std::mem::take(&mut self.folds);
        Some(Aggregate {
            index,
            histogram,
            validity,
            folds,
        })
    }
}

/// Averages runs of `bucket_size` consecutive snapshots.
///
/// A trailing short bucket is still divided by `bucket_size`, not by the
/// number of snapshots it actually holds.
pub struct BucketAggregator {
    bucket_size: usize,
    bucket: AggregateBucket,
    emitted: Vec<Aggregate>,
    prefix: String,
}

impl BucketAggregator {
    pub fn new(bucket_size: usize, prefix: impl Into<String>) -> Self {
        Self {
            bucket_size,
            bucket: AggregateBucket::new(),
            emitted: Vec::new(),
            prefix: prefix.into(),
        }
    }

    pub fn push(&mut self, snapshot: &Snapshot) -> Result<()> {
        if self.bucket_size == 0 {
            return Ok(());
        }
        self.bucket.fold(snapshot)?;
        if self.bucket.folds() == self.bucket_size {
            self.flush();
        }
        Ok(())
    }

    fn flush(&mut self) {
        let index = self.emitted.len();
        let name = format!("{}_{:02}", self.prefix, index);
        if let Some(agg) = self.bucket.finalize(index, self.bucket_size, name) {
            debug!(index, folds = agg.folds, window = %agg.validity, "bucket emitted");
            self.emitted.push(agg);
        }
    }

    pub fn finish(mut self) -> Vec<Aggregate> {
        if !self.bucket.is_empty() {
            self.flush();
        }
        self.emitted
    }
}

/// bucketed averages over the whole timeline; empty when `bucket_size` is 0
pub fn aggregate_buckets(timeline: &Timeline, bucket_size: usize, prefix: &str) -> Result<Vec<Aggregate>> {
    let mut aggregator = BucketAggregator::new(bucket_size, prefix);
    for snapshot in timeline {
        aggregator.push(snapshot)?;
    }
    Ok(aggregator.finish())
}

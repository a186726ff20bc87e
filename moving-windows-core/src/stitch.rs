use crate::histogram::Histogram;
use crate::rebin::RebinEngine;
use crate::store::{QueryMetadata, ValidityStore};
use crate::timeline::{RunBounds, Snapshot, Timeline};
use crate::validity::{format_timestamp, ValidityInterval};
use moving_windows_common::{MovingWindowsError, Result};
use tracing::{debug, info};

pub const DEFAULT_INCREMENT_MS: i64 = 60_000;

/// resolve start/end of run from the boundary markers
pub fn resolve_run_bounds<S: ValidityStore + ?Sized>(
    store: &S,
    run: u32,
    sor_marker: &str,
    eor_marker: &str,
) -> Result<RunBounds> {
    let lookup = |marker: &str| -> Result<i64> {
        match store.query_run_bound(run, marker)? {
            Some(ts) => {
                info!(run, marker, ts, date = %format_timestamp(ts, false), "run boundary found");
                Ok(ts)
            }
            None => Err(MovingWindowsError::MissingBoundary {
                run,
                marker: marker.to_owned(),
            }),
        }
    };
    let start = lookup(sor_marker)?;
    let end = lookup(eor_marker)?;
    Ok(RunBounds { start, end })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StitchState {
    Seeking(i64),
    Done,
}

/// counters from one stitch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchStats {
    pub queries: usize,
    pub found: usize,
    pub gaps: usize,
}

/// Walks a run's time axis collecting the objects valid along it.
pub struct WindowStitcher<'a, S: ValidityStore + ?Sized> {
    store: &'a S,
    increment_ms: i64,
    rebin: Option<&'a RebinEngine>,
}

impl<'a, S: ValidityStore + ?Sized> WindowStitcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            increment_ms: DEFAULT_INCREMENT_MS,
            rebin: None,
        }
    }

    /// polling step used to skip over gaps; must be positive
    pub fn with_increment(mut self, increment_ms: i64) -> Self {
        self.increment_ms = increment_ms;
        self
    }

    pub fn with_rebin(mut self, engine: &'a RebinEngine) -> Self {
        self.rebin = Some(engine);
        self
    }

    pub fn stitch(&self, key: &str, metadata: &QueryMetadata, bounds: RunBounds) -> Result<Timeline> {
        self.stitch_with_stats(key, metadata, bounds).map(|(t, _)| t)
    }

    pub fn stitch_with_stats(
        &self,
        key: &str,
        metadata: &QueryMetadata,
        bounds: RunBounds,
    ) -> Result<(Timeline, StitchStats)> {
        if self.increment_ms <= 0 {
            return Err(MovingWindowsError::Config(format!(
                "increment must be positive, got {}",
                self.increment_ms
            )));
        }
        let mut timeline = Timeline::new();
        let mut stats = StitchStats::default();
        let mut state = StitchState::Seeking(bounds.start);
        while let StitchState::Seeking(ts) = state {
            stats.queries += 1;
            state = match self.store.query_at(key, metadata, ts)? {
                Some(object) => {
                    let validity = ValidityInterval::from_headers(&object.headers, key, ts)?;
                    if validity.until < ts {
                        return Err(MovingWindowsError::MalformedHeader {
                            key: key.to_owned(),
                            timestamp: ts,
                            detail: format!("validity {} ends before query time", validity.encode()),
                        });
                    }
                    debug!(
                        run = metadata.run,
                        pass = %metadata.pass,
                        from = validity.from,
                        until = validity.until,
                        window = %validity,
                        "object found"
                    );
                    timeline.push(self.snapshot(&object.histogram, validity))?;
                    stats.found += 1;
                    // an overflowing cursor is past any run end
                    match validity.until.checked_add(1) {
                        Some(next) if next < bounds.end => StitchState::Seeking(next),
                        _ => StitchState::Done,
                    }
                }
                None if ts < bounds.end => {
                    debug!(run = metadata.run, pass = %metadata.pass, ts, "no object valid, skipping ahead");
                    stats.gaps += 1;
                    match ts.checked_add(self.increment_ms) {
                        Some(next) => StitchState::Seeking(next),
                        None => StitchState::Done,
                    }
                }
                None => StitchState::Done,
            };
        }
        info!(
            run = metadata.run,
            pass = %metadata.pass,
            key,
            snapshots = timeline.len(),
            gaps = stats.gaps,
            queries = stats.queries,
            "stitching complete"
        );
        Ok((timeline, stats))
    }

    /// fresh copy named after its validity, optionally rebinned
    fn snapshot(&self, fetched: &Histogram, validity: ValidityInterval) -> Snapshot {
        let name = validity.encode();
        let histogram = match self.rebin {
            Some(engine) => {
                let mut h = engine.rebin(fetched);
                h.name = name;
                h
            }
            None => fetched.copy_as(name),
        };
        Snapshot { histogram, validity }
    }
}

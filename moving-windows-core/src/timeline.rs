use crate::histogram::Histogram;
use crate::validity::ValidityInterval;
use moving_windows_common::{MovingWindowsError, Result};
use serde::{Deserialize, Serialize};

/// Y-axis headroom over the tallest plotted bin.
pub const Y_MAX_HEADROOM: f64 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBounds {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub histogram: Histogram,
    pub validity: ValidityInterval,
}

/// Snapshots of one run ordered by `validity.from`. Gaps are allowed,
/// overlaps are not, and every histogram shares the same edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    snapshots: Vec<Snapshot>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// build from already-ordered snapshots, checking the invariants
    pub fn from_snapshots(snapshots: Vec<Snapshot>) -> Result<Self> {
        let mut timeline = Self::new();
        for s in snapshots {
            timeline.push(s)?;
        }
        Ok(timeline)
    }

    pub fn push(&mut self, snapshot: Snapshot) -> Result<()> {
        if let Some(last) = self.snapshots.last() {
            if snapshot.validity.from <= last.validity.until {
                return Err(MovingWindowsError::Other(format!(
                    "snapshot {} overlaps or precedes {}",
                    snapshot.validity.encode(),
                    last.validity.encode()
                )));
            }
            if snapshot.histogram.bins != last.histogram.bins {
                return Err(MovingWindowsError::BinMismatch {
                    expected: last.histogram.n_bins(),
                    found: snapshot.histogram.n_bins(),
                });
            }
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    /// shared y-axis ceiling: headroom times the largest peak of any snapshot
    pub fn y_max(&self) -> f64 {
        shared_y_max(self.snapshots.iter().map(|s| &s.histogram))
    }

    /// total milliseconds between consecutive snapshots not covered by any validity
    pub fn gap_ms(&self) -> i64 {
        self.snapshots
            .windows(2)
            .map(|w| (w[1].validity.from - w[0].validity.until - 1).max(0))
            .sum()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;
    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

pub fn shared_y_max<'a>(histograms: impl IntoIterator<Item = &'a Histogram>) -> f64 {
    let peak = histograms
        .into_iter()
        .map(Histogram::maximum)
        .fold(0.0_f64, f64::max);
    peak * Y_MAX_HEADROOM
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::BinScheme;

    fn snap(from: i64, until: i64, contents: Vec<f64>) -> Snapshot {
        let bins = BinScheme::uniform(contents.len(), 0.0, contents.len() as f64).unwrap();
        let validity = ValidityInterval::new(from, until).unwrap();
        Snapshot {
            histogram: Histogram::from_contents(validity.encode(), bins, contents).unwrap(),
            validity,
        }
    }

    #[test]
    fn push_rejects_overlap_and_layout_change() {
        let mut t = Timeline::new();
        t.push(snap(0, 99, vec![1.0, 2.0])).unwrap();
        assert!(t.push(snap(99, 200, vec![1.0, 2.0])).is_err());
        assert!(matches!(
            t.push(snap(100, 200, vec![1.0, 2.0, 3.0])),
            Err(MovingWindowsError::BinMismatch { expected: 2, found: 3 })
        ));
        t.push(snap(100, 200, vec![0.0, 0.0])).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn y_max_uses_headroom_over_peak() {
        let t = Timeline::from_snapshots(vec![
            snap(0, 9, vec![1.0, 4.0]),
            snap(10, 19, vec![8.0, 2.0]),
            snap(20, 29, vec![-3.0, 0.5]),
        ])
        .unwrap();
        assert!((t.y_max() - 8.4).abs() < 1e-12);
        assert_eq!(Timeline::new().y_max(), 0.0);
    }

    #[test]
    fn gap_ms_counts_uncovered_time() {
        let t = Timeline::from_snapshots(vec![
            snap(0, 9, vec![1.0]),
            snap(10, 19, vec![1.0]),
            snap(50, 59, vec![1.0]),
        ])
        .unwrap();
        assert_eq!(t.gap_ms(), 30);
    }
}

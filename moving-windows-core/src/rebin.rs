use crate::histogram::{BinScheme, Histogram};
use moving_windows_common::Result;
use tracing::debug;

/// Edges of the readout-frame (ROF) scheme: linear in the first decade of
/// counts, then coarser steps per decade up to 50000. 320 edges, 319 bins.
pub fn rof_edges() -> Vec<f64> {
    let steps: [(u32, u32, u32); 4] = [
        (1, 100, 1),
        (110, 1000, 10),
        (1100, 10000, 100),
        (11000, 50000, 1000),
    ];
    steps
        .iter()
        .flat_map(|&(from, to, step)| (from..=to).step_by(step as usize).map(f64::from))
        .collect()
}

pub fn rof_scheme() -> Result<BinScheme> {
    BinScheme::new(rof_edges())
}

/// Folds histograms onto a fixed target scheme.
///
/// Each source bin moves whole into the target bin holding its center; a
/// center outside the target range drops that bin's content.
#[derive(Debug, Clone)]
pub struct RebinEngine {
    target: BinScheme,
}

impl RebinEngine {
    pub fn new(target: BinScheme) -> Self {
        Self { target }
    }

    pub fn rof() -> Result<Self> {
        Ok(Self::new(rof_scheme()?))
    }

    pub fn target(&self) -> &BinScheme {
        &self.target
    }

    /// many-to-one redistribution without width normalization; dropped
    /// content is also taken off `entries`
    pub fn accumulate(&self, source: &Histogram) -> Histogram {
        let mut out = Histogram::new(format!("{}_rebin", source.name), self.target.clone())
            .with_titles(&source.title, &source.x_title, &source.y_title);
        let mut dropped = 0usize;
        let mut dropped_content = 0.0;
        for (bin, &value) in source.contents.iter().enumerate() {
            match self.target.find_bin(source.bins.center(bin)) {
                Some(t) => out.contents[t] += value,
                None => {
                    dropped += 1;
                    dropped_content += value;
                }
            }
        }
        if dropped > 0 {
            debug!(histogram = %source.name, dropped, dropped_content, "source bins outside target scheme dropped");
        }
        out.entries = source.entries - dropped_content;
        out
    }

    /// redistribute then divide every target bin by its width
    pub fn rebin(&self, source: &Histogram) -> Histogram {
        let mut out = self.accumulate(source);
        out.scale_by_width();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rof_scheme_matches_reference_layout() {
        let edges = rof_edges();
        assert_eq!(edges.len(), 320);
        assert_eq!(edges[0], 1.0);
        assert_eq!(edges[99], 100.0);
        assert_eq!(edges[100], 110.0);
        assert_eq!(edges[189], 1000.0);
        assert_eq!(edges[190], 1100.0);
        assert_eq!(edges[279], 10000.0);
        assert_eq!(edges[280], 11000.0);
        assert_eq!(edges[319], 50000.0);
        assert_eq!(rof_scheme().unwrap().n_bins(), 319);
    }

    #[test]
    fn rebin_on_target_scheme_only_applies_width() {
        let engine = RebinEngine::rof().unwrap();
        let target = engine.target().clone();
        let contents: Vec<f64> = (0..target.n_bins()).map(|i| (i % 7) as f64 - 2.0).collect();
        let h = Histogram::from_contents("h", target.clone(), contents.clone()).unwrap();
        let acc = engine.accumulate(&h);
        assert_eq!(acc.contents, contents);
        let rebinned = engine.rebin(&h);
        for i in 0..target.n_bins() {
            assert!((rebinned.content(i) * target.width(i) - contents[i]).abs() < 1e-9);
        }
        // unit-width bins come back untouched
        assert_eq!(&rebinned.contents[..99], &contents[..99]);
    }

    #[test]
    fn conserves_content_inside_range() {
        let engine = RebinEngine::rof().unwrap();
        let source = BinScheme::uniform(500, 1.0, 2001.0).unwrap();
        let contents: Vec<f64> = (0..500).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let h = Histogram::from_contents("src", source, contents).unwrap();
        let acc = engine.accumulate(&h);
        assert!((acc.integral() - h.integral()).abs() < 1e-9);
    }

    #[test]
    fn drops_centers_outside_target() {
        let target = BinScheme::new(vec![0.0, 10.0, 20.0]).unwrap();
        let engine = RebinEngine::new(target);
        let source = BinScheme::uniform(4, -10.0, 30.0).unwrap(); // centers -5, 5, 15, 25
        let h = Histogram::from_contents("src", source, vec![100.0, 1.0, 2.0, 100.0]).unwrap();
        let acc = engine.accumulate(&h);
        assert_eq!(acc.contents, vec![1.0, 2.0]);
        assert_eq!(h.entries, 203.0);
        assert_eq!(acc.entries, 3.0);
        let out = engine.rebin(&h);
        assert_eq!(out.contents, vec![0.1, 0.2]);
    }

    #[test]
    fn many_to_one_and_metadata() {
        let target = BinScheme::new(vec![0.0, 4.0, 8.0]).unwrap();
        let engine = RebinEngine::new(target);
        let source = BinScheme::uniform(8, 0.0, 8.0).unwrap();
        let h = Histogram::from_contents("rof", source, vec![1.0; 8])
            .unwrap()
            .with_titles("ROF size", "clusters", "entries");
        let out = engine.rebin(&h);
        assert_eq!(out.contents, vec![1.0, 1.0]);
        assert_eq!(out.name, "rof_rebin");
        assert_eq!(out.x_title, "clusters");
        assert_eq!(out.title, "ROF size");
    }
}

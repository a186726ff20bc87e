use moving_windows_common::{MovingWindowsError, Result};
use serde::{Deserialize, Serialize};

/// strictly increasing bin edges, `n_bins + 1` of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BinScheme {
    edges: Vec<f64>,
}

impl BinScheme {
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(MovingWindowsError::InvalidBinScheme(format!(
                "need at least 2 edges, got {}",
                edges.len()
            )));
        }
        if let Some(w) = edges.windows(2).find(|w| !(w[0] < w[1])) {
            return Err(MovingWindowsError::InvalidBinScheme(format!(
                "edges not strictly increasing at {} -> {}",
                w[0], w[1]
            )));
        }
        Ok(Self { edges })
    }

    pub fn uniform(n_bins: usize, low: f64, high: f64) -> Result<Self> {
        if n_bins == 0 || !(low < high) {
            return Err(MovingWindowsError::InvalidBinScheme(format!(
                "uniform scheme needs n_bins > 0 and low < high, got {n_bins} bins over [{low}, {high})"
            )));
        }
        let width = (high - low) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| low + i as f64 * width).collect();
        edges.push(high);
        Self::new(edges)
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn low(&self) -> f64 {
        self.edges[0]
    }

    pub fn high(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    pub fn low_edge(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    pub fn width(&self, bin: usize) -> f64 {
        self.edges[bin + 1] - self.edges[bin]
    }

    pub fn center(&self, bin: usize) -> f64 {
        0.5 * (self.edges[bin] + self.edges[bin + 1])
    }

    /// index of the bin whose `[low, high)` range holds `x`; None outside the scheme
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.low() && x < self.high()) {
            return None;
        }
        // first edge strictly greater than x closes the bin
        let upper = self.edges.partition_point(|&e| e <= x);
        Some(upper - 1)
    }
}

impl TryFrom<Vec<f64>> for BinScheme {
    type Error = MovingWindowsError;
    fn try_from(edges: Vec<f64>) -> Result<Self> {
        Self::new(edges)
    }
}

impl From<BinScheme> for Vec<f64> {
    fn from(scheme: BinScheme) -> Self {
        scheme.edges
    }
}

/// 1-D histogram with fixed edges; contents may be negative after upstream subtraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistogram")]
pub struct Histogram {
    pub name: String,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub bins: BinScheme,
    pub contents: Vec<f64>,
    pub entries: f64,
}

/// wire form, checked against its own bin layout before it becomes a `Histogram`
#[derive(Deserialize)]
struct RawHistogram {
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    x_title: String,
    #[serde(default)]
    y_title: String,
    bins: BinScheme,
    contents: Vec<f64>,
    #[serde(default)]
    entries: f64,
}

impl TryFrom<RawHistogram> for Histogram {
    type Error = MovingWindowsError;
    fn try_from(raw: RawHistogram) -> Result<Self> {
        let mut h = Histogram::from_contents(raw.name, raw.bins, raw.contents)?
            .with_titles(&raw.title, &raw.x_title, &raw.y_title);
        h.entries = raw.entries;
        Ok(h)
    }
}

impl Histogram {
    pub fn new(name: impl Into<String>, bins: BinScheme) -> Self {
        let n = bins.n_bins();
        Self {
            name: name.into(),
            title: String::new(),
            x_title: String::new(),
            y_title: String::new(),
            bins,
            contents: vec![0.0; n],
            entries: 0.0,
        }
    }

    pub fn from_contents(name: impl Into<String>, bins: BinScheme, contents: Vec<f64>) -> Result<Self> {
        if contents.len() != bins.n_bins() {
            return Err(MovingWindowsError::BinMismatch {
                expected: bins.n_bins(),
                found: contents.len(),
            });
        }
        let entries = contents.iter().sum();
        Ok(Self {
            name: name.into(),
            title: String::new(),
            x_title: String::new(),
            y_title: String::new(),
            bins,
            contents,
            entries,
        })
    }

    pub fn with_titles(mut self, title: &str, x_title: &str, y_title: &str) -> Self {
        self.title = title.to_owned();
        self.x_title = x_title.to_owned();
        self.y_title = y_title.to_owned();
        self
    }

    /// a fresh histogram with the same edges, contents and titles under a new name
    pub fn copy_as(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// an empty histogram sharing this one's edges and titles
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.bins.clone()).with_titles(&self.title, &self.x_title, &self.y_title)
    }

    pub fn n_bins(&self) -> usize {
        self.bins.n_bins()
    }

    pub fn content(&self, bin: usize) -> f64 {
        self.contents[bin]
    }

    pub fn set_content(&mut self, bin: usize, value: f64) {
        self.contents[bin] = value;
    }

    /// bin-wise addition; both histograms must share the same edges
    pub fn add(&mut self, other: &Histogram) -> Result<()> {
        if self.bins != other.bins {
            if self.n_bins() != other.n_bins() {
                return Err(MovingWindowsError::BinMismatch {
                    expected: self.n_bins(),
                    found: other.n_bins(),
                });
            }
            return Err(MovingWindowsError::InvalidBinScheme(format!(
                "cannot add {} to {}: bin edges differ",
                other.name, self.name
            )));
        }
        for (acc, v) in self.contents.iter_mut().zip(&other.contents) {
            *acc += v;
        }
        self.entries += other.entries;
        Ok(())
    }

    pub fn scale(&mut self, factor: f64) {
        for c in &mut self.contents {
            *c *= factor;
        }
    }

    /// divide every bin by its width
    pub fn scale_by_width(&mut self) {
        for (i, c) in self.contents.iter_mut().enumerate() {
            *c /= self.bins.width(i);
        }
    }

    pub fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.entries = 0.0;
    }

    pub fn maximum(&self) -> f64 {
        self.contents.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_or_unsorted_edges() {
        assert!(BinScheme::new(vec![1.0]).is_err());
        assert!(BinScheme::new(vec![1.0, 1.0]).is_err());
        assert!(BinScheme::new(vec![0.0, 2.0, 1.0]).is_err());
        assert!(BinScheme::uniform(0, 0.0, 1.0).is_err());
        assert!(BinScheme::uniform(4, 1.0, 1.0).is_err());
    }

    #[test]
    fn uniform_edges_and_centers() {
        let s = BinScheme::uniform(4, 0.0, 8.0).unwrap();
        assert_eq!(s.edges(), &[0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(s.n_bins(), 4);
        assert_eq!(s.center(1), 3.0);
        assert_eq!(s.width(3), 2.0);
    }

    #[test]
    fn find_bin_is_half_open() {
        let s = BinScheme::new(vec![1.0, 2.0, 5.0, 10.0]).unwrap();
        assert_eq!(s.find_bin(1.0), Some(0));
        assert_eq!(s.find_bin(1.99), Some(0));
        assert_eq!(s.find_bin(2.0), Some(1));
        assert_eq!(s.find_bin(9.5), Some(2));
        assert_eq!(s.find_bin(10.0), None);
        assert_eq!(s.find_bin(0.5), None);
        assert_eq!(s.find_bin(f64::NAN), None);
    }

    #[test]
    fn add_requires_same_edges() {
        let a = BinScheme::uniform(3, 0.0, 3.0).unwrap();
        let b = BinScheme::uniform(4, 0.0, 3.0).unwrap();
        let c = BinScheme::uniform(3, 0.0, 6.0).unwrap();
        let mut h = Histogram::new("h", a.clone());
        assert!(matches!(
            h.add(&Histogram::new("g", b)),
            Err(MovingWindowsError::BinMismatch { expected: 3, found: 4 })
        ));
        assert!(h.add(&Histogram::new("g", c)).is_err());
        let g = Histogram::from_contents("g", a, vec![1.0, -2.0, 3.0]).unwrap();
        h.add(&g).unwrap();
        h.add(&g).unwrap();
        assert_eq!(h.contents, vec![2.0, -4.0, 6.0]);
    }

    #[test]
    fn scale_reset_and_maximum() {
        let s = BinScheme::uniform(3, 0.0, 3.0).unwrap();
        let mut h = Histogram::from_contents("h", s, vec![1.0, 4.0, 2.0]).unwrap();
        h.scale(0.5);
        assert_eq!(h.contents, vec![0.5, 2.0, 1.0]);
        assert_eq!(h.maximum(), 2.0);
        assert_eq!(h.integral(), 3.5);
        h.reset();
        assert_eq!(h.integral(), 0.0);
        assert_eq!(h.maximum(), 0.0);
    }

    #[test]
    fn scheme_deserialization_validates() {
        let ok: BinScheme = serde_json::from_str("[0.0, 1.0, 3.0]").unwrap();
        assert_eq!(ok.n_bins(), 2);
        assert!(serde_json::from_str::<BinScheme>("[3.0, 1.0]").is_err());
    }

    #[test]
    fn histogram_deserialization_checks_content_length() {
        let h: Histogram = serde_json::from_str(
            r#"{"name":"h","title":"ROF size","bins":[0.0,1.0,2.0],"contents":[1.0,2.0],"entries":7.0}"#,
        )
        .unwrap();
        assert_eq!(h.contents, vec![1.0, 2.0]);
        assert_eq!(h.entries, 7.0);
        assert_eq!(h.title, "ROF size");

        let short = serde_json::from_str::<Histogram>(r#"{"name":"h","bins":[0.0,1.0,2.0],"contents":[1.0]}"#);
        let err = short.unwrap_err().to_string();
        assert!(err.contains("expected 2 bins, found 1"), "{err}");
        assert!(serde_json::from_str::<Histogram>(r#"{"name":"h","bins":[0.0,1.0],"contents":[1.0,2.0]}"#).is_err());
    }
}

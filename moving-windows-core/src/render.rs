use crate::histogram::Histogram;
use crate::validity::ValidityInterval;
use moving_windows_common::{MovingWindowsError, PlotConfig, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn snapshot_stem(key: &str, validity: &ValidityInterval) -> String {
    format!("{key}_{}", validity.from)
}

pub fn bucket_stem(key: &str, index: usize) -> String {
    format!("{key}_{index:02}")
}

pub fn total_stem(key: &str) -> String {
    format!("{key}_total")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
}

/// one drawn histogram with its legend entry
#[derive(Debug, Clone)]
pub struct Series<'a> {
    pub histogram: &'a Histogram,
    pub validity: ValidityInterval,
    pub label: String,
    pub color: &'static str,
    pub line: LineStyle,
}

impl<'a> Series<'a> {
    /// primary series, legend is the validity window in local `HH:MM:SS`
    pub fn primary(histogram: &'a Histogram, validity: ValidityInterval) -> Self {
        Self {
            histogram,
            validity,
            label: validity.to_string(),
            color: "blue",
            line: LineStyle::Solid,
        }
    }

    pub fn overlay(histogram: &'a Histogram, validity: ValidityInterval) -> Self {
        Self {
            color: "red",
            line: LineStyle::Dashed,
            ..Self::primary(histogram, validity)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub file_stem: String,
    pub title: String,
    pub primary: Series<'a>,
    pub secondary: Option<Series<'a>>,
    pub y_max: f64,
}

/// Consumes histograms plus metadata and produces one artifact per call.
pub trait RenderSink {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<PathBuf>;
}

impl<R: RenderSink + ?Sized> RenderSink for &mut R {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<PathBuf> {
        (**self).render(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasFormat {
    Json,
    Csv,
}

impl CanvasFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(MovingWindowsError::Config(format!(
                "unknown plot format: {other} (use json or csv)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotStyle {
    pub log_x: bool,
    pub log_y: bool,
    pub draw_style: String,
}

impl From<&PlotConfig> for PlotStyle {
    fn from(cfg: &PlotConfig) -> Self {
        Self {
            log_x: cfg.log_x,
            log_y: cfg.log_y,
            draw_style: cfg.draw_style.clone(),
        }
    }
}

#[derive(Serialize)]
struct CanvasSeries<'a> {
    label: &'a str,
    valid_from: i64,
    valid_until: i64,
    color: &'a str,
    line: LineStyle,
    values: &'a [f64],
}

#[derive(Serialize)]
struct CanvasDoc<'a> {
    title: &'a str,
    x_title: &'a str,
    y_title: &'a str,
    log_x: bool,
    log_y: bool,
    draw_style: &'a str,
    y_range: [f64; 2],
    x_edges: &'a [f64],
    series: Vec<CanvasSeries<'a>>,
}

/// Writes a plotting-ready description of each canvas to `<dir>/<stem>.<ext>`.
pub struct CanvasSink {
    dir: PathBuf,
    format: CanvasFormat,
    style: PlotStyle,
}

impl CanvasSink {
    pub fn new(dir: impl Into<PathBuf>, format: CanvasFormat, style: PlotStyle) -> Self {
        Self {
            dir: dir.into(),
            format,
            style,
        }
    }

    pub fn from_config(dir: impl Into<PathBuf>, cfg: &PlotConfig) -> Result<Self> {
        Ok(Self::new(dir, CanvasFormat::parse(&cfg.format)?, PlotStyle::from(cfg)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_json(&self, path: &Path, request: &RenderRequest<'_>) -> Result<()> {
        let primary = request.primary.histogram;
        let series = std::iter::once(&request.primary)
            .chain(request.secondary.as_ref())
            .map(|s| CanvasSeries {
                label: &s.label,
                valid_from: s.validity.from,
                valid_until: s.validity.until,
                color: s.color,
                line: s.line,
                values: &s.histogram.contents,
            })
            .collect();
        let doc = CanvasDoc {
            title: &request.title,
            x_title: &primary.x_title,
            y_title: &primary.y_title,
            log_x: self.style.log_x,
            log_y: self.style.log_y,
            draw_style: &self.style.draw_style,
            y_range: [0.0, request.y_max],
            x_edges: primary.bins.edges(),
            series,
        };
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &doc)?;
        Ok(())
    }

    fn write_csv(&self, path: &Path, request: &RenderRequest<'_>) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        let primary = request.primary.histogram;
        let secondary = request.secondary.as_ref();
        write!(file, "bin_low,bin_high,{}", csv_escape(&request.primary.label))?;
        if let Some(s) = secondary {
            write!(file, ",{}", csv_escape(&s.label))?;
        }
        writeln!(file)?;
        for bin in 0..primary.n_bins() {
            write!(
                file,
                "{},{},{}",
                primary.bins.low_edge(bin),
                primary.bins.low_edge(bin + 1),
                primary.content(bin)
            )?;
            if let Some(s) = secondary {
                write!(file, ",{}", s.histogram.contents.get(bin).copied().unwrap_or(0.0))?;
            }
            writeln!(file)?;
        }
        file.flush()?;
        Ok(())
    }
}

impl RenderSink for CanvasSink {
    fn render(&mut self, request: &RenderRequest<'_>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}.{}", request.file_stem, self.format.extension()));
        match self.format {
            CanvasFormat::Json => self.write_json(&path, request)?,
            CanvasFormat::Csv => self.write_csv(&path, request)?,
        }
        Ok(path)
    }
}

// wrap in quotes if contains comma, quote, or newline
fn csv_escape(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::BinScheme;

    fn hist(v: f64) -> Histogram {
        Histogram::from_contents("h", BinScheme::new(vec![1.0, 2.0, 4.0]).unwrap(), vec![v, 2.0 * v])
            .unwrap()
            .with_titles("ROF size", "n tracks", "entries")
    }

    fn style() -> PlotStyle {
        PlotStyle {
            log_x: true,
            log_y: false,
            draw_style: "hist".into(),
        }
    }

    #[test]
    fn stems_follow_naming_convention() {
        let v = ValidityInterval::new(1719668288021, 1719668888021).unwrap();
        assert_eq!(snapshot_stem("mMFTTrackROFSize", &v), "mMFTTrackROFSize_1719668288021");
        assert_eq!(bucket_stem("mMFTTrackROFSize", 3), "mMFTTrackROFSize_03");
        assert_eq!(bucket_stem("mMFTTrackROFSize", 12), "mMFTTrackROFSize_12");
        assert_eq!(total_stem("mMFTTrackROFSize"), "mMFTTrackROFSize_total");
    }

    #[test]
    fn json_canvas_carries_both_series() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CanvasSink::new(dir.path(), CanvasFormat::Json, style());
        let (a, b) = (hist(1.0), hist(3.0));
        let va = ValidityInterval::new(0, 59_999).unwrap();
        let vb = ValidityInterval::new(60_000, 119_999).unwrap();
        let req = RenderRequest {
            file_stem: "h_0".into(),
            title: "ROF size (59s window)".into(),
            primary: Series::primary(&a, va),
            secondary: Some(Series::overlay(&b, vb)),
            y_max: 6.3,
        };
        let path = sink.render(&req).unwrap();
        assert_eq!(path, dir.path().join("h_0.json"));
        let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["title"], "ROF size (59s window)");
        assert_eq!(doc["log_x"], true);
        assert_eq!(doc["y_range"][1], 6.3);
        assert_eq!(doc["x_edges"].as_array().unwrap().len(), 3);
        let series = doc["series"].as_array().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0]["line"], "solid");
        assert_eq!(series[1]["line"], "dashed");
        assert_eq!(series[1]["values"][1], 6.0);
    }

    #[test]
    fn csv_canvas_rows_per_bin() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CanvasSink::new(dir.path().join("plots"), CanvasFormat::Csv, style());
        let a = hist(1.5);
        let req = RenderRequest {
            file_stem: "h_total".into(),
            title: "total".into(),
            primary: Series {
                label: "run, average".into(),
                ..Series::primary(&a, ValidityInterval::new(0, 10).unwrap())
            },
            secondary: None,
            y_max: 3.15,
        };
        let path = sink.render(&req).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "bin_low,bin_high,\"run, average\"");
        assert_eq!(lines[1], "1,2,1.5");
        assert_eq!(lines[2], "2,4,3");
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(CanvasFormat::parse("pdf").is_err());
        assert_eq!(CanvasFormat::parse("csv").unwrap().extension(), "csv");
    }
}

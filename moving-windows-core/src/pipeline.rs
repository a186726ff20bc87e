use crate::aggregate::{aggregate_buckets, run_average, Aggregate};
use crate::cache::ArtifactCache;
use crate::histogram::Histogram;
use crate::rebin::RebinEngine;
use crate::render::{bucket_stem, snapshot_stem, total_stem, RenderRequest, RenderSink, Series};
use crate::stitch::{resolve_run_bounds, StitchStats, WindowStitcher};
use crate::store::{QueryMetadata, ValidityStore};
use crate::timeline::{shared_y_max, Timeline};
use crate::validity::ValidityInterval;
use moving_windows_common::{Config, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything one invocation needs, fixed before any work starts.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub run: u32,
    pub pass: String,
    pub hname: String,
    pub object_prefix: String,
    pub sor_marker: String,
    pub eor_marker: String,
    pub increment_ms: i64,
    pub rebin: bool,
    pub bucket_size: usize,
    pub overlay_next: bool,
    pub rewrite: bool,
    pub artifact_dir: PathBuf,
}

impl RunParams {
    pub fn from_config(run: u32, pass: &str, hname: &str, cfg: &Config) -> Self {
        Self {
            run,
            pass: pass.to_owned(),
            hname: hname.to_owned(),
            object_prefix: cfg.store.object_prefix.clone(),
            sor_marker: cfg.store.sor_marker.clone(),
            eor_marker: cfg.store.eor_marker.clone(),
            increment_ms: cfg.store.increment_ms,
            rebin: cfg.aggregation.rebin,
            bucket_size: cfg.aggregation.bucket_size,
            overlay_next: cfg.plot.overlay_next,
            rewrite: cfg.cache.rewrite,
            artifact_dir: PathBuf::from(&cfg.cache.artifact_dir),
        }
    }

    /// full store key: prefix followed by the object name
    pub fn key(&self) -> String {
        format!("{}{}", self.object_prefix, self.hname)
    }

    pub fn metadata(&self) -> QueryMetadata {
        QueryMetadata::new(self.run, self.pass.clone())
    }

    pub fn cache(&self) -> ArtifactCache {
        ArtifactCache::new(&self.artifact_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineSource {
    Cache,
    Store(StitchStats),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// nothing was valid during the run; aggregation and rendering skipped
    EmptyTimeline,
    Rendered,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: u32,
    pub pass: String,
    pub source: TimelineSource,
    pub artifact: Option<PathBuf>,
    pub snapshots: usize,
    pub total: Option<Histogram>,
    pub aggregates: Vec<Aggregate>,
    pub renders: Vec<PathBuf>,
    pub outcome: RunOutcome,
}

/// cached timeline when present and rewrite is off, otherwise stitch from the store and persist
pub fn obtain_timeline<S: ValidityStore + ?Sized>(
    store: &S,
    params: &RunParams,
) -> Result<(Timeline, TimelineSource, Option<PathBuf>)> {
    let cache = params.cache();
    if cache.exists(params.run, &params.pass) && !params.rewrite {
        let path = cache.path_for(params.run, &params.pass);
        info!(run = params.run, pass = %params.pass, path = %path.display(), "already downloaded, skipping stitch");
        let timeline = cache.load(params.run, &params.pass, &params.hname)?;
        return Ok((timeline, TimelineSource::Cache, Some(path)));
    }

    let bounds = resolve_run_bounds(store, params.run, &params.sor_marker, &params.eor_marker)?;
    let engine = if params.rebin { Some(RebinEngine::rof()?) } else { None };
    let mut stitcher = WindowStitcher::new(store).with_increment(params.increment_ms);
    if let Some(engine) = engine.as_ref() {
        stitcher = stitcher.with_rebin(engine);
    }
    let (timeline, stats) = stitcher.stitch_with_stats(&params.key(), &params.metadata(), bounds)?;
    if timeline.is_empty() {
        return Ok((timeline, TimelineSource::Store(stats), None));
    }
    let path = cache.save(params.run, &params.pass, &params.hname, &timeline)?;
    Ok((timeline, TimelineSource::Store(stats), Some(path)))
}

/// stitch or reload, then render every snapshot, the run average and each bucket
pub fn run_moving_windows<S, R>(store: &S, sink: &mut R, params: &RunParams) -> Result<RunReport>
where
    S: ValidityStore + ?Sized,
    R: RenderSink + ?Sized,
{
    let (timeline, source, artifact) = obtain_timeline(store, params)?;
    let mut report = RunReport {
        run: params.run,
        pass: params.pass.clone(),
        source,
        artifact,
        snapshots: timeline.len(),
        total: None,
        aggregates: Vec::new(),
        renders: Vec::new(),
        outcome: RunOutcome::EmptyTimeline,
    };
    if timeline.is_empty() {
        warn!(run = params.run, pass = %params.pass, key = %params.key(), "no objects valid during the run, nothing to aggregate");
        return Ok(report);
    }

    report.renders.extend(render_snapshots(sink, &timeline, params)?);

    let first = &timeline.snapshots()[0];
    let last = &timeline.snapshots()[timeline.len() - 1];
    let span = ValidityInterval {
        from: first.validity.from,
        until: last.validity.until,
    };
    if let Some(total) = run_average(&timeline, &total_stem(&params.hname))? {
        let request = RenderRequest {
            file_stem: total_stem(&params.hname),
            title: format!("{} (run average)", first.histogram.title),
            primary: Series::primary(&total, span),
            secondary: None,
            y_max: shared_y_max([&total]),
        };
        report.renders.push(sink.render(&request)?);
        report.total = Some(total);
    }

    let aggregates = aggregate_buckets(&timeline, params.bucket_size, &params.hname)?;
    if !aggregates.is_empty() {
        let y_max = shared_y_max(aggregates.iter().map(|a| &a.histogram));
        for agg in &aggregates {
            let request = RenderRequest {
                file_stem: bucket_stem(&params.hname, agg.index),
                title: window_title(&first.histogram.title, &agg.validity),
                primary: Series::primary(&agg.histogram, agg.validity),
                secondary: None,
                y_max,
            };
            report.renders.push(sink.render(&request)?);
        }
        info!(run = params.run, pass = %params.pass, buckets = aggregates.len(), bucket_size = params.bucket_size, "aggregates rendered");
    }
    report.aggregates = aggregates;
    report.outcome = RunOutcome::Rendered;
    Ok(report)
}

/// one canvas per snapshot, optionally overlaid with its successor, on a shared y-axis
pub fn render_snapshots<R: RenderSink + ?Sized>(
    sink: &mut R,
    timeline: &Timeline,
    params: &RunParams,
) -> Result<Vec<PathBuf>> {
    let y_max = timeline.y_max();
    let snapshots = timeline.snapshots();
    let mut out = Vec::with_capacity(snapshots.len());
    for (i, snap) in snapshots.iter().enumerate() {
        let secondary = snapshots
            .get(i + 1)
            .filter(|_| params.overlay_next)
            .map(|next| Series::overlay(&next.histogram, next.validity));
        let request = RenderRequest {
            file_stem: snapshot_stem(&params.hname, &snap.validity),
            title: window_title(&snap.histogram.title, &snap.validity),
            primary: Series::primary(&snap.histogram, snap.validity),
            secondary,
            y_max,
        };
        out.push(sink.render(&request)?);
    }
    info!(run = params.run, pass = %params.pass, snapshots = out.len(), y_max, "snapshots rendered");
    Ok(out)
}

/// `"<title> (<seconds>s window)"`
pub fn window_title(title: &str, validity: &ValidityInterval) -> String {
    format!("{title} ({}s window)", validity.duration_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_from_config() {
        let mut cfg = Config::default();
        cfg.aggregation.bucket_size = 5;
        cfg.cache.artifact_dir = "cache".into();
        let p = RunParams::from_config(550367, "apass1", "mMFTTrackROFSize", &cfg);
        assert_eq!(p.key(), "qc_async/MFT/MO/Tracks/mw/mMFTTrackROFSize");
        assert_eq!(p.bucket_size, 5);
        assert_eq!(p.increment_ms, 60_000);
        assert_eq!(p.metadata(), QueryMetadata::new(550367, "apass1"));
        assert_eq!(p.cache().path_for(550367, "apass1"), PathBuf::from("cache/550367_apass1.json"));
    }

    #[test]
    fn window_title_uses_whole_seconds() {
        let v = ValidityInterval::new(1_000, 601_999).unwrap();
        assert_eq!(window_title("ROF size", &v), "ROF size (600s window)");
    }
}

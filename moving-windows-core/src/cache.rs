use crate::histogram::Histogram;
use crate::timeline::{Snapshot, Timeline};
use crate::validity::ValidityInterval;
use moving_windows_common::{MovingWindowsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// one cached artifact found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedArtifact {
    pub path: PathBuf,
    pub run: u32,
    pub pass: String,
}

/// Stitched timelines persisted as `<dir>/<run>_<pass>.json`, each holding one
/// array named after the monitored object. Entries are named `"<from>_<until>"`.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, run: u32, pass: &str) -> PathBuf {
        self.dir.join(format!("{run}_{pass}.json"))
    }

    pub fn exists(&self, run: u32, pass: &str) -> bool {
        self.path_for(run, pass).is_file()
    }

    pub fn load(&self, run: u32, pass: &str, name: &str) -> Result<Timeline> {
        let path = self.path_for(run, pass);
        let timeline = load_artifact(&path, name)?;
        info!(run, pass, path = %path.display(), snapshots = timeline.len(), "loaded cached timeline");
        Ok(timeline)
    }

    /// write through a temp file so an interrupted save never leaves a readable artifact
    pub fn save(&self, run: u32, pass: &str, name: &str, timeline: &Timeline) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(run, pass);
        let entries: Vec<&Histogram> = timeline.iter().map(|s| &s.histogram).collect();
        let doc = BTreeMap::from([(name, entries)]);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&doc)?)?;
        std::fs::rename(&tmp, &path)?;
        debug!(run, pass, path = %path.display(), "timeline saved");
        Ok(path)
    }

    /// artifacts under the cache directory, sorted by path
    pub fn list(&self) -> Result<Vec<CachedArtifact>> {
        let pattern = format!("{}/*_*.json", glob::Pattern::escape(&self.dir.to_string_lossy()));
        let entries = glob::glob(&pattern).map_err(|e| MovingWindowsError::Other(e.to_string()))?;
        let mut out: Vec<CachedArtifact> = entries
            .flatten()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                let (run, pass) = stem.split_once('_')?;
                let run = run.parse().ok()?;
                let pass = pass.to_owned();
                Some(CachedArtifact { path, run, pass })
            })
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

/// read the array `name` from an artifact, recovering each validity from its entry name
pub fn load_artifact(path: &Path, name: &str) -> Result<Timeline> {
    let (_, timeline) = load_artifact_any(path, Some(name))?;
    Ok(timeline)
}

/// like `load_artifact`, taking the only array when `name` is None
pub fn load_artifact_any(path: &Path, name: Option<&str>) -> Result<(String, Timeline)> {
    let bytes = std::fs::read(path)?;
    let mut doc: BTreeMap<String, Vec<Histogram>> = serde_json::from_slice(&bytes)?;
    let (array_name, histograms) = match name {
        Some(n) => {
            let entries = doc.remove(n).ok_or_else(|| {
                MovingWindowsError::Other(format!("{}: no array named {n}", path.display()))
            })?;
            (n.to_owned(), entries)
        }
        None if doc.len() == 1 => doc.into_iter().next().ok_or_else(|| {
            MovingWindowsError::Other(format!("{}: empty artifact", path.display()))
        })?,
        None => {
            return Err(MovingWindowsError::Other(format!(
                "{}: expected one array, found {}",
                path.display(),
                doc.len()
            )))
        }
    };
    let snapshots = histograms
        .into_iter()
        .map(|histogram| {
            let validity = ValidityInterval::parse(&histogram.name)?;
            Ok(Snapshot { histogram, validity })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((array_name, Timeline::from_snapshots(snapshots)?))
}

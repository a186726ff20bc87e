use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_ccdb_url")]
    pub ccdb_url: String,
    #[serde(default = "default_qcdb_url")]
    pub qcdb_url: String,
    #[serde(default = "default_run_info_path")]
    pub run_info_path: String,
    #[serde(default = "default_object_prefix")]
    pub object_prefix: String,
    #[serde(default = "default_sor_marker")]
    pub sor_marker: String,
    #[serde(default = "default_eor_marker")]
    pub eor_marker: String,
    #[serde(default = "default_increment_ms")]
    pub increment_ms: i64,
    #[serde(default)]
    pub timeout_secs: Option<u64>, // no client timeout when None
}

fn default_ccdb_url() -> String {
    "http://alice-ccdb.cern.ch".into()
}
fn default_qcdb_url() -> String {
    "http://ali-qcdb-gpn.cern.ch:8083".into()
}
fn default_run_info_path() -> String {
    "RCT/Info/RunInformation".into()
}
fn default_object_prefix() -> String {
    "qc_async/MFT/MO/Tracks/mw/".into()
}
fn default_sor_marker() -> String {
    "STF".into()
}
fn default_eor_marker() -> String {
    "EOR".into()
}
fn default_increment_ms() -> i64 {
    60_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ccdb_url: default_ccdb_url(),
            qcdb_url: default_qcdb_url(),
            run_info_path: default_run_info_path(),
            object_prefix: default_object_prefix(),
            sor_marker: default_sor_marker(),
            eor_marker: default_eor_marker(),
            increment_ms: default_increment_ms(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default)]
    pub log_x: bool,
    #[serde(default)]
    pub log_y: bool,
    #[serde(default = "default_draw_style")]
    pub draw_style: String,
    #[serde(default = "default_true")]
    pub overlay_next: bool,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_plot_dir")]
    pub plot_dir: String,
}

fn default_draw_style() -> String {
    "hist".into()
}
fn default_true() -> bool {
    true
}
fn default_format() -> String {
    "json".into()
}
fn default_plot_dir() -> String {
    "plots".into()
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            log_x: false,
            log_y: false,
            draw_style: default_draw_style(),
            overlay_next: true,
            format: default_format(),
            plot_dir: default_plot_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AggregationConfig {
    #[serde(default)]
    pub rebin: bool,
    #[serde(default)]
    pub bucket_size: usize, // 0 disables bucketed aggregation
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    #[serde(default)]
    pub rewrite: bool,
}

fn default_artifact_dir() -> String {
    "root_files".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            rewrite: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub plot: PlotConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        if let Ok(env_path) = std::env::var("MOVING_WINDOWS_CONFIG") {
            return PathBuf::from(env_path); // $MOVING_WINDOWS_CONFIG overrides default config path
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("moving-windows")
            .join("config.toml")
    }

    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&content)
            .map_err(|e| crate::MovingWindowsError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self) -> crate::Result<PathBuf> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::MovingWindowsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.store.increment_ms <= 0 {
            return Err(crate::MovingWindowsError::Config(format!(
                "store.increment_ms must be positive, got {}",
                self.store.increment_ms
            )));
        }
        match self.plot.format.as_str() {
            "json" | "csv" => Ok(()),
            other => Err(crate::MovingWindowsError::Config(format!(
                "unknown plot format: {other} (use json or csv)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.store.increment_ms, 60_000);
        assert_eq!(cfg.store.sor_marker, "STF");
        assert_eq!(cfg.store.eor_marker, "EOR");
        assert_eq!(cfg.aggregation.bucket_size, 0);
        assert!(cfg.plot.overlay_next);
        assert!(!cfg.cache.rewrite);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[aggregation]\nbucket_size = 4\nrebin = true\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.aggregation.bucket_size, 4);
        assert!(cfg.aggregation.rebin);
        assert_eq!(cfg.plot.format, "json");
        assert_eq!(cfg.cache.artifact_dir, "root_files");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.plot.log_y = true;
        cfg.store.increment_ms = 30_000;
        cfg.save_to(&path).unwrap();
        let back = Config::load_from(&path).unwrap();
        assert!(back.plot.log_y);
        assert_eq!(back.store.increment_ms, 30_000);
    }

    #[test]
    fn rejects_non_positive_increment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store]\nincrement_ms = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn rejects_unknown_format() {
        let mut cfg = Config::default();
        cfg.plot.format = "pdf".into();
        assert!(cfg.validate().is_err());
    }
}

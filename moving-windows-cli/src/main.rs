use clap::{Parser, Subcommand};
use moving_windows_common::{init_logging, Config};
use moving_windows_core::{
    format_timestamp, load_artifact_any, run_moving_windows, ArtifactCache, CanvasSink, CcdbStore,
    RunOutcome, RunParams, TimelineSource,
};
use std::path::{Path, PathBuf};
use tracing::info;

fn parse_run(s: &str) -> Result<u32, String> { // run numbers are positive
    let v: u32 = s.parse().map_err(|_| format!("not a run number: {s}"))?;
    if v > 0 { Ok(v) } else { Err("run number must be positive".to_string()) }
}

#[derive(Parser)]
#[command(name = "moving-windows", version, about = "Moving-window histogram timelines for a run")]
struct Cli {
    /// debug-level logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// stitch, aggregate and render one run
    Run {
        #[arg(long, value_parser = parse_run)]
        run: u32,
        #[arg(long, default_value = "online")]
        pass: String,
        #[arg(long, default_value = "mMFTTrackROFSize")]
        hname: String,
        #[arg(long)] rebin: bool,
        #[arg(long)] bucket_size: Option<usize>,
        #[arg(long, conflicts_with = "no_overlay")] overlay_next: bool,
        #[arg(long)] no_overlay: bool,
        #[arg(long)] rewrite: bool,
        #[arg(long)] log_x: bool,
        #[arg(long)] log_y: bool,
        #[arg(long)] draw_style: Option<String>,
        #[arg(long)] format: Option<String>,
        #[arg(long)] increment_ms: Option<i64>,
    },
    /// cached timeline artifacts
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// print the windows stored in an artifact
    Inspect {
        path: PathBuf,
        #[arg(long)] hname: Option<String>,
        #[arg(long)] json: bool,
    },
    /// show the effective configuration
    Config { #[arg(long)] save: bool },
}

#[derive(Subcommand)]
enum CacheAction {
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load()?;
    match cli.command {
        Commands::Run {
            run, pass, hname, rebin, bucket_size, overlay_next, no_overlay, rewrite,
            log_x, log_y, draw_style, format, increment_ms,
        } => {
            let mut config = config;
            // flags only ever switch options on; config supplies the rest
            config.aggregation.rebin |= rebin;
            config.cache.rewrite |= rewrite;
            config.plot.log_x |= log_x;
            config.plot.log_y |= log_y;
            if overlay_next { config.plot.overlay_next = true; }
            if no_overlay { config.plot.overlay_next = false; }
            if let Some(b) = bucket_size { config.aggregation.bucket_size = b; }
            if let Some(s) = draw_style { config.plot.draw_style = s; }
            if let Some(f) = format { config.plot.format = f; }
            if let Some(i) = increment_ms { config.store.increment_ms = i; }
            config.validate()?;
            run_one(run, &pass, &hname, &config)?
        }
        Commands::Cache { action: CacheAction::List } => run_cache_list(&config)?,
        Commands::Inspect { path, hname, json } => run_inspect(&path, hname.as_deref(), json)?,
        Commands::Config { save } => run_config(&config, save)?,
    }
    Ok(())
}

fn run_one(run: u32, pass: &str, hname: &str, config: &Config) -> anyhow::Result<()> {
    let params = RunParams::from_config(run, pass, hname, config);
    let store = CcdbStore::new(&config.store)?;
    let plot_dir = Path::new(&config.plot.plot_dir).join(format!("{run}_{pass}"));
    let mut sink = CanvasSink::from_config(&plot_dir, &config.plot)?;
    info!(run, pass, key = %params.key(), plot_dir = %plot_dir.display(), "processing run");
    let report = run_moving_windows(&store, &mut sink, &params)?;

    println!("{:<16} {}", "run:", report.run);
    println!("{:<16} {}", "pass:", report.pass);
    match report.source {
        TimelineSource::Cache => println!("{:<16} cache", "source:"),
        TimelineSource::Store(stats) => println!(
            "{:<16} store ({} queries, {} found, {} gaps)",
            "source:", stats.queries, stats.found, stats.gaps
        ),
    }
    if let Some(path) = &report.artifact {
        println!("{:<16} {}", "artifact:", path.display());
    }
    println!("{:<16} {}", "snapshots:", report.snapshots);
    if report.outcome == RunOutcome::EmptyTimeline {
        println!("{:<16} none (no objects valid during the run)", "plots:");
        return Ok(());
    }
    println!("{:<16} {}", "aggregates:", report.aggregates.len());
    println!("{:<16} {} in {}", "plots:", report.renders.len(), sink.dir().display());
    Ok(())
}

fn run_cache_list(config: &Config) -> anyhow::Result<()> {
    let cache = ArtifactCache::new(&config.cache.artifact_dir);
    let artifacts = cache.list()?;
    if artifacts.is_empty() {
        println!("No cached artifacts in {}", cache.dir().display());
        return Ok(());
    }
    println!("{:<10} {:<20} {}", "run", "pass", "path");
    for a in &artifacts {
        println!("{:<10} {:<20} {}", a.run, a.pass, a.path.display());
    }
    Ok(())
}

fn run_inspect(path: &Path, hname: Option<&str>, json: bool) -> anyhow::Result<()> {
    if !path.is_file() { anyhow::bail!("No such artifact: {}", path.display()); }
    let (name, timeline) = load_artifact_any(path, hname)?;
    if json {
        let windows: Vec<_> = timeline
            .iter()
            .map(|s| serde_json::json!({
                "name": s.histogram.name,
                "valid_from": s.validity.from,
                "valid_until": s.validity.until,
                "duration_s": s.validity.duration_secs(),
                "peak": s.histogram.maximum(),
                "integral": s.histogram.integral(),
            }))
            .collect();
        let doc = serde_json::json!({ "object": name, "snapshots": windows });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    println!("{:<16} {}", "object:", name);
    println!("{:<16} {}", "snapshots:", timeline.len());
    if let (Some(first), Some(last)) = (timeline.snapshots().first(), timeline.snapshots().last()) {
        println!("{:<16} {}", "first:", format_timestamp(first.validity.from, false));
        println!("{:<16} {}", "last:", format_timestamp(last.validity.until, false));
        println!("{:<16} {}", "bins:", first.histogram.n_bins());
        println!("{:<16} {} ms", "gaps:", timeline.gap_ms());
    }
    println!();
    println!("{:<20} {:>8} {:>12}", "window", "seconds", "peak");
    for s in &timeline {
        println!("{:<20} {:>8} {:>12.4}", s.validity.to_string(), s.validity.duration_secs(), s.histogram.maximum());
    }
    Ok(())
}

fn run_config(config: &Config, save: bool) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if save {
        let path = config.save()?;
        println!("Config saved to {}", path.display());
    }
    Ok(())
}

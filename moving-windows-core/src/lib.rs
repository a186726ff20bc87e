pub mod aggregate;
pub mod cache;
pub mod ccdb_store;
pub mod histogram;
pub mod pipeline;
pub mod rebin;
pub mod render;
pub mod stitch;
pub mod store;
pub mod timeline;
pub mod validity;

pub use aggregate::{aggregate_buckets, run_average, Aggregate, AggregateBucket, BucketAggregator};
pub use cache::{load_artifact, load_artifact_any, ArtifactCache, CachedArtifact};
pub use ccdb_store::CcdbStore;
pub use histogram::{BinScheme, Histogram};
pub use moving_windows_common::{MovingWindowsError, Result};
pub use pipeline::{obtain_timeline, render_snapshots, run_moving_windows, RunOutcome, RunParams, RunReport, TimelineSource};
pub use rebin::{rof_edges, rof_scheme, RebinEngine};
pub use render::{CanvasFormat, CanvasSink, PlotStyle, RenderRequest, RenderSink, Series};
pub use stitch::{resolve_run_bounds, StitchStats, WindowStitcher};
pub use store::{MemoryStore, QueryMetadata, StoredObject, ValidityStore, ONLINE_PASS};
pub use timeline::{RunBounds, Snapshot, Timeline};
pub use validity::{format_timestamp, ValidityInterval};

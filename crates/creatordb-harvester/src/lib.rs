pub mod cascade;
pub mod client;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fields;
pub mod html;
pub mod identity;
pub mod media;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod pagination;
pub mod platforms;
pub mod sink;
pub mod store;
pub mod walk;

pub use client::HttpFetcher;
pub use deadline::Deadline;
pub use engine::{run_engine, EngineRun, PlatformEngine, RunPlan, Session};
pub use error::{HarvestError, StoreError};
pub use extract::{extract, ExtractContext, Extraction, RecordShapes};
pub use identity::{parse_target, Target};
pub use merge::SafeMergePolicy;
pub use normalize::{parse_count, parse_duration_secs, parse_relative_age};
pub use orchestrator::Harvester;
pub use pagination::{PageBudget, PageState, StopReason};
pub use platforms::{InstagramEngine, TikTokEngine, YouTubeEngine};
pub use sink::{apply_harvest, SinkInput, SinkReport};
pub use store::{AccountWrite, HarvestStore, MemoryStore, MetricsSnapshot, PgStore, StoredAccount};

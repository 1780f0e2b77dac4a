//! Tubescope Core Library
//!
//! Core functionality for fetching a YouTube channel's recent video statistics,
//! generating AI-powered channel reports, and exporting them to Word and Excel.

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod insight;
pub mod markdown;
pub mod provider;
pub mod session;
pub mod stats;
pub mod types;
pub mod youtube;

// Re-export commonly used items at crate root
pub use cache::{get_cache_dir, get_snapshot_path, load_snapshot, save_snapshot};
pub use config::AnalyzerConfig;
pub use error::{ErrorClass, Result, TubescopeError};
pub use export::{ExportPaths, write_exports};
pub use format::{format_count, format_duration, format_video_table};
pub use insight::{ProviderClient, TextGenerator};
pub use markdown::{DocumentBlock, StructuredTable, parse_document};
pub use provider::{Provider, ProviderConfig};
pub use session::{AnalysisOptions, AnalysisSession, AnalysisStep, run_analysis};
pub use stats::ContentBreakdown;
pub use types::{AnalysisSnapshot, ChannelStats, ChatTurn, ContentType, Role, VideoRecord};
pub use youtube::{ChannelSource, YouTubeClient};

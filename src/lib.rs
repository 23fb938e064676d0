//! # framestage: real-time frame dispatch with streaming statistics
//!
//! A frame stage receives multi-dimensional array frames from an upstream
//! source and reduces each one, either on the delivering thread or on its
//! own consumer thread behind a bounded queue. The statistics reducer
//! computes basic statistics, centroid and moments, projection profiles,
//! a histogram, and a bounded time series of the results.
//!
//! ## Architecture
//!
//! - **Pipeline**: frames, the bounded queue, sources, the parameter table,
//!   and the [`FrameStage`](pipeline::FrameStage) dispatch core
//! - **Analysis**: the reductions and [`StatsEngine`](analysis::StatsEngine)
//! - **Config**: TOML stage configuration with serde defaults
//! - **Communication**: crossbeam channels between producer and consumer
//!
//! ## Example
//!
//! ```no_run
//! use framestage::analysis::StatsEngine;
//! use framestage::config::StageConfig;
//! use framestage::pipeline::{Frame, FramePort, FrameStage, SourceRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> framestage::Result<()> {
//! let registry = Arc::new(SourceRegistry::new());
//! let port = Arc::new(FramePort::new("SIM1", 1));
//! registry.register(port.clone());
//!
//! let mut config = StageConfig::default();
//! config.stage.source_port = "SIM1".to_string();
//! config.stats.compute_centroid = true;
//!
//! let stage = FrameStage::new(&config.stage, StatsEngine::new(config.stats), registry)?;
//! port.publish(0, &Frame::new(vec![0u16; 64 * 64], &[64, 64]).into_shared());
//! println!("{:?}", stage.status());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use analysis::{FrameStats, StatsEngine, StatsSetting};
pub use config::StageConfig;
pub use error::{Result, ResultExt, StageError};
pub use pipeline::{Frame, FramePort, FrameStage, SharedFrame, SourceRegistry, StageSetting};
pub use types::{ElementType, Pixel};

//! Frame reductions
//!
//! This module provides the per-frame analysis run by a statistics stage:
//! - Basic statistics (min/max, mean, sigma, total, background-corrected net)
//! - Centroid and higher moments of the thresholded intensity
//! - X/Y projection profiles
//! - Histogram and entropy
//! - A bounded time series of the results
//!
//! Every pass is generic over [`Pixel`](crate::types::Pixel); [`StatsEngine`]
//! ties them together as a [`FrameReducer`](crate::pipeline::FrameReducer).

pub mod centroid;
pub mod histogram;
pub mod profiles;
pub mod statistics;
pub mod stats_engine;
pub mod time_series;

pub use centroid::{CentroidStats, SIGMA_EPSILON};
pub use histogram::Histogram;
pub use profiles::{ProfileKind, Profiles};
pub use statistics::BasicStats;
pub use stats_engine::{FrameStats, StatsEngine, StatsSetting};
pub use time_series::{
    AcquireState, MetricSample, TimeSeries, TimeSeriesControl, TimeSeriesMetric,
    TimeSeriesSnapshot,
};

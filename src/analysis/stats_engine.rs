//! Statistics reducer
//!
//! [`StatsEngine`] is the [`FrameReducer`] that runs the basic statistics,
//! centroid, profile and histogram passes on each frame, publishes the
//! results, and feeds the time series.
//!
//! Each section runs only when enabled and only when the frame layout
//! supports it. A section that does not run leaves its published values and
//! its time series metrics exactly as they were.

use crate::analysis::centroid::{self, CentroidStats};
use crate::analysis::histogram::{self, Histogram};
use crate::analysis::profiles::{self, ProfileKind, Profiles};
use crate::analysis::statistics::{self, BasicStats};
use crate::analysis::time_series::{
    MetricSample, TimeSeries, TimeSeriesControl, TimeSeriesMetric, TimeSeriesSnapshot,
};
use crate::config::StatsConfig;
use crate::error::{Result, StageError};
use crate::pipeline::{Frame, FrameReducer, ParamKey, ParamTable};
use crate::types::Pixel;
use serde::Serialize;

/// Parameters published by the statistics reducer.
pub mod keys {
    use crate::pipeline::ParamKey;

    // ── Settings ──
    pub const COMPUTE_STATISTICS: ParamKey = ParamKey("COMPUTE_STATISTICS");
    pub const BACKGROUND_WIDTH: ParamKey = ParamKey("BGD_WIDTH");
    pub const COMPUTE_CENTROID: ParamKey = ParamKey("COMPUTE_CENTROID");
    pub const CENTROID_THRESHOLD: ParamKey = ParamKey("CENTROID_THRESHOLD");
    pub const COMPUTE_PROFILES: ParamKey = ParamKey("COMPUTE_PROFILES");
    pub const CURSOR_X: ParamKey = ParamKey("CURSOR_X");
    pub const CURSOR_Y: ParamKey = ParamKey("CURSOR_Y");
    pub const COMPUTE_HISTOGRAM: ParamKey = ParamKey("COMPUTE_HISTOGRAM");
    pub const HIST_SIZE: ParamKey = ParamKey("HIST_SIZE");
    pub const HIST_MIN: ParamKey = ParamKey("HIST_MIN");
    pub const HIST_MAX: ParamKey = ParamKey("HIST_MAX");
    pub const TS_NUM_POINTS: ParamKey = ParamKey("TS_NUM_POINTS");

    // ── Basic statistics ──
    pub const MIN_VALUE: ParamKey = ParamKey("MIN_VALUE");
    pub const MIN_X: ParamKey = ParamKey("MIN_X");
    pub const MIN_Y: ParamKey = ParamKey("MIN_Y");
    pub const MAX_VALUE: ParamKey = ParamKey("MAX_VALUE");
    pub const MAX_X: ParamKey = ParamKey("MAX_X");
    pub const MAX_Y: ParamKey = ParamKey("MAX_Y");
    pub const MEAN_VALUE: ParamKey = ParamKey("MEAN_VALUE");
    pub const SIGMA_VALUE: ParamKey = ParamKey("SIGMA_VALUE");
    pub const TOTAL: ParamKey = ParamKey("TOTAL");
    pub const NET: ParamKey = ParamKey("NET");

    // ── Centroid ──
    pub const CENTROID_TOTAL: ParamKey = ParamKey("CENTROID_TOTAL");
    pub const CENTROID_X: ParamKey = ParamKey("CENTROIDX_VALUE");
    pub const CENTROID_Y: ParamKey = ParamKey("CENTROIDY_VALUE");
    pub const SIGMA_X: ParamKey = ParamKey("SIGMAX_VALUE");
    pub const SIGMA_Y: ParamKey = ParamKey("SIGMAY_VALUE");
    pub const SIGMA_XY: ParamKey = ParamKey("SIGMAXY_VALUE");
    pub const SKEW_X: ParamKey = ParamKey("SKEWX_VALUE");
    pub const SKEW_Y: ParamKey = ParamKey("SKEWY_VALUE");
    pub const KURTOSIS_X: ParamKey = ParamKey("KURTOSISX_VALUE");
    pub const KURTOSIS_Y: ParamKey = ParamKey("KURTOSISY_VALUE");
    pub const ECCENTRICITY: ParamKey = ParamKey("ECCENTRICITY_VALUE");
    pub const ORIENTATION: ParamKey = ParamKey("ORIENTATION_VALUE");

    // ── Profiles ──
    pub const PROFILE_SIZE_X: ParamKey = ParamKey("PROFILE_SIZE_X");
    pub const PROFILE_SIZE_Y: ParamKey = ParamKey("PROFILE_SIZE_Y");
    pub const PROFILE_AVERAGE_X: ParamKey = ParamKey("PROFILE_AVERAGE_X");
    pub const PROFILE_AVERAGE_Y: ParamKey = ParamKey("PROFILE_AVERAGE_Y");
    pub const PROFILE_THRESHOLD_X: ParamKey = ParamKey("PROFILE_THRESHOLD_X");
    pub const PROFILE_THRESHOLD_Y: ParamKey = ParamKey("PROFILE_THRESHOLD_Y");
    pub const PROFILE_CENTROID_X: ParamKey = ParamKey("PROFILE_CENTROID_X");
    pub const PROFILE_CENTROID_Y: ParamKey = ParamKey("PROFILE_CENTROID_Y");
    pub const PROFILE_CURSOR_X: ParamKey = ParamKey("PROFILE_CURSOR_X");
    pub const PROFILE_CURSOR_Y: ParamKey = ParamKey("PROFILE_CURSOR_Y");

    // ── Histogram ──
    pub const HIST_ARRAY: ParamKey = ParamKey("HIST_ARRAY");
    pub const HIST_BELOW: ParamKey = ParamKey("HIST_BELOW");
    pub const HIST_ABOVE: ParamKey = ParamKey("HIST_ABOVE");
    pub const HIST_ENTROPY: ParamKey = ParamKey("HIST_ENTROPY");

    // ── Time series ──
    pub const TS_CURRENT_POINT: ParamKey = ParamKey("TS_CURRENT_POINT");
    pub const TS_ACQUIRING: ParamKey = ParamKey("TS_ACQUIRING");
}

/// Key of the published profile array along x (`true`) or y (`false`).
pub fn profile_key(along_x: bool, kind: ProfileKind) -> ParamKey {
    match (along_x, kind) {
        (true, ProfileKind::Average) => keys::PROFILE_AVERAGE_X,
        (false, ProfileKind::Average) => keys::PROFILE_AVERAGE_Y,
        (true, ProfileKind::Threshold) => keys::PROFILE_THRESHOLD_X,
        (false, ProfileKind::Threshold) => keys::PROFILE_THRESHOLD_Y,
        (true, ProfileKind::Centroid) => keys::PROFILE_CENTROID_X,
        (false, ProfileKind::Centroid) => keys::PROFILE_CENTROID_Y,
        (true, ProfileKind::Cursor) => keys::PROFILE_CURSOR_X,
        (false, ProfileKind::Cursor) => keys::PROFILE_CURSOR_Y,
    }
}

/// Key of the published time series array for `metric`.
pub fn time_series_key(metric: TimeSeriesMetric) -> ParamKey {
    ParamKey(metric.array_name())
}

/// Runtime settings of the statistics reducer
#[derive(Debug, Clone, PartialEq)]
pub enum StatsSetting {
    ComputeStatistics(bool),
    BackgroundWidth(usize),
    ComputeCentroid(bool),
    CentroidThreshold(f64),
    ComputeProfiles(bool),
    CursorX(usize),
    CursorY(usize),
    ComputeHistogram(bool),
    HistSize(usize),
    HistMin(f64),
    HistMax(f64),
    TimeSeriesControl(TimeSeriesControl),
    TimeSeriesNumPoints(usize),
}

/// Results of one reduction pass. Sections that did not run are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FrameStats {
    pub unique_id: i64,
    pub timestamp: f64,
    pub basic: Option<BasicStats>,
    pub centroid: Option<CentroidStats>,
    pub profiles: Option<Profiles>,
    pub histogram: Option<Histogram>,
}

/// Statistics reducer with its time series buffer
#[derive(Debug, Clone)]
pub struct StatsEngine {
    config: StatsConfig,
    time_series: TimeSeries,
    last_metrics: MetricSample,
}

impl StatsEngine {
    pub fn new(config: StatsConfig) -> Self {
        let time_series = TimeSeries::new(config.ts_num_points);
        Self {
            config,
            time_series,
            last_metrics: [0.0; TimeSeriesMetric::COUNT],
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn time_series(&self) -> &TimeSeries {
        &self.time_series
    }

    /// Samples acquired so far, without publishing them.
    pub fn read_time_series(&self) -> TimeSeriesSnapshot {
        self.time_series.read()
    }

    /// Most recent value of every time series metric.
    pub fn last_metrics(&self) -> &MetricSample {
        &self.last_metrics
    }

    fn compute<T: Pixel>(&self, pixels: &[T], frame: &Frame, stats: &mut FrameStats) {
        let cfg = &self.config;
        let dims: Vec<usize> = frame.dims.iter().map(|d| d.size).collect();
        let size_x = frame.size(0);
        let size_y = frame.size(1);

        if cfg.compute_statistics {
            stats.basic = statistics::basic_stats(pixels, &dims, cfg.background_width);
        }

        let wants_centroid = cfg.compute_centroid || cfg.compute_profiles;
        let planar = frame.ndims() <= 2;
        if wants_centroid && !planar {
            tracing::warn!(
                "Frame {}: centroid and profiles need rank <= 2, got rank {}",
                frame.unique_id,
                frame.ndims()
            );
        }
        let centroid = (wants_centroid && planar)
            .then(|| centroid::centroid(pixels, size_x, cfg.centroid_threshold));

        if cfg.compute_centroid {
            stats.centroid = centroid;
        }

        if cfg.compute_profiles && planar {
            let center = centroid.map(|c| (c.x, c.y)).unwrap_or_default();
            stats.profiles = Some(profiles::profiles(
                pixels,
                size_x,
                size_y,
                cfg.centroid_threshold,
                center,
                (cfg.cursor_x, cfg.cursor_y),
            ));
        }

        if cfg.compute_histogram {
            stats.histogram = histogram::histogram(pixels, cfg.hist_size, cfg.hist_min, cfg.hist_max);
            if stats.histogram.is_none() {
                tracing::warn!(
                    "Histogram skipped: invalid configuration (size {}, range [{}, {}])",
                    cfg.hist_size,
                    cfg.hist_min,
                    cfg.hist_max
                );
            }
        }
    }

    fn publish(&self, stats: &FrameStats, params: &mut ParamTable) {
        if let Some(b) = &stats.basic {
            params.set_float(keys::MIN_VALUE, b.min);
            params.set_int(keys::MIN_X, b.min_x as i64);
            params.set_int(keys::MIN_Y, b.min_y as i64);
            params.set_float(keys::MAX_VALUE, b.max);
            params.set_int(keys::MAX_X, b.max_x as i64);
            params.set_int(keys::MAX_Y, b.max_y as i64);
            params.set_float(keys::MEAN_VALUE, b.mean);
            params.set_float(keys::SIGMA_VALUE, b.sigma);
            params.set_float(keys::TOTAL, b.total);
            params.set_float(keys::NET, b.net);
        }

        if let Some(c) = &stats.centroid {
            params.set_float(keys::CENTROID_TOTAL, c.total);
            params.set_float(keys::CENTROID_X, c.x);
            params.set_float(keys::CENTROID_Y, c.y);
            params.set_float(keys::SIGMA_X, c.sigma_x);
            params.set_float(keys::SIGMA_Y, c.sigma_y);
            params.set_float(keys::SIGMA_XY, c.sigma_xy);
            params.set_float(keys::SKEW_X, c.skew_x);
            params.set_float(keys::SKEW_Y, c.skew_y);
            params.set_float(keys::KURTOSIS_X, c.kurtosis_x);
            params.set_float(keys::KURTOSIS_Y, c.kurtosis_y);
            params.set_float(keys::ECCENTRICITY, c.eccentricity);
            params.set_float(keys::ORIENTATION, c.orientation);
        }

        if let Some(p) = &stats.profiles {
            params.set_int(keys::PROFILE_SIZE_X, p.size_x as i64);
            params.set_int(keys::PROFILE_SIZE_Y, p.size_y as i64);
            for &kind in ProfileKind::all() {
                for along_x in [true, false] {
                    params.set_float_array(profile_key(along_x, kind), p.get(along_x, kind).to_vec());
                }
            }
        }

        if let Some(h) = &stats.histogram {
            params.set_int_array(keys::HIST_ARRAY, h.bins.iter().map(|&c| c as i64).collect());
            params.set_int(keys::HIST_BELOW, h.below as i64);
            params.set_int(keys::HIST_ABOVE, h.above as i64);
            params.set_float(keys::HIST_ENTROPY, h.entropy);
        }
    }

    fn update_metrics(&mut self, stats: &FrameStats) {
        use TimeSeriesMetric as M;
        let m = &mut self.last_metrics;

        if let Some(b) = &stats.basic {
            m[M::MinValue.index()] = b.min;
            m[M::MinX.index()] = b.min_x as f64;
            m[M::MinY.index()] = b.min_y as f64;
            m[M::MaxValue.index()] = b.max;
            m[M::MaxX.index()] = b.max_x as f64;
            m[M::MaxY.index()] = b.max_y as f64;
            m[M::MeanValue.index()] = b.mean;
            m[M::SigmaValue.index()] = b.sigma;
            m[M::Total.index()] = b.total;
            m[M::Net.index()] = b.net;
        }
        if let Some(c) = &stats.centroid {
            m[M::CentroidTotal.index()] = c.total;
            m[M::CentroidX.index()] = c.x;
            m[M::CentroidY.index()] = c.y;
            m[M::SigmaX.index()] = c.sigma_x;
            m[M::SigmaY.index()] = c.sigma_y;
            m[M::SigmaXY.index()] = c.sigma_xy;
            m[M::SkewX.index()] = c.skew_x;
            m[M::SkewY.index()] = c.skew_y;
            m[M::KurtosisX.index()] = c.kurtosis_x;
            m[M::KurtosisY.index()] = c.kurtosis_y;
            m[M::Eccentricity.index()] = c.eccentricity;
            m[M::Orientation.index()] = c.orientation;
        }
        m[M::Timestamp.index()] = stats.timestamp;
    }

    fn publish_settings(&self, params: &mut ParamTable) {
        let cfg = &self.config;
        params.set_bool(keys::COMPUTE_STATISTICS, cfg.compute_statistics);
        params.set_int(keys::BACKGROUND_WIDTH, cfg.background_width as i64);
        params.set_bool(keys::COMPUTE_CENTROID, cfg.compute_centroid);
        params.set_float(keys::CENTROID_THRESHOLD, cfg.centroid_threshold);
        params.set_bool(keys::COMPUTE_PROFILES, cfg.compute_profiles);
        params.set_int(keys::CURSOR_X, cfg.cursor_x as i64);
        params.set_int(keys::CURSOR_Y, cfg.cursor_y as i64);
        params.set_bool(keys::COMPUTE_HISTOGRAM, cfg.compute_histogram);
        params.set_int(keys::HIST_SIZE, cfg.hist_size as i64);
        params.set_float(keys::HIST_MIN, cfg.hist_min);
        params.set_float(keys::HIST_MAX, cfg.hist_max);
        params.set_int(keys::TS_NUM_POINTS, self.time_series.num_points() as i64);
    }

    fn publish_ts_state(&self, params: &mut ParamTable) {
        params.set_int(keys::TS_CURRENT_POINT, self.time_series.current_point() as i64);
        params.set_bool(keys::TS_ACQUIRING, self.time_series.is_acquiring());
    }

    /// Publish every time series array, notifying listeners even when the
    /// contents did not change.
    fn publish_time_series(&self, params: &mut ParamTable) {
        let snapshot = self.time_series.read();
        for (metric, samples) in snapshot.iter() {
            let key = time_series_key(metric);
            if !params.set_float_array(key, samples.to_vec()) {
                params.touch(key);
            }
        }
    }
}

impl Default for StatsEngine {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

impl FrameReducer for StatsEngine {
    type Output = FrameStats;
    type Setting = StatsSetting;

    fn name(&self) -> &str {
        "stats"
    }

    fn init_params(&mut self, params: &mut ParamTable) {
        self.publish_settings(params);
        self.publish_ts_state(params);
    }

    fn reduce(&mut self, frame: &Frame, params: &mut ParamTable) -> Result<FrameStats> {
        if frame.data.is_empty() {
            return Err(StageError::Reduction(format!(
                "frame {} has no elements",
                frame.unique_id
            )));
        }
        if !frame.is_consistent() {
            return Err(StageError::Reduction(format!(
                "frame {}: dimensions {:?} describe {} elements, buffer has {}",
                frame.unique_id,
                frame.dims.iter().map(|d| d.size).collect::<Vec<_>>(),
                frame.element_count(),
                frame.data.len()
            )));
        }

        let mut stats = FrameStats {
            unique_id: frame.unique_id,
            timestamp: frame.timestamp,
            ..FrameStats::default()
        };
        crate::dispatch_pixels!(&frame.data, |px| self.compute(px, frame, &mut stats));

        self.publish(&stats, params);
        self.update_metrics(&stats);

        if self.time_series.push(&self.last_metrics) {
            tracing::info!(
                "Time series full after {} points, acquisition stopped",
                self.time_series.num_points()
            );
            self.publish_time_series(params);
        }
        self.publish_ts_state(params);

        Ok(stats)
    }

    fn apply_setting(&mut self, setting: StatsSetting, params: &mut ParamTable) -> Result<()> {
        let cfg = &mut self.config;
        match setting {
            StatsSetting::ComputeStatistics(v) => cfg.compute_statistics = v,
            StatsSetting::BackgroundWidth(v) => cfg.background_width = v,
            StatsSetting::ComputeCentroid(v) => cfg.compute_centroid = v,
            StatsSetting::CentroidThreshold(v) => {
                if !v.is_finite() {
                    return Err(StageError::Config(format!("centroid threshold {} is not finite", v)));
                }
                cfg.centroid_threshold = v;
            }
            StatsSetting::ComputeProfiles(v) => cfg.compute_profiles = v,
            StatsSetting::CursorX(v) => cfg.cursor_x = v,
            StatsSetting::CursorY(v) => cfg.cursor_y = v,
            StatsSetting::ComputeHistogram(v) => cfg.compute_histogram = v,
            StatsSetting::HistSize(v) => cfg.hist_size = v,
            StatsSetting::HistMin(v) => cfg.hist_min = v,
            StatsSetting::HistMax(v) => cfg.hist_max = v,
            StatsSetting::TimeSeriesControl(control) => {
                self.time_series.control(control);
                tracing::debug!(
                    "Time series {:?}: point {} of {}",
                    control,
                    self.time_series.current_point(),
                    self.time_series.num_points()
                );
                match control {
                    TimeSeriesControl::EraseStart
                    | TimeSeriesControl::Stop
                    | TimeSeriesControl::Read => self.publish_time_series(params),
                    TimeSeriesControl::Start => {}
                }
            }
            StatsSetting::TimeSeriesNumPoints(n) => {
                if n == 0 {
                    return Err(StageError::Config(
                        "time series needs at least one point".to_string(),
                    ));
                }
                cfg.ts_num_points = n;
                self.time_series.set_num_points(n);
                self.publish_time_series(params);
            }
        }
        self.publish_settings(params);
        self.publish_ts_state(params);
        Ok(())
    }
}

//! Bounded time series of per-frame reduction results
//!
//! While acquiring, every reduced frame appends one sample per
//! [`TimeSeriesMetric`]. The buffer is not circular: when it fills up,
//! acquisition stops on its own.

use serde::{Deserialize, Serialize};

/// Quantities recorded per frame, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSeriesMetric {
    MinValue,
    MinX,
    MinY,
    MaxValue,
    MaxX,
    MaxY,
    MeanValue,
    SigmaValue,
    Total,
    Net,
    CentroidTotal,
    CentroidX,
    CentroidY,
    SigmaX,
    SigmaY,
    SigmaXY,
    SkewX,
    SkewY,
    KurtosisX,
    KurtosisY,
    Eccentricity,
    Orientation,
    Timestamp,
}

impl TimeSeriesMetric {
    /// Number of metrics
    pub const COUNT: usize = 23;

    /// All metrics in storage order
    pub const ALL: [TimeSeriesMetric; Self::COUNT] = [
        TimeSeriesMetric::MinValue,
        TimeSeriesMetric::MinX,
        TimeSeriesMetric::MinY,
        TimeSeriesMetric::MaxValue,
        TimeSeriesMetric::MaxX,
        TimeSeriesMetric::MaxY,
        TimeSeriesMetric::MeanValue,
        TimeSeriesMetric::SigmaValue,
        TimeSeriesMetric::Total,
        TimeSeriesMetric::Net,
        TimeSeriesMetric::CentroidTotal,
        TimeSeriesMetric::CentroidX,
        TimeSeriesMetric::CentroidY,
        TimeSeriesMetric::SigmaX,
        TimeSeriesMetric::SigmaY,
        TimeSeriesMetric::SigmaXY,
        TimeSeriesMetric::SkewX,
        TimeSeriesMetric::SkewY,
        TimeSeriesMetric::KurtosisX,
        TimeSeriesMetric::KurtosisY,
        TimeSeriesMetric::Eccentricity,
        TimeSeriesMetric::Orientation,
        TimeSeriesMetric::Timestamp,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the published array for this metric
    pub fn array_name(self) -> &'static str {
        match self {
            TimeSeriesMetric::MinValue => "TS_MIN_VALUE",
            TimeSeriesMetric::MinX => "TS_MIN_X",
            TimeSeriesMetric::MinY => "TS_MIN_Y",
            TimeSeriesMetric::MaxValue => "TS_MAX_VALUE",
            TimeSeriesMetric::MaxX => "TS_MAX_X",
            TimeSeriesMetric::MaxY => "TS_MAX_Y",
            TimeSeriesMetric::MeanValue => "TS_MEAN_VALUE",
            TimeSeriesMetric::SigmaValue => "TS_SIGMA_VALUE",
            TimeSeriesMetric::Total => "TS_TOTAL",
            TimeSeriesMetric::Net => "TS_NET",
            TimeSeriesMetric::CentroidTotal => "TS_CENTROID_TOTAL",
            TimeSeriesMetric::CentroidX => "TS_CENTROIDX_VALUE",
            TimeSeriesMetric::CentroidY => "TS_CENTROIDY_VALUE",
            TimeSeriesMetric::SigmaX => "TS_SIGMAX_VALUE",
            TimeSeriesMetric::SigmaY => "TS_SIGMAY_VALUE",
            TimeSeriesMetric::SigmaXY => "TS_SIGMAXY_VALUE",
            TimeSeriesMetric::SkewX => "TS_SKEWX_VALUE",
            TimeSeriesMetric::SkewY => "TS_SKEWY_VALUE",
            TimeSeriesMetric::KurtosisX => "TS_KURTOSISX_VALUE",
            TimeSeriesMetric::KurtosisY => "TS_KURTOSISY_VALUE",
            TimeSeriesMetric::Eccentricity => "TS_ECCENTRICITY_VALUE",
            TimeSeriesMetric::Orientation => "TS_ORIENTATION_VALUE",
            TimeSeriesMetric::Timestamp => "TS_TIMESTAMP",
        }
    }
}

/// Time series control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSeriesControl {
    /// Clear the buffer and start acquiring from point 0
    EraseStart,
    /// Resume acquiring at the current point
    Start,
    /// Stop acquiring, keeping the data
    Stop,
    /// Publish the acquired samples
    Read,
}

/// Acquisition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquireState {
    #[default]
    Idle,
    Acquiring,
}

impl AcquireState {
    pub fn is_acquiring(&self) -> bool {
        matches!(self, AcquireState::Acquiring)
    }
}

/// One sample per metric
pub type MetricSample = [f64; TimeSeriesMetric::COUNT];

/// Samples acquired so far, per metric
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesSnapshot {
    pub points: usize,
    series: Vec<Vec<f64>>,
}

impl TimeSeriesSnapshot {
    pub fn get(&self, metric: TimeSeriesMetric) -> &[f64] {
        &self.series[metric.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeSeriesMetric, &[f64])> {
        TimeSeriesMetric::ALL
            .iter()
            .map(move |&m| (m, self.series[m.index()].as_slice()))
    }
}

/// Fixed-length buffer with one array per metric
#[derive(Debug, Clone)]
pub struct TimeSeries {
    num_points: usize,
    current_point: usize,
    state: AcquireState,
    series: Vec<Vec<f64>>,
}

impl TimeSeries {
    /// Create an idle buffer of `num_points` samples (at least 1)
    pub fn new(num_points: usize) -> Self {
        let num_points = num_points.max(1);
        Self {
            num_points,
            current_point: 0,
            state: AcquireState::Idle,
            series: vec![vec![0.0; num_points]; TimeSeriesMetric::COUNT],
        }
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn current_point(&self) -> usize {
        self.current_point
    }

    pub fn state(&self) -> AcquireState {
        self.state
    }

    pub fn is_acquiring(&self) -> bool {
        self.state.is_acquiring()
    }

    pub fn is_full(&self) -> bool {
        self.current_point >= self.num_points
    }

    /// Apply a control command. `Read` does not change anything.
    pub fn control(&mut self, control: TimeSeriesControl) {
        match control {
            TimeSeriesControl::EraseStart => {
                self.erase();
                self.state = AcquireState::Acquiring;
            }
            TimeSeriesControl::Start => {
                if !self.is_full() {
                    self.state = AcquireState::Acquiring;
                }
            }
            TimeSeriesControl::Stop => self.state = AcquireState::Idle,
            TimeSeriesControl::Read => {}
        }
    }

    /// Reallocate to `num_points` samples. Erases the data and stops.
    pub fn set_num_points(&mut self, num_points: usize) {
        *self = Self::new(num_points);
    }

    fn erase(&mut self) {
        self.current_point = 0;
        for s in &mut self.series {
            s.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    /// Append one sample if acquiring.
    ///
    /// Returns `true` when this sample filled the buffer and acquisition
    /// stopped.
    pub fn push(&mut self, sample: &MetricSample) -> bool {
        if !self.is_acquiring() || self.is_full() {
            return false;
        }
        for (series, &value) in self.series.iter_mut().zip(sample.iter()) {
            series[self.current_point] = value;
        }
        self.current_point += 1;
        if self.is_full() {
            self.state = AcquireState::Idle;
            return true;
        }
        false
    }

    /// First `current_point` samples of every metric.
    pub fn read(&self) -> TimeSeriesSnapshot {
        TimeSeriesSnapshot {
            points: self.current_point,
            series: self
                .series
                .iter()
                .map(|s| s[..self.current_point].to_vec())
                .collect(),
        }
    }
}

//! Test data builders for frames and stage configs

use framestage::config::{DispatchConfig, StatsConfig};
use framestage::pipeline::{AttributeValue, Frame, SharedFrame};

/// Builder for 2-D `u16` test frames
pub struct FrameBuilder {
    width: usize,
    height: usize,
    fill: u16,
    points: Vec<(usize, usize, u16)>,
    unique_id: i64,
    timestamp: f64,
    color_mode: Option<i64>,
}

impl FrameBuilder {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            fill: 0,
            points: Vec::new(),
            unique_id: 0,
            timestamp: 0.0,
            color_mode: None,
        }
    }

    pub fn fill(mut self, value: u16) -> Self {
        self.fill = value;
        self
    }

    pub fn point(mut self, x: usize, y: usize, value: u16) -> Self {
        self.points.push((x, y, value));
        self
    }

    pub fn unique_id(mut self, id: i64) -> Self {
        self.unique_id = id;
        self
    }

    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn color_mode(mut self, code: i64) -> Self {
        self.color_mode = Some(code);
        self
    }

    pub fn build(self) -> Frame {
        let mut pixels = vec![self.fill; self.width * self.height];
        for (x, y, v) in self.points {
            pixels[y * self.width + x] = v;
        }
        let mut frame = Frame::new(pixels, &[self.width, self.height])
            .with_unique_id(self.unique_id)
            .with_timestamp(self.timestamp);
        if let Some(code) = self.color_mode {
            frame = frame.with_attribute("colorMode", AttributeValue::Int(code));
        }
        frame
    }

    pub fn shared(self) -> SharedFrame {
        self.build().into_shared()
    }
}

/// Dispatch config for tests, bound to `port` if non-empty
pub fn dispatch_config(port: &str, blocking: bool) -> DispatchConfig {
    DispatchConfig {
        name: "TEST".to_string(),
        queue_capacity: 8,
        blocking_mode: blocking,
        enabled: true,
        min_callback_period_secs: 0.0,
        source_port: port.to_string(),
        source_addr: 0,
    }
}

/// Stats config with every section enabled
pub fn full_stats_config() -> StatsConfig {
    StatsConfig {
        compute_statistics: true,
        compute_centroid: true,
        compute_profiles: true,
        compute_histogram: true,
        centroid_threshold: 0.0,
        hist_size: 16,
        hist_min: 0.0,
        hist_max: 1000.0,
        ..StatsConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder() {
        let frame = FrameBuilder::new(4, 3).fill(2).point(1, 2, 9).unique_id(7).build();
        assert_eq!(frame.unique_id, 7);
        assert_eq!(frame.data.get_f64(2 * 4 + 1), Some(9.0));
        assert_eq!(frame.data.get_f64(0), Some(2.0));
        assert!(frame.is_consistent());
    }
}

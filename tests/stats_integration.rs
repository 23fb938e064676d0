//! Statistics reducer tests run through a live stage

mod common;

use common::builders::{dispatch_config, full_stats_config, FrameBuilder};
use common::{assert_close, DRAIN_TIMEOUT};
use framestage::analysis::stats_engine::{keys, time_series_key};
use framestage::analysis::{StatsEngine, StatsSetting, TimeSeriesControl, TimeSeriesMetric};
use framestage::config::{StageConfig, StatsConfig};
use framestage::pipeline::{stage_keys, FrameStage, ParamKey, ParamValue, SourceRegistry};
use std::sync::{Arc, Mutex};

fn stats_stage(blocking: bool, stats: StatsConfig) -> FrameStage<StatsEngine> {
    FrameStage::new(
        &dispatch_config("", blocking),
        StatsEngine::new(stats),
        Arc::new(SourceRegistry::new()),
    )
    .unwrap()
}

#[test]
fn test_time_series_acquisition_through_queue() {
    let stage = stats_stage(
        false,
        StatsConfig {
            ts_num_points: 100,
            ..StatsConfig::default()
        },
    );
    stage
        .configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::EraseStart))
        .unwrap();

    for id in 0..5usize {
        let frame = FrameBuilder::new(8, 4)
            .point(id, 2, 1000)
            .unique_id(id as i64)
            .timestamp(id as f64 * 0.5)
            .shared();
        stage.on_frame_arrived(&frame);
        // One at a time so none are dropped
        assert!(stage.wait_idle(DRAIN_TIMEOUT));
    }

    stage
        .configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::Stop))
        .unwrap();
    // Frames after Stop are not recorded
    stage.on_frame_arrived(&FrameBuilder::new(8, 4).point(7, 0, 1000).shared());
    assert!(stage.wait_idle(DRAIN_TIMEOUT));

    stage
        .configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::Read))
        .unwrap();

    let expected_x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
    let series = stage.with_reducer(|engine| engine.read_time_series());
    assert_eq!(series.points, 5);
    assert_eq!(series.get(TimeSeriesMetric::MaxX), expected_x.as_slice());
    assert_eq!(series.get(TimeSeriesMetric::MaxY), &[2.0; 5]);
    assert_eq!(
        series.get(TimeSeriesMetric::Timestamp),
        &[0.0, 0.5, 1.0, 1.5, 2.0]
    );

    assert_eq!(
        stage.param(time_series_key(TimeSeriesMetric::MaxX)),
        Some(ParamValue::FloatArray(expected_x))
    );
    assert_eq!(stage.param(keys::TS_CURRENT_POINT).and_then(|v| v.as_i64()), Some(5));
    assert_eq!(stage.param(keys::TS_ACQUIRING).and_then(|v| v.as_i64()), Some(0));
    assert_eq!(stage.status().frame_counter, 6);
}

#[test]
fn test_time_series_stops_when_full() {
    let stage = stats_stage(
        true,
        StatsConfig {
            ts_num_points: 3,
            ..StatsConfig::default()
        },
    );
    stage
        .configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::EraseStart))
        .unwrap();

    for id in 0..5 {
        stage.on_frame_arrived(&FrameBuilder::new(2, 2).fill(id).shared());
    }

    let series = stage.with_reducer(|engine| engine.read_time_series());
    assert_eq!(series.points, 3);
    assert_eq!(series.get(TimeSeriesMetric::MeanValue), &[0.0, 1.0, 2.0]);
    assert_eq!(stage.param(keys::TS_ACQUIRING).and_then(|v| v.as_i64()), Some(0));

    // Start on a full buffer stays idle
    stage
        .configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::Start))
        .unwrap();
    assert!(!stage.with_reducer(|engine| engine.time_series().is_acquiring()));
}

#[test]
fn test_single_pixel_centroid() {
    let stage = stats_stage(
        true,
        StatsConfig {
            compute_centroid: true,
            centroid_threshold: 0.0,
            ..StatsConfig::default()
        },
    );
    stage.on_frame_arrived(&FrameBuilder::new(5, 5).point(3, 1, 100).unique_id(9).shared());

    let stats = stage.last_output().unwrap();
    assert_eq!(stats.unique_id, 9);
    let c = stats.centroid.unwrap();
    assert_close(c.total, 100.0, 1e-9);
    assert_close(c.x, 3.0, 1e-9);
    assert_close(c.y, 1.0, 1e-9);
    assert_close(c.sigma_x, 0.0, 1e-9);
    assert_close(c.sigma_y, 0.0, 1e-9);
    assert_eq!(stage.param(keys::CENTROID_X).and_then(|v| v.as_f64()), Some(3.0));
}

#[test]
fn test_constant_frame_all_sections() {
    let stage = stats_stage(true, full_stats_config());
    stage.on_frame_arrived(&FrameBuilder::new(6, 4).fill(500).shared());

    let stats = stage.last_output().unwrap();
    let basic = stats.basic.unwrap();
    assert_close(basic.mean, 500.0, 1e-9);
    assert_close(basic.sigma, 0.0, 1e-9);
    assert_close(basic.total, 500.0 * 24.0, 1e-6);

    let hist = stats.histogram.unwrap();
    assert_eq!(hist.bins.iter().sum::<u64>(), 24);
    assert_eq!(hist.below, 0);
    assert_eq!(hist.above, 0);
    assert_close(hist.entropy, 0.0, 1e-12);

    let profiles = stats.profiles.unwrap();
    assert_eq!(profiles.average_x, vec![500.0; 6]);
    assert_eq!(profiles.average_y, vec![500.0; 4]);

    assert_eq!(
        stage.param(keys::PROFILE_SIZE_X).and_then(|v| v.as_i64()),
        Some(6)
    );
    assert_eq!(stage.param(keys::HIST_ENTROPY).and_then(|v| v.as_f64()), Some(0.0));
}

#[test]
fn test_inconsistent_frame_keeps_previous_output() {
    let stage = stats_stage(true, StatsConfig::default());
    stage.on_frame_arrived(&FrameBuilder::new(2, 2).fill(7).unique_id(1).shared());

    let mut bad = FrameBuilder::new(2, 2).unique_id(2).build();
    bad.dims[0].size = 3;
    stage.on_frame_arrived(&bad.into_shared());

    // Counted by the stage, but the reducer output is unchanged
    assert_eq!(stage.status().frame_counter, 2);
    assert_eq!(stage.last_output().map(|s| s.unique_id), Some(1));
    assert_eq!(stage.param(keys::MEAN_VALUE).and_then(|v| v.as_f64()), Some(7.0));
}

#[test]
fn test_listeners_notified_once_per_changed_key() {
    let stage = stats_stage(true, StatsConfig::default());
    let seen: Arc<Mutex<Vec<ParamKey>>> = Arc::default();
    let sink = Arc::clone(&seen);
    stage.subscribe(Arc::new(move |key: ParamKey, _value: &ParamValue| {
        sink.lock().unwrap().push(key);
    }));

    stage.on_frame_arrived(&FrameBuilder::new(3, 3).fill(4).point(1, 1, 9).shared());
    let first = std::mem::take(&mut *seen.lock().unwrap());
    for key in [keys::MEAN_VALUE, keys::MAX_VALUE, stage_keys::FRAME_COUNTER] {
        assert_eq!(first.iter().filter(|&&k| k == key).count(), 1, "{}", key);
    }

    // Same frame again: only the counter moves
    stage.on_frame_arrived(&FrameBuilder::new(3, 3).fill(4).point(1, 1, 9).shared());
    let second = seen.lock().unwrap().clone();
    assert!(second.contains(&stage_keys::FRAME_COUNTER));
    assert!(!second.contains(&keys::MEAN_VALUE));
}

#[test]
fn test_settings_reach_published_params() {
    let stage = stats_stage(true, StatsConfig::default());
    stage.configure_reducer(StatsSetting::HistSize(32)).unwrap();
    stage.configure_reducer(StatsSetting::TimeSeriesNumPoints(10)).unwrap();

    assert_eq!(stage.param(keys::HIST_SIZE).and_then(|v| v.as_i64()), Some(32));
    assert_eq!(stage.param(keys::TS_NUM_POINTS).and_then(|v| v.as_i64()), Some(10));
    assert!(stage
        .configure_reducer(StatsSetting::TimeSeriesNumPoints(0))
        .is_err());
    assert!(stage
        .configure_reducer(StatsSetting::CentroidThreshold(f64::INFINITY))
        .is_err());
}

#[test]
fn test_stage_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stage.toml");
    std::fs::write(
        &path,
        r#"
[stage]
name = "STATS2"
blocking_mode = true
queue_capacity = 4

[stats]
compute_histogram = true
hist_size = 8
hist_min = 0.0
hist_max = 80.0
"#,
    )
    .unwrap();

    let config = StageConfig::load(&path).unwrap();
    assert_eq!(config.stage.name, "STATS2");
    assert!(config.stats.compute_statistics);

    let stage = FrameStage::new(
        &config.stage,
        StatsEngine::new(config.stats.clone()),
        Arc::new(SourceRegistry::new()),
    )
    .unwrap();
    assert_eq!(stage.name(), "STATS2");
    assert_eq!(stage.status().queue_capacity, 4);

    stage.on_frame_arrived(&FrameBuilder::new(4, 2).fill(15).point(0, 0, 200).shared());
    let hist = stage.last_output().and_then(|s| s.histogram).unwrap();
    assert_eq!(hist.bins.len(), 8);
    assert_eq!(hist.bins[1], 7);
    assert_eq!(hist.above, 1);
}

//! framestage - demonstration runner
//!
//! Feeds synthetic Gaussian-spot frames through an in-process port into a
//! statistics stage, then prints the stage status and the last results.

use anyhow::Context;
use clap::Parser;
use framestage::analysis::{StatsEngine, StatsSetting, TimeSeriesControl, TimeSeriesMetric};
use framestage::config::{default_config_path, StageConfig};
use framestage::pipeline::{AttributeValue, Frame, FramePort, FrameStage, SourceRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEMO_PORT: &str = "SIM1";

#[derive(Parser, Debug)]
#[command(name = "framestage", version, about = "Run a statistics stage on synthetic frames")]
struct Args {
    /// Stage config file (defaults to the platform config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to publish
    #[arg(short = 'n', long, default_value_t = 200)]
    frames: usize,

    /// Frame width in pixels
    #[arg(long, default_value_t = 256)]
    width: usize,

    /// Frame height in pixels
    #[arg(long, default_value_t = 256)]
    height: usize,

    /// Publish rate in frames per second (0 publishes as fast as possible)
    #[arg(long, default_value_t = 100.0)]
    rate_hz: f64,

    /// Reduce on the publishing thread instead of the consumer thread
    #[arg(long)]
    blocking: bool,

    /// RNG seed for reproducible frames
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective config to this path before exiting
    #[arg(long)]
    save_config: Option<PathBuf>,
}

/// Gaussian spot on a noisy background
struct SpotGenerator {
    rng: StdRng,
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    sigma: f64,
    amplitude: f64,
    background: f64,
}

impl SpotGenerator {
    fn new(width: usize, height: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            width,
            height,
            x: width as f64 / 2.0,
            y: height as f64 / 2.0,
            sigma: (width.min(height) as f64 / 20.0).max(1.0),
            amplitude: 4000.0,
            background: 100.0,
        }
    }

    fn next_frame(&mut self, unique_id: i64, timestamp: f64) -> Frame {
        // Random walk, kept inside the frame
        self.x = (self.x + self.rng.gen_range(-1.0..1.0)).clamp(0.0, (self.width - 1) as f64);
        self.y = (self.y + self.rng.gen_range(-1.0..1.0)).clamp(0.0, (self.height - 1) as f64);

        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        let mut pixels = Vec::with_capacity(self.width * self.height);
        for row in 0..self.height {
            let dy = row as f64 - self.y;
            for col in 0..self.width {
                let dx = col as f64 - self.x;
                let spot = self.amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                let noise = self.rng.gen_range(0.0..20.0);
                pixels.push((self.background + spot + noise).min(u16::MAX as f64) as u16);
            }
        }

        Frame::new(pixels, &[self.width, self.height])
            .with_unique_id(unique_id)
            .with_timestamp(timestamp)
            .with_attribute("colorMode", AttributeValue::Int(0))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.width > 0 && args.height > 0, "frame size must be non-zero");

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = match &config_path {
        Some(path) if path.exists() => StageConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        _ => StageConfig::default(),
    };

    if args.blocking {
        config.stage.blocking_mode = true;
    }
    if config.stage.source_port.is_empty() {
        config.stage.source_port = DEMO_PORT.to_string();
    }
    config.stats.compute_centroid = true;

    let _log_guard = framestage::logging::init_logging(&config.logging)?;
    tracing::info!("Starting framestage demo ({} frames)", args.frames);

    let registry = Arc::new(SourceRegistry::new());
    let port = Arc::new(FramePort::new(config.stage.source_port.clone(), 1));
    registry.register(port.clone());

    let stage = FrameStage::new(&config.stage, StatsEngine::new(config.stats.clone()), registry)
        .context("Failed to create stage")?;
    stage.configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::EraseStart))?;

    let period = (args.rate_hz > 0.0).then(|| Duration::from_secs_f64(1.0 / args.rate_hz));
    let mut generator = SpotGenerator::new(args.width, args.height, args.seed);
    let start = std::time::Instant::now();
    for id in 0..args.frames {
        let frame = generator
            .next_frame(id as i64, start.elapsed().as_secs_f64())
            .into_shared();
        port.publish(config.stage.source_addr, &frame);
        if let Some(period) = period {
            std::thread::sleep(period);
        }
    }

    if !stage.wait_idle(Duration::from_secs(10)) {
        tracing::warn!("Stage did not drain within 10 s");
    }
    stage.configure_reducer(StatsSetting::TimeSeriesControl(TimeSeriesControl::Stop))?;

    let status = stage.status();
    println!("{}", serde_json::to_string_pretty(&status)?);

    if let Some(stats) = stage.last_output() {
        if let Some(c) = stats.centroid {
            println!(
                "Last centroid: ({:.2}, {:.2})  sigma ({:.2}, {:.2})  eccentricity {:.3}",
                c.x, c.y, c.sigma_x, c.sigma_y, c.eccentricity
            );
        }
        if let Some(b) = stats.basic {
            println!(
                "Last frame: min {} max {} mean {:.2} sigma {:.2}",
                b.min, b.max, b.mean, b.sigma
            );
        }
    }

    let series = stage.with_reducer(|engine| engine.read_time_series());
    let xs = series.get(TimeSeriesMetric::CentroidX);
    if let (Some(first), Some(last)) = (xs.first(), xs.last()) {
        println!(
            "Time series: {} points, centroid x drifted {:.2} -> {:.2}",
            series.points, first, last
        );
    }

    if let Some(path) = args.save_config {
        config.save(&path)?;
        tracing::info!("Saved config to {:?}", path);
    }

    Ok(())
}

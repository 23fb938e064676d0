//! Frame dispatch stage.
//!
//! A [`FrameStage`] sits between an upstream [`FrameSource`] and a
//! [`FrameReducer`]. For every delivered frame it applies the rate gate,
//! then either reduces the frame on the delivering thread (blocking mode) or
//! hands it to its own consumer thread through a bounded [`FrameQueue`]. A
//! full queue drops the frame and counts it; the producer never waits.
//!
//! # Locking
//!
//! One mutex per stage guards the dispatch state, the reducer and the
//! parameter table. It is held for the whole reduction pass, for admission,
//! and for rebinding. The queue has its own synchronization.
//!
//! # Shutdown
//!
//! Dropping the `FrameStage` cancels its source registration, signals the
//! consumer thread and joins it. Frames still queued at that point are
//! released without being reduced.

use crate::config::DispatchConfig;
use crate::error::Result;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::frame::{Frame, SharedFrame, MAX_DIMS};
use crate::pipeline::params::{ListenerId, ParamKey, ParamListener, ParamTable, ParamValue};
use crate::pipeline::queue::FrameQueue;
use crate::pipeline::reducer::FrameReducer;
use crate::pipeline::source::{FrameCallback, FrameSource, SourceAddress, SourceRegistry, SubscriptionId};
use crate::types::{BayerPattern, ColorMode};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Parameters published by every stage, independent of its reducer.
pub mod keys {
    use crate::pipeline::params::ParamKey;

    pub const FRAME_COUNTER: ParamKey = ParamKey("ARRAY_COUNTER");
    pub const DROPPED_FRAMES: ParamKey = ParamKey("DROPPED_ARRAYS");
    pub const NDIMENSIONS: ParamKey = ParamKey("ARRAY_NDIMENSIONS");
    pub const DIMENSIONS: ParamKey = ParamKey("ARRAY_DIMENSIONS");
    pub const DATA_TYPE: ParamKey = ParamKey("DATA_TYPE");
    pub const COLOR_MODE: ParamKey = ParamKey("COLOR_MODE");
    pub const BAYER_PATTERN: ParamKey = ParamKey("BAYER_PATTERN");
    pub const UNIQUE_ID: ParamKey = ParamKey("UNIQUE_ID");
    pub const TIMESTAMP: ParamKey = ParamKey("TIME_STAMP");
    pub const ENABLED: ParamKey = ParamKey("ENABLE_CALLBACKS");
    pub const BLOCKING_MODE: ParamKey = ParamKey("BLOCKING_CALLBACKS");
    pub const MIN_CALLBACK_PERIOD: ParamKey = ParamKey("MIN_CALLBACK_TIME");
    pub const SOURCE_PORT: ParamKey = ParamKey("NDARRAY_PORT");
    pub const SOURCE_ADDR: ParamKey = ParamKey("NDARRAY_ADDR");
    pub const QUEUE_SIZE: ParamKey = ParamKey("QUEUE_SIZE");
}

/// Frame attribute carrying the color mode code.
pub const COLOR_MODE_ATTRIBUTE: &str = "colorMode";

/// Frame attribute carrying the Bayer pattern code.
pub const BAYER_PATTERN_ATTRIBUTE: &str = "bayerPattern";

/// Runtime dispatch settings.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSetting {
    /// Register for (or cancel) deliveries from the bound source.
    Enabled(bool),
    /// Reduce on the delivering thread instead of queueing.
    BlockingMode(bool),
    /// Minimum seconds between processed frames.
    MinCallbackPeriod(f64),
    /// Rebind to a different port, keeping the sub-address.
    SourcePort(String),
    /// Rebind to a different sub-address on the same port.
    SourceAddr(i32),
}

/// Snapshot of a stage's dispatch state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStatus {
    pub name: String,
    pub enabled: bool,
    pub blocking_mode: bool,
    pub min_callback_period_secs: f64,
    pub frame_counter: u64,
    pub dropped_frames: u64,
    pub source: SourceAddress,
    pub connected: bool,
    pub registered: bool,
    pub queue_len: usize,
    pub queue_capacity: usize,
}

// ==================== Dispatch State ====================

struct DispatchState {
    enabled: bool,
    blocking_mode: bool,
    min_callback_period: Duration,
    last_processed: Option<Instant>,
    frame_counter: u64,
    dropped_frames: u64,
    dims_prev: [usize; MAX_DIMS],
    source: SourceAddress,
    connection: Option<Arc<dyn FrameSource>>,
    registration: Option<SubscriptionId>,
    /// Bumped on every registration change; deliveries carry the value they
    /// were registered with.
    epoch: u64,
}

/// Convert a period in seconds, rejecting negative, non-finite and
/// out-of-range values.
fn callback_period(secs: f64) -> PipelineResult<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        PipelineError::InvalidSetting(format!("min callback period {} s: {}", secs, e))
    })
}

impl DispatchState {
    fn from_config(config: &DispatchConfig) -> PipelineResult<Self> {
        Ok(Self {
            enabled: config.enabled,
            blocking_mode: config.blocking_mode,
            min_callback_period: callback_period(config.min_callback_period_secs)?,
            last_processed: None,
            frame_counter: 0,
            dropped_frames: 0,
            dims_prev: [0; MAX_DIMS],
            source: SourceAddress::new(config.source_port.clone(), config.source_addr),
            connection: None,
            registration: None,
            epoch: 0,
        })
    }

    /// Rate gate. Records the admission time when the frame passes.
    fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_processed {
            if !self.min_callback_period.is_zero()
                && now.saturating_duration_since(last) <= self.min_callback_period
            {
                return false;
            }
        }
        self.last_processed = Some(now);
        true
    }
}

struct StageInner<R: FrameReducer> {
    dispatch: DispatchState,
    reducer: R,
    params: ParamTable,
    last_output: Option<R::Output>,
}

struct StageShared<R: FrameReducer> {
    name: String,
    queue: FrameQueue,
    /// Frames queued or being reduced by the consumer.
    in_flight: Mutex<usize>,
    /// Signalled when `in_flight` drops to zero.
    drained: Condvar,
    registry: Arc<SourceRegistry>,
    inner: Mutex<StageInner<R>>,
}

// ==================== Frame Stage ====================

/// A dispatch stage running reducer `R` on its frames.
pub struct FrameStage<R: FrameReducer> {
    shared: Arc<StageShared<R>>,
    shutdown_tx: Option<Sender<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl<R: FrameReducer> FrameStage<R> {
    /// Create a stage, start its consumer thread and bind it to the
    /// configured source.
    ///
    /// A source that cannot be resolved is logged and leaves the stage
    /// disconnected; it can be rebound later with
    /// [`FrameStage::connect_to_source`].
    pub fn new(
        config: &DispatchConfig,
        reducer: R,
        registry: Arc<SourceRegistry>,
    ) -> PipelineResult<Self> {
        let shared = StageShared::new(config, reducer, registry)?;

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let consumer_shared = Arc::clone(&shared);
        let consumer = std::thread::Builder::new()
            .name(format!("{}-consumer", config.name))
            .spawn(move || consumer_loop(consumer_shared, shutdown_rx))?;

        tracing::info!(
            "Stage '{}' created (reducer: {}, queue capacity {})",
            config.name,
            shared.lock().reducer.name(),
            config.queue_capacity
        );

        let stage = Self {
            shared,
            shutdown_tx: Some(shutdown_tx),
            consumer: Some(consumer),
        };

        if !config.source_port.is_empty() {
            let address = SourceAddress::new(config.source_port.clone(), config.source_addr);
            if let Err(e) = stage.connect_to_source(address) {
                tracing::error!("Stage '{}' could not bind to its source: {}", config.name, e);
            }
        }

        Ok(stage)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Producer entry point: admit, then reduce inline or enqueue.
    ///
    /// The caller keeps its own handle whatever happens.
    pub fn on_frame_arrived(&self, frame: &SharedFrame) {
        self.shared.on_frame_arrived(frame);
    }

    /// Rebind to `address`, cancelling any existing registration first.
    pub fn connect_to_source(&self, address: SourceAddress) -> PipelineResult<()> {
        let mut inner = self.shared.lock();
        let result = bind(&self.shared, &mut inner, address);
        inner.params.flush();
        result
    }

    /// Enable or disable deliveries from the bound source.
    pub fn set_enabled(&self, enabled: bool) -> PipelineResult<()> {
        let mut inner = self.shared.lock();
        inner.dispatch.enabled = enabled;
        inner.params.set_bool(keys::ENABLED, enabled);
        let result = if enabled {
            register(&self.shared, &mut inner)
        } else {
            cancel_registration(&self.shared.name, &mut inner.dispatch);
            Ok(())
        };
        inner.params.flush();
        result
    }

    /// Apply a dispatch setting.
    pub fn apply(&self, setting: StageSetting) -> PipelineResult<()> {
        tracing::debug!("Stage '{}': {:?}", self.shared.name, setting);
        match setting {
            StageSetting::Enabled(enabled) => self.set_enabled(enabled),
            StageSetting::BlockingMode(blocking) => {
                let mut inner = self.shared.lock();
                inner.dispatch.blocking_mode = blocking;
                inner.params.set_bool(keys::BLOCKING_MODE, blocking);
                inner.params.flush();
                Ok(())
            }
            StageSetting::MinCallbackPeriod(secs) => {
                let period = callback_period(secs)?;
                let mut inner = self.shared.lock();
                inner.dispatch.min_callback_period = period;
                inner.params.set_float(keys::MIN_CALLBACK_PERIOD, secs);
                inner.params.flush();
                Ok(())
            }
            StageSetting::SourcePort(port) => {
                let addr = self.shared.lock().dispatch.source.addr;
                self.connect_to_source(SourceAddress::new(port, addr))
            }
            StageSetting::SourceAddr(addr) => {
                let port = self.shared.lock().dispatch.source.port.clone();
                self.connect_to_source(SourceAddress::new(port, addr))
            }
        }
    }

    /// Apply a reducer setting and publish whatever it changed.
    pub fn configure_reducer(&self, setting: R::Setting) -> Result<()> {
        let mut inner = self.shared.lock();
        let StageInner {
            reducer, params, ..
        } = &mut *inner;
        let result = reducer.apply_setting(setting, params);
        params.flush();
        result
    }

    /// Run `f` against the reducer under the stage lock.
    pub fn with_reducer<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.shared.lock().reducer)
    }

    /// Run `f` against the parameter table under the stage lock.
    pub fn with_params<T>(&self, f: impl FnOnce(&ParamTable) -> T) -> T {
        f(&self.shared.lock().params)
    }

    /// Current value of one parameter.
    pub fn param(&self, key: ParamKey) -> Option<ParamValue> {
        self.shared.lock().params.get(key).cloned()
    }

    /// Register a listener for every parameter change.
    pub fn subscribe(&self, listener: ParamListener) -> ListenerId {
        self.shared.lock().params.subscribe(listener)
    }

    /// Register a listener for changes of one parameter.
    pub fn subscribe_to(&self, key: ParamKey, listener: ParamListener) -> ListenerId {
        self.shared.lock().params.subscribe_to(key, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.lock().params.unsubscribe(id)
    }

    /// Dimension sizes of the last processed frame, zero padded.
    pub fn dimensions(&self) -> [usize; MAX_DIMS] {
        self.shared.lock().dispatch.dims_prev
    }

    pub fn status(&self) -> StageStatus {
        let inner = self.shared.lock();
        let d = &inner.dispatch;
        StageStatus {
            name: self.shared.name.clone(),
            enabled: d.enabled,
            blocking_mode: d.blocking_mode,
            min_callback_period_secs: d.min_callback_period.as_secs_f64(),
            frame_counter: d.frame_counter,
            dropped_frames: d.dropped_frames,
            source: d.source.clone(),
            connected: d.connection.is_some(),
            registered: d.registration.is_some(),
            queue_len: self.shared.queue.len(),
            queue_capacity: self.shared.queue.capacity(),
        }
    }

    /// Block until every queued frame has been reduced, or `timeout` passes.
    /// Returns whether the stage drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let in_flight = self.shared.in_flight_count();
        let (in_flight, _) = self
            .shared
            .drained
            .wait_timeout_while(in_flight, timeout, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *in_flight == 0
    }
}

impl<R: FrameReducer> FrameStage<R>
where
    R::Output: Clone,
{
    /// Output of the most recent successful reduction.
    pub fn last_output(&self) -> Option<R::Output> {
        self.shared.lock().last_output.clone()
    }
}

impl<R: FrameReducer> Drop for FrameStage<R> {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.lock();
            cancel_registration(&self.shared.name, &mut inner.dispatch);
            inner.dispatch.connection = None;
        }
        // Disconnects the shutdown channel, which wakes the consumer.
        self.shutdown_tx.take();
        if let Some(handle) = self.consumer.take() {
            if handle.join().is_err() {
                tracing::error!("Stage '{}' consumer thread panicked", self.shared.name);
            }
        }
        let discarded = self.shared.queue.drain();
        tracing::info!(
            "Stage '{}' stopped ({} queued frames discarded)",
            self.shared.name,
            discarded
        );
    }
}

impl<R: FrameReducer> std::fmt::Debug for FrameStage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStage")
            .field("name", &self.shared.name)
            .field("queue_capacity", &self.shared.queue.capacity())
            .finish()
    }
}

// ==================== Dispatch ====================

impl<R: FrameReducer> StageShared<R> {
    fn new(
        config: &DispatchConfig,
        mut reducer: R,
        registry: Arc<SourceRegistry>,
    ) -> PipelineResult<Arc<Self>> {
        let dispatch = DispatchState::from_config(config)?;
        let queue = FrameQueue::new(config.queue_capacity)?;

        let mut params = ParamTable::new();
        params.set_int(keys::FRAME_COUNTER, 0);
        params.set_int(keys::DROPPED_FRAMES, 0);
        params.set_int(keys::NDIMENSIONS, 0);
        params.set_int_array(keys::DIMENSIONS, vec![0; MAX_DIMS]);
        params.set_bool(keys::ENABLED, dispatch.enabled);
        params.set_bool(keys::BLOCKING_MODE, dispatch.blocking_mode);
        params.set_float(keys::MIN_CALLBACK_PERIOD, config.min_callback_period_secs);
        params.set_text(keys::SOURCE_PORT, dispatch.source.port.clone());
        params.set_int(keys::SOURCE_ADDR, dispatch.source.addr as i64);
        params.set_int(keys::QUEUE_SIZE, queue.capacity() as i64);
        reducer.init_params(&mut params);

        Ok(Arc::new(Self {
            name: config.name.clone(),
            queue,
            in_flight: Mutex::new(0),
            drained: Condvar::new(),
            registry,
            inner: Mutex::new(StageInner {
                dispatch,
                reducer,
                params,
                last_output: None,
            }),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, StageInner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight_count(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_work(&self) {
        *self.in_flight_count() += 1;
    }

    fn finish_work(&self) {
        let mut in_flight = self.in_flight_count();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.drained.notify_all();
        }
    }

    /// Delivery from a registered source.
    ///
    /// The epoch check and admission run under one guard, so a rebind or
    /// disable cannot slip in between them.
    fn deliver(&self, epoch: u64, frame: &SharedFrame) {
        let mut inner = self.lock();
        if inner.dispatch.registration.is_none() || inner.dispatch.epoch != epoch {
            tracing::debug!(
                "Stage '{}': ignoring stale delivery of frame {}",
                self.name,
                frame.unique_id
            );
            return;
        }
        self.dispatch_locked(&mut inner, frame);
    }

    fn on_frame_arrived(&self, frame: &SharedFrame) {
        let mut inner = self.lock();
        self.dispatch_locked(&mut inner, frame);
    }

    fn dispatch_locked(&self, inner: &mut StageInner<R>, frame: &SharedFrame) {
        if !inner.dispatch.admit(Instant::now()) {
            tracing::trace!("Stage '{}': frame {} throttled", self.name, frame.unique_id);
            return;
        }

        if inner.dispatch.blocking_mode {
            process_frame(&self.name, inner, frame);
            return;
        }

        self.begin_work();
        match self.queue.try_push(Arc::clone(frame)) {
            Ok(()) => {
                tracing::trace!("Stage '{}': frame {} queued", self.name, frame.unique_id);
            }
            Err(rejected) => {
                drop(rejected);
                self.finish_work();
                inner.dispatch.dropped_frames += 1;
                let dropped = inner.dispatch.dropped_frames;
                inner.params.set_int(keys::DROPPED_FRAMES, dropped as i64);
                inner.params.flush();
                tracing::debug!(
                    "Stage '{}': queue full, dropped frame {} ({} dropped total)",
                    self.name,
                    frame.unique_id,
                    dropped
                );
            }
        }
    }
}

fn consumer_loop<R: FrameReducer>(shared: Arc<StageShared<R>>, shutdown_rx: Receiver<()>) {
    tracing::info!("Stage '{}' consumer started", shared.name);
    let frames = shared.queue.receiver().clone();
    loop {
        select! {
            recv(frames) -> msg => match msg {
                Ok(frame) => {
                    {
                        let mut inner = shared.lock();
                        process_frame(&shared.name, &mut inner, &frame);
                    }
                    drop(frame);
                    shared.finish_work();
                }
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }
    tracing::info!("Stage '{}' consumer stopped", shared.name);
}

/// Stage bookkeeping, then the reducer, then listener notification.
fn process_frame<R: FrameReducer>(name: &str, inner: &mut StageInner<R>, frame: &Frame) {
    let StageInner {
        dispatch,
        reducer,
        params,
        last_output,
    } = inner;

    dispatch.frame_counter += 1;
    params.set_int(keys::FRAME_COUNTER, dispatch.frame_counter as i64);
    params.set_int(keys::NDIMENSIONS, frame.ndims() as i64);
    params.set_int(keys::DATA_TYPE, frame.element_type().code());
    params.set_int(keys::UNIQUE_ID, frame.unique_id);
    params.set_float(keys::TIMESTAMP, frame.timestamp);

    let color_mode = frame
        .attribute(COLOR_MODE_ATTRIBUTE)
        .and_then(|v| v.as_i64())
        .and_then(ColorMode::from_code)
        .unwrap_or_default();
    let bayer_pattern = frame
        .attribute(BAYER_PATTERN_ATTRIBUTE)
        .and_then(|v| v.as_i64())
        .and_then(BayerPattern::from_code)
        .unwrap_or_default();
    params.set_int(keys::COLOR_MODE, color_mode.code());
    params.set_int(keys::BAYER_PATTERN, bayer_pattern.code());

    let sizes = frame.dim_sizes();
    if sizes != dispatch.dims_prev {
        dispatch.dims_prev = sizes;
        params.set_int_array(keys::DIMENSIONS, sizes.iter().map(|&s| s as i64).collect());
    }

    match reducer.reduce(frame, params) {
        Ok(output) => *last_output = Some(output),
        Err(e) => tracing::warn!(
            "Stage '{}': {} failed on frame {}: {}",
            name,
            reducer.name(),
            frame.unique_id,
            e
        ),
    }

    params.flush();
}

// ==================== Binding ====================

fn bind<R: FrameReducer>(
    shared: &Arc<StageShared<R>>,
    inner: &mut StageInner<R>,
    address: SourceAddress,
) -> PipelineResult<()> {
    cancel_registration(&shared.name, &mut inner.dispatch);
    inner.dispatch.connection = None;

    inner.params.set_text(keys::SOURCE_PORT, address.port.clone());
    inner.params.set_int(keys::SOURCE_ADDR, address.addr as i64);
    inner.dispatch.source = address.clone();

    let source = shared.registry.resolve(&address).map_err(|e| {
        tracing::warn!("Stage '{}': cannot connect to {}: {}", shared.name, address, e);
        e
    })?;
    inner.dispatch.connection = Some(source);
    tracing::info!("Stage '{}' connected to {}", shared.name, address);

    if inner.dispatch.enabled {
        register(shared, inner)?;
    }
    Ok(())
}

fn register<R: FrameReducer>(
    shared: &Arc<StageShared<R>>,
    inner: &mut StageInner<R>,
) -> PipelineResult<()> {
    let dispatch = &mut inner.dispatch;
    if dispatch.registration.is_some() {
        return Ok(());
    }
    let Some(source) = dispatch.connection.clone() else {
        return Ok(());
    };

    dispatch.epoch += 1;
    let epoch = dispatch.epoch;
    let weak: Weak<StageShared<R>> = Arc::downgrade(shared);
    let callback: FrameCallback = Arc::new(move |frame: &SharedFrame| {
        if let Some(stage) = weak.upgrade() {
            stage.deliver(epoch, frame);
        }
    });

    match source.subscribe(dispatch.source.addr, callback) {
        Ok(id) => {
            dispatch.registration = Some(id);
            tracing::info!("Stage '{}' registered on {}", shared.name, dispatch.source);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "Stage '{}': registration on {} failed: {}",
                shared.name,
                dispatch.source,
                e
            );
            Err(e)
        }
    }
}

fn cancel_registration(name: &str, dispatch: &mut DispatchState) {
    let Some(id) = dispatch.registration.take() else {
        return;
    };
    dispatch.epoch += 1;
    if let Some(source) = &dispatch.connection {
        if let Err(e) = source.unsubscribe(id) {
            tracing::warn!("Stage '{}': failed to cancel registration: {}", name, e);
        }
    }
    tracing::info!("Stage '{}' unregistered from {}", name, dispatch.source);
}

//! Upstream frame sources and how stages bind to them.
//!
//! A stage names its upstream by a [`SourceAddress`] (port name plus
//! sub-address). The [`SourceRegistry`] resolves the port name to a
//! [`FrameSource`], which the stage subscribes to for delivery callbacks.
//!
//! [`FramePort`] is the in-process source: producers call
//! [`FramePort::publish`] and every subscriber on that address receives the
//! frame on the producer's thread.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::frame::SharedFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Delivery callback registered with a source.
///
/// The source keeps its own handle for the duration of the call; callbacks
/// clone it if they need the frame afterwards.
pub type FrameCallback = Arc<dyn Fn(&SharedFrame) + Send + Sync>;

/// Handle for an active delivery registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Port name plus sub-address identifying an upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SourceAddress {
    pub port: String,
    pub addr: i32,
}

impl SourceAddress {
    pub fn new(port: impl Into<String>, addr: i32) -> Self {
        Self {
            port: port.into(),
            addr,
        }
    }
}

impl std::fmt::Display for SourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.port, self.addr)
    }
}

/// Anything that can deliver frames to registered callbacks.
pub trait FrameSource: Send + Sync {
    /// Port name this source is registered under.
    fn name(&self) -> &str;

    /// Whether this source delivers frames at `addr`.
    fn has_frame_interface(&self, addr: i32) -> bool;

    /// Register a delivery callback on `addr`.
    fn subscribe(&self, addr: i32, callback: FrameCallback) -> PipelineResult<SubscriptionId>;

    /// Cancel a registration. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId) -> PipelineResult<()>;
}

/// Name → source lookup shared by every stage in a process.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<dyn FrameSource>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own name, replacing any previous one.
    pub fn register(&self, source: Arc<dyn FrameSource>) {
        let name = source.name().to_string();
        self.register_as(name, source);
    }

    /// Register a source under an explicit name.
    pub fn register_as(&self, name: impl Into<String>, source: Arc<dyn FrameSource>) {
        let name = name.into();
        tracing::info!("Registered frame source '{}'", name);
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, source);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn FrameSource>> {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FrameSource>> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Resolve an address to a source exposing a frame interface there.
    pub fn resolve(&self, address: &SourceAddress) -> PipelineResult<Arc<dyn FrameSource>> {
        let source = self
            .get(&address.port)
            .ok_or_else(|| PipelineError::SourceNotFound(address.port.clone()))?;
        if !source.has_frame_interface(address.addr) {
            return Err(PipelineError::NoFrameInterface(address.clone()));
        }
        Ok(source)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

struct Subscriber {
    id: SubscriptionId,
    addr: i32,
    callback: FrameCallback,
}

/// In-process frame source with `max_addr` sub-addresses (0..max_addr).
pub struct FramePort {
    name: String,
    max_addr: i32,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl FramePort {
    pub fn new(name: impl Into<String>, max_addr: i32) -> Self {
        Self {
            name: name.into(),
            max_addr: max_addr.max(1),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
        }
    }

    /// Deliver `frame` to every subscriber on `addr`.
    ///
    /// Returns the number of callbacks invoked. The subscriber list is
    /// snapshotted first so no port lock is held while callbacks run.
    pub fn publish(&self, addr: i32, frame: &SharedFrame) -> usize {
        let callbacks: Vec<FrameCallback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.addr == addr)
            .map(|s| Arc::clone(&s.callback))
            .collect();

        self.published.fetch_add(1, Ordering::Relaxed);
        for callback in &callbacks {
            callback(frame);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of publish calls.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl FrameSource for FramePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_frame_interface(&self, addr: i32) -> bool {
        (0..self.max_addr).contains(&addr)
    }

    fn subscribe(&self, addr: i32, callback: FrameCallback) -> PipelineResult<SubscriptionId> {
        if !self.has_frame_interface(addr) {
            return Err(PipelineError::Registration {
                address: SourceAddress::new(self.name.clone(), addr),
                message: format!("address out of range 0..{}", self.max_addr),
            });
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, addr, callback });
        tracing::debug!("Port '{}' addr {}: subscription {:?} added", self.name, addr, id);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> PipelineResult<()> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| s.id != id);
        Ok(())
    }
}

impl std::fmt::Debug for FramePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePort")
            .field("name", &self.name)
            .field("max_addr", &self.max_addr)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

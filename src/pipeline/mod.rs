//! Frame dispatch core.
//!
//! Frames flow from an upstream source into a stage, which decides per frame
//! whether to reduce it on the delivering thread or queue it for its own
//! consumer thread.
//!
//! # Architecture
//!
//! ```text
//! [FramePort] ──publish──► FrameStage ──(blocking)──────────────► FrameReducer
//!                             │                                      ▲
//!                             └──try_push──► FrameQueue ──► consumer ┘
//! ```
//!
//! # Design
//!
//! - **Shared frames**: `Arc<Frame>`; the queue owns one clone per admitted frame.
//! - **Never block the producer**: a full queue drops the frame and counts it.
//! - **One lock per stage**: dispatch state, reducer and parameters together.
//! - **Trait seams**: sources implement [`FrameSource`], reductions implement
//!   [`FrameReducer`].

pub mod error;
pub mod frame;
pub mod params;
pub mod queue;
pub mod reducer;
pub mod source;
pub mod stage;

pub use error::{PipelineError, PipelineResult};
pub use frame::{AttributeValue, Dimension, Frame, FrameData, SharedFrame, MAX_DIMS};
pub use params::{ListenerId, ParamKey, ParamListener, ParamTable, ParamValue};
pub use queue::FrameQueue;
pub use reducer::FrameReducer;
pub use source::{FrameCallback, FramePort, FrameSource, SourceAddress, SourceRegistry, SubscriptionId};
pub use stage::{keys as stage_keys, FrameStage, StageSetting, StageStatus};

//! Per-frame work plugged into a [`FrameStage`](crate::pipeline::FrameStage).
//!
//! The stage owns the dispatch algorithm (admission, queueing, consumer
//! thread, rebinding). What happens to each admitted frame is up to the
//! [`FrameReducer`] it was built with.

use crate::error::Result;
use crate::pipeline::frame::Frame;
use crate::pipeline::params::ParamTable;

/// Reduction run on every admitted frame.
///
/// Both methods are called with the stage lock held, so implementations see
/// frames and settings strictly one at a time.
pub trait FrameReducer: Send + 'static {
    /// Result of one reduction pass, kept by the stage as its last output.
    type Output: Send + 'static;

    /// Runtime configuration accepted by [`FrameReducer::apply_setting`].
    type Setting: std::fmt::Debug + Send;

    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Publish initial values for every parameter this reducer owns.
    fn init_params(&mut self, _params: &mut ParamTable) {}

    /// Reduce one frame, writing results into `params`.
    ///
    /// The stage flushes `params` afterwards. An error leaves the stage
    /// running; the reducer is responsible for leaving its previous outputs
    /// in place.
    fn reduce(&mut self, frame: &Frame, params: &mut ParamTable) -> Result<Self::Output>;

    /// Apply a runtime setting.
    fn apply_setting(&mut self, setting: Self::Setting, params: &mut ParamTable) -> Result<()>;
}

//! Mock sources and test reducers

use framestage::pipeline::{
    Frame, FrameCallback, FrameReducer, FrameSource, ParamTable, PipelineResult, SubscriptionId,
};
use mockall::mock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mock! {
    pub Source {}

    impl FrameSource for Source {
        fn name(&self) -> &str;
        fn has_frame_interface(&self, addr: i32) -> bool;
        fn subscribe(&self, addr: i32, callback: FrameCallback) -> PipelineResult<SubscriptionId>;
        fn unsubscribe(&self, id: SubscriptionId) -> PipelineResult<()>;
    }
}

/// Reducer that records the unique ids it saw, optionally sleeping per frame
#[derive(Clone, Default)]
pub struct RecordingReducer {
    pub seen: Arc<Mutex<Vec<i64>>>,
    pub delay: Option<Duration>,
}

impl RecordingReducer {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<i64> {
        self.seen.lock().unwrap().clone()
    }
}

impl FrameReducer for RecordingReducer {
    type Output = i64;
    type Setting = ();

    fn name(&self) -> &str {
        "recording"
    }

    fn reduce(&mut self, frame: &Frame, _params: &mut ParamTable) -> framestage::Result<i64> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.seen.lock().unwrap().push(frame.unique_id);
        Ok(frame.unique_id)
    }

    fn apply_setting(&mut self, _setting: (), _params: &mut ParamTable) -> framestage::Result<()> {
        Ok(())
    }
}

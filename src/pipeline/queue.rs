//! Bounded frame queue between the producer and the consumer thread.
//!
//! The producer side never blocks: [`FrameQueue::try_push`] either moves the
//! handle into the queue or hands it straight back. The consumer side blocks
//! in [`FrameQueue::receiver`] until a frame arrives.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::frame::SharedFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Fixed-capacity FIFO of shared frames.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    tx: Sender<SharedFrame>,
    rx: Receiver<SharedFrame>,
    capacity: usize,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> PipelineResult<Self> {
        // A zero-capacity crossbeam channel is a rendezvous channel, which
        // would make every non-blocking push fail.
        if capacity == 0 {
            return Err(PipelineError::InvalidQueueCapacity(capacity));
        }
        let (tx, rx) = bounded(capacity);
        Ok(Self { tx, rx, capacity })
    }

    /// Try to enqueue without blocking.
    ///
    /// On a full queue the handle is returned so the caller decides when it
    /// is released.
    pub fn try_push(&self, frame: SharedFrame) -> Result<(), SharedFrame> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(frame)) | Err(TrySendError::Disconnected(frame)) => Err(frame),
        }
    }

    /// Receiving end, for blocking receives and `select!`.
    pub fn receiver(&self) -> &Receiver<SharedFrame> {
        &self.rx
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drop every queued frame, returning how many were discarded.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frame::Frame;
    use std::sync::Arc;

    fn frame(id: i64) -> SharedFrame {
        Frame::new(vec![0u8; 4], &[2, 2]).with_unique_id(id).into_shared()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            FrameQueue::new(0),
            Err(PipelineError::InvalidQueueCapacity(0))
        ));
    }

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new(4).unwrap();
        for id in 0..3 {
            queue.try_push(frame(id)).unwrap();
        }
        assert_eq!(queue.len(), 3);
        let ids: Vec<i64> = std::iter::from_fn(|| queue.receiver().try_recv().ok())
            .map(|f| f.unique_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_returns_handle() {
        let queue = FrameQueue::new(1).unwrap();
        queue.try_push(frame(1)).unwrap();
        assert_eq!(queue.len(), queue.capacity());

        let mine = frame(2);
        let extra = Arc::clone(&mine);
        assert_eq!(Arc::strong_count(&mine), 2);

        let returned = queue.try_push(extra).unwrap_err();
        assert_eq!(returned.unique_id, 2);
        drop(returned);

        // Caller's handle is the only one left and still usable.
        assert_eq!(Arc::strong_count(&mine), 1);
        assert_eq!(mine.data.len(), 4);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain() {
        let queue = FrameQueue::new(3).unwrap();
        queue.try_push(frame(1)).unwrap();
        queue.try_push(frame(2)).unwrap();
        assert_eq!(queue.drain(), 2);
        assert!(queue.is_empty());
    }
}

//! Frames: typed multi-dimensional buffers with metadata.
//!
//! A [`Frame`] is built by the producer while it still owns it exclusively,
//! then shared as a [`SharedFrame`] (`Arc<Frame>`). Every holder of a
//! `SharedFrame` keeps the buffer alive; the last one to drop it frees it.
//! The producer may keep its own handle while the queue owns a second one.

use crate::types::{ElementType, Pixel};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum rank of a frame.
pub const MAX_DIMS: usize = 10;

/// Shared, reference-counted frame handle.
pub type SharedFrame = Arc<Frame>;

/// One axis of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    /// Number of elements along this axis.
    pub size: usize,
    /// Offset of this axis relative to the sensor origin.
    pub offset: usize,
    /// Binning factor applied upstream.
    pub binning: usize,
    /// Whether the axis was read out reversed.
    pub reversed: bool,
}

impl Dimension {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            offset: 0,
            binning: 1,
            reversed: false,
        }
    }
}

/// Typed scalar attached to a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Integer view of the value (floats are truncated, text is parsed).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Float(v) if v.is_finite() => Some(*v as i64),
            AttributeValue::Float(_) => None,
            AttributeValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Element buffer of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Run a generic expression against the typed slice inside a [`FrameData`].
///
/// ```ignore
/// let total = dispatch_pixels!(&frame.data, |px| px.iter().map(|v| v.to_f64()).sum::<f64>());
/// ```
#[macro_export]
macro_rules! dispatch_pixels {
    ($data:expr, |$px:ident| $body:expr) => {
        match $data {
            $crate::pipeline::FrameData::I8(v) => {
                let $px: &[i8] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::U8(v) => {
                let $px: &[u8] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::I16(v) => {
                let $px: &[i16] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::U16(v) => {
                let $px: &[u16] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::I32(v) => {
                let $px: &[i32] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::U32(v) => {
                let $px: &[u32] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::I64(v) => {
                let $px: &[i64] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::U64(v) => {
                let $px: &[u64] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::F32(v) => {
                let $px: &[f32] = v.as_slice();
                $body
            }
            $crate::pipeline::FrameData::F64(v) => {
                let $px: &[f64] = v.as_slice();
                $body
            }
        }
    };
}

impl FrameData {
    pub fn element_type(&self) -> ElementType {
        match self {
            FrameData::I8(_) => ElementType::I8,
            FrameData::U8(_) => ElementType::U8,
            FrameData::I16(_) => ElementType::I16,
            FrameData::U16(_) => ElementType::U16,
            FrameData::I32(_) => ElementType::I32,
            FrameData::U32(_) => ElementType::U32,
            FrameData::I64(_) => ElementType::I64,
            FrameData::U64(_) => ElementType::U64,
            FrameData::F32(_) => ElementType::F32,
            FrameData::F64(_) => ElementType::F64,
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        dispatch_pixels!(self, |px| px.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a flat index, widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        dispatch_pixels!(self, |px| px.get(index).map(|v| v.to_f64()))
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for FrameData {
                fn from(v: Vec<$ty>) -> Self {
                    FrameData::$variant(v)
                }
            }
        )*
    };
}

impl_from_vec!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

/// One multi-dimensional array delivery with its metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number assigned by the producer.
    pub unique_id: i64,
    /// Device timestamp in seconds.
    pub timestamp: f64,
    /// Wall-clock time at which the producer emitted the frame.
    pub arrival_time: DateTime<Utc>,
    /// Axes, fastest-varying first.
    pub dims: Vec<Dimension>,
    /// Element buffer.
    pub data: FrameData,
    /// Named attributes copied from the producer.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Frame {
    /// Create a frame from data and axis sizes.
    ///
    /// The product of `sizes` should equal the element count; reductions treat
    /// a mismatch as an unsupported layout.
    pub fn new(data: impl Into<FrameData>, sizes: &[usize]) -> Self {
        Self {
            unique_id: 0,
            timestamp: 0.0,
            arrival_time: Utc::now(),
            dims: sizes.iter().take(MAX_DIMS).map(|&s| Dimension::new(s)).collect(),
            data: data.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_unique_id(mut self, unique_id: i64) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Wrap into a shared handle.
    pub fn into_shared(self) -> SharedFrame {
        Arc::new(self)
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Number of elements implied by the dimensions.
    pub fn element_count(&self) -> usize {
        if self.dims.is_empty() {
            return 0;
        }
        self.dims.iter().map(|d| d.size).product()
    }

    /// Whether the dimensions describe the buffer exactly.
    pub fn is_consistent(&self) -> bool {
        self.element_count() == self.data.len()
    }

    /// Size of axis `axis`, or 1 if the frame has fewer axes.
    pub fn size(&self, axis: usize) -> usize {
        self.dims.get(axis).map(|d| d.size).unwrap_or(1)
    }

    /// Dimension sizes padded with zeros to `MAX_DIMS`.
    pub fn dim_sizes(&self) -> [usize; MAX_DIMS] {
        let mut sizes = [0usize; MAX_DIMS];
        for (slot, dim) in sizes.iter_mut().zip(self.dims.iter()) {
            *slot = dim.size;
        }
        sizes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shape() {
        let frame = Frame::new(vec![0u16; 12], &[4, 3]);
        assert_eq!(frame.ndims(), 2);
        assert_eq!(frame.size(0), 4);
        assert_eq!(frame.size(1), 3);
        assert_eq!(frame.size(2), 1);
        assert!(frame.is_consistent());
        assert_eq!(frame.element_type(), ElementType::U16);

        let sizes = frame.dim_sizes();
        assert_eq!(&sizes[..3], &[4, 3, 0]);
    }

    #[test]
    fn test_inconsistent_frame() {
        let frame = Frame::new(vec![1.0f32; 5], &[2, 3]);
        assert!(!frame.is_consistent());
    }

    #[test]
    fn test_dispatch_pixels_widens() {
        let data = FrameData::from(vec![1i32, -2, 3]);
        let sum = dispatch_pixels!(&data, |px| px.iter().map(|v| v.to_f64()).sum::<f64>());
        assert_eq!(sum, 2.0);
        assert_eq!(data.get_f64(1), Some(-2.0));
        assert_eq!(data.get_f64(3), None);
    }

    #[test]
    fn test_attribute_conversion() {
        assert_eq!(AttributeValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(AttributeValue::Text(" 5 ".into()).as_i64(), Some(5));
        assert_eq!(AttributeValue::Float(f64::NAN).as_i64(), None);
        assert_eq!(AttributeValue::Int(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_shared_frame_refcount() {
        let frame = Frame::new(vec![0u8; 4], &[2, 2]).into_shared();
        let second = Arc::clone(&frame);
        assert_eq!(Arc::strong_count(&frame), 2);
        drop(second);
        assert_eq!(Arc::strong_count(&frame), 1);
    }
}

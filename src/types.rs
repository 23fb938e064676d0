//! Core data types shared by the dispatch core and the reduction engine
//!
//! # Main Types
//!
//! - [`ElementType`] - Enum of supported frame element types (u8, i16, f32, etc.)
//! - [`Pixel`] - Numeric conversion trait implemented by every element type
//! - [`ColorMode`] / [`BayerPattern`] - Color layout metadata carried by frame attributes
//!
//! # Element Types
//!
//! Frames carry one of the common detector data types:
//! - Signed integers: i8, i16, i32, i64
//! - Unsigned integers: u8, u16, u32, u64
//! - Floating point: f32, f64
//!
//! Every reduction widens elements to `f64` through [`Pixel::to_f64`], so results
//! do not depend on the storage width.

use serde::{Deserialize, Serialize};

/// Element type of a frame's data buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ElementType {
    /// 8-bit signed integer
    I8,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit signed integer
    I16,
    /// 16-bit unsigned integer
    #[default]
    U16,
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit signed integer
    I64,
    /// 64-bit unsigned integer
    U64,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
}

impl ElementType {
    /// Returns the size in bytes of one element
    pub fn size_bytes(&self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Whether this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    /// Numeric code published for this type (matches the areaDetector ordering)
    pub fn code(&self) -> i64 {
        match self {
            ElementType::I8 => 0,
            ElementType::U8 => 1,
            ElementType::I16 => 2,
            ElementType::U16 => 3,
            ElementType::I32 => 4,
            ElementType::U32 => 5,
            ElementType::I64 => 6,
            ElementType::U64 => 7,
            ElementType::F32 => 8,
            ElementType::F64 => 9,
        }
    }

    /// All element types
    pub fn all() -> &'static [ElementType] {
        &[
            ElementType::I8,
            ElementType::U8,
            ElementType::I16,
            ElementType::U16,
            ElementType::I32,
            ElementType::U32,
            ElementType::I64,
            ElementType::U64,
            ElementType::F32,
            ElementType::F64,
        ]
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::I8 => write!(f, "i8"),
            ElementType::U8 => write!(f, "u8"),
            ElementType::I16 => write!(f, "i16"),
            ElementType::U16 => write!(f, "u16"),
            ElementType::I32 => write!(f, "i32"),
            ElementType::U32 => write!(f, "u32"),
            ElementType::I64 => write!(f, "i64"),
            ElementType::U64 => write!(f, "u64"),
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
        }
    }
}

/// A frame element that can be widened to `f64` for reduction.
pub trait Pixel: Copy + Send + Sync + 'static {
    /// Element type tag for this Rust type
    const ELEMENT_TYPE: ElementType;

    /// Widen to f64
    fn to_f64(self) -> f64;
}

macro_rules! impl_pixel {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Pixel for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$tag;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_pixel!(
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

/// Color layout of a frame, read from the `colorMode` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorMode {
    #[default]
    Mono,
    Bayer,
    Rgb1,
    Rgb2,
    Rgb3,
    Yuv444,
    Yuv422,
    Yuv411,
}

impl ColorMode {
    /// Decode from the integer attribute value, if it is in range
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => ColorMode::Mono,
            1 => ColorMode::Bayer,
            2 => ColorMode::Rgb1,
            3 => ColorMode::Rgb2,
            4 => ColorMode::Rgb3,
            5 => ColorMode::Yuv444,
            6 => ColorMode::Yuv422,
            7 => ColorMode::Yuv411,
            _ => return None,
        })
    }

    pub fn code(&self) -> i64 {
        *self as i64
    }
}

/// Bayer mosaic arrangement, read from the `bayerPattern` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BayerPattern {
    #[default]
    Rggb,
    Gbrg,
    Grbg,
    Bggr,
}

impl BayerPattern {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => BayerPattern::Rggb,
            1 => BayerPattern::Gbrg,
            2 => BayerPattern::Grbg,
            3 => BayerPattern::Bggr,
            _ => return None,
        })
    }

    pub fn code(&self) -> i64 {
        *self as i64
    }
}

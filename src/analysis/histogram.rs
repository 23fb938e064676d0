//! Fixed-range histogram and entropy

use crate::types::Pixel;
use serde::Serialize;

/// Histogram of one frame over `[min, max]`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    /// Counts per bin; a value equal to `max` lands in the last bin
    pub bins: Vec<u64>,
    /// Elements below `min`
    pub below: u64,
    /// Elements above `max`
    pub above: u64,
    /// Shannon entropy in bits over the in-range counts
    pub entropy: f64,
}

impl Histogram {
    /// Number of elements that fell inside the range
    pub fn in_range(&self) -> u64 {
        self.bins.iter().sum()
    }
}

/// Bin `pixels` into `size` equal-width bins over `[min, max]`.
///
/// Returns `None` if `size` is 0 or the range is empty or not finite.
/// NaN elements are not counted anywhere.
pub fn histogram<T: Pixel>(pixels: &[T], size: usize, min: f64, max: f64) -> Option<Histogram> {
    if size == 0 || !min.is_finite() || !max.is_finite() || max <= min {
        return None;
    }

    let scale = size as f64 / (max - min);
    let last = size - 1;
    let mut bins = vec![0u64; size];
    let mut below = 0;
    let mut above = 0;

    for &p in pixels {
        let v = p.to_f64();
        if v < min {
            below += 1;
        } else if v > max {
            above += 1;
        } else if v.is_nan() {
            continue;
        } else {
            let bin = (((v - min) * scale) as usize).min(last);
            bins[bin] += 1;
        }
    }

    let entropy = entropy(&bins);
    Some(Histogram {
        min,
        max,
        bins,
        below,
        above,
        entropy,
    })
}

/// -Σ p·log2(p) over the nonzero bins.
pub fn entropy(bins: &[u64]) -> f64 {
    let total: u64 = bins.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let mut entropy = 0.0;
    for &count in bins.iter().filter(|&&c| c > 0) {
        let p = count as f64 / total;
        entropy -= p * p.log2();
    }
    entropy
}

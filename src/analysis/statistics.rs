//! Basic frame statistics
//!
//! One pass over the elements gives min/max (with coordinates), total,
//! mean and population sigma. An optional edge background estimate turns
//! the total into a net signal.

use crate::types::Pixel;
use serde::Serialize;

/// Result of the basic statistics pass
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BasicStats {
    /// Number of elements
    pub count: usize,
    pub min: f64,
    pub min_x: usize,
    pub min_y: usize,
    pub max: f64,
    pub max_x: usize,
    pub max_y: usize,
    pub mean: f64,
    /// Population standard deviation
    pub sigma: f64,
    /// Sum of all elements
    pub total: f64,
    /// Total minus the background estimate (equal to `total` when the
    /// background width is 0)
    pub net: f64,
}

/// Compute basic statistics over `pixels`, laid out as `dims` (fastest first).
///
/// Coordinates of the extrema are reported over the first two dimensions.
/// Returns `None` for an empty buffer.
pub fn basic_stats<T: Pixel>(
    pixels: &[T],
    dims: &[usize],
    background_width: usize,
) -> Option<BasicStats> {
    if pixels.is_empty() {
        return None;
    }
    let size_x = dims.first().copied().unwrap_or(pixels.len()).max(1);
    let size_y = dims.get(1).copied().unwrap_or(1).max(1);

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut min_index = 0;
    let mut max_index = 0;
    let mut total = 0.0;
    // Welford's running mean / M2
    let mut running_mean = 0.0;
    let mut m2 = 0.0;

    for (i, &p) in pixels.iter().enumerate() {
        let v = p.to_f64();
        if v < min {
            min = v;
            min_index = i;
        }
        if v > max {
            max = v;
            max_index = i;
        }
        total += v;
        let delta = v - running_mean;
        running_mean += delta / (i + 1) as f64;
        m2 += delta * (v - running_mean);
    }

    let n = pixels.len() as f64;
    let net = match background_average(pixels, dims, background_width) {
        Some(background) => total - background * n,
        None => total,
    };

    Some(BasicStats {
        count: pixels.len(),
        min,
        min_x: min_index % size_x,
        min_y: (min_index / size_x) % size_y,
        max,
        max_x: max_index % size_x,
        max_y: (max_index / size_x) % size_y,
        mean: total / n,
        sigma: (m2 / n).max(0.0).sqrt(),
        total,
        net,
    })
}

/// Mean of every element within `width` of either edge of each dimension.
///
/// An element near the edge of two dimensions (a corner) is counted once per
/// dimension. Returns `None` when `width` is 0 or the layout does not match
/// the buffer.
pub fn background_average<T: Pixel>(pixels: &[T], dims: &[usize], width: usize) -> Option<f64> {
    if width == 0 || dims.is_empty() || dims.iter().product::<usize>() != pixels.len() {
        return None;
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    let mut coords = vec![0usize; dims.len()];

    for &p in pixels {
        let v = p.to_f64();
        for (&c, &size) in coords.iter().zip(dims) {
            if c < width || c + width >= size {
                sum += v;
                count += 1;
            }
        }
        for (c, &size) in coords.iter_mut().zip(dims) {
            *c += 1;
            if *c < size {
                break;
            }
            *c = 0;
        }
    }

    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic_stats_2d() {
        // 3 x 2, row-major with x fastest
        let pixels: Vec<u16> = vec![5, 1, 7, 3, 9, 2];
        let stats = basic_stats(&pixels, &[3, 2], 0).unwrap();

        assert_eq!(stats.count, 6);
        assert_eq!(stats.min, 1.0);
        assert_eq!((stats.min_x, stats.min_y), (1, 0));
        assert_eq!(stats.max, 9.0);
        assert_eq!((stats.max_x, stats.max_y), (1, 1));
        assert_eq!(stats.total, 27.0);
        assert_eq!(stats.net, 27.0);
        assert!((stats.mean - 4.5).abs() < 1e-12);

        let var = pixels
            .iter()
            .map(|&v| (v as f64 - 4.5).powi(2))
            .sum::<f64>()
            / 6.0;
        assert!((stats.sigma - var.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_frame_has_zero_sigma() {
        let pixels = vec![42.0f32; 16];
        let stats = basic_stats(&pixels, &[4, 4], 0).unwrap();
        assert_eq!(stats.sigma, 0.0);
        assert_eq!(stats.mean, 42.0);
    }

    #[test]
    fn test_empty_frame() {
        let pixels: Vec<u8> = Vec::new();
        assert!(basic_stats(&pixels, &[0], 0).is_none());
    }

    #[test]
    fn test_net_subtracts_edge_background() {
        // 3 x 3 of ones with a bright center; only the center is off-edge
        let mut pixels = vec![1i32; 9];
        pixels[4] = 10;
        let stats = basic_stats(&pixels, &[3, 3], 1).unwrap();
        assert_eq!(stats.total, 18.0);
        assert_eq!(stats.net, 9.0);
    }

    #[test]
    fn test_background_counts_corners_per_dimension() {
        // 2 x 2: every element is on the edge of both dimensions
        let pixels = vec![1u8, 2, 3, 4];
        let avg = background_average(&pixels, &[2, 2], 1).unwrap();
        assert_eq!(avg, 2.5);
        assert!(background_average(&pixels, &[2, 2], 0).is_none());
        assert!(background_average(&pixels, &[3, 2], 1).is_none());
    }

    proptest! {
        #[test]
        fn prop_mean_between_extrema(pixels in prop::collection::vec(-1000i32..1000, 1..200)) {
            let n = pixels.len();
            let stats = basic_stats(&pixels, &[n], 0).unwrap();
            prop_assert!(stats.min <= stats.mean + 1e-9);
            prop_assert!(stats.mean <= stats.max + 1e-9);
            prop_assert!(stats.sigma >= 0.0);
            prop_assert_eq!(pixels[stats.max_x] as f64, stats.max);
            prop_assert_eq!(pixels[stats.min_x] as f64, stats.min);
        }
    }
}

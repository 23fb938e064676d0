//! Centroid and moment analysis
//!
//! The frame is treated as a 2-D image (a 1-D frame is a single row).
//! Elements at or below the threshold carry no weight. A first pass finds
//! the total mass and the centroid; a second pass accumulates central
//! moments up to fourth order around it.

use crate::types::Pixel;
use serde::Serialize;

/// Normalizers smaller than this make the dependent quantity 0.
pub const SIGMA_EPSILON: f64 = 1e-10;

/// Shape of the thresholded intensity distribution
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CentroidStats {
    /// Sum of the elements above the threshold
    pub total: f64,
    pub x: f64,
    pub y: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    /// Covariance of x and y
    pub sigma_xy: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    /// Excess kurtosis (0 for a normal distribution)
    pub kurtosis_x: f64,
    pub kurtosis_y: f64,
    /// 0 for a circular spot, approaching 1 for a line
    pub eccentricity: f64,
    /// Major axis angle from the x axis, in degrees
    pub orientation: f64,
}

#[derive(Default)]
struct CentralMoments {
    xx: f64,
    yy: f64,
    xy: f64,
    xxx: f64,
    yyy: f64,
    xxxx: f64,
    yyyy: f64,
}

/// Compute the centroid section for a `size_x` by `size_y` image.
///
/// Zero total mass gives all zeros.
pub fn centroid<T: Pixel>(pixels: &[T], size_x: usize, threshold: f64) -> CentroidStats {
    let size_x = size_x.max(1);

    let mut mass = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (y, row) in pixels.chunks(size_x).enumerate() {
        for (x, &p) in row.iter().enumerate() {
            let v = p.to_f64();
            if v > threshold {
                mass += v;
                sum_x += v * x as f64;
                sum_y += v * y as f64;
            }
        }
    }

    if mass <= 0.0 {
        return CentroidStats::default();
    }
    let cx = sum_x / mass;
    let cy = sum_y / mass;

    let mut m = CentralMoments::default();
    for (y, row) in pixels.chunks(size_x).enumerate() {
        let dy = y as f64 - cy;
        for (x, &p) in row.iter().enumerate() {
            let v = p.to_f64();
            if v > threshold {
                let dx = x as f64 - cx;
                let dx2 = dx * dx;
                let dy2 = dy * dy;
                m.xx += v * dx2;
                m.yy += v * dy2;
                m.xy += v * dx * dy;
                m.xxx += v * dx2 * dx;
                m.yyy += v * dy2 * dy;
                m.xxxx += v * dx2 * dx2;
                m.yyyy += v * dy2 * dy2;
            }
        }
    }

    let var_x = m.xx / mass;
    let var_y = m.yy / mass;
    let cov = m.xy / mass;
    let sigma_x = var_x.max(0.0).sqrt();
    let sigma_y = var_y.max(0.0).sqrt();

    CentroidStats {
        total: mass,
        x: cx,
        y: cy,
        sigma_x,
        sigma_y,
        sigma_xy: cov,
        skew_x: ratio(m.xxx / mass, sigma_x.powi(3)),
        skew_y: ratio(m.yyy / mass, sigma_y.powi(3)),
        kurtosis_x: excess_kurtosis(m.xxxx / mass, var_x),
        kurtosis_y: excess_kurtosis(m.yyyy / mass, var_y),
        eccentricity: eccentricity(var_x, var_y, cov),
        orientation: orientation(var_x, var_y, cov),
    }
}

fn ratio(numerator: f64, normalizer: f64) -> f64 {
    if normalizer < SIGMA_EPSILON {
        0.0
    } else {
        numerator / normalizer
    }
}

fn excess_kurtosis(mu4: f64, variance: f64) -> f64 {
    let normalizer = variance * variance;
    if normalizer < SIGMA_EPSILON {
        0.0
    } else {
        mu4 / normalizer - 3.0
    }
}

/// sqrt(1 - λmin/λmax) of the 2x2 covariance matrix.
fn eccentricity(var_x: f64, var_y: f64, cov: f64) -> f64 {
    let half_trace = 0.5 * (var_x + var_y);
    let disc = (0.25 * (var_x - var_y).powi(2) + cov * cov).sqrt();
    let lambda_max = half_trace + disc;
    let lambda_min = half_trace - disc;
    if lambda_max < SIGMA_EPSILON {
        return 0.0;
    }
    (1.0 - lambda_min / lambda_max).clamp(0.0, 1.0).sqrt()
}

fn orientation(var_x: f64, var_y: f64, cov: f64) -> f64 {
    let num = 2.0 * cov;
    let den = var_x - var_y;
    if num.abs() < SIGMA_EPSILON && den.abs() < SIGMA_EPSILON {
        return 0.0;
    }
    (0.5 * num.atan2(den)).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(size_x: usize, size_y: usize, points: &[(usize, usize, u16)]) -> Vec<u16> {
        let mut pixels = vec![0u16; size_x * size_y];
        for &(x, y, v) in points {
            pixels[y * size_x + x] = v;
        }
        pixels
    }

    #[test]
    fn test_single_pixel() {
        let pixels = image(8, 6, &[(5, 2, 100)]);
        let c = centroid(&pixels, 8, 1.0);
        assert_eq!(c.total, 100.0);
        assert_eq!((c.x, c.y), (5.0, 2.0));
        assert_eq!((c.sigma_x, c.sigma_y, c.sigma_xy), (0.0, 0.0, 0.0));
        assert_eq!((c.skew_x, c.skew_y), (0.0, 0.0));
        assert_eq!((c.kurtosis_x, c.kurtosis_y), (0.0, 0.0));
        assert_eq!(c.eccentricity, 0.0);
        assert_eq!(c.orientation, 0.0);
    }

    #[test]
    fn test_threshold_excludes_background() {
        let mut pixels = vec![3u16; 25];
        pixels[2 * 5 + 3] = 50;
        let c = centroid(&pixels, 5, 3.0);
        assert_eq!((c.x, c.y), (3.0, 2.0));
        assert_eq!(c.total, 50.0);
    }

    #[test]
    fn test_zero_mass() {
        let pixels = vec![0.5f32; 9];
        assert_eq!(centroid(&pixels, 3, 1.0), CentroidStats::default());
    }

    #[test]
    fn test_horizontal_pair() {
        // Two equal points at x=1 and x=3: variance 1, mu4 1
        let pixels = image(5, 1, &[(1, 0, 10), (3, 0, 10)]);
        let c = centroid(&pixels, 5, 0.0);
        assert_eq!(c.x, 2.0);
        assert!((c.sigma_x - 1.0).abs() < 1e-12);
        assert_eq!(c.skew_x, 0.0);
        assert!((c.kurtosis_x + 2.0).abs() < 1e-12);
        assert!((c.eccentricity - 1.0).abs() < 1e-12);
        assert!(c.orientation.abs() < 1e-9);
    }

    #[test]
    fn test_vertical_line_orientation() {
        let pixels = image(3, 5, &[(1, 0, 1), (1, 1, 1), (1, 2, 1), (1, 3, 1), (1, 4, 1)]);
        let c = centroid(&pixels, 3, 0.0);
        assert_eq!((c.x, c.y), (1.0, 2.0));
        assert!((c.orientation.abs() - 90.0).abs() < 1e-9);
        assert!((c.eccentricity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_covariance() {
        let pixels = image(3, 3, &[(0, 0, 1), (1, 1, 1), (2, 2, 1)]);
        let c = centroid(&pixels, 3, 0.0);
        assert!((c.sigma_xy - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.orientation - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_skew_sign() {
        // Long tail to the right
        let pixels = image(6, 1, &[(0, 0, 10), (1, 0, 10), (5, 0, 2)]);
        let c = centroid(&pixels, 6, 0.0);
        assert!(c.skew_x > 0.0);
    }

    #[test]
    fn test_circular_spot_is_round() {
        let pixels = image(
            3,
            3,
            &[(1, 0, 5), (0, 1, 5), (1, 1, 20), (2, 1, 5), (1, 2, 5)],
        );
        let c = centroid(&pixels, 3, 0.0);
        assert_eq!((c.x, c.y), (1.0, 1.0));
        assert!(c.eccentricity.abs() < 1e-6);
        assert_eq!(c.orientation, 0.0);
    }
}

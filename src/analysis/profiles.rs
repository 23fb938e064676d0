//! 1-D projection profiles of a 2-D frame
//!
//! For each axis there are four profiles, each as long as that axis:
//! the mean over the other axis, the mean over elements above the
//! threshold, the line through the centroid, and the line through the
//! cursor.

use crate::types::Pixel;
use serde::Serialize;

/// Profile variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProfileKind {
    Average,
    Threshold,
    Centroid,
    Cursor,
}

impl ProfileKind {
    pub fn all() -> &'static [ProfileKind] {
        &[
            ProfileKind::Average,
            ProfileKind::Threshold,
            ProfileKind::Centroid,
            ProfileKind::Cursor,
        ]
    }
}

/// All profiles of one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Profiles {
    pub size_x: usize,
    pub size_y: usize,
    pub average_x: Vec<f64>,
    pub average_y: Vec<f64>,
    pub threshold_x: Vec<f64>,
    pub threshold_y: Vec<f64>,
    pub centroid_x: Vec<f64>,
    pub centroid_y: Vec<f64>,
    pub cursor_x: Vec<f64>,
    pub cursor_y: Vec<f64>,
}

impl Profiles {
    /// Profile along x (`true`) or y (`false`) of the given kind
    pub fn get(&self, along_x: bool, kind: ProfileKind) -> &[f64] {
        match (along_x, kind) {
            (true, ProfileKind::Average) => &self.average_x,
            (false, ProfileKind::Average) => &self.average_y,
            (true, ProfileKind::Threshold) => &self.threshold_x,
            (false, ProfileKind::Threshold) => &self.threshold_y,
            (true, ProfileKind::Centroid) => &self.centroid_x,
            (false, ProfileKind::Centroid) => &self.centroid_y,
            (true, ProfileKind::Cursor) => &self.cursor_x,
            (false, ProfileKind::Cursor) => &self.cursor_y,
        }
    }
}

/// Compute every profile for a `size_x` by `size_y` image.
///
/// `centroid` is the (x, y) position used for the centroid profiles;
/// `cursor` is clamped to the image.
pub fn profiles<T: Pixel>(
    pixels: &[T],
    size_x: usize,
    size_y: usize,
    threshold: f64,
    centroid: (f64, f64),
    cursor: (usize, usize),
) -> Profiles {
    let mut sum_x = vec![0.0; size_x];
    let mut sum_y = vec![0.0; size_y];
    let mut thr_sum_x = vec![0.0; size_x];
    let mut thr_count_x = vec![0usize; size_x];
    let mut thr_sum_y = vec![0.0; size_y];
    let mut thr_count_y = vec![0usize; size_y];

    for (y, row) in pixels.chunks(size_x.max(1)).take(size_y).enumerate() {
        for (x, &p) in row.iter().enumerate() {
            let v = p.to_f64();
            sum_x[x] += v;
            sum_y[y] += v;
            if v > threshold {
                thr_sum_x[x] += v;
                thr_count_x[x] += 1;
                thr_sum_y[y] += v;
                thr_count_y[y] += 1;
            }
        }
    }

    let mean = |sums: Vec<f64>, n: usize| -> Vec<f64> {
        sums.into_iter().map(|s| if n > 0 { s / n as f64 } else { 0.0 }).collect()
    };
    let thresholded = |sums: Vec<f64>, counts: Vec<usize>| -> Vec<f64> {
        sums.into_iter()
            .zip(counts)
            .map(|(s, c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect()
    };

    let row = |y: usize| -> Vec<f64> {
        let start = y * size_x;
        pixels
            .get(start..start + size_x)
            .map(|r| r.iter().map(|p| p.to_f64()).collect())
            .unwrap_or_else(|| vec![0.0; size_x])
    };
    let column = |x: usize| -> Vec<f64> {
        (0..size_y)
            .map(|y| pixels.get(y * size_x + x).map(|p| p.to_f64()).unwrap_or(0.0))
            .collect()
    };

    let centroid_col = clamp_index(centroid.0.round(), size_x);
    let centroid_row = clamp_index(centroid.1.round(), size_y);
    let cursor_col = cursor.0.min(size_x.saturating_sub(1));
    let cursor_row = cursor.1.min(size_y.saturating_sub(1));

    Profiles {
        size_x,
        size_y,
        average_x: mean(sum_x, size_y),
        average_y: mean(sum_y, size_x),
        threshold_x: thresholded(thr_sum_x, thr_count_x),
        threshold_y: thresholded(thr_sum_y, thr_count_y),
        centroid_x: row(centroid_row),
        centroid_y: column(centroid_col),
        cursor_x: row(cursor_row),
        cursor_y: column(cursor_col),
    }
}

fn clamp_index(position: f64, size: usize) -> usize {
    if !position.is_finite() || position <= 0.0 {
        0
    } else {
        (position as usize).min(size.saturating_sub(1))
    }
}

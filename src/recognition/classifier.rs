//! On/off classification of sampled segment colors.

use super::decoder::SegmentPattern;
use super::sampler::{Rgb8, SEGMENT_COUNT};

/// Default luminance threshold (0-255) above which a segment counts as lit.
pub const DEFAULT_THRESHOLD: u8 = 150;

/// Plain channel average of an RGB triple.
pub fn average_intensity(pixel: Rgb8) -> f64 {
    (pixel[0] as f64 + pixel[1] as f64 + pixel[2] as f64) / 3.0
}

/// Returns true when the pixel is strictly brighter than `threshold`.
///
/// A pixel whose average equals the threshold is off.
pub fn classify(pixel: Rgb8, threshold: u8) -> bool {
    average_intensity(pixel) > threshold as f64
}

/// Classifies all seven sampled colors of one digit.
pub fn classify_segments(pixels: &[Rgb8; SEGMENT_COUNT], threshold: u8) -> SegmentPattern {
    SegmentPattern(pixels.map(|p| classify(p, threshold)))
}

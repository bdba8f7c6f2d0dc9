//! Segment sampling inside a digit box.
//!
//! Digit boxes and segment offsets are calibration data in normalized
//! coordinates. Sampling converts them to absolute pixel positions for the
//! frame at hand and reads one RGB value per segment.

use serde::{Deserialize, Serialize};

use crate::capture::Frame;

/// Number of segments in a seven-segment digit.
pub const SEGMENT_COUNT: usize = 7;

/// Color returned for sample points that fall outside the frame.
pub const OUT_OF_FRAME: Rgb8 = [0, 0, 0];

/// A raw RGB triple.
pub type Rgb8 = [u8; 3];

/// One digit's rectangle in normalized frame coordinates (0.0 to 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DigitBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// A point inside a digit box, normalized to the box's own width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentOffset {
    pub x: f64,
    pub y: f64,
}

/// A digit box resolved against concrete frame dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelBox {
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

impl DigitBox {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Converts to absolute pixel coordinates, truncating each edge.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelBox {
        let w = width as f64;
        let h = height as f64;
        PixelBox {
            left: (self.left * w) as i64,
            top: (self.top * h) as i64,
            right: (self.right * w) as i64,
            bottom: (self.bottom * h) as i64,
        }
    }
}

impl SegmentOffset {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Absolute pixel positions of all seven segments of one digit box.
///
/// Positions may lie outside the frame; callers decide what that means.
pub fn sample_points(
    width: u32,
    height: u32,
    digit_box: &DigitBox,
    offsets: &[SegmentOffset; SEGMENT_COUNT],
) -> [(i64, i64); SEGMENT_COUNT] {
    let bx = digit_box.to_pixels(width, height);
    let box_w = bx.width() as f64;
    let box_h = bx.height() as f64;

    offsets.map(|off| {
        (
            bx.left + (off.x * box_w) as i64,
            bx.top + (off.y * box_h) as i64,
        )
    })
}

/// Reads the pixel at an absolute position, or [`OUT_OF_FRAME`] when the
/// position is outside `[0, w) x [0, h)`.
pub fn pixel_at(frame: &Frame, x: i64, y: i64) -> Rgb8 {
    let (w, h) = frame.dimensions();
    if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
        return OUT_OF_FRAME;
    }
    frame.get_pixel(x as u32, y as u32).0
}

/// Samples the seven segment colors of one digit box, in A..G order.
pub fn sample_segments(
    frame: &Frame,
    digit_box: &DigitBox,
    offsets: &[SegmentOffset; SEGMENT_COUNT],
) -> [Rgb8; SEGMENT_COUNT] {
    let (w, h) = frame.dimensions();
    sample_points(w, h, digit_box, offsets).map(|(x, y)| pixel_at(frame, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn centered_offsets() -> [SegmentOffset; SEGMENT_COUNT] {
        [SegmentOffset::new(0.5, 0.5); SEGMENT_COUNT]
    }

    #[test]
    fn test_to_pixels_truncates() {
        let b = DigitBox::new(0.17, 0.44, 0.41, 0.96);
        let px = b.to_pixels(640, 480);
        assert_eq!(px.left, 108); // 108.8
        assert_eq!(px.top, 211); // 211.2
        assert_eq!(px.right, 262); // 262.4
        assert_eq!(px.bottom, 460); // 460.8
    }

    #[test]
    fn test_sample_points_inside_box() {
        let b = DigitBox::new(0.0, 0.0, 0.5, 0.5);
        let offsets = [
            SegmentOffset::new(0.5, 0.125),
            SegmentOffset::new(0.75, 0.25),
            SegmentOffset::new(0.75, 0.75),
            SegmentOffset::new(0.5, 0.875),
            SegmentOffset::new(0.25, 0.75),
            SegmentOffset::new(0.25, 0.25),
            SegmentOffset::new(0.5, 0.5),
        ];
        let points = sample_points(200, 160, &b, &offsets);
        // Box is 100x80 pixels at the origin
        assert_eq!(points[0], (50, 10));
        assert_eq!(points[1], (75, 20));
        assert_eq!(points[3], (50, 70));
        assert_eq!(points[6], (50, 40));
    }

    #[test]
    fn test_sample_reads_frame_pixel() {
        let frame: Frame = ImageBuffer::from_fn(16, 16, |x, y| Rgb([x as u8, y as u8, 7]));
        let b = DigitBox::new(0.25, 0.5, 0.75, 1.0);
        // Box spans x 4..12, y 8..16, centre is (8, 12)
        let colors = sample_segments(&frame, &b, &centered_offsets());
        assert!(colors.iter().all(|c| *c == [8, 12, 7]));
    }

    #[test]
    fn test_out_of_frame_is_black() {
        let frame: Frame = ImageBuffer::from_pixel(10, 10, Rgb([255, 255, 255]));
        // right == 1.0 with an offset of 1.0 lands exactly on x == w
        let b = DigitBox::new(0.5, 0.5, 1.0, 1.0);
        let offsets = [SegmentOffset::new(1.0, 1.0); SEGMENT_COUNT];
        let colors = sample_segments(&frame, &b, &offsets);
        assert!(colors.iter().all(|c| *c == OUT_OF_FRAME));
    }

    #[test]
    fn test_pixel_at_negative() {
        let frame: Frame = ImageBuffer::from_pixel(4, 4, Rgb([200, 200, 200]));
        assert_eq!(pixel_at(&frame, -1, 0), OUT_OF_FRAME);
        assert_eq!(pixel_at(&frame, 0, 4), OUT_OF_FRAME);
        assert_eq!(pixel_at(&frame, 3, 3), [200, 200, 200]);
    }
}

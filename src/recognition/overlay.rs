//! Diagnostic overlay for calibration.
//!
//! Draws each digit box and a marker at every sampled segment point on a
//! copy of the frame. Purely cosmetic: it recomputes positions from the
//! calibration and never feeds back into recognition.

use image::{ImageBuffer, Rgb};

use super::classifier::classify;
use super::sampler::{pixel_at, sample_points};
use super::Calibration;
use crate::capture::Frame;

pub const COLOR_SEGMENT_ON: Rgb<u8> = Rgb([0, 255, 0]); // Green
pub const COLOR_SEGMENT_OFF: Rgb<u8> = Rgb([255, 0, 0]); // Red
pub const COLOR_DIGIT_BOX: Rgb<u8> = Rgb([255, 255, 0]); // Yellow

/// Marker radius in pixels.
pub const MARKER_RADIUS: i64 = 8;

/// Renders digit boxes and sampled points onto a copy of `frame`.
pub fn render_overlay(frame: &Frame, calibration: &Calibration) -> Frame {
    let mut img = frame.clone();
    let (width, height) = frame.dimensions();

    for digit_box in calibration.digit_boxes() {
        let b = digit_box.to_pixels(width, height);
        draw_rect(
            &mut img,
            b.left,
            b.top,
            b.width(),
            b.height(),
            COLOR_DIGIT_BOX,
            2,
        );

        for (x, y) in sample_points(width, height, digit_box, calibration.segment_offsets()) {
            // Color from the untouched source frame, not from earlier markers
            let on = classify(pixel_at(frame, x, y), calibration.threshold());
            let color = if on { COLOR_SEGMENT_ON } else { COLOR_SEGMENT_OFF };
            draw_marker(&mut img, x, y, MARKER_RADIUS, color);
        }
    }

    img
}

/// Draws a rectangle border, clipping anything outside the image.
pub fn draw_rect(
    img: &mut ImageBuffer<Rgb<u8>, Vec<u8>>,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    color: Rgb<u8>,
    thickness: i64,
) {
    for dy in 0..h {
        for dx in 0..w {
            let edge = dx < thickness || dy < thickness || dx >= w - thickness || dy >= h - thickness;
            if edge {
                put_clipped(img, x + dx, y + dy, color);
            }
        }
    }
}

/// Draws a filled disc centred on a point.
pub fn draw_marker(
    img: &mut ImageBuffer<Rgb<u8>, Vec<u8>>,
    cx: i64,
    cy: i64,
    radius: i64,
    color: Rgb<u8>,
) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_clipped(img, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_clipped(img: &mut ImageBuffer<Rgb<u8>, Vec<u8>>, x: i64, y: i64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if x >= 0 && y >= 0 && x < w as i64 && y < h as i64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::testing::{calibration, display_frame};
    use crate::recognition::read_frame;

    #[test]
    fn test_draw_rect() {
        let mut img = ImageBuffer::from_pixel(100, 100, Rgb([0, 0, 0]));
        draw_rect(&mut img, 10, 10, 50, 30, COLOR_DIGIT_BOX, 2);

        assert_eq!(*img.get_pixel(10, 10), COLOR_DIGIT_BOX);
        assert_eq!(*img.get_pixel(59, 39), COLOR_DIGIT_BOX);
        // Interior untouched
        assert_eq!(*img.get_pixel(35, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_marker_clips_at_border() {
        let mut img = ImageBuffer::from_pixel(10, 10, Rgb([0, 0, 0]));
        draw_marker(&mut img, 0, 0, 3, COLOR_SEGMENT_ON);
        assert_eq!(*img.get_pixel(0, 0), COLOR_SEGMENT_ON);
        assert_eq!(*img.get_pixel(3, 0), COLOR_SEGMENT_ON);
        assert_eq!(*img.get_pixel(3, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_overlay_does_not_change_reading() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), Some(0), Some(4)]);
        let before = read_frame(&frame, &cal);

        let overlay = render_overlay(&frame, &cal);
        assert_eq!(overlay.dimensions(), frame.dimensions());
        assert_eq!(read_frame(&frame, &cal), before);

        // Middle segment is drawn last in each box: lit for 2, dark for 0
        assert_eq!(*overlay.get_pixel(8, 16), COLOR_SEGMENT_ON);
        assert_eq!(*overlay.get_pixel(24, 16), COLOR_SEGMENT_OFF);
    }
}

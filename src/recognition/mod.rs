//! Optical seven-segment recognition.
//!
//! This module provides:
//! - Segment sampling at calibrated points inside each digit box
//! - Threshold classification of sampled colors
//! - Pattern-to-digit decoding against a configurable table
//! - Assembly of digits into a reading with a fixed decimal split
//! - A diagnostic overlay marking every sampled point

pub mod assembler;
pub mod classifier;
pub mod decoder;
pub mod overlay;
pub mod sampler;

pub use assembler::{assemble, try_assemble, FALLBACK_READING};
pub use classifier::{classify, classify_segments, DEFAULT_THRESHOLD};
pub use decoder::{DecodedDigit, DigitTable, SegmentPattern, TableEntry, TablePreset};
pub use sampler::{sample_segments, DigitBox, SegmentOffset, SEGMENT_COUNT};

use anyhow::{bail, Result};

use crate::capture::Frame;

/// Validated calibration for one physical display.
#[derive(Clone, Debug)]
pub struct Calibration {
    threshold: u8,
    digit_boxes: Vec<DigitBox>,
    segment_offsets: [SegmentOffset; SEGMENT_COUNT],
    table: DigitTable,
    integer_digit_count: usize,
}

impl Calibration {
    pub fn new(
        threshold: u8,
        digit_boxes: Vec<DigitBox>,
        segment_offsets: &[SegmentOffset],
        table: DigitTable,
        integer_digit_count: usize,
    ) -> Result<Self> {
        let segment_offsets: [SegmentOffset; SEGMENT_COUNT] = match segment_offsets.try_into() {
            Ok(offsets) => offsets,
            Err(_) => bail!(
                "expected {} segment offsets (A..G), got {}",
                SEGMENT_COUNT,
                segment_offsets.len()
            ),
        };
        if digit_boxes.is_empty() {
            bail!("at least one digit box is required");
        }
        for (i, b) in digit_boxes.iter().enumerate() {
            let coords = [b.left, b.top, b.right, b.bottom];
            if coords.iter().any(|c| !(0.0..=1.0).contains(c)) {
                bail!("digit box {} has coordinates outside 0..1: {:?}", i + 1, b);
            }
            if b.left >= b.right || b.top >= b.bottom {
                bail!("digit box {} is empty or inverted: {:?}", i + 1, b);
            }
        }
        for (i, o) in segment_offsets.iter().enumerate() {
            if !(0.0..=1.0).contains(&o.x) || !(0.0..=1.0).contains(&o.y) {
                bail!("segment offset {} lies outside its box: {:?}", i, o);
            }
        }
        if integer_digit_count > digit_boxes.len() {
            bail!(
                "integer_digit_count {} exceeds the {} digit boxes",
                integer_digit_count,
                digit_boxes.len()
            );
        }

        Ok(Self {
            threshold,
            digit_boxes,
            segment_offsets,
            table,
            integer_digit_count,
        })
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn digit_boxes(&self) -> &[DigitBox] {
        &self.digit_boxes
    }

    pub fn segment_offsets(&self) -> &[SegmentOffset; SEGMENT_COUNT] {
        &self.segment_offsets
    }

    pub fn table(&self) -> &DigitTable {
        &self.table
    }

    pub fn integer_digit_count(&self) -> usize {
        self.integer_digit_count
    }
}

/// Everything recognized from one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReading {
    pub patterns: Vec<SegmentPattern>,
    pub digits: Vec<DecodedDigit>,
    /// `None` when the fallback applies.
    pub value: Option<f64>,
}

impl FrameReading {
    /// The reading with the fallback substituted.
    pub fn reading(&self) -> f64 {
        self.value.unwrap_or(FALLBACK_READING)
    }

    pub fn is_fallback(&self) -> bool {
        self.value.is_none()
    }

    /// Digits as a compact string, `?` for unrecognized ones.
    pub fn digits_text(&self) -> String {
        self.digits.iter().map(|d| d.to_string()).collect()
    }
}

/// Runs sampling, classification, decoding and assembly over every digit box.
pub fn read_frame(frame: &Frame, calibration: &Calibration) -> FrameReading {
    let patterns: Vec<SegmentPattern> = calibration
        .digit_boxes
        .iter()
        .map(|b| {
            let pixels = sample_segments(frame, b, &calibration.segment_offsets);
            classify_segments(&pixels, calibration.threshold)
        })
        .collect();

    let digits: Vec<DecodedDigit> = patterns.iter().map(|p| calibration.table.decode(p)).collect();
    let value = try_assemble(&digits, calibration.integer_digit_count);

    FrameReading {
        patterns,
        digits,
        value,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_read_frame_end_to_end() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), Some(0), Some(4)]);
        let reading = read_frame(&frame, &cal);
        assert_eq!(reading.digits_text(), "204");
        assert_eq!(reading.value, Some(20.4));
        assert!(!reading.is_fallback());
    }

    #[test]
    fn test_read_frame_dark_digit_falls_back() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), None, Some(4)]);
        let reading = read_frame(&frame, &cal);
        assert_eq!(reading.patterns[1].to_string(), "0000000");
        assert_eq!(reading.digits[1], DecodedDigit::Unrecognized);
        assert_eq!(reading.reading(), FALLBACK_READING);
        assert!(reading.is_fallback());
        assert_eq!(reading.digits_text(), "2?4");
    }

    #[test]
    fn test_calibration_rejects_bad_geometry() {
        let table = || DigitTable::from_preset(TablePreset::Standard).unwrap();
        assert!(Calibration::new(150, boxes(), &offsets()[..6], table(), 2).is_err());
        assert!(Calibration::new(150, vec![], &offsets(), table(), 0).is_err());
        assert!(Calibration::new(150, boxes(), &offsets(), table(), 4).is_err());

        let inverted = vec![DigitBox::new(0.5, 0.0, 0.2, 1.0)];
        assert!(Calibration::new(150, inverted, &offsets(), table(), 1).is_err());

        let outside = vec![DigitBox::new(0.5, 0.0, 1.2, 1.0)];
        assert!(Calibration::new(150, outside, &offsets(), table(), 1).is_err());
    }
}

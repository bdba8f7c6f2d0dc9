//! Seven-segment pattern decoding.
//!
//! The pattern-to-digit table is calibration data: physical displays differ
//! in segment polarity and wiring order, so the table is loaded from
//! configuration and built once. Two presets ship for the displays seen so far.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::sampler::SEGMENT_COUNT;

/// Segment on/off states in canonical A..G order.
///
/// Serialized as a 7-character string of `1`/`0`, e.g. `"1111110"` for 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentPattern(pub [bool; SEGMENT_COUNT]);

impl fmt::Display for SegmentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for on in self.0 {
            f.write_str(if on { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for SegmentPattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != SEGMENT_COUNT {
            bail!(
                "segment pattern {:?} must have {} characters, got {}",
                s,
                SEGMENT_COUNT,
                chars.len()
            );
        }
        let mut bits = [false; SEGMENT_COUNT];
        for (bit, c) in bits.iter_mut().zip(chars) {
            *bit = match c {
                '1' => true,
                '0' => false,
                other => return Err(anyhow!("invalid segment state {:?} in {:?}", other, s)),
            };
        }
        Ok(Self(bits))
    }
}

impl TryFrom<String> for SegmentPattern {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SegmentPattern> for String {
    fn from(p: SegmentPattern) -> Self {
        p.to_string()
    }
}

/// Result of decoding one digit box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedDigit {
    Digit(u8),
    /// The pattern has no table entry. Expected for blurred or
    /// mid-transition frames.
    Unrecognized,
}

impl DecodedDigit {
    pub fn value(self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(d),
            Self::Unrecognized => None,
        }
    }
}

impl fmt::Display for DecodedDigit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digit(d) => write!(f, "{}", d),
            Self::Unrecognized => write!(f, "?"),
        }
    }
}

/// One row of a configured table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub pattern: SegmentPattern,
    pub digit: u8,
}

/// Built-in tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TablePreset {
    /// Conventional A..G wiring used by the scanner rig.
    Standard,
    /// The second polarity/order convention seen on the bench display.
    Alternate,
}

const T: bool = true;
const F: bool = false;

const STANDARD: [([bool; SEGMENT_COUNT], u8); 10] = [
    ([T, T, T, T, T, T, F], 0),
    ([F, T, T, F, F, F, F], 1),
    ([T, T, F, T, T, F, T], 2),
    ([T, T, T, T, F, F, T], 3),
    ([F, T, T, F, F, T, T], 4),
    ([T, F, T, T, F, T, T], 5),
    ([T, F, T, T, T, T, T], 6),
    ([T, T, T, F, F, F, F], 7),
    ([T, T, T, T, T, T, T], 8),
    ([T, T, T, T, F, T, T], 9),
];

const ALTERNATE: [([bool; SEGMENT_COUNT], u8); 10] = [
    ([T, T, T, F, T, T, T], 0),
    ([F, F, T, F, F, T, F], 1),
    ([T, F, T, T, T, F, T], 2),
    ([T, F, T, T, F, T, T], 3),
    ([F, T, T, T, F, T, F], 4),
    ([T, T, F, T, F, T, T], 5),
    ([T, T, F, T, T, T, T], 6),
    ([T, F, T, F, F, T, F], 7),
    ([T, T, T, T, T, T, T], 8),
    ([T, T, T, T, F, T, F], 9),
];

impl TablePreset {
    pub fn entries(self) -> Vec<TableEntry> {
        let rows = match self {
            Self::Standard => &STANDARD,
            Self::Alternate => &ALTERNATE,
        };
        rows.iter()
            .map(|&(bits, digit)| TableEntry {
                pattern: SegmentPattern(bits),
                digit,
            })
            .collect()
    }
}

/// Immutable pattern-to-digit lookup.
#[derive(Clone, Debug)]
pub struct DigitTable {
    map: HashMap<SegmentPattern, u8>,
}

impl DigitTable {
    /// Builds a table, requiring exactly ten distinct patterns covering
    /// digits 0 through 9 once each.
    pub fn new(entries: &[TableEntry]) -> Result<Self> {
        if entries.len() != 10 {
            bail!("digit table needs 10 entries, got {}", entries.len());
        }
        let mut map = HashMap::with_capacity(entries.len());
        let mut seen_digits = [false; 10];
        for entry in entries {
            let slot = seen_digits
                .get_mut(entry.digit as usize)
                .ok_or_else(|| anyhow!("digit {} is out of range 0-9", entry.digit))?;
            if *slot {
                bail!("digit {} appears twice in the table", entry.digit);
            }
            *slot = true;
            if map.insert(entry.pattern, entry.digit).is_some() {
                bail!("pattern {} appears twice in the table", entry.pattern);
            }
        }
        Ok(Self { map })
    }

    pub fn from_preset(preset: TablePreset) -> Result<Self> {
        Self::new(&preset.entries())
    }

    pub fn decode(&self, pattern: &SegmentPattern) -> DecodedDigit {
        self.map
            .get(pattern)
            .map_or(DecodedDigit::Unrecognized, |&d| DecodedDigit::Digit(d))
    }

    /// Reverse lookup, used to synthesize test frames and overlays.
    pub fn pattern_for(&self, digit: u8) -> Option<SegmentPattern> {
        self.map
            .iter()
            .find_map(|(p, &d)| (d == digit).then_some(*p))
    }
}

// iio-ndso/src/pattern.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Converter test patterns.
//!
//! The high-speed ADCs can replace their samples with fixed patterns to
//! check the digital interface. A capture of both channels in test mode
//! is a sequence of 32-bit words, each holding one sample of each
//! channel, which must match the pattern.

use std::fmt;

/// A converter test pattern and the words it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestPattern {
    /// The name to show the user
    pub name: &'static str,
    /// The value written to the `in_voltageN_test_mode` attributes
    pub mode: &'static str,
    /// First expected word
    pub pat1: u32,
    /// Second expected word
    pub pat2: u32,
}

const fn pattern(name: &'static str, mode: &'static str, pat1: u32, pat2: u32) -> TestPattern {
    TestPattern {
        name,
        mode,
        pat1,
        pat2,
    }
}

/// Patterns of the 14-bit AD9643 style converters.
pub const GENERIC_PATTERNS: [TestPattern; 5] = [
    pattern("Midscale Short", "midscale_short", 0x0000_0000, 0x0000_0000),
    pattern("Positive Full Scale", "pos_fullscale", 0x1FFF_1FFF, 0x1FFF_1FFF),
    pattern("Negative Full Scale", "neg_fullscale", 0xE000_E000, 0xE000_E000),
    pattern("Alternating Checkerboard", "checkerboard", 0x2AAA_1555, 0x1555_2AAA),
    pattern("One Zero Word Toggle", "one_zero_toggle", 0xFFFF_0000, 0x0000_FFFF),
];

/// Patterns of the 16-bit AD9467 and AD9265.
pub const AD9467_PATTERNS: [TestPattern; 5] = [
    pattern("Midscale Short", "midscale_short", 0x0000_0000, 0x0000_0000),
    pattern("Positive Full Scale", "pos_fullscale", 0x7FFF_7FFF, 0x7FFF_7FFF),
    pattern("Negative Full Scale", "neg_fullscale", 0x8000_8000, 0x8000_8000),
    pattern("Alternating Checkerboard", "checkerboard", 0xAAAA_5555, 0x5555_AAAA),
    pattern("One Zero Word Toggle", "one_zero_toggle", 0xFFFF_0000, 0x0000_FFFF),
];

/// Patterns of the AD9250, which uses offset binary.
pub const AD9250_PATTERNS: [TestPattern; 5] = [
    pattern("Midscale Short", "midscale_short", 0x2000_2000, 0x2000_2000),
    pattern("Positive Full Scale", "pos_fullscale", 0x3FFF_3FFF, 0x3FFF_3FFF),
    pattern("Negative Full Scale", "neg_fullscale", 0x0000_0000, 0x0000_0000),
    pattern("Alternating Checkerboard", "checkerboard", 0x2AAA_1555, 0x1555_2AAA),
    pattern("One Zero Word Toggle", "one_zero_toggle", 0x3FFF_0000, 0x0000_3FFF),
];

/// The family of a converter, as far as test patterns go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcId {
    /// AD9643 and anything not otherwise known
    Generic,
    /// AD9467 or AD9265
    Ad9467,
    /// AD9250
    Ad9250,
}

impl AdcId {
    /// Identifies a converter from the name of its IIO device, such as
    /// `cf-ad9467-core-lpc`.
    pub fn from_device_name(name: &str) -> AdcId {
        if name.starts_with("cf-ad9467") || name.starts_with("cf-ad9265") {
            AdcId::Ad9467
        }
        else if name.starts_with("cf-ad9250") {
            AdcId::Ad9250
        }
        else {
            AdcId::Generic
        }
    }

    /// Gets the test patterns of the converter.
    pub fn patterns(self) -> &'static [TestPattern] {
        match self {
            AdcId::Generic => &GENERIC_PATTERNS,
            AdcId::Ad9467 => &AD9467_PATTERNS,
            AdcId::Ad9250 => &AD9250_PATTERNS,
        }
    }
}

/// A word that didn't match the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternFailure {
    /// Position of the word in the capture
    pub index: usize,
    /// The word
    pub word: u32,
    /// The word after it, if any
    pub next: Option<u32>,
}

/// The result of checking a capture against a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternReport {
    /// Number of words that didn't match
    pub errors: usize,
    /// The first word that didn't match
    pub first_failure: Option<PatternFailure>,
}

impl PatternReport {
    /// Whether every word matched.
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

impl fmt::Display for PatternReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first_failure {
            None => write!(f, "PASSED"),
            Some(fail) => {
                write!(f, "FAILED: {} errors, first 0x{:X}", self.errors, fail.word)?;
                if let Some(next) = fail.next {
                    write!(f, " 0x{:X}", next)?;
                }
                write!(f, " at {}", fail.index)
            }
        }
    }
}

/// Checks captured words against a pair of pattern words.
///
/// A word matches if it equals either pattern word, or the pair
/// swapped across the half-words, as happens when the channels of
/// an alternating pattern are out of phase.
pub fn verify_test_pattern(words: &[u32], pat1: u32, pat2: u32) -> PatternReport {
    let swap1 = (pat1 >> 16) | (pat2 << 16);
    let swap2 = (pat2 >> 16) | (pat1 << 16);

    let mut report = PatternReport::default();
    for (index, &word) in words.iter().enumerate() {
        if word == pat1 || word == pat2 || word == swap1 || word == swap2 {
            continue;
        }
        report.errors += 1;
        if report.first_failure.is_none() {
            report.first_failure = Some(PatternFailure {
                index,
                word,
                next: words.get(index + 1).copied(),
            });
        }
    }
    report
}

/// Reinterprets a raw capture as native-endian 32-bit words.
///
/// Trailing bytes that don't fill a word are ignored.
pub fn words_from_bytes(raw: &[u8]) -> Vec<u32> {
    raw.chunks_exact(4)
        .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids() {
        assert_eq!(AdcId::from_device_name("cf-ad9643-core-lpc"), AdcId::Generic);
        assert_eq!(AdcId::from_device_name("cf-ad9467-core-lpc"), AdcId::Ad9467);
        assert_eq!(AdcId::from_device_name("cf-ad9265-core-lpc"), AdcId::Ad9467);
        assert_eq!(AdcId::from_device_name("cf-ad9250-core-lpc"), AdcId::Ad9250);
        assert_eq!(AdcId::from_device_name("ad7476"), AdcId::Generic);

        assert_eq!(AdcId::Ad9250.patterns()[0].pat1, 0x2000_2000);
        assert_eq!(AdcId::Ad9467.patterns()[1].pat1, 0x7FFF_7FFF);
        assert!(AdcId::Generic
            .patterns()
            .iter()
            .all(|p| !p.name.is_empty() && !p.mode.is_empty()));
    }

    #[test]
    fn zero_pattern_passes() {
        let report = verify_test_pattern(&[0; 64], 0, 0);
        assert_eq!(report.errors, 0);
        assert!(report.passed());
        assert_eq!(report.first_failure, None);
        assert_eq!(report.to_string(), "PASSED");
    }

    #[test]
    fn one_bad_word() {
        let mut words = [0u32; 16];
        words[5] = 0xDEAD_BEEF;
        let report = verify_test_pattern(&words, 0, 0);
        assert_eq!(report.errors, 1);
        assert!(!report.passed());
        assert_eq!(
            report.first_failure,
            Some(PatternFailure {
                index: 5,
                word: 0xDEAD_BEEF,
                next: Some(0)
            })
        );
    }

    #[test]
    fn first_failure_is_kept() {
        let report = verify_test_pattern(&[1, 0, 2], 0, 0);
        assert_eq!(report.errors, 2);
        let fail = report.first_failure.unwrap();
        assert_eq!(fail.index, 0);
        assert_eq!(fail.next, Some(0));
        assert_eq!(report.to_string(), "FAILED: 2 errors, first 0x1 0x0 at 0");

        let report = verify_test_pattern(&[0, 7], 0, 0);
        assert_eq!(report.first_failure.unwrap().next, None);
        assert_eq!(report.to_string(), "FAILED: 1 errors, first 0x7 at 1");
    }

    #[test]
    fn swapped_half_words_match() {
        let p = GENERIC_PATTERNS[3];
        let words = [p.pat1, p.pat2, 0x1555_1555, 0x2AAA_2AAA];
        let report = verify_test_pattern(&words, p.pat1, p.pat2);
        assert!(report.passed());

        let toggle = GENERIC_PATTERNS[4];
        let words = [0xFFFF_0000, 0x0000_FFFF, 0xFFFF_FFFF, 0x0000_0000];
        let report = verify_test_pattern(&words, toggle.pat1, toggle.pat2);
        assert!(report.passed());

        let report = verify_test_pattern(&[0x1234_5678], toggle.pat1, toggle.pat2);
        assert_eq!(report.errors, 1);
    }

    #[test]
    fn bytes_to_words() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x1FFF_1FFFu32.to_ne_bytes());
        raw.extend_from_slice(&0xE000_E000u32.to_ne_bytes());
        raw.push(0xAA);
        assert_eq!(words_from_bytes(&raw), vec![0x1FFF_1FFF, 0xE000_E000]);
        assert!(words_from_bytes(&[1, 2]).is_empty());
    }
}

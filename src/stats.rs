// iio-ndso/src/stats.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Time-domain statistics of a capture.

use std::fmt;

use crate::{Error, Result};

/// Minimum, maximum and mean of the raw samples of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    /// The smallest sample
    pub min: i32,
    /// The largest sample
    pub max: i32,
    /// The arithmetic mean
    pub avg: f64,
}

impl fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Min:{} Max:{} Avg:{:4.3}", self.min, self.max, self.avg)
    }
}

/// Computes the statistics of each channel of an interleaved capture.
///
/// `data` holds `count` records of `samples_per_scan` 16-bit samples.
/// Only one or two samples per scan are supported.
pub fn compute_channel_stats(
    data: &[i16],
    samples_per_scan: usize,
    count: usize,
) -> Result<Vec<ChannelStats>> {
    if !(1..=2).contains(&samples_per_scan) {
        return Err(Error::UnsupportedChannelCount(samples_per_scan));
    }
    if count == 0 || data.len() < count * samples_per_scan {
        return Err(Error::BufferTooShort);
    }

    let stats = (0..samples_per_scan)
        .map(|ch| {
            let mut min = i32::MAX;
            let mut max = i32::MIN;
            let mut sum: i64 = 0;

            for val in data
                .chunks_exact(samples_per_scan)
                .take(count)
                .map(|rec| i32::from(rec[ch]))
            {
                min = min.min(val);
                max = max.max(val);
                sum += i64::from(val);
            }

            ChannelStats {
                min,
                max,
                avg: sum as f64 / count as f64,
            }
        })
        .collect();

    Ok(stats)
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

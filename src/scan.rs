// iio-ndso/src/scan.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Decoding of captured scan records.
//!
//! A capture is a run of scan records laid back to back. Each record holds
//! one sample of every enabled channel, at the location given by the
//! channel's layout. Decoding pulls each sample out, masks and sign
//! extends it, and converts it to physical units as
//! `(raw + offset) * scale`.
//!
//! Only 16-bit and 64-bit storage is decoded. An uncalibrated 64-bit
//! channel is taken to be the timestamp and comes out as an integer
//! delta from a reference time rather than as a scaled value.
//!

use std::{fmt, io::Write};

use crate::{
    channel::{Channel, Endian},
    Error, Result,
};

/// A raw sample value after masking and sign extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue {
    /// A value from a signed channel
    Signed(i64),
    /// A value from an unsigned channel
    Unsigned(u64),
}

impl RawValue {
    /// The value as a floating-point number.
    pub fn as_f64(self) -> f64 {
        match self {
            RawValue::Signed(v) => v as f64,
            RawValue::Unsigned(v) => v as f64,
        }
    }

    /// The value as a signed integer, wrapping unsigned values that
    /// don't fit.
    pub fn as_i64(self) -> i64 {
        match self {
            RawValue::Signed(v) => v,
            RawValue::Unsigned(v) => v as i64,
        }
    }
}

/// A decoded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// A value in physical units
    Value(f64),
    /// A timestamp, relative to the reference time of the decode
    Timestamp(i64),
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Value(v) => write!(f, "{:.6}", v),
            Sample::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

/// Sign extends a 16-bit pattern with `bits` significant bits.
///
/// If the top significant bit is set, the bits above it are filled with
/// ones, otherwise the pattern is just masked.
pub fn extend_16(raw: u16, bits: u32, mask: u64) -> i16 {
    let mask = mask as u16;
    if bits > 0 && bits <= 16 && (raw >> (bits - 1)) & 1 != 0 {
        ((raw & mask) | !mask) as i16
    }
    else {
        (raw & mask) as i16
    }
}

/// Sign extends a 64-bit pattern with `bits` significant bits.
pub fn extend_64(raw: u64, bits: u32, mask: u64) -> i64 {
    if bits > 0 && bits <= 64 && (raw >> (bits - 1)) & 1 != 0 {
        ((raw & mask) | !mask) as i64
    }
    else {
        (raw & mask) as i64
    }
}

/// Reads the raw value of a channel from a scan record.
///
/// Returns `None` if the channel's storage isn't 2 or 8 bytes, or if it
/// doesn't fit in the record.
pub fn raw_value(record: &[u8], chan: &Channel) -> Option<RawValue> {
    let fmt = chan.data_format();
    let off = chan.byte_offset();
    let bytes = record.get(off..off + chan.storage_bytes())?;

    match bytes.len() {
        2 => {
            let arr = [bytes[0], bytes[1]];
            let raw = match fmt.endian() {
                Endian::Little => u16::from_le_bytes(arr),
                Endian::Big => u16::from_be_bytes(arr),
            };
            Some(if fmt.is_signed() {
                RawValue::Signed(i64::from(extend_16(raw, fmt.bits(), fmt.mask())))
            }
            else {
                RawValue::Unsigned(u64::from(raw) & fmt.mask())
            })
        }
        8 => {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(bytes);
            let raw = match fmt.endian() {
                Endian::Little => u64::from_le_bytes(arr),
                Endian::Big => u64::from_be_bytes(arr),
            };
            Some(if fmt.is_signed() {
                RawValue::Signed(extend_64(raw, fmt.bits(), fmt.mask()))
            }
            else {
                RawValue::Unsigned(raw & fmt.mask())
            })
        }
        _ => None,
    }
}

/// Decodes one scan record, in channel order.
///
/// Channels with unsupported storage produce no sample. The timestamp
/// channel is reported relative to `ts_ref`.
pub fn decode_record(record: &[u8], channels: &[Channel], ts_ref: i64) -> Vec<Sample> {
    channels
        .iter()
        .filter_map(|chan| {
            let raw = raw_value(record, chan)?;
            if chan.is_timestamp() {
                Some(Sample::Timestamp(raw.as_i64().wrapping_sub(ts_ref)))
            }
            else {
                Some(Sample::Value((raw.as_f64() + chan.offset()) * chan.scale()))
            }
        })
        .collect()
}

// Checks that `count` records fit in the data and that every channel
// fits in a record.
fn check_scan(raw: &[u8], channels: &[Channel], count: usize, record_size: usize) -> Result<()> {
    if record_size == 0 {
        return Err(Error::InvalidConfig("zero-length scan record".into()));
    }
    if let Some(chan) = channels
        .iter()
        .find(|chan| chan.byte_offset() + chan.storage_bytes() > record_size)
    {
        return Err(Error::InvalidConfig(format!(
            "channel '{}' lies outside the {} byte record",
            chan.name(),
            record_size
        )));
    }
    match count.checked_mul(record_size) {
        Some(n) if n <= raw.len() => Ok(()),
        _ => Err(Error::BufferTooShort),
    }
}

/// Decodes `count` scan records of `record_size` bytes from `raw`.
pub fn decode_scan(
    raw: &[u8],
    channels: &[Channel],
    count: usize,
    record_size: usize,
    ts_ref: i64,
) -> Result<Vec<Vec<Sample>>> {
    check_scan(raw, channels, count, record_size)?;
    Ok(raw
        .chunks_exact(record_size)
        .take(count)
        .map(|rec| decode_record(rec, channels, ts_ref))
        .collect())
}

/// Gets the raw timestamp of the first record, or zero if there's no
/// timestamp channel.
pub fn first_timestamp(raw: &[u8], channels: &[Channel]) -> i64 {
    channels
        .iter()
        .find(|chan| chan.is_timestamp())
        .and_then(|chan| raw_value(raw, chan))
        .map(RawValue::as_i64)
        .unwrap_or(0)
}

/// Extracts the unscaled values of the 16-bit channels, interleaved one
/// record after another.
///
/// Returns the samples and the number of samples per record.
pub fn raw_i16_samples(
    raw: &[u8],
    channels: &[Channel],
    count: usize,
    record_size: usize,
) -> Result<(Vec<i16>, usize)> {
    check_scan(raw, channels, count, record_size)?;
    let chans: Vec<&Channel> = channels
        .iter()
        .filter(|chan| chan.storage_bytes() == 2)
        .collect();

    let mut data = Vec::with_capacity(count * chans.len());
    for rec in raw.chunks_exact(record_size).take(count) {
        for chan in &chans {
            if let Some(val) = raw_value(rec, chan) {
                data.push(val.as_i64() as i16);
            }
        }
    }
    Ok((data, chans.len()))
}

/// Writes decoded rows as text, one record per line with the samples
/// separated by spaces.
pub fn write_rows<W: Write>(mut out: W, rows: &[Vec<Sample>]) -> std::io::Result<()> {
    for row in rows {
        let line: Vec<String> = row.iter().map(Sample::to_string).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

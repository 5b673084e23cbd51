// iio-ndso/src/channel.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Industrial I/O Channels
//!
//! The channels of a buffered device are described by the files in its
//! `scan_elements` directory. This module reads those descriptions and
//! lays the enabled channels out inside a scan record.
//!

use std::{
    collections::BTreeSet,
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::debug;

use crate::attr::{read_attr, read_attr_str};
use crate::{Error, Result};

/// The name of the per-device directory describing the scan channels.
pub const SCAN_ELEMENTS_DIR: &str = "scan_elements";

/// Byte order of the samples of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Little endian
    Little,
    /// Big endian
    Big,
}

impl Endian {
    /// The byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        }
        else {
            Endian::Little
        }
    }
}

/// The format of a data sample, parsed from a channel's `_type` attribute.
///
/// The attribute looks like `s16/16>>0`, optionally preceded by a byte
/// order such as `le:`. The first character is `s` for signed samples,
/// anything else is unsigned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataFormat {
    is_signed: bool,
    bits: u32,
    length: u32,
    shift: u32,
    mask: u64,
    endian: Endian,
}

impl DataFormat {
    /// Creates a format for `bits` significant bits in `length` bits of
    /// storage, using the host byte order.
    pub fn new(is_signed: bool, bits: u32, length: u32, shift: u32) -> Self {
        let mask = if bits >= 64 { !0 } else { (1u64 << bits) - 1 };
        DataFormat {
            is_signed,
            bits,
            length,
            shift,
            mask,
            endian: Endian::native(),
        }
    }

    /// Gets total length of the sample, in bits.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Gets the length of valid data in the sample, in bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Right-shift the hardware applied to the sample.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Mask of the valid data bits.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Determines if the sample is signed
    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    /// Determines if the sample is in big-endian format
    pub fn is_big_endian(&self) -> bool {
        self.endian == Endian::Big
    }

    /// The byte order of the sample
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The number of bytes required to hold a single sample from the channel.
    pub fn byte_length(&self) -> usize {
        (self.length / 8) as usize
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (endian, desc) = match s.split_once(':') {
            Some(("le", desc)) => (Endian::Little, desc),
            Some(("be", desc)) => (Endian::Big, desc),
            Some((other, _)) => return Err(format!("unknown byte order '{}'", other)),
            None => (Endian::native(), s),
        };

        let mut chars = desc.chars();
        let is_signed = match chars.next() {
            Some(c) => c == 's',
            None => return Err("empty type descriptor".into()),
        };
        let rest = chars.as_str();

        let (bits, rest) = rest
            .split_once('/')
            .ok_or_else(|| format!("missing storage size in '{}'", s))?;
        let (length, shift) = rest
            .split_once(">>")
            .ok_or_else(|| format!("missing shift in '{}'", s))?;

        let num = |v: &str| {
            v.parse::<u32>()
                .map_err(|_| format!("bad number '{}' in '{}'", v, s))
        };
        let (bits, length, shift) = (num(bits)?, num(length)?, num(shift)?);

        if length == 0 || length % 8 != 0 || length > 64 {
            return Err(format!("unsupported storage of {} bits", length));
        }
        if bits == 0 || bits > length {
            return Err(format!("{} bits don't fit in {} bits of storage", bits, length));
        }

        Ok(DataFormat {
            endian,
            ..DataFormat::new(is_signed, bits, length, shift)
        })
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endian = if self.is_big_endian() { "be" } else { "le" };
        let sign = if self.is_signed { 's' } else { 'u' };
        write!(f, "{}:{}{}/{}>>{}", endian, sign, self.bits, self.length, self.shift)
    }
}

// --------------------------------------------------------------------------

/// An enabled channel of a buffered device, as it appears in a scan record.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    name: String,
    generic_name: String,
    scale: f64,
    offset: f64,
    index: u32,
    format: DataFormat,
    location: usize,
}

impl Channel {
    /// Creates a channel description with unit scale and zero offset.
    pub fn new(name: &str, index: u32, format: DataFormat) -> Self {
        Channel {
            name: name.to_string(),
            generic_name: generic_name(name),
            scale: 1.0,
            offset: 0.0,
            index,
            format,
            location: 0,
        }
    }

    /// Sets the scale used to convert raw values to physical units.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the offset added to raw values before scaling.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// The channel name, like `in_voltage0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name without any digits, like `in_voltage`.
    pub fn generic_name(&self) -> &str {
        &self.generic_name
    }

    /// The scale to convert to physical units.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The offset to apply before scaling.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The hardware scan index of the channel.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The sample format.
    pub fn data_format(&self) -> DataFormat {
        self.format
    }

    /// Bytes the sample occupies in a scan record.
    pub fn storage_bytes(&self) -> usize {
        self.format.byte_length()
    }

    /// Number of significant bits in the sample.
    pub fn bits_used(&self) -> u32 {
        self.format.bits()
    }

    /// Mask of the significant bits.
    pub fn bit_mask(&self) -> u64 {
        self.format.mask()
    }

    /// The shift the hardware applied to the sample.
    pub fn shift(&self) -> u32 {
        self.format.shift()
    }

    /// Whether the sample is signed.
    pub fn is_signed(&self) -> bool {
        self.format.is_signed()
    }

    /// The offset of the sample from the start of a scan record.
    pub fn byte_offset(&self) -> usize {
        self.location
    }

    /// Whether this looks like the free-running timestamp channel:
    /// eight bytes wide with no calibration.
    pub fn is_timestamp(&self) -> bool {
        self.storage_bytes() == 8 && self.scale == 1.0 && self.offset == 0.0
    }
}

/// Gets the generic name of a channel by dropping all the digits.
///
/// This is the name used for attributes shared by several channels, such
/// as `in_voltage_scale`.
pub fn generic_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Assigns each channel its location in a scan record and returns the
/// size of the record.
///
/// The channels are packed in slice order, each one aligned to a multiple
/// of its own size.
pub fn scan_size(channels: &mut [Channel]) -> usize {
    let mut bytes = 0;
    for chan in channels.iter_mut() {
        let sz = chan.storage_bytes();
        if sz > 0 && bytes % sz != 0 {
            bytes += sz - bytes % sz;
        }
        chan.location = bytes;
        bytes += sz;
    }
    bytes
}

// --------------------------------------------------------------------------

/// The ordered set of enabled channels of a device and the size of a
/// scan record that holds one sample from each of them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanLayout {
    channels: Vec<Channel>,
    record_size: usize,
}

impl ScanLayout {
    /// Sorts the channels by index, then lays them out in that order,
    /// the way the kernel packs its scan records.
    pub fn new(mut channels: Vec<Channel>) -> Self {
        channels.sort_by_key(|chan| chan.index);
        let record_size = scan_size(&mut channels);
        ScanLayout {
            channels,
            record_size,
        }
    }

    /// The channels, sorted by index.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Bytes in one scan record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Number of enabled channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is enabled.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Finds a channel by name.
    pub fn find(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|chan| chan.name == name)
    }
}

// The file names in a directory, for attribute lookup by exact or
// generic channel name.
struct AttrTable {
    dir: PathBuf,
    names: BTreeSet<String>,
}

impl AttrTable {
    fn new(dir: &Path) -> io::Result<Self> {
        let names = fs::read_dir(dir)?
            .filter_map(|ent| ent.ok())
            .filter_map(|ent| ent.file_name().into_string().ok())
            .collect();
        Ok(AttrTable {
            dir: dir.to_path_buf(),
            names,
        })
    }

    // Specific channel names take precedence over generic ones.
    fn lookup(&self, chan: &Channel, suffix: &str) -> Option<String> {
        [&chan.name, &chan.generic_name]
            .iter()
            .map(|name| format!("{}_{}", name, suffix))
            .find(|attr| self.names.contains(attr))
    }

    fn read_float(&self, chan: &Channel, suffix: &str) -> Result<Option<f64>> {
        match self.lookup(chan, suffix) {
            Some(attr) => Ok(Some(read_attr(&self.dir, &attr)?)),
            None => Ok(None),
        }
    }
}

/// Builds the layout of the enabled scan channels of the device in the
/// sysfs directory `device_dir`.
///
/// Channels whose `_en` attribute isn't `1` are left out. Any other
/// problem reading the channel descriptions fails the whole build.
pub fn build_channel_array(device_dir: &Path) -> Result<ScanLayout> {
    let scan_dir = device_dir.join(SCAN_ELEMENTS_DIR);
    let scan_attrs = AttrTable::new(&scan_dir).map_err(|source| Error::ScanElements {
        path: scan_dir.clone(),
        source,
    })?;
    let dev_attrs = AttrTable::new(device_dir)?;

    let mut channels = Vec::new();

    for en in scan_attrs.names.iter().filter(|name| name.ends_with("_en")) {
        if !matches!(read_attr::<i64>(&scan_dir, en), Ok(1)) {
            continue;
        }
        let name = &en[..en.len() - "_en".len()];

        let index = read_attr::<u32>(&scan_dir, &format!("{}_index", name)).map_err(|err| {
            Error::ChannelIndex {
                channel: name.to_string(),
                source: Box::new(err),
            }
        })?;

        let mut chan = Channel::new(name, index, DataFormat::new(false, 0, 0, 0));

        let type_attr = scan_attrs.lookup(&chan, "type").ok_or_else(|| Error::ChannelType {
            channel: name.to_string(),
            reason: "no type attribute".into(),
        })?;
        let type_str = read_attr_str(&scan_dir, &type_attr).map_err(|err| Error::ChannelType {
            channel: name.to_string(),
            reason: err.to_string(),
        })?;
        chan.format = type_str.parse().map_err(|reason| Error::ChannelType {
            channel: name.to_string(),
            reason,
        })?;

        if let Some(scale) = dev_attrs.read_float(&chan, "scale")? {
            chan.scale = scale;
        }
        if let Some(offset) = dev_attrs.read_float(&chan, "offset")? {
            chan.offset = offset;
        }

        debug!(
            "channel {}: index {}, {} bytes at scale {} offset {}",
            chan.name,
            chan.index,
            chan.storage_bytes(),
            chan.scale,
            chan.offset
        );
        channels.push(chan);
    }

    Ok(ScanLayout::new(channels))
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

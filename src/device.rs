// iio-ndso/src/device.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Industrial I/O Devices
//!

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::PathBuf,
};

use log::{debug, warn};

use crate::{
    attr::{self, FromAttribute, ToAttribute},
    channel::{build_channel_array, ScanLayout, SCAN_ELEMENTS_DIR},
    context::DEVICE_PREFIX,
    Buffer, Context, Error, Result,
};

/// The debugfs attribute used for direct register access.
pub const REG_ACCESS_ATTR: &str = "direct_reg_access";

/// The attribute holding the ADC sample rate.
pub const SAMPLING_FREQ_ATTR: &str = "in_voltage_sampling_frequency";

/// An attribute file of a device, as shown in an attribute listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttr {
    /// The attribute (file) name
    pub name: String,
    /// The current contents, or empty if it couldn't be read
    pub value: String,
    /// Whether the attribute can be written by its owner
    pub writable: bool,
}

/// An Industrial I/O Device
///
/// This can not be created directly. It is obtained from a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    ctx: Context,
    num: u32,
}

impl Device {
    pub(crate) fn new(ctx: Context, num: u32) -> Self {
        Device { ctx, num }
    }

    /// Gets the context to which the device belongs
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The device number, as in `iio:device<num>`
    pub fn number(&self) -> u32 {
        self.num
    }

    /// Gets the device ID (e.g. <b><i>iio:device0</i></b>)
    pub fn id(&self) -> String {
        format!("{}{}", DEVICE_PREFIX, self.num)
    }

    /// Gets the name of the device
    pub fn name(&self) -> Option<String> {
        attr::read_attr_str(&self.dir(), "name")
            .ok()
            .and_then(|s| s.split_whitespace().next().map(String::from))
    }

    /// The sysfs directory of the device
    pub fn dir(&self) -> PathBuf {
        self.ctx.sysfs_root().join(self.id())
    }

    /// The directory describing the device's scan channels
    pub fn scan_elements_dir(&self) -> PathBuf {
        self.dir().join(SCAN_ELEMENTS_DIR)
    }

    /// The directory of the device's buffer attributes
    pub fn buffer_dir(&self) -> PathBuf {
        self.dir().join("buffer")
    }

    /// The character device used to read the buffer
    pub fn dev_node(&self) -> PathBuf {
        self.ctx.dev_root().join(self.id())
    }

    /// The debugfs directory of the device
    pub fn debugfs_dir(&self) -> PathBuf {
        self.ctx.debugfs_root().join(self.id())
    }

    /// Determines whether the device can capture into a buffer
    pub fn is_buffer_capable(&self) -> bool {
        self.buffer_dir().is_dir()
    }

    // ----- Attributes -----

    /// Determines if the device has the specified attribute.
    pub fn has_attr(&self, attr: &str) -> bool {
        self.dir().join(attr).is_file()
    }

    /// Reads a device attribute
    ///
    /// `attr` The name of the attribute
    pub fn attr_read<T: FromAttribute>(&self, attr: &str) -> Result<T> {
        attr::read_attr(&self.dir(), attr)
    }

    /// Reads a device attribute as a string
    pub fn attr_read_str(&self, attr: &str) -> Result<String> {
        self.attr_read(attr)
    }

    /// Reads a device attribute as an integer (i64)
    pub fn attr_read_int(&self, attr: &str) -> Result<i64> {
        self.attr_read(attr)
    }

    /// Reads a device attribute as a floating-point (f64) number
    pub fn attr_read_float(&self, attr: &str) -> Result<f64> {
        self.attr_read(attr)
    }

    /// Writes a device attribute
    ///
    /// `attr` The name of the attribute
    /// `val` The value to write
    pub fn attr_write<T: ToAttribute>(&self, attr: &str, val: T) -> Result<()> {
        attr::write_attr(&self.dir(), attr, val)
    }

    /// Writes a device attribute as a string
    pub fn attr_write_str(&self, attr: &str, val: &str) -> Result<()> {
        attr::write_attr_str(&self.dir(), attr, val)
    }

    /// Writes a device attribute as an integer (i64)
    pub fn attr_write_int(&self, attr: &str, val: i64) -> Result<()> {
        self.attr_write(attr, val)
    }

    /// Writes a value typed into a form field.
    ///
    /// Spaces are removed and the value is newline-terminated. An empty
    /// value leaves the attribute alone.
    pub fn write_form_attr(&self, attr: &str, val: &str) -> Result<()> {
        let val: String = val.chars().filter(|&c| c != ' ').collect();
        if val.is_empty() {
            return Ok(());
        }
        self.attr_write_str(attr, &format!("{}\n", val))
    }

    /// Lists the attribute files in the device directory, sorted by name.
    pub fn attributes(&self) -> Result<Vec<DeviceAttr>> {
        let dir = self.dir();
        let mut attrs = Vec::new();

        for ent in fs::read_dir(&dir)? {
            let ent = ent?;
            let meta = match ent.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let name = match ent.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let value = attr::read_attr_str(&dir, &name).unwrap_or_default();
            attrs.push(DeviceAttr {
                name,
                value: value.trim_end().to_string(),
                writable: meta.permissions().mode() & 0o200 != 0,
            });
        }
        attrs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(attrs)
    }

    /// Reads the ADC sampling frequency, in samples per second.
    pub fn sampling_frequency(&self) -> Result<u32> {
        self.attr_read(SAMPLING_FREQ_ATTR)
    }

    // ----- Scan elements -----

    /// Reads the layout of the enabled scan channels.
    pub fn scan_layout(&self) -> Result<ScanLayout> {
        build_channel_array(&self.dir())
    }

    // The `_en` attributes of the scan elements, sorted by name.
    fn enable_attrs(&self) -> Result<Vec<String>> {
        let dir = self.scan_elements_dir();
        let rd = fs::read_dir(&dir).map_err(|source| Error::ScanElements {
            path: dir.clone(),
            source,
        })?;
        let mut names: Vec<String> = rd
            .filter_map(|ent| ent.ok())
            .filter_map(|ent| ent.file_name().into_string().ok())
            .filter(|name| name.ends_with("_en"))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Enables the scan channels selected by the bits of `mask`, and
    /// disables the rest.
    ///
    /// Bit `n` of the mask applies to the n'th `_en` attribute in name
    /// order. The timestamp channel is left as it is.
    pub fn enable_selected_channels(&self, mask: u64) -> Result<()> {
        let dir = self.scan_elements_dir();
        let names = self.enable_attrs()?;

        for (i, name) in names
            .iter()
            .filter(|name| !name.ends_with("timestamp_en"))
            .enumerate()
        {
            let on = i < 64 && (mask >> i) & 1 != 0;
            attr::write_attr_str(&dir, name, if on { "1\n" } else { "0\n" })?;
        }
        Ok(())
    }

    /// Selects the two ADC converter channels from the low bits of `mask`
    /// and returns the number of samples per scan.
    ///
    /// With `hw_fft` the channels are routed through the converter's
    /// frequency-domain path instead. Failures to write are logged and
    /// skipped; the count reflects what the device reports afterwards.
    pub fn set_scan_elements(&self, mask: u32, hw_fft: bool) -> usize {
        let dir = self.scan_elements_dir();
        let suffix = if hw_fft { "frequency_domain_en" } else { "en" };

        for ch in 0..2 {
            let attr = format!("in_voltage{}_{}", ch, suffix);
            let on = (mask >> ch) & 1 != 0;
            if let Err(err) = attr::write_attr(&dir, &attr, on) {
                warn!("Can't write {}: {}", attr, err);
            }
        }

        (0..2)
            .filter_map(|ch| attr::read_attr::<usize>(&dir, &format!("in_voltage{}_en", ch)).ok())
            .sum()
    }

    /// Puts both converter channels into a test mode, such as
    /// `checkerboard`, or back to normal with `off`.
    pub fn set_test_mode(&self, mode: &str) -> Result<()> {
        for ch in 0..2 {
            self.attr_write_str(&format!("in_voltage{}_test_mode", ch), mode)?;
        }
        Ok(())
    }

    // ----- Buffer -----

    /// Sets the buffer length, in bytes.
    pub fn set_buffer_length(&self, len: usize) -> Result<()> {
        attr::write_attr(&self.buffer_dir(), "length", len)
    }

    /// Starts or stops the buffer.
    pub fn enable_buffer(&self, on: bool) -> Result<()> {
        attr::write_attr(&self.buffer_dir(), "enable", on)
    }

    /// Determines whether the buffer is running.
    pub fn is_buffer_enabled(&self) -> Result<bool> {
        attr::read_attr(&self.buffer_dir(), "enable")
    }

    /// Arms a buffer to capture `samples` scan records of `record_size`
    /// bytes each.
    pub fn create_buffer(&self, samples: usize, record_size: usize) -> Result<Buffer> {
        Buffer::arm(self.clone(), samples, record_size)
    }

    // ----- Registers -----

    fn reg_dir(&self) -> Result<PathBuf> {
        let dir = self.debugfs_dir();
        if !dir.is_dir() {
            return Err(Error::DeviceNotFound(self.id()));
        }
        Ok(dir)
    }

    /// Writes a converter register through debugfs.
    pub fn reg_write(&self, reg: u32, val: u32) -> Result<()> {
        debug!("{}: REG[0x{:X}] <- 0x{:X}", self.id(), reg, val);
        attr::write_attr(&self.reg_dir()?, REG_ACCESS_ATTR, (reg, val))
    }

    /// Reads a converter register through debugfs.
    pub fn reg_read(&self, reg: u32) -> Result<u32> {
        let dir = self.reg_dir()?;
        attr::write_attr_str(&dir, REG_ACCESS_ATTR, &reg.to_string())?;
        attr::read_attr(&dir, REG_ACCESS_ATTR)
    }
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

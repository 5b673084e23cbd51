// iio-ndso/src/context.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Industrial I/O Contexts.
//!

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, error};

use crate::{attr::read_attr_str, Device, Error, Result};

/// The default sysfs directory holding the IIO devices.
pub const DFLT_SYSFS_ROOT: &str = "/sys/bus/iio/devices";

/// The default directory of the IIO character devices.
pub const DFLT_DEV_ROOT: &str = "/dev";

/// The default debugfs directory for IIO register access.
pub const DFLT_DEBUGFS_ROOT: &str = "/sys/kernel/debug/iio";

/// The prefix of the directory name of every IIO device.
pub const DEVICE_PREFIX: &str = "iio:device";

/// An Industrial I/O Context
///
/// This is the set of file system roots under which the IIO devices are
/// found: the sysfs device directories, the character devices used to
/// read buffers, and the debugfs register interface. The defaults are
/// the standard Linux locations, but any of them can be moved, which is
/// handy for testing against a fake tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    sysfs: PathBuf,
    dev: PathBuf,
    debugfs: PathBuf,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    /// Creates a context for the local IIO devices.
    pub fn new() -> Context {
        Context::with_roots(DFLT_SYSFS_ROOT, DFLT_DEV_ROOT, DFLT_DEBUGFS_ROOT)
    }

    /// Creates a context with the specified roots.
    pub fn with_roots<P, Q, R>(sysfs: P, dev: Q, debugfs: R) -> Context
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        Context {
            sysfs: sysfs.as_ref().to_path_buf(),
            dev: dev.as_ref().to_path_buf(),
            debugfs: debugfs.as_ref().to_path_buf(),
        }
    }

    /// The sysfs directory holding the devices
    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs
    }

    /// The directory holding the device nodes
    pub fn dev_root(&self) -> &Path {
        &self.dev
    }

    /// The debugfs directory for the devices
    pub fn debugfs_root(&self) -> &Path {
        &self.debugfs
    }

    /// Gets the numbers of all the devices in the context, in order.
    fn device_numbers(&self) -> Result<Vec<u32>> {
        let mut nums: Vec<u32> = fs::read_dir(&self.sysfs)?
            .filter_map(|ent| ent.ok())
            .filter_map(|ent| {
                let name = ent.file_name().into_string().ok()?;
                name.strip_prefix(DEVICE_PREFIX)?.parse().ok()
            })
            .collect();
        nums.sort_unstable();
        Ok(nums)
    }

    /// Get the number of devices in the context
    pub fn num_devices(&self) -> usize {
        self.device_numbers().map(|v| v.len()).unwrap_or(0)
    }

    /// Gets a device by its number, as in `iio:device<num>`.
    pub fn get_device(&self, num: u32) -> Result<Device> {
        let dev = Device::new(self.clone(), num);
        if !dev.dir().is_dir() {
            return Err(Error::DeviceNotFound(format!("{}{}", DEVICE_PREFIX, num)));
        }
        Ok(dev)
    }

    /// Try to find a device by name
    ///
    /// `name` The name of the device to find, as in its `name` attribute
    pub fn find_device(&self, name: &str) -> Result<Device> {
        let nums = self.device_numbers().map_err(|err| {
            error!("No industrialio devices available: {}", err);
            Error::DeviceNotFound(name.to_string())
        })?;

        for num in nums {
            let dev = Device::new(self.clone(), num);
            match read_attr_str(&dev.dir(), "name") {
                Ok(s) if s.split_whitespace().next() == Some(name) => {
                    debug!("found '{}' at {}", name, dev.dir().display());
                    return Ok(dev);
                }
                _ => {}
            }
        }
        Err(Error::DeviceNotFound(name.to_string()))
    }

    /// Gets all the devices in the context.
    pub fn devices(&self) -> Result<Vec<Device>> {
        Ok(self
            .device_numbers()?
            .into_iter()
            .map(|num| Device::new(self.clone(), num))
            .collect())
    }
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeIio;

    #[test]
    fn default_roots() {
        let ctx = Context::default();
        assert_eq!(ctx.sysfs_root(), Path::new(DFLT_SYSFS_ROOT));
        assert_eq!(ctx.dev_root(), Path::new(DFLT_DEV_ROOT));
    }

    #[test]
    fn find_by_name() {
        let iio = FakeIio::new();
        iio.add_device(0, "ad9523-lpc");
        iio.add_device(2, "cf-ad9643-core-lpc");
        iio.mkdir(&iio.sysfs().join("trigger0"));

        let ctx = iio.context();
        assert_eq!(ctx.num_devices(), 2);

        let dev = ctx.find_device("cf-ad9643-core-lpc").unwrap();
        assert_eq!(dev.number(), 2);
        assert_eq!(dev.name().as_deref(), Some("cf-ad9643-core-lpc"));

        assert!(matches!(
            ctx.find_device("cf-ad9467"),
            Err(Error::DeviceNotFound(_))
        ));
        assert!(ctx.get_device(1).is_err());
        assert_eq!(ctx.devices().unwrap().len(), 2);
    }

    #[test]
    fn missing_root() {
        let ctx = Context::with_roots("/nonexistent/iio", "/dev", "/nonexistent/debug");
        assert_eq!(ctx.num_devices(), 0);
        assert!(matches!(ctx.find_device("adc"), Err(Error::DeviceNotFound(_))));
    }
}

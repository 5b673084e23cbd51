// iio-ndso/src/buffer.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Industrial I/O Buffers.
//!
//! A capture is done by arming the device's buffer and then reading the
//! device node. Arming sets `buffer/length` and writes `buffer/enable`;
//! the raw scan records then come out of `/dev/iio:device<N>`.
//!
//! A [`Buffer`] is always coupled to exactly one [`Device`]. The channels
//! that take part in the capture must be enabled before the buffer is
//! armed, and the size of a scan record must come from the layout of
//! those channels (see [`Device::scan_layout()`]).
//!
//! The device buffer is disabled again when the [`Buffer`] is dropped,
//! whether or not the capture succeeded.
//!
//! [`Device::scan_layout()`]: crate::device::Device::scan_layout()
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

use log::{info, warn};
use nix::{
    errno::Errno,
    fcntl::{self, OFlag},
    sys::stat::Mode,
    unistd,
};

use crate::{Device, Error, Result};

/// An armed Industrial I/O input buffer.
///
/// The buffer holds room for `capacity()` scan records. Space that the
/// device didn't fill on a read is left zeroed.
#[derive(Debug)]
pub struct Buffer {
    /// The device that owns the buffer
    dev: Device,
    /// The buffer capacity, in scan records
    cap: usize,
    /// Bytes per scan record
    record_size: usize,
    /// The raw capture
    data: Vec<u8>,
    /// Bytes delivered by the last read
    len: usize,
}

impl Buffer {
    /// Arms the device buffer for `samples` records of `record_size` bytes.
    ///
    /// Failing to set the length is an error. Failing to enable the
    /// buffer is only logged, since some drivers start capturing on
    /// their own.
    pub(crate) fn arm(dev: Device, samples: usize, record_size: usize) -> Result<Self> {
        let nbytes = samples
            .checked_mul(record_size)
            .ok_or(Error::Alloc(usize::MAX))?;

        dev.set_buffer_length(nbytes)?;

        if let Err(err) = dev.enable_buffer(true) {
            warn!("{}: can't enable the buffer: {}", dev.id(), err);
        }

        // From here on, dropping the buffer disables the device again.
        let mut buf = Buffer {
            dev,
            cap: samples,
            record_size,
            data: Vec::new(),
            len: 0,
        };

        buf.data
            .try_reserve_exact(nbytes)
            .map_err(|_| Error::Alloc(nbytes))?;
        buf.data.resize(nbytes, 0);

        info!(
            "{}: armed for {} records of {} bytes",
            buf.dev.id(),
            samples,
            record_size
        );
        Ok(buf)
    }

    /// Get the buffer size, in scan records.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The size of each scan record, in bytes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Gets a reference to the device to which this buffer is attached.
    pub fn device(&self) -> &Device {
        &self.dev
    }

    /// Fetch the samples from the device.
    ///
    /// The device node is opened non-blocking, so this never waits for
    /// data. A read that finds nothing available isn't an error; it
    /// returns zero and leaves the buffer zeroed.
    pub fn refill(&mut self) -> Result<usize> {
        let path = self.dev.dev_node();
        let fd = fcntl::open(
            path.as_path(),
            OFlag::O_RDONLY | OFlag::O_NONBLOCK,
            Mode::empty(),
        )
        .map_err(|err| {
            warn!("Failed to open {}: {}", path.display(), err);
            err
        })?;

        let res = unistd::read(fd, &mut self.data);
        if let Err(err) = unistd::close(fd) {
            warn!("Error closing {}: {}", path.display(), err);
        }

        self.len = match res {
            Ok(n) => n,
            Err(Errno::EAGAIN) => 0,
            Err(err) => return Err(err.into()),
        };

        if self.len == 0 {
            warn!("{}: nothing available", self.dev.id());
        }
        else if self.len < self.data.len() {
            warn!(
                "{}: short read of {} of {} bytes",
                self.dev.id(),
                self.len,
                self.data.len()
            );
        }
        Ok(self.len)
    }

    /// The number of bytes delivered by the last refill.
    pub fn bytes_read(&self) -> usize {
        self.len
    }

    /// The whole capture area, `capacity() * record_size()` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Iterates over the scan records of the capture area.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.record_size.max(1))
    }

    /// Takes the captured bytes out of the buffer, leaving it empty.
    pub fn take_data(&mut self) -> Vec<u8> {
        self.len = 0;
        std::mem::take(&mut self.data)
    }
}

/// Stop the device buffer when the object scope ends.
impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(err) = self.dev.enable_buffer(false) {
            warn!("{}: can't disable the buffer: {}", self.dev.id(), err);
        }
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
    fn arm_read_and_disable() {
        let iio = FakeIio::new();
        let dir = iio.add_device(0, "adc");
        iio.set_data(0, &[1, 2, 3, 4, 5, 6, 7, 8]);

        let dev = iio.context().get_device(0).unwrap();
        {
            let mut buf = dev.create_buffer(4, 4).unwrap();
            assert_eq!(iio.read(&dir.join("buffer/length")), "16");
            assert_eq!(iio.read(&dir.join("buffer/enable")), "1");

            assert_eq!(buf.refill().unwrap(), 8);
            assert_eq!(buf.bytes_read(), 8);
            assert_eq!(buf.as_bytes().len(), 16);
            assert_eq!(&buf.as_bytes()[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
            assert_eq!(&buf.as_bytes()[8..], &[0; 8]);

            let recs: Vec<_> = buf.records().collect();
            assert_eq!(recs.len(), 4);
            assert_eq!(recs[1], &[5, 6, 7, 8]);
        }
        assert_eq!(iio.read(&dir.join("buffer/enable")), "0");
    }

    #[test]
    fn empty_read_is_not_an_error() {
        let iio = FakeIio::new();
        iio.add_device(0, "adc");
        iio.set_data(0, &[]);

        let dev = iio.context().get_device(0).unwrap();
        let mut buf = dev.create_buffer(2, 2).unwrap();
        assert_eq!(buf.refill().unwrap(), 0);
        assert_eq!(buf.as_bytes(), &[0; 4]);
    }

    #[test]
    fn missing_node_is_an_error() {
        let iio = FakeIio::new();
        let dir = iio.add_device(0, "adc");
        let dev = iio.context().get_device(0).unwrap();

        let res = dev.create_buffer(2, 2).and_then(|mut buf| buf.refill());
        assert!(matches!(res, Err(Error::Nix(Errno::ENOENT))));
        assert_eq!(iio.read(&dir.join("buffer/enable")), "0");
    }

    #[test]
    fn missing_buffer_dir() {
        let iio = FakeIio::new();
        let dir = iio.add_device(0, "adc");
        std::fs::remove_dir_all(dir.join("buffer")).unwrap();
        let dev = iio.context().get_device(0).unwrap();
        assert!(matches!(dev.create_buffer(2, 2), Err(Error::Io(_))));
    }
}

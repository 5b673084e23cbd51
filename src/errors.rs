// iio-ndso/src/errors.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//!
//! Error definitions for the IIO oscilloscope library.

use nix::errno::Errno;
use std::{io, path::PathBuf};
use thiserror::Error;

/// The Error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A low-level I/O error
    #[error("{0}")]
    Io(#[from] io::Error),
    /// A low-level Unix-style error
    #[error("{0}")]
    Nix(#[from] nix::Error),
    /// No IIO device has the requested name
    #[error("Failed to find the IIO device '{0}'")]
    DeviceNotFound(String),
    /// The device's scan elements directory could not be listed
    #[error("Can't read scan elements in {}: {source}", path.display())]
    ScanElements {
        /// The directory that was scanned
        path: PathBuf,
        /// The underlying failure
        #[source]
        source: io::Error,
    },
    /// The `_index` attribute of an enabled channel could not be read
    #[error("Can't read the index of channel '{channel}': {source}")]
    ChannelIndex {
        /// The channel name
        channel: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
    /// The `_type` attribute of an enabled channel is missing or malformed
    #[error("Bad type descriptor for channel '{channel}': {reason}")]
    ChannelType {
        /// The channel name
        channel: String,
        /// What was wrong with it
        reason: String,
    },
    /// An attribute value could not be parsed
    #[error("Can't parse attribute '{attr}' from '{value}'")]
    ParseAttr {
        /// The attribute name
        attr: String,
        /// The text that was read
        value: String,
    },
    /// A capture buffer could not be allocated
    #[error("Can't allocate a {0} byte capture buffer")]
    Alloc(usize),
    /// The operation only supports one or two active channels
    #[error("Unsupported number of active channels: {0}")]
    UnsupportedChannelCount(usize),
    /// The data buffer is shorter than the requested number of records
    #[error("Buffer too short for the requested number of records")]
    BufferTooShort,
    /// The capture request is not valid
    #[error("Invalid request: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Gets the negative, errno-style code for the error.
    ///
    /// This is what a request handler reports back for a failed capture.
    pub fn errno(&self) -> i32 {
        let errno = match self {
            Error::Io(err) => err.raw_os_error().unwrap_or(Errno::EIO as i32),
            Error::Nix(err) => *err as i32,
            Error::DeviceNotFound(_) => Errno::ENODEV as i32,
            Error::ScanElements { source, .. } => {
                source.raw_os_error().unwrap_or(Errno::EIO as i32)
            }
            Error::ChannelIndex { source, .. } => return source.errno(),
            Error::Alloc(_) => Errno::ENOMEM as i32,
            Error::ChannelType { .. }
            | Error::ParseAttr { .. }
            | Error::UnsupportedChannelCount(_)
            | Error::BufferTooShort
            | Error::InvalidConfig(_) => Errno::EINVAL as i32,
        };
        -errno
    }
}

/// The default result type for the library
pub type Result<T> = std::result::Result<T, Error>;

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

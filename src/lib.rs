// iio-ndso/src/lib.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//!
//! A digital storage oscilloscope for Linux Industrial I/O converters.
//!
//! This crate captures blocks of samples from high-speed A/D converters
//! through the Linux Industrial I/O (IIO) sysfs interface and the
//! `/dev/iio:device<N>` character devices. It decodes the raw scan
//! records into scaled values, computes channel statistics, turns a
//! capture into a fixed-point loudness spectrum, and runs the converter
//! test patterns to verify the digital interface.
//!
//! Captures can span a master converter and a slave that is clocked
//! from it. The slave is armed first so that both start together.
//!
//! For more information, see:
//!
//!   [IIO Wiki](https://wiki.analog.com/software/linux/docs/iio/iio)
//!

// Lints
// This may be overkill.
#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

pub use crate::buffer::*;
pub use crate::capture::*;
pub use crate::channel::*;
pub use crate::context::*;
pub use crate::device::*;
pub use crate::errors::*;

pub mod attr;
pub mod buffer;
pub mod capture;
pub mod channel;
pub mod context;
pub mod device;
pub mod errors;
pub mod fft;
pub mod pattern;
pub mod scan;
pub mod stats;

#[cfg(test)]
mod testutil;

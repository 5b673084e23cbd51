// iio-ndso/src/bin/ndso_stop_all.rs
//
// Copyright (c) 2019-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//

//! Rust application to stop all Industrial I/O devices.
//!
//! It disables the buffer of every device that has one.
//!
//! This is useful, particularly during development, when a crashed app can
//! leave the devices acquiring data.
//!

use clap::{Arg, ArgAction, Command};
use iio_ndso as iio;
use log::info;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// --------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let args = Command::new("ndso_stop_all")
        .version(VERSION)
        .author("Frank Pagliughi")
        .about("Disable the buffer of every IIO device.")
        .arg(
            Arg::new("sysfs")
                .long("sysfs")
                .action(ArgAction::Set)
                .default_value(iio::DFLT_SYSFS_ROOT)
                .help("The sysfs directory of the IIO devices"),
        )
        .get_matches();

    let sysfs = args
        .get_one::<String>("sysfs")
        .map(String::as_str)
        .unwrap_or(iio::DFLT_SYSFS_ROOT);

    // Only sysfs is touched, so the other roots keep their defaults.
    let ctx = iio::Context::with_roots(sysfs, iio::DFLT_DEV_ROOT, iio::DFLT_DEBUGFS_ROOT);
    let devs = ctx.devices().unwrap_or_else(|err| {
        eprintln!("Error listing the IIO devices: {}", err);
        process::exit(1);
    });

    let mut failed = false;
    for dev in devs.iter().filter(|dev| dev.is_buffer_capable()) {
        match dev.enable_buffer(false) {
            Ok(()) => info!("{}: buffer disabled", dev.id()),
            Err(err) => {
                eprintln!("Error disabling buffer of {}: {}", dev.id(), err);
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

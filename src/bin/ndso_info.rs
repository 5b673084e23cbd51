// iio-ndso/src/bin/ndso_info.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//

//! Rust application to gather information about Industrial I/O devices.
//!
//! Lists every device with its attributes and the layout of the scan
//! channels that are currently enabled.
//!

use clap::{Arg, ArgAction, Command};
use iio_ndso as iio;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    env_logger::init();

    let args = Command::new("ndso_info")
        .version(VERSION)
        .author("Frank Pagliughi")
        .about("IIO oscilloscope device information.")
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .short('?')
                .long("help")
                .global(true)
                .action(ArgAction::Help)
                .help("Print help information"),
        )
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

    let ctx = iio::Context::with_roots(sysfs, iio::DFLT_DEV_ROOT, iio::DFLT_DEBUGFS_ROOT);

    let devs = ctx.devices().unwrap_or_else(|err| {
        eprintln!("Error listing the IIO devices: {}", err);
        process::exit(1);
    });

    println!("IIO context has {} device(s):", devs.len());
    for dev in devs {
        println!(
            "\t{}: {}",
            dev.id(),
            dev.name().unwrap_or_else(|| "<unknown>".to_string())
        );

        if let Ok(freq) = dev.sampling_frequency() {
            println!("\t\tSampling frequency: {} Hz", freq);
        }

        if dev.is_buffer_capable() {
            match dev.scan_layout() {
                Ok(layout) => {
                    println!(
                        "\t\t{} scan channel(s) enabled, {} bytes per record:",
                        layout.len(),
                        layout.record_size()
                    );
                    for chan in layout.channels() {
                        println!(
                            "\t\t\t{} [{}] {} at {}, scale {} offset {}",
                            chan.name(),
                            chan.index(),
                            chan.data_format(),
                            chan.byte_offset(),
                            chan.scale(),
                            chan.offset()
                        );
                    }
                }
                Err(err) => println!("\t\tScan channels: {}", err),
            }
        }

        match dev.attributes() {
            Ok(attrs) => {
                println!("\t\tAttributes:");
                for attr in attrs {
                    let mode = if attr.writable { "rw" } else { "r" };
                    println!("\t\t\t{} ({}): {}", attr.name, mode, attr.value);
                }
            }
            Err(err) => println!("\t\tAttributes: {}", err),
        }
    }
}

// iio-ndso/src/bin/ndso.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//

//! Digital storage oscilloscope for IIO converters.
//!
//! Captures a block of samples from a converter (and optionally a slave
//! clocked from it), writes the samples or their spectrum to a text file
//! ready for plotting, and prints the channel statistics. It can also run
//! the converter test patterns and read or write the device attributes
//! and registers.
//!

use anyhow::{bail, Context, Result};
use clap::{arg, value_parser, ArgAction, ArgMatches, Command};
use iio_ndso as iio;
use std::{
    fs::File,
    io::{BufWriter, Write},
    process,
};

const DFLT_SAMPLES: &str = "1024";

// Parses an integer that may be in hex, like a register address.
fn parse_u32(s: &str) -> std::result::Result<u32, String> {
    let res = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    res.map_err(|err| format!("'{}': {}", s, err))
}

// Gets a string argument, which has a default or is required.
fn str_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument '{}'", name))
}

fn context(args: &ArgMatches) -> Result<iio::Context> {
    Ok(iio::Context::with_roots(
        str_arg(args, "sysfs")?,
        str_arg(args, "dev")?,
        str_arg(args, "debugfs")?,
    ))
}

// ----- Capture -----

fn capture(ctx: &iio::Context, args: &ArgMatches) -> Result<()> {
    let mut config = iio::CaptureConfig::new(
        str_arg(args, "device")?,
        *args.get_one::<usize>("samples").unwrap_or(&1024),
    );

    config.slave = args.get_one::<String>("slave").cloned();
    if let Some(&mask) = args.get_one::<u32>("mask") {
        config.channel_mask = mask;
    }
    if let Some(&log2_n) = args.get_one::<u32>("fft") {
        config.domain = iio::Domain::Frequency {
            log2_n,
            window: args.get_flag("window"),
            exclude_dc: args.get_flag("exclude_dc"),
            hw_fft: args.get_flag("hw_fft"),
        };
    }
    config.output = str_arg(args, "output")?.into();
    config.slave_output = str_arg(args, "slave_output")?.into();

    config.validate()?;

    let caps = iio::capture(ctx, &config).context("Capture failed")?;

    for cap in caps {
        let path = config.output_for(&cap.device);
        let file = File::create(path)
            .with_context(|| format!("Can't create '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        cap.write_samples(&mut out)?;
        out.flush()?;

        println!(
            "{}: {} bytes of {} record(s) -> {}",
            cap.device,
            cap.bytes_read,
            config.samples,
            path.display()
        );
        for (i, stats) in cap.stats().iter().enumerate() {
            println!("  CH{} {}", i, stats);
        }
    }
    Ok(())
}

// ----- Test patterns -----

fn test(ctx: &iio::Context, args: &ArgMatches) -> Result<bool> {
    let device = str_arg(args, "device")?;
    let slave = args.get_one::<String>("slave").map(String::as_str);
    let samples = *args.get_one::<usize>("samples").unwrap_or(&1024);

    let outcomes = iio::run_pattern_tests(ctx, device, slave, samples)?;

    let mut passed = true;
    for outcome in outcomes {
        println!(
            "{}: Running test: {} [{} Samples]",
            outcome.device, outcome.pattern.name, samples
        );
        println!("  {}", outcome.report);
        passed &= outcome.report.passed();
    }
    Ok(passed)
}

// ----- Attributes & registers -----

fn attrs(ctx: &iio::Context, args: &ArgMatches) -> Result<()> {
    let dev = ctx.find_device(str_arg(args, "device")?)?;

    if let Ok(freq) = dev.sampling_frequency() {
        println!("Sampling frequency: {} Hz", freq);
    }
    for attr in dev.attributes()? {
        let mode = if attr.writable { "rw" } else { "r" };
        println!("{} ({}): {}", attr.name, mode, attr.value);
    }
    Ok(())
}

fn write(ctx: &iio::Context, args: &ArgMatches) -> Result<()> {
    let dev = ctx.find_device(str_arg(args, "device")?)?;

    for assign in args.get_many::<String>("assign").into_iter().flatten() {
        let (attr, val) = match assign.split_once('=') {
            Some(pair) => pair,
            None => bail!("Expected attr=value, got '{}'", assign),
        };
        dev.write_form_attr(attr.trim(), val)
            .with_context(|| format!("Can't write '{}'", attr))?;
    }
    Ok(())
}

fn reg(ctx: &iio::Context, args: &ArgMatches) -> Result<()> {
    let dev = ctx.find_device(str_arg(args, "device")?)?;
    let reg = *args
        .get_one::<u32>("reg")
        .context("Missing register address")?;

    if let Some(&val) = args.get_one::<u32>("value") {
        dev.reg_write(reg, val)?;
    }
    let val = dev.reg_read(reg)?;
    println!("REG[0x{:X}] = 0x{:X}", reg, val);
    Ok(())
}

// --------------------------------------------------------------------------

fn run() -> Result<bool> {
    let slave = arg!(-s --slave [slave] "The name of a slave device clocked from the master")
        .action(ArgAction::Set);
    let samples = arg!(-n --samples <N> "The number of samples to capture")
        .value_parser(value_parser!(usize))
        .default_value(DFLT_SAMPLES);

    let args = Command::new("ndso")
        .version(clap::crate_version!())
        .author(clap::crate_authors!())
        .about("Digital storage oscilloscope for IIO converters.")
        .subcommand_required(true)
        .args(&[
            arg!(--sysfs [dir] "The sysfs directory of the IIO devices")
                .global(true)
                .default_value(iio::DFLT_SYSFS_ROOT),
            arg!(--dev [dir] "The directory of the IIO device nodes")
                .global(true)
                .default_value(iio::DFLT_DEV_ROOT),
            arg!(--debugfs [dir] "The debugfs directory of the IIO devices")
                .global(true)
                .default_value(iio::DFLT_DEBUGFS_ROOT),
        ])
        .subcommand(
            Command::new("capture")
                .about("Capture samples and write them to a file")
                .args(&[
                    arg!(<device> "The name of the master device"),
                    slave.clone(),
                    samples.clone(),
                    arg!(-m --mask [mask] "The converter channels to enable, as a bit mask")
                        .value_parser(parse_u32),
                    arg!(-f --fft [log2] "Compute a spectrum of 2^log2 samples")
                        .value_parser(value_parser!(u32)),
                    arg!(-w --window "Apply a Hann window before the FFT")
                        .action(ArgAction::SetTrue),
                    arg!(-x --exclude_dc "Leave the DC bin out of the spectrum")
                        .action(ArgAction::SetTrue),
                    arg!(--hw_fft "The converter computes the FFT itself")
                        .action(ArgAction::SetTrue),
                    arg!(-o --output <file> "The file for the master's samples")
                        .default_value("samples.txt"),
                    arg!(--slave_output <file> "The file for the slave's samples")
                        .default_value("samples_slave.txt"),
                ]),
        )
        .subcommand(
            Command::new("test")
                .about("Run the converter test patterns")
                .args(&[arg!(<device> "The name of the master device"), slave, samples]),
        )
        .subcommand(
            Command::new("attrs")
                .about("List the device attributes")
                .arg(arg!(<device> "The name of the device")),
        )
        .subcommand(
            Command::new("write")
                .about("Write device attributes")
                .args(&[
                    arg!(<device> "The name of the device"),
                    arg!(<assign> ... "Assignments of the form attr=value"),
                ]),
        )
        .subcommand(
            Command::new("reg")
                .about("Read, or write then read back, a converter register")
                .args(&[
                    arg!(<device> "The name of the device"),
                    arg!(<reg> "The register address").value_parser(parse_u32),
                    arg!([value] "The value to write").value_parser(parse_u32),
                ]),
        )
        .get_matches();

    let ctx = context(&args)?;

    match args.subcommand() {
        Some(("capture", sub)) => capture(&ctx, sub)?,
        Some(("test", sub)) => return test(&ctx, sub),
        Some(("attrs", sub)) => attrs(&ctx, sub)?,
        Some(("write", sub)) => write(&ctx, sub)?,
        Some(("reg", sub)) => reg(&ctx, sub)?,
        _ => bail!("Unknown command"),
    }
    Ok(true)
}

fn main() {
    env_logger::init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            if let Some(err) = err.downcast_ref::<iio::Error>() {
                eprintln!("Error {}: {}", err.errno(), err);
            }
            else {
                eprintln!("{:#}", err);
            }
            process::exit(1);
        }
    }
}

// iio-ndso/src/capture.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Capture requests.
//!
//! A request names a master converter and, optionally, a slave that is
//! clocked from it. The slave has to be armed first so that it's
//! waiting when the master starts. Every target is armed, in order,
//! before any of them is read.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    fft::{self, SpectrumOptions},
    pattern::{self, AdcId, PatternReport, TestPattern},
    scan::{self, Sample},
    stats::{self, ChannelStats},
    Buffer, Context, Device, Error, Result, ScanLayout,
};

/// The largest number of samples in a capture.
pub const MAX_SAMPLES: usize = 65536;

/// Captures must have more than this many samples.
pub const MIN_SAMPLES: usize = 1;

/// Largest log2 of a software FFT.
pub const MAX_LOG2_FFT: u32 = fft::LOG2_N_WAVE;

/// Default channel selection: both converter channels.
pub const DFLT_CHANNEL_MASK: u32 = 0x3;

/// How a capture is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// The scaled samples themselves
    Time,
    /// A loudness spectrum of `2^log2_n` samples
    Frequency {
        /// log2 of the number of samples
        log2_n: u32,
        /// Whether to apply a Hann window
        window: bool,
        /// Whether to leave out the DC bin
        exclude_dc: bool,
        /// Whether the converter computes the FFT itself
        hw_fft: bool,
    },
}

impl Domain {
    fn hw_fft(&self) -> bool {
        matches!(self, Domain::Frequency { hw_fft: true, .. })
    }
}

/// A capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Name of the master device
    pub device: String,
    /// Name of the slave device, if any
    pub slave: Option<String>,
    /// Number of scan records to capture
    pub samples: usize,
    /// Converter channels to enable, bit 0 for channel 0
    pub channel_mask: u32,
    /// Time or frequency domain
    pub domain: Domain,
    /// Where the master's samples go
    pub output: PathBuf,
    /// Where the slave's samples go
    pub slave_output: PathBuf,
}

impl CaptureConfig {
    /// Creates a time-domain request for both channels of a device.
    pub fn new(device: &str, samples: usize) -> Self {
        Self {
            device: device.to_string(),
            slave: None,
            samples,
            channel_mask: DFLT_CHANNEL_MASK,
            domain: Domain::Time,
            output: PathBuf::from("samples.txt"),
            slave_output: PathBuf::from("samples_slave.txt"),
        }
    }

    /// Checks the request, fixing up what can be fixed.
    ///
    /// In the frequency domain the number of samples comes from the FFT
    /// size, which is limited to [`MAX_LOG2_FFT`] unless the converter
    /// does the transform.
    pub fn validate(&mut self) -> Result<()> {
        if self.slave.as_deref() == Some(self.device.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "'{}' can't be its own slave",
                self.device
            )));
        }

        if let Domain::Frequency {
            ref mut log2_n,
            hw_fft,
            ..
        } = self.domain
        {
            if !hw_fft && *log2_n > MAX_LOG2_FFT {
                warn!("FFT limited to 2^{} points", MAX_LOG2_FFT);
                *log2_n = MAX_LOG2_FFT;
            }
            self.samples = 1usize.checked_shl(*log2_n).unwrap_or(usize::MAX);
        }

        if self.samples <= MIN_SAMPLES || self.samples > MAX_SAMPLES {
            return Err(Error::InvalidConfig(format!(
                "{} samples is out of range",
                self.samples
            )));
        }
        Ok(())
    }

    /// The devices to capture from, in the order they're armed: the
    /// slave, if any, then the master.
    pub fn targets(&self) -> Vec<&str> {
        self.slave
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.device.as_str()))
            .collect()
    }

    /// The file for the samples of a target device.
    pub fn output_for(&self, device: &str) -> &Path {
        if self.slave.as_deref() == Some(device) {
            &self.slave_output
        }
        else {
            &self.output
        }
    }

    fn spectrum_options(&self) -> Option<SpectrumOptions> {
        match self.domain {
            Domain::Time => None,
            Domain::Frequency {
                log2_n,
                window,
                exclude_dc,
                ..
            } => Some(SpectrumOptions {
                log2_n,
                window,
                start_bin: usize::from(exclude_dc),
                ..SpectrumOptions::default()
            }),
        }
    }
}

/// The processed samples of one device.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureData {
    /// Decoded scan records and per-channel statistics
    Time {
        /// One row of samples per record
        rows: Vec<Vec<Sample>>,
        /// Statistics of the raw 16-bit channels, if there are one or two
        stats: Vec<ChannelStats>,
    },
    /// `(bin, dB)` pairs
    Spectrum(Vec<(usize, i16)>),
}

/// A capture from one device.
#[derive(Debug, Clone)]
pub struct DeviceCapture {
    /// The device name
    pub device: String,
    /// The scan record layout used for the capture
    pub layout: ScanLayout,
    /// The raw capture, zero-filled beyond what the device delivered
    pub raw: Vec<u8>,
    /// Bytes the device actually delivered
    pub bytes_read: usize,
    /// The processed samples
    pub data: CaptureData,
}

impl DeviceCapture {
    /// Gets the channel statistics of a time-domain capture.
    pub fn stats(&self) -> &[ChannelStats] {
        match &self.data {
            CaptureData::Time { stats, .. } => stats,
            CaptureData::Spectrum(_) => &[],
        }
    }

    /// Writes the samples as text: one record per line in the time
    /// domain, or one `bin magnitude` pair per line for a spectrum.
    pub fn write_samples<W: Write>(&self, out: W) -> std::io::Result<()> {
        match &self.data {
            CaptureData::Time { rows, .. } => scan::write_rows(out, rows),
            CaptureData::Spectrum(bins) => fft::write_spectrum(out, bins),
        }
    }
}

// A target that has been armed, but not yet read.
struct Armed {
    name: String,
    layout: ScanLayout,
    buf: Buffer,
}

fn arm(ctx: &Context, name: &str, config: &CaptureConfig) -> Result<Armed> {
    let dev = ctx.find_device(name)?;
    // The AD9250 always streams both of its channels.
    let mask = match AdcId::from_device_name(name) {
        AdcId::Ad9250 => DFLT_CHANNEL_MASK,
        _ => config.channel_mask,
    };
    let per_scan = dev.set_scan_elements(mask, config.domain.hw_fft());
    info!("{}: {} samples per scan", name, per_scan);

    let layout = dev.scan_layout()?;
    if layout.record_size() == 0 {
        return Err(Error::InvalidConfig(format!("{}: no channels enabled", name)));
    }

    let buf = dev.create_buffer(config.samples, layout.record_size())?;
    Ok(Armed {
        name: name.to_string(),
        layout,
        buf,
    })
}

fn process(config: &CaptureConfig, armed: Armed) -> Result<DeviceCapture> {
    let Armed {
        name,
        layout,
        mut buf,
    } = armed;

    buf.refill()?;
    let bytes_read = buf.bytes_read();
    let raw = buf.take_data();
    drop(buf);

    let count = config.samples;
    let rec_size = layout.record_size();

    let data = match config.spectrum_options() {
        None => {
            let ts_ref = scan::first_timestamp(&raw, layout.channels());
            let rows = scan::decode_scan(&raw, layout.channels(), count, rec_size, ts_ref)?;

            let (vals, per_scan) = scan::raw_i16_samples(&raw, layout.channels(), count, rec_size)?;
            let stats = stats::compute_channel_stats(&vals, per_scan, count).unwrap_or_else(|err| {
                warn!("{}: no statistics: {}", name, err);
                Vec::new()
            });
            CaptureData::Time { rows, stats }
        }
        Some(opts) => {
            let (mut real, mut imag) =
                fft::spectrum_input(&raw, layout.channels(), count, rec_size)?;
            let bins = if config.domain.hw_fft() {
                fft::hw_spectrum(&real, opts.start_bin)
            }
            else {
                fft::spectrum(&mut real, &mut imag, &opts)?
            };
            CaptureData::Spectrum(bins)
        }
    };

    Ok(DeviceCapture {
        device: name,
        layout,
        raw,
        bytes_read,
        data,
    })
}

/// Runs a capture request.
///
/// Every target is armed, slave first, and then each is read and
/// processed in the same order. The device buffers are disabled again
/// whether or not the capture succeeds.
pub fn capture(ctx: &Context, config: &CaptureConfig) -> Result<Vec<DeviceCapture>> {
    let mut armed = Vec::new();
    for name in config.targets() {
        armed.push(arm(ctx, name, config)?);
    }

    armed
        .into_iter()
        .map(|target| process(config, target))
        .collect()
}

/// The result of one test pattern on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestOutcome<'a> {
    /// The device tested
    pub device: &'a str,
    /// The pattern
    pub pattern: TestPattern,
    /// How the capture compared to the pattern
    pub report: PatternReport,
}

// Puts the converters back to normal operation when it goes out of scope.
struct TestModeGuard<'a> {
    devs: &'a [Device],
}

impl Drop for TestModeGuard<'_> {
    fn drop(&mut self) {
        for dev in self.devs {
            if let Err(err) = dev.set_test_mode("off") {
                warn!("{}: can't leave test mode: {}", dev.id(), err);
            }
        }
    }
}

fn run_pattern<'a>(
    devs: &[Device],
    names: &[&'a str],
    pat: &TestPattern,
    samples: usize,
) -> Result<Vec<TestOutcome<'a>>> {
    let _guard = TestModeGuard { devs };

    let mut bufs = Vec::with_capacity(devs.len());
    for dev in devs {
        let per_scan = dev.set_scan_elements(DFLT_CHANNEL_MASK, false);
        if per_scan == 0 {
            return Err(Error::InvalidConfig(format!("{}: no channels enabled", dev.id())));
        }
        dev.set_test_mode(pat.mode)?;
        bufs.push(dev.create_buffer(samples, 2 * per_scan)?);
    }

    let mut outcomes = Vec::with_capacity(bufs.len());
    for (buf, &name) in bufs.iter_mut().zip(names) {
        buf.refill()?;
        let mut words = pattern::words_from_bytes(buf.as_bytes());
        words.truncate(samples);

        let report = pattern::verify_test_pattern(&words, pat.pat1, pat.pat2);
        info!("{}: {}: {}", name, pat.name, report);
        outcomes.push(TestOutcome {
            device: name,
            pattern: *pat,
            report,
        });
    }
    Ok(outcomes)
}

/// Runs every test pattern of a converter, and of its slave if there is
/// one.
///
/// The pattern table is picked from the master's name. Both channels of
/// each device are put into the test mode and captured as 32-bit words.
/// The converters are always put back into normal operation.
pub fn run_pattern_tests<'a>(
    ctx: &Context,
    device: &'a str,
    slave: Option<&'a str>,
    samples: usize,
) -> Result<Vec<TestOutcome<'a>>> {
    if slave == Some(device) {
        return Err(Error::InvalidConfig(format!("'{}' can't be its own slave", device)));
    }
    if samples <= MIN_SAMPLES || samples > MAX_SAMPLES {
        return Err(Error::InvalidConfig(format!("{} samples is out of range", samples)));
    }

    let names: Vec<&str> = slave.into_iter().chain(std::iter::once(device)).collect();
    let devs = names
        .iter()
        .map(|name| ctx.find_device(name))
        .collect::<Result<Vec<_>>>()?;

    let mut outcomes = Vec::new();
    for pat in AdcId::from_device_name(device).patterns() {
        outcomes.extend(run_pattern(&devs, &names, pat, samples)?);
    }
    Ok(outcomes)
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{le_bytes, FakeIio};

    fn converter(iio: &FakeIio, num: u32, name: &str) -> PathBuf {
        let dir = iio.add_device(num, name);
        iio.add_channel(&dir, "in_voltage0", 0, "le:s16/16>>0", false);
        iio.add_channel(&dir, "in_voltage1", 1, "le:s16/16>>0", false);
        iio.write(&dir.join("in_voltage_scale"), "0.5\n");
        dir
    }

    #[test]
    fn validation() {
        let mut cfg = CaptureConfig::new("cf-ad9643-core-lpc", 1024);
        assert!(cfg.validate().is_ok());

        cfg.slave = Some("cf-ad9643-core-lpc".into());
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
        cfg.slave = None;

        cfg.samples = 1;
        assert!(cfg.validate().is_err());
        cfg.samples = MAX_SAMPLES + 1;
        assert!(cfg.validate().is_err());
        cfg.samples = MAX_SAMPLES;
        assert!(cfg.validate().is_ok());

        cfg.domain = Domain::Frequency {
            log2_n: 14,
            window: true,
            exclude_dc: false,
            hw_fft: false,
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.samples, 1024);
        assert!(matches!(cfg.domain, Domain::Frequency { log2_n: 10, .. }));

        cfg.domain = Domain::Frequency {
            log2_n: 14,
            window: false,
            exclude_dc: false,
            hw_fft: true,
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.samples, 16384);

        cfg.domain = Domain::Frequency {
            log2_n: 20,
            window: false,
            exclude_dc: false,
            hw_fft: true,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn targets_slave_first() {
        let mut cfg = CaptureConfig::new("master", 16);
        assert_eq!(cfg.targets(), ["master"]);
        cfg.slave = Some("slave".into());
        assert_eq!(cfg.targets(), ["slave", "master"]);
        assert_eq!(cfg.output_for("slave"), Path::new("samples_slave.txt"));
        assert_eq!(cfg.output_for("master"), Path::new("samples.txt"));
    }

    #[test]
    fn time_domain_capture() {
        let iio = FakeIio::new();
        let dir = converter(&iio, 0, "cf-ad9643-core-lpc");
        iio.set_data(0, &le_bytes(&[2, -2, 4, -4, 6, -6, 8, -8]));

        let ctx = iio.context();
        let caps = capture(&ctx, &CaptureConfig::new("cf-ad9643-core-lpc", 4)).unwrap();
        assert_eq!(caps.len(), 1);

        let cap = &caps[0];
        assert_eq!(cap.device, "cf-ad9643-core-lpc");
        assert_eq!(cap.bytes_read, 16);
        assert_eq!(cap.layout.record_size(), 4);
        assert_eq!(iio.read(&dir.join("buffer/length")), "16");
        assert_eq!(iio.read(&dir.join("buffer/enable")), "0");

        let stats = cap.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0], ChannelStats { min: 2, max: 8, avg: 5.0 });
        assert_eq!(stats[1], ChannelStats { min: -8, max: -2, avg: -5.0 });

        let mut out = Vec::new();
        cap.write_samples(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next(), Some("1.000000 -1.000000"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn short_read_is_zero_filled() {
        let iio = FakeIio::new();
        converter(&iio, 0, "adc");
        iio.set_data(0, &le_bytes(&[10, 20]));

        let mut cfg = CaptureConfig::new("adc", 4);
        cfg.channel_mask = 0x1;
        let caps = capture(&iio.context(), &cfg).unwrap();
        assert_eq!(caps[0].layout.len(), 1);
        assert_eq!(caps[0].bytes_read, 4);
        assert_eq!(caps[0].stats(), &[ChannelStats { min: 0, max: 20, avg: 7.5 }]);
    }

    #[test]
    fn ad9250_keeps_both_channels() {
        let iio = FakeIio::new();
        converter(&iio, 0, "cf-ad9250-core-lpc");
        iio.set_data(0, &le_bytes(&[10, -10, 20, -20]));

        let mut cfg = CaptureConfig::new("cf-ad9250-core-lpc", 2);
        cfg.channel_mask = 0x1;
        let caps = capture(&iio.context(), &cfg).unwrap();
        assert_eq!(caps[0].layout.len(), 2);
        assert_eq!(caps[0].layout.record_size(), 4);
        assert_eq!(caps[0].stats()[1], ChannelStats { min: -20, max: -10, avg: -15.0 });
    }

    #[test]
    fn master_and_slave() {
        let iio = FakeIio::new();
        let master = converter(&iio, 0, "cf-ad9643-core-lpc");
        let slave = converter(&iio, 1, "cf-ad9643-core-hpc");
        iio.set_data(0, &le_bytes(&[1, 1, 1, 1]));
        iio.set_data(1, &le_bytes(&[2, 2, 2, 2]));

        let mut cfg = CaptureConfig::new("cf-ad9643-core-lpc", 2);
        cfg.slave = Some("cf-ad9643-core-hpc".into());
        let caps = capture(&iio.context(), &cfg).unwrap();

        let names: Vec<_> = caps.iter().map(|c| c.device.as_str()).collect();
        assert_eq!(names, ["cf-ad9643-core-hpc", "cf-ad9643-core-lpc"]);
        assert_eq!(caps[0].stats()[0].max, 2);
        assert_eq!(caps[1].stats()[0].max, 1);

        for dir in [master, slave] {
            assert_eq!(iio.read(&dir.join("buffer/length")), "8");
            assert_eq!(iio.read(&dir.join("buffer/enable")), "0");
        }
    }

    #[test]
    fn missing_slave_fails() {
        let iio = FakeIio::new();
        converter(&iio, 0, "adc");
        let mut cfg = CaptureConfig::new("adc", 2);
        cfg.slave = Some("nope".into());
        assert!(matches!(
            capture(&iio.context(), &cfg),
            Err(Error::DeviceNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn frequency_domain_capture() {
        let iio = FakeIio::new();
        converter(&iio, 0, "adc");
        let mut vals = Vec::new();
        for _ in 0..8 {
            vals.extend_from_slice(&[1000, 0]);
        }
        iio.set_data(0, &le_bytes(&vals));

        let mut cfg = CaptureConfig::new("adc", 0);
        cfg.domain = Domain::Frequency {
            log2_n: 3,
            window: false,
            exclude_dc: true,
            hw_fft: false,
        };
        cfg.validate().unwrap();
        let caps = capture(&iio.context(), &cfg).unwrap();

        match &caps[0].data {
            CaptureData::Spectrum(bins) => {
                let idx: Vec<_> = bins.iter().map(|b| b.0).collect();
                assert_eq!(idx, [1, 2, 3]);
            }
            data => panic!("unexpected {:?}", data),
        }
        assert!(caps[0].stats().is_empty());
    }

    #[test]
    fn pattern_tests() {
        let iio = FakeIio::new();
        let dir = converter(&iio, 0, "cf-ad9643-core-lpc");
        iio.set_data(0, &[0; 32]);

        let ctx = iio.context();
        let outcomes = run_pattern_tests(&ctx, "cf-ad9643-core-lpc", None, 8).unwrap();
        assert_eq!(outcomes.len(), 5);

        let passed: Vec<_> = outcomes
            .iter()
            .map(|o| (o.pattern.mode, o.report.passed()))
            .collect();
        assert_eq!(
            passed,
            [
                ("midscale_short", true),
                ("pos_fullscale", false),
                ("neg_fullscale", false),
                ("checkerboard", false),
                ("one_zero_toggle", true),
            ]
        );
        assert_eq!(outcomes[1].report.errors, 8);

        assert_eq!(iio.read(&dir.join("in_voltage0_test_mode")), "off");
        assert_eq!(iio.read(&dir.join("in_voltage1_test_mode")), "off");
        assert_eq!(iio.read(&dir.join("buffer/length")), "32");
        assert_eq!(iio.read(&dir.join("buffer/enable")), "0");
    }

    #[test]
    fn failed_pattern_test_leaves_test_mode() {
        let iio = FakeIio::new();
        let dir = converter(&iio, 0, "cf-ad9250-core-lpc");

        // No device node, so the read fails.
        let res = run_pattern_tests(&iio.context(), "cf-ad9250-core-lpc", None, 8);
        assert!(res.is_err());
        assert_eq!(iio.read(&dir.join("in_voltage0_test_mode")), "off");

        assert!(run_pattern_tests(&iio.context(), "a", Some("a"), 8).is_err());
        assert!(run_pattern_tests(&iio.context(), "cf-ad9250-core-lpc", None, 1).is_err());
    }
}

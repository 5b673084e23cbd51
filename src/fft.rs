// iio-ndso/src/fft.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Fixed-point spectrum of a capture.
//!
//! The transform works on 16-bit Q15 data in place: a radix-2,
//! decimation-in-time FFT with a quarter-wave sine table, an optional
//! Hann window, and a conversion of each bin to a rough loudness in dB.
//!
//! The forward transform scales by 1/2 on every pass, so the result of
//! an `n` point transform is the true DFT divided by `n`. The inverse
//! transform only scales on the passes where the data would otherwise
//! overflow, and reports how many times it did.

use std::{f64::consts::PI, io::Write};

use crate::{scan, Channel, Error, Result};

/// Number of points in a full sine wave of the lookup table.
pub const N_WAVE: usize = 1024;

/// log2 of [`N_WAVE`]. This is the largest supported transform size.
pub const LOG2_N_WAVE: u32 = 10;

/// Number of 1 dB steps in the loudness table.
const N_LOUD: usize = 100;

/// Multiplies two Q15 fixed-point numbers, rounding the result.
pub fn fix_mpy(a: i16, b: i16) -> i16 {
    let c = (i32::from(a) * i32::from(b)) >> 14;
    ((c >> 1) + (c & 1)) as i16
}

/// The lookup tables of the fixed-point transform.
#[derive(Debug, Clone)]
pub struct Fft {
    /// Three quarters of a sine wave, in Q15
    sinewave: Vec<i16>,
    /// Squared amplitude thresholds, one per dB below full scale
    loud2: Vec<i64>,
}

impl Default for Fft {
    fn default() -> Self {
        Self::new()
    }
}

impl Fft {
    /// Builds the sine and loudness tables.
    pub fn new() -> Self {
        let sinewave = (0..N_WAVE - N_WAVE / 4)
            .map(|i| (32767.0 * (2.0 * PI * i as f64 / N_WAVE as f64).sin()) as i16)
            .collect();

        // The threshold between two steps is the mean of their squared
        // amplitudes.
        let ampl: Vec<i64> = (0..N_LOUD)
            .map(|i| (32767.0 * 10f64.powf(-(i as f64) / 20.0)) as i64)
            .collect();

        let mut loud2 = vec![0i64; N_LOUD];
        loud2[0] = ampl[0] * ampl[0];
        for i in 1..N_LOUD {
            let v = ampl[i] * ampl[i];
            loud2[i] = v;
            loud2[i - 1] = (loud2[i - 1] + v) / 2;
        }

        Self { sinewave, loud2 }
    }

    /// Gets the sine table entry for `i / N_WAVE` of a period.
    pub fn sine(&self, i: usize) -> Option<i16> {
        self.sinewave.get(i).copied()
    }

    /// Applies a Hann window to the data in place.
    ///
    /// The length of the data must be a power of two, from 2 to
    /// [`N_WAVE`].
    pub fn window(&self, fr: &mut [i16]) -> Result<()> {
        let n = fr.len();
        if !(2..=N_WAVE).contains(&n) || !n.is_power_of_two() {
            return Err(Error::InvalidConfig(format!("can't window {} points", n)));
        }

        let j = N_WAVE / n;
        let mut k = N_WAVE / 4;

        for v in &mut fr[..n / 2] {
            *v = fix_mpy(*v, 16384 - (self.sinewave[k] >> 1));
            k += j;
        }
        for v in &mut fr[n / 2..] {
            k -= j;
            *v = fix_mpy(*v, 16384 - (self.sinewave[k] >> 1));
        }
        Ok(())
    }

    /// Performs an in-place FFT of `2^log2_n` points.
    ///
    /// `fr` and `fi` hold the real and imaginary parts and are replaced
    /// by the transform. Returns the number of times the inverse
    /// transform scaled the data by 1/2, which is always zero for the
    /// forward transform.
    pub fn transform(
        &self,
        fr: &mut [i16],
        fi: &mut [i16],
        log2_n: u32,
        inverse: bool,
    ) -> Result<i32> {
        if log2_n > LOG2_N_WAVE {
            return Err(Error::InvalidConfig(format!(
                "FFT of 2^{} points is too large",
                log2_n
            )));
        }
        let n = 1usize << log2_n;
        if fr.len() < n || fi.len() < n {
            return Err(Error::BufferTooShort);
        }

        // Decimation in time: put the input in bit-reversed order.
        let nn = n - 1;
        let mut mr = 0;
        for m in 1..=nn {
            let mut l = n;
            loop {
                l >>= 1;
                if mr + l <= nn {
                    break;
                }
            }
            mr = (mr & (l - 1)) + l;
            if mr > m {
                fr.swap(m, mr);
                fi.swap(m, mr);
            }
        }

        let mut scale = 0;
        let mut l = 1;
        let mut k = LOG2_N_WAVE - 1;

        while l < n {
            let shift = if inverse {
                let overflow = fr[..n]
                    .iter()
                    .zip(&fi[..n])
                    .any(|(&r, &i)| i32::from(r).abs() > 16383 || i32::from(i).abs() > 16383);
                if overflow {
                    scale += 1;
                }
                overflow
            }
            else {
                true
            };

            let istep = l << 1;
            for m in 0..l {
                let j = m << k;
                let mut wr = self.sinewave[j + N_WAVE / 4];
                let mut wi = -self.sinewave[j];
                if inverse {
                    wi = -wi;
                }
                if shift {
                    wr >>= 1;
                    wi >>= 1;
                }

                for i in (m..n).step_by(istep) {
                    let j = i + l;
                    let tr = fix_mpy(wr, fr[j]).wrapping_sub(fix_mpy(wi, fi[j]));
                    let ti = fix_mpy(wr, fi[j]).wrapping_add(fix_mpy(wi, fr[j]));
                    let (mut qr, mut qi) = (fr[i], fi[i]);
                    if shift {
                        qr >>= 1;
                        qi >>= 1;
                    }
                    fr[j] = qr.wrapping_sub(tr);
                    fi[j] = qi.wrapping_sub(ti);
                    fr[i] = qr.wrapping_add(tr);
                    fi[i] = qi.wrapping_add(ti);
                }
            }
            k = k.saturating_sub(1);
            l = istep;
        }
        Ok(scale)
    }

    /// Converts a complex amplitude to dB below full scale, in whole
    /// steps from 0 down to -100.
    pub fn db_from_ampl(&self, re: i16, im: i16) -> i16 {
        let v = i64::from(re) * i64::from(re) + i64::from(im) * i64::from(im);
        let i = self
            .loud2
            .iter()
            .position(|&thresh| thresh <= v)
            .unwrap_or(N_LOUD);
        -(i as i16)
    }

    /// Computes the loudness of the first `n` bins of a transform.
    ///
    /// Each bin is offset by `(scale_shift + 1) * 6` dB, and clamped to
    /// 10 dB when `scale_shift` is positive, or to 0 dB otherwise.
    pub fn loudness(&self, fr: &[i16], fi: &[i16], n: usize, scale_shift: i32) -> Vec<i16> {
        let max: i32 = if scale_shift > 0 { 10 } else { 0 };
        let offset = (scale_shift + 1) * 6;

        fr.iter()
            .zip(fi)
            .take(n)
            .map(|(&re, &im)| {
                let db = i32::from(self.db_from_ampl(re, im)) + offset;
                db.min(max) as i16
            })
            .collect()
    }
}

/// How to turn a capture into a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumOptions {
    /// log2 of the number of points
    pub log2_n: u32,
    /// Whether to apply a Hann window first
    pub window: bool,
    /// The first bin to report. One skips the DC bin.
    pub start_bin: usize,
    /// Loudness scaling; see [`Fft::loudness()`]
    pub scale_shift: i32,
}

impl Default for SpectrumOptions {
    fn default() -> Self {
        Self {
            log2_n: LOG2_N_WAVE,
            window: false,
            start_bin: 0,
            // Lifts 14-bit converter data to 16-bit full scale.
            scale_shift: 2,
        }
    }
}

impl SpectrumOptions {
    /// The number of points of the transform.
    pub fn points(&self) -> usize {
        1 << self.log2_n
    }
}

/// Computes the loudness spectrum of a complex signal.
///
/// The first `2^log2_n` points of `real` and `imag` are transformed in
/// place. Returns `(bin, dB)` pairs from `start_bin` up to, but not
/// including, the Nyquist bin.
pub fn spectrum(
    real: &mut [i16],
    imag: &mut [i16],
    opts: &SpectrumOptions,
) -> Result<Vec<(usize, i16)>> {
    let fft = Fft::new();
    let n = opts.points();
    if real.len() < n || imag.len() < n {
        return Err(Error::BufferTooShort);
    }

    if opts.window {
        fft.window(&mut real[..n])?;
        fft.window(&mut imag[..n])?;
    }

    fft.transform(real, imag, opts.log2_n, false)?;
    let loud = fft.loudness(real, imag, n / 2, opts.scale_shift);

    Ok(loud
        .into_iter()
        .enumerate()
        .skip(opts.start_bin)
        .collect())
}

/// Gets the bins of a spectrum computed by the converter itself.
///
/// The real part of each record already holds the magnitude of a bin.
pub fn hw_spectrum(real: &[i16], start_bin: usize) -> Vec<(usize, i16)> {
    real[..real.len() / 2]
        .iter()
        .copied()
        .enumerate()
        .skip(start_bin)
        .collect()
}

/// Splits a capture into the real and imaginary input of a transform.
///
/// With one 16-bit channel, it's the real part and the imaginary part
/// is zero. With two, the first is real and the second imaginary.
/// Timestamps and other wide channels are ignored.
pub fn spectrum_input(
    raw: &[u8],
    channels: &[Channel],
    count: usize,
    record_size: usize,
) -> Result<(Vec<i16>, Vec<i16>)> {
    let (data, per_scan) = scan::raw_i16_samples(raw, channels, count, record_size)?;

    match per_scan {
        1 => {
            let imag = vec![0; data.len()];
            Ok((data, imag))
        }
        2 => Ok(data.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip()),
        n => Err(Error::UnsupportedChannelCount(n)),
    }
}

/// Writes a spectrum as text, one `bin magnitude` pair per line.
pub fn write_spectrum<W: Write>(mut out: W, bins: &[(usize, i16)]) -> std::io::Result<()> {
    for (bin, mag) in bins {
        writeln!(out, "{} {}", bin, mag)?;
    }
    Ok(())
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DataFormat, ScanLayout};
    use crate::testutil::le_bytes;

    fn layout(types: &[&str]) -> ScanLayout {
        let chans = types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Channel::new(&format!("voltage{}", i), i as u32, t.parse::<DataFormat>().unwrap())
            })
            .collect();
        ScanLayout::new(chans)
    }

    #[test]
    fn q15_multiply() {
        assert_eq!(fix_mpy(16384, 16384), 8192);
        assert_eq!(fix_mpy(32767, 32767), 32766);
        assert_eq!(fix_mpy(-16384, 16384), -8192);
        assert_eq!(fix_mpy(0, 12345), 0);
    }

    #[test]
    fn sine_table() {
        let fft = Fft::new();
        assert_eq!(fft.sine(0), Some(0));
        assert_eq!(fft.sine(7), Some(1406));
        assert_eq!(fft.sine(256), Some(32767));
        assert_eq!(fft.sine(512), Some(0));
        assert_eq!(fft.sine(640), Some(-23169));
        assert_eq!(fft.sine(767), Some(-32766));
        assert_eq!(fft.sine(768), None);
    }

    #[test]
    fn hann_window() {
        let fft = Fft::new();
        let mut data = [1000i16; 8];
        fft.window(&mut data).unwrap();
        assert_eq!(data, [0, 146, 500, 854, 854, 500, 146, 0]);

        assert!(fft.window(&mut [0i16; 6]).is_err());
        assert!(fft.window(&mut [0i16; 1]).is_err());
        assert!(fft.window(&mut vec![0i16; 2048]).is_err());
    }

    #[test]
    fn dc_transform() {
        let fft = Fft::new();
        let mut re = [1000i16; 8];
        let mut im = [0i16; 8];
        assert_eq!(fft.transform(&mut re, &mut im, 3, false).unwrap(), 0);
        assert_eq!(re, [1000, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(im, [0; 8]);

        // Back again, without overflow there's no scaling.
        assert_eq!(fft.transform(&mut re, &mut im, 3, true).unwrap(), 0);
        assert_eq!(re, [1000; 8]);
        assert_eq!(im, [0; 8]);
    }

    #[test]
    fn inverse_scaling() {
        let fft = Fft::new();
        let mut re = [0i16; 8];
        let mut im = [0i16; 8];
        re[0] = 16384;
        assert_eq!(fft.transform(&mut re, &mut im, 3, true).unwrap(), 1);
        assert_eq!(re, [8192; 8]);
        assert_eq!(im, [0; 8]);
    }

    #[test]
    fn tone_transform() {
        let fft = Fft::new();
        let mut re = [
            8000i16, 5656, 0, -5656, -8000, -5656, 0, 5656, 8000, 5656, 0, -5656, -8000, -5656,
            0, 5656,
        ];
        let mut im = [0i16; 16];
        fft.transform(&mut re, &mut im, 4, false).unwrap();

        let mut expected = [0i16; 16];
        expected[2] = 4000;
        expected[14] = 4000;
        assert_eq!(re, expected);
        assert_eq!(im, [0; 16]);
    }

    #[test]
    fn transform_limits() {
        let fft = Fft::new();
        let mut re = vec![0i16; 2048];
        let mut im = vec![0i16; 2048];
        assert!(matches!(
            fft.transform(&mut re, &mut im, 11, false),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            fft.transform(&mut re[..4], &mut im, 3, false),
            Err(Error::BufferTooShort)
        ));
    }

    #[test]
    fn loudness() {
        let fft = Fft::new();
        assert_eq!(fft.db_from_ampl(32767, 0), 0);
        assert_eq!(fft.db_from_ampl(16384, 0), -6);
        assert_eq!(fft.db_from_ampl(0, 0), -90);

        let zero = [0i16; 4];
        assert_eq!(fft.loudness(&zero, &zero, 4, 2), vec![-72; 4]);
        assert_eq!(fft.loudness(&zero, &zero, 4, 0), vec![-84; 4]);
        assert_eq!(fft.loudness(&zero, &zero, 2, 0).len(), 2);

        // Clamped at 10 dB
        let full = [32767i16; 2];
        assert_eq!(fft.loudness(&full, &zero, 2, 2), vec![10, 10]);
        assert_eq!(fft.loudness(&full, &zero, 2, 0), vec![0, 0]);
    }

    #[test]
    fn tone_spectrum() {
        let mut re = vec![
            8000i16, 5656, 0, -5656, -8000, -5656, 0, 5656, 8000, 5656, 0, -5656, -8000, -5656,
            0, 5656,
        ];
        let mut im = vec![0i16; 16];
        let opts = SpectrumOptions {
            log2_n: 4,
            start_bin: 1,
            ..SpectrumOptions::default()
        };
        let bins = spectrum(&mut re, &mut im, &opts).unwrap();
        assert_eq!(
            bins,
            vec![(1, -72), (2, 0), (3, -72), (4, -72), (5, -72), (6, -72), (7, -72)]
        );

        let mut out = Vec::new();
        write_spectrum(&mut out, &bins[..2]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 -72\n2 0\n");
    }

    #[test]
    fn windowed_spectrum() {
        let mut re = vec![1000i16; 8];
        let mut im = vec![0i16; 8];
        let opts = SpectrumOptions {
            log2_n: 3,
            window: true,
            ..SpectrumOptions::default()
        };
        let bins = spectrum(&mut re, &mut im, &opts).unwrap();
        assert_eq!(bins.len(), 4);
        assert_eq!(bins[0].0, 0);

        let mut short = vec![0i16; 4];
        assert!(matches!(
            spectrum(&mut short, &mut im, &opts),
            Err(Error::BufferTooShort)
        ));
    }

    #[test]
    fn hardware_bins() {
        let bins = hw_spectrum(&[7, 6, 5, 4, 3, 2], 1);
        assert_eq!(bins, vec![(1, 6), (2, 5)]);
    }

    #[test]
    fn input_from_capture() {
        let two = layout(&["le:s16/16>>0", "le:s16/16>>0"]);
        let raw = le_bytes(&[1, -1, 2, -2, 3, -3]);
        let (re, im) = spectrum_input(&raw, two.channels(), 3, two.record_size()).unwrap();
        assert_eq!(re, vec![1, 2, 3]);
        assert_eq!(im, vec![-1, -2, -3]);

        let one = layout(&["le:s16/16>>0"]);
        let (re, im) = spectrum_input(&raw, one.channels(), 4, one.record_size()).unwrap();
        assert_eq!(re, vec![1, -1, 2, -2]);
        assert_eq!(im, vec![0; 4]);

        let three = layout(&["le:s16/16>>0", "le:s16/16>>0", "le:s16/16>>0"]);
        assert!(matches!(
            spectrum_input(&raw, three.channels(), 2, three.record_size()),
            Err(Error::UnsupportedChannelCount(3))
        ));
    }
}

// iio-ndso/src/attr.rs
//
// Copyright (c) 2018-2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Reading and writing sysfs attributes.
//!
//! Every IIO attribute is a small text file in sysfs holding a single
//! value. The functions here read and write those files, converting to
//! and from Rust types through the [`FromAttribute`] and [`ToAttribute`]
//! traits.
//!

use std::{fs, path::Path};

use log::debug;

use crate::{Error, Result};

/// Conversion of a sysfs attribute string into a value.
pub trait FromAttribute: Sized {
    /// Converts the attribute text into a value.
    fn from_attr(s: &str) -> Result<Self>;
}

/// Conversion of a value into a sysfs attribute string.
pub trait ToAttribute {
    /// Converts the value into attribute text.
    fn to_attr(&self) -> Result<String>;
}

// The first whitespace-delimited token, the way the kernel prints values.
fn first_token(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or("")
}

fn parse_err(s: &str) -> Error {
    Error::ParseAttr {
        attr: String::new(),
        value: s.trim().to_string(),
    }
}

/// Parses an integer in decimal, or in hex with a `0x` prefix.
pub(crate) fn parse_int(s: &str) -> Option<i64> {
    let tok = first_token(s);
    let (neg, digits) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok.strip_prefix('+').unwrap_or(tok)),
    };
    let val = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if neg { -val } else { val })
}

impl FromAttribute for String {
    fn from_attr(s: &str) -> Result<Self> {
        Ok(s.trim_end_matches('\n').to_string())
    }
}

impl FromAttribute for bool {
    fn from_attr(s: &str) -> Result<Self> {
        match first_token(s) {
            "1" | "Y" | "y" => Ok(true),
            "0" | "N" | "n" => Ok(false),
            _ => Err(parse_err(s)),
        }
    }
}

impl FromAttribute for i64 {
    fn from_attr(s: &str) -> Result<Self> {
        parse_int(s).ok_or_else(|| parse_err(s))
    }
}

impl FromAttribute for u32 {
    fn from_attr(s: &str) -> Result<Self> {
        parse_int(s)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| parse_err(s))
    }
}

impl FromAttribute for usize {
    fn from_attr(s: &str) -> Result<Self> {
        parse_int(s)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| parse_err(s))
    }
}

impl FromAttribute for f64 {
    fn from_attr(s: &str) -> Result<Self> {
        first_token(s).parse().map_err(|_| parse_err(s))
    }
}

impl ToAttribute for bool {
    fn to_attr(&self) -> Result<String> {
        Ok(if *self { "1" } else { "0" }.into())
    }
}

impl ToAttribute for i64 {
    fn to_attr(&self) -> Result<String> {
        Ok(self.to_string())
    }
}

impl ToAttribute for usize {
    fn to_attr(&self) -> Result<String> {
        Ok(self.to_string())
    }
}

impl ToAttribute for f64 {
    fn to_attr(&self) -> Result<String> {
        Ok(self.to_string())
    }
}

impl ToAttribute for &str {
    fn to_attr(&self) -> Result<String> {
        Ok((*self).to_string())
    }
}

impl ToAttribute for (u32, u32) {
    fn to_attr(&self) -> Result<String> {
        Ok(format!("{} {}", self.0, self.1))
    }
}

// --------------------------------------------------------------------------

/// Reads the raw text of the attribute `attr` in directory `dir`.
pub fn read_attr_str(dir: &Path, attr: &str) -> Result<String> {
    let path = dir.join(attr);
    let sval = fs::read_to_string(&path)?;
    debug!("read {} = {:?}", path.display(), sval.trim_end());
    Ok(sval)
}

/// Reads the attribute `attr` in directory `dir`, converted to a value.
pub fn read_attr<T: FromAttribute>(dir: &Path, attr: &str) -> Result<T> {
    let sval = read_attr_str(dir, attr)?;
    T::from_attr(&sval).map_err(|_| Error::ParseAttr {
        attr: attr.to_string(),
        value: sval.trim().to_string(),
    })
}

/// Writes the text `val` to the attribute `attr` in directory `dir`.
pub fn write_attr_str(dir: &Path, attr: &str, val: &str) -> Result<()> {
    let path = dir.join(attr);
    debug!("write {} = {:?}", path.display(), val);
    fs::write(&path, val)?;
    Ok(())
}

/// Writes a value to the attribute `attr` in directory `dir`.
pub fn write_attr<T: ToAttribute>(dir: &Path, attr: &str, val: T) -> Result<()> {
    let sval = val.to_attr()?;
    write_attr_str(dir, attr, &sval)
}

// --------------------------------------------------------------------------
//                              Unit Tests
// --------------------------------------------------------------------------

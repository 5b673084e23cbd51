// iio-ndso/src/testutil.rs
//
// Copyright (c) 2026, Frank Pagliughi
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! A fake IIO file system tree for the unit tests.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::{channel::SCAN_ELEMENTS_DIR, Context};

pub(crate) struct FakeIio {
    dir: TempDir,
}

impl FakeIio {
    pub fn new() -> Self {
        let iio = FakeIio {
            dir: tempfile::tempdir().unwrap(),
        };
        iio.mkdir(&iio.sysfs());
        iio.mkdir(&iio.dev());
        iio.mkdir(&iio.debugfs());
        iio
    }

    pub fn sysfs(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    pub fn dev(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    pub fn debugfs(&self) -> PathBuf {
        self.dir.path().join("debug")
    }

    pub fn context(&self) -> Context {
        Context::with_roots(self.sysfs(), self.dev(), self.debugfs())
    }

    pub fn mkdir(&self, path: &Path) {
        fs::create_dir_all(path).unwrap();
    }

    pub fn write(&self, path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    /// Adds a device with an empty scan elements directory and a buffer.
    pub fn add_device(&self, num: u32, name: &str) -> PathBuf {
        let dir = self.sysfs().join(format!("iio:device{}", num));
        self.mkdir(&dir.join(SCAN_ELEMENTS_DIR));
        self.mkdir(&dir.join("buffer"));
        self.write(&dir.join("name"), &format!("{}\n", name));
        self.write(&dir.join("buffer/length"), "0\n");
        self.write(&dir.join("buffer/enable"), "0\n");

        let dbg = self.debugfs().join(format!("iio:device{}", num));
        self.mkdir(&dbg);
        self.write(&dbg.join("direct_reg_access"), "0x0\n");
        dir
    }

    pub fn add_channel(&self, dev: &Path, name: &str, index: u32, type_: &str, enabled: bool) {
        let scan = dev.join(SCAN_ELEMENTS_DIR);
        self.write(&scan.join(format!("{}_en", name)), if enabled { "1\n" } else { "0\n" });
        self.write(&scan.join(format!("{}_index", name)), &format!("{}\n", index));
        self.write(&scan.join(format!("{}_type", name)), &format!("{}\n", type_));
    }

    /// Sets the bytes the device node returns on a read.
    pub fn set_data(&self, num: u32, data: &[u8]) {
        fs::write(self.dev().join(format!("iio:device{}", num)), data).unwrap();
    }
}

/// Packs 16-bit samples into little-endian bytes.
pub(crate) fn le_bytes(vals: &[i16]) -> Vec<u8> {
    vals.iter().flat_map(|v| v.to_le_bytes()).collect()
}

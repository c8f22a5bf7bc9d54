//! Seekable byte input with latched validity.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

/// A seekable binary input over a file.
///
/// All reads are exact-count: a short read means the source has gone bad,
/// and the validity flag latches false. Once latched, every further read
/// and seek is a no-op returning `false`; the handle itself stays open
/// until [`close`](ByteSource::close) releases it.
#[derive(Debug)]
pub struct ByteSource {
    file: Option<File>,
    valid: bool,
}

impl ByteSource {
    /// Open a file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(ByteSource {
            file: Some(file),
            valid: true,
        })
    }

    /// Release the file handle.
    pub fn close(&mut self) {
        self.valid = false;
        self.file = None;
    }

    /// Whether a file handle is held.
    pub fn is_opened(&self) -> bool {
        self.file.is_some()
    }

    /// Whether the source is still good for reading.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Read exactly `dst.len()` bytes.
    ///
    /// Returns `false` and latches invalid on a short read; the contents
    /// of `dst` are unspecified in that case.
    pub fn read(&mut self, dst: &mut [u8]) -> bool {
        if !self.valid {
            return false;
        }
        match self.file.as_mut() {
            Some(file) => {
                self.valid = file.read_exact(dst).is_ok();
            }
            None => self.valid = false,
        }
        self.valid
    }

    /// Seek to an absolute offset from the start of the file.
    pub fn seek(&mut self, pos: u64) -> bool {
        if !self.valid {
            return false;
        }
        match self.file.as_mut() {
            Some(file) => {
                self.valid = file.seek(SeekFrom::Start(pos)).is_ok();
            }
            None => self.valid = false,
        }
        self.valid
    }

    /// Current offset from the start of the file.
    pub fn position(&mut self) -> u64 {
        self.file
            .as_mut()
            .and_then(|file| file.stream_position().ok())
            .unwrap_or(0)
    }
}

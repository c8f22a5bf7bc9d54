//! Buffered byte output with back-patching and JPEG byte-stuffing.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::chunks::FourCC;
use crate::error::Result;

/// Bytes buffered before a block is spilled to the file.
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 15;

/// Extra room past the block boundary so that a multi-byte write may land
/// before the flush check runs. The largest single write is 8 bytes
/// (a fully stuffed [`jput`](BitSink::jput)).
const OVERRUN_MARGIN: usize = 1024;

/// A buffered, seekable binary output.
///
/// Three write disciplines share one buffer: raw little-endian writes for
/// RIFF structure, big-endian writes with `0xFF 00` stuffing for JPEG
/// entropy data, and back-patching of 32-bit size fields at positions that
/// may or may not still be resident in the buffer.
///
/// A failed block write latches the sink invalid and leaves the file
/// truncated at the last position that reached it; writes are never rolled
/// back.
#[derive(Debug)]
pub struct BitSink {
    buf: Vec<u8>,
    /// Write cursor within `buf`.
    current: usize,
    /// Bytes already spilled to the file.
    flushed: u64,
    file: Option<File>,
    valid: bool,
}

impl BitSink {
    /// Create the output file and an empty buffer.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(BitSink {
            buf: vec![0u8; DEFAULT_BLOCK_SIZE + OVERRUN_MARGIN],
            current: 0,
            flushed: 0,
            file: Some(file),
            valid: true,
        })
    }

    /// Flush any buffered bytes and release the file handle.
    pub fn close(&mut self) {
        self.write_block();
        self.file = None;
    }

    /// Whether a file handle is held.
    pub fn is_opened(&self) -> bool {
        self.file.is_some()
    }

    /// Whether every block so far reached the file.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Logical offset of the next byte to be written.
    pub fn pos(&self) -> u64 {
        self.flushed + self.current as u64
    }

    /// Spill `[0, current)` to the file and reset the cursor.
    ///
    /// The logical position advances even if the write fails; the failure
    /// latches [`is_valid`](BitSink::is_valid) false.
    pub fn write_block(&mut self) {
        if self.current > 0 {
            if let Some(file) = self.file.as_mut() {
                if let Err(err) = file.write_all(&self.buf[..self.current]) {
                    log::error!("failed to write {} byte block: {}", self.current, err);
                    self.valid = false;
                }
            }
        }
        self.flushed += self.current as u64;
        self.current = 0;
    }

    fn maybe_flush(&mut self) {
        if self.current >= DEFAULT_BLOCK_SIZE {
            self.write_block();
        }
    }

    /// Write one byte.
    pub fn put_byte(&mut self, val: u8) {
        self.buf[self.current] = val;
        self.current += 1;
        self.maybe_flush();
    }

    /// Write a byte slice.
    pub fn put_bytes(&mut self, data: &[u8]) {
        debug_assert!(self.is_opened());
        self.maybe_flush();

        let mut rest = data;
        while !rest.is_empty() {
            let room = (DEFAULT_BLOCK_SIZE - self.current).min(rest.len());
            self.buf[self.current..self.current + room].copy_from_slice(&rest[..room]);
            self.current += room;
            rest = &rest[room..];
            self.maybe_flush();
        }
    }

    /// Write a 16-bit value, little-endian.
    pub fn put_short(&mut self, val: u16) {
        LittleEndian::write_u16(&mut self.buf[self.current..self.current + 2], val);
        self.current += 2;
        self.maybe_flush();
    }

    /// Write a 32-bit value, little-endian.
    pub fn put_int(&mut self, val: u32) {
        LittleEndian::write_u32(&mut self.buf[self.current..self.current + 4], val);
        self.current += 4;
        self.maybe_flush();
    }

    /// Write a FourCC tag in its on-disk byte order.
    pub fn put_fourcc(&mut self, cc: FourCC) {
        self.buf[self.current..self.current + 4].copy_from_slice(cc.as_bytes());
        self.current += 4;
        self.maybe_flush();
    }

    /// Write a 16-bit value, big-endian (JPEG segment sizes).
    pub fn jput_short(&mut self, val: u16) {
        BigEndian::write_u16(&mut self.buf[self.current..self.current + 2], val);
        self.current += 2;
        self.maybe_flush();
    }

    /// Overwrite the 4 little-endian bytes at an earlier absolute position.
    ///
    /// Patches in place while the target is still resident in the buffer;
    /// otherwise seeks the file, rewrites the field, and restores the write
    /// position. A field must lie entirely on one side of the
    /// flushed/resident boundary.
    pub fn patch_int(&mut self, val: u32, pos: u64) {
        if pos >= self.flushed {
            let delta = (pos - self.flushed) as usize;
            assert!(delta + 4 <= self.current);
            LittleEndian::write_u32(&mut self.buf[delta..delta + 4], val);
        } else {
            debug_assert!(pos + 4 <= self.flushed);
            let Some(file) = self.file.as_mut() else {
                return;
            };
            let mut bytes = [0u8; 4];
            LittleEndian::write_u32(&mut bytes, val);
            let patched = file
                .stream_position()
                .and_then(|saved| {
                    file.seek(SeekFrom::Start(pos))?;
                    file.write_all(&bytes)?;
                    file.seek(SeekFrom::Start(saved))
                })
                .is_ok();
            if !patched {
                log::error!("failed to patch size field at offset {}", pos);
                self.valid = false;
            }
        }
    }

    /// Write a 32-bit value most-significant byte first, inserting a zero
    /// byte after every `0xFF` (JPEG byte-stuffing).
    pub fn jput(&mut self, currval: u32) {
        for shift in [24u32, 16, 8, 0] {
            let v = (currval >> shift) as u8;
            self.buf[self.current] = v;
            self.current += 1;
            if v == 0xFF {
                self.buf[self.current] = 0;
                self.current += 1;
            }
        }
        self.maybe_flush();
    }

    /// Finalize a JPEG entropy bit buffer: pad the positions below
    /// `bit_idx` with one-bits, then emit the remaining whole bytes with
    /// stuffing until the buffer is drained.
    pub fn jflush(&mut self, currval: u32, bit_idx: u32) {
        debug_assert!(bit_idx <= 32);
        let mut val = currval | (((1u64 << bit_idx) - 1) as u32);
        let mut idx = bit_idx;
        while idx < 32 {
            let v = (val >> 24) as u8;
            self.buf[self.current] = v;
            self.current += 1;
            if v == 0xFF {
                self.buf[self.current] = 0;
                self.current += 1;
            }
            val <<= 8;
            idx += 8;
        }
        self.maybe_flush();
    }
}

impl Drop for BitSink {
    fn drop(&mut self) {
        self.close();
    }
}

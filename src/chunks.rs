//! RIFF chunk and list headers, FourCC tags, and `idx1` index entries.

use byteorder::{ByteOrder, LittleEndian};

use crate::source::ByteSource;

/// FourCC (Four Character Code) identifier.
///
/// Four ASCII bytes interpreted as a little-endian 32-bit tag. All tags
/// used by this crate are constructible at compile time (`FourCC(*b"RIFF")`).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create from bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }

    /// The tag as a little-endian 32-bit integer, as it appears on disk.
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Rebuild a tag from its on-disk 32-bit form.
    pub const fn from_u32(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCC(\"{}\")", self)
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

/// Well-known chunk and list tags.
pub mod chunk_ids {
    use super::FourCC;

    pub const RIFF: FourCC = FourCC(*b"RIFF");
    pub const LIST: FourCC = FourCC(*b"LIST");
    pub const AVI: FourCC = FourCC(*b"AVI ");
    pub const AVIX: FourCC = FourCC(*b"AVIX");
    pub const HDRL: FourCC = FourCC(*b"hdrl");
    pub const AVIH: FourCC = FourCC(*b"avih");
    pub const STRL: FourCC = FourCC(*b"strl");
    pub const STRH: FourCC = FourCC(*b"strh");
    pub const STRF: FourCC = FourCC(*b"strf");
    pub const VIDS: FourCC = FourCC(*b"vids");
    pub const MJPG: FourCC = FourCC(*b"MJPG");
    pub const MOVI: FourCC = FourCC(*b"movi");
    pub const IDX1: FourCC = FourCC(*b"idx1");
    pub const JUNK: FourCC = FourCC(*b"JUNK");
    pub const INFO: FourCC = FourCC(*b"INFO");
    pub const ODML: FourCC = FourCC(*b"odml");
    pub const DMLH: FourCC = FourCC(*b"dmlh");
}

/// Kind of per-stream data chunk, encoded in the tag suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Uncompressed video frame (`db`).
    VideoUncompressed,
    /// Compressed video frame (`dc`).
    VideoCompressed,
    /// Palette change (`pc`).
    PaletteChange,
    /// Audio data (`wb`).
    Audio,
}

impl ChunkKind {
    fn suffix(self) -> [u8; 2] {
        match self {
            ChunkKind::VideoUncompressed => *b"db",
            ChunkKind::VideoCompressed => *b"dc",
            ChunkKind::PaletteChange => *b"pc",
            ChunkKind::Audio => *b"wb",
        }
    }
}

/// Build the `NNxx` tag for a stream's data chunks.
///
/// `NN` is the stream number as two ASCII decimal digits, so stream 0's
/// compressed video chunks are tagged `00dc`. The same derivation is used
/// when emitting chunks and when matching index entries against a stream.
pub fn stream_chunk(stream_number: u8, kind: ChunkKind) -> FourCC {
    let suffix = kind.suffix();
    FourCC([
        b'0' + stream_number / 10,
        b'0' + stream_number % 10,
        suffix[0],
        suffix[1],
    ])
}

/// 8-byte RIFF chunk header. `size` excludes the header itself.
#[derive(Debug, Clone, Copy)]
pub struct RiffChunk {
    pub fourcc: FourCC,
    pub size: u32,
}

impl RiffChunk {
    /// Read a chunk header from the source. `None` on short read.
    pub fn read_from(source: &mut ByteSource) -> Option<Self> {
        let mut buf = [0u8; 8];
        if !source.read(&mut buf) {
            return None;
        }
        Some(RiffChunk {
            fourcc: FourCC([buf[0], buf[1], buf[2], buf[3]]),
            size: LittleEndian::read_u32(&buf[4..8]),
        })
    }
}

/// 12-byte RIFF list header (`RIFF` or `LIST`).
///
/// `size` counts from just past the size field to the end of the list, so
/// it includes the 4-byte `list_type` that has already been consumed once
/// the header is read.
#[derive(Debug, Clone, Copy)]
pub struct RiffList {
    pub fourcc: FourCC,
    pub size: u32,
    pub list_type: FourCC,
}

impl RiffList {
    /// Read a list header from the source. `None` on short read.
    pub fn read_from(source: &mut ByteSource) -> Option<Self> {
        let mut buf = [0u8; 12];
        if !source.read(&mut buf) {
            return None;
        }
        Some(RiffList {
            fourcc: FourCC([buf[0], buf[1], buf[2], buf[3]]),
            size: LittleEndian::read_u32(&buf[4..8]),
            list_type: FourCC([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// 16-byte `idx1` index entry.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    /// Tag of the chunk the entry points at.
    pub chunk_id: FourCC,
    /// Entry flags.
    pub flags: u32,
    /// Chunk offset relative to the `movi` list's type word.
    pub offset: u32,
    /// Length of the chunk data.
    pub size: u32,
}

impl IndexEntry {
    /// Keyframe flag.
    pub const KEYFRAME: u32 = 0x10;

    /// Read an entry from the source. `None` on short read.
    pub fn read_from(source: &mut ByteSource) -> Option<Self> {
        let mut buf = [0u8; 16];
        if !source.read(&mut buf) {
            return None;
        }
        Some(IndexEntry {
            chunk_id: FourCC([buf[0], buf[1], buf[2], buf[3]]),
            flags: LittleEndian::read_u32(&buf[4..8]),
            offset: LittleEndian::read_u32(&buf[8..12]),
            size: LittleEndian::read_u32(&buf[12..16]),
        })
    }

    /// Check the keyframe flag.
    pub fn is_keyframe(&self) -> bool {
        (self.flags & Self::KEYFRAME) != 0
    }
}

//! AVI header structures and writer layout constants.

use crate::chunks::{chunk_ids, FourCC};

/// Size of the `avih` and `strh` payloads on disk.
pub const AVIH_STRH_SIZE: u32 = 56;
/// Size of the BITMAPINFOHEADER written as the `strf` payload.
pub const STRF_SIZE: u32 = 40;
/// Main header flags written by the muxer:
/// HAS_INDEX | IS_INTERLEAVED | WAS_CAPTURE_FILE.
pub const AVI_DWFLAG: u32 = 0x0000_0910;
/// `avih` flag bit signalling that an `idx1` chunk is present.
pub const AVIF_HASINDEX: u32 = 0x10;
/// Time scale for video streams; FPS is `rate / scale`.
pub const AVI_DWSCALE: u32 = 1;
/// Encoding quality. −1 lets drivers pick their default.
pub const AVI_DWQUALITY: i32 = -1;
/// File offset the `JUNK` padding chunk fills up to.
pub const JUNK_SEEK: u64 = 4096;
/// `idx1` keyframe flag.
pub const AVIIF_KEYFRAME: u32 = 0x10;
/// Declared maximum data rate.
pub const MAX_BYTES_PER_SEC: u32 = 99_999_999;
/// Suggested read buffer size written into the headers.
pub const SUG_BUFFER_SIZE: u32 = 1_048_576;

/// Codec carried in the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Motion JPEG: every frame is an independent JPEG still.
    Mjpeg,
}

impl Codec {
    /// Handler tag written into `strh` and `strf`.
    pub fn handler(self) -> FourCC {
        match self {
            Codec::Mjpeg => chunk_ids::MJPG,
        }
    }
}

/// Main AVI header (`avih` payload).
#[derive(Debug, Clone, Default)]
pub struct AviHeader {
    /// Period between video frames.
    pub micro_sec_per_frame: u32,
    /// Maximum data rate of the file.
    pub max_bytes_per_sec: u32,
    pub reserved1: u32,
    /// Raw flag word; see [`AviHeader::has_index`].
    pub flags: u32,
    /// Total number of frames of data in the file.
    pub total_frames: u32,
    /// Used for interleaved files.
    pub initial_frames: u32,
    /// Number of streams in the file.
    pub streams: u32,
    /// Suggested buffer size for reading the file.
    pub suggested_buffer_size: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl AviHeader {
    /// Whether the file declares an `idx1` index chunk.
    pub fn has_index(&self) -> bool {
        (self.flags & AVIF_HASINDEX) != 0
    }
}

/// Stream header (`strh` payload).
#[derive(Debug, Clone, Default)]
pub struct StreamHeader {
    /// Stream type tag (`vids`, `auds`, ...).
    pub fcc_type: FourCC,
    /// Handler/codec tag.
    pub fcc_handler: FourCC,
    pub flags: u32,
    /// Priority and language packed in one dword.
    pub priority: u32,
    pub initial_frames: u32,
    /// Time scale.
    pub scale: u32,
    /// Rate; frame rate for video streams is `rate / scale`.
    pub rate: u32,
    pub start: u32,
    /// Number of frames (playing time in `scale`/`rate` units).
    pub length: u32,
    pub suggested_buffer_size: u32,
    /// −1 means driver default quality.
    pub quality: u32,
    /// 0 means each frame is in its own chunk.
    pub sample_size: u32,
    /// Used if the stream has a different size than the file rectangle.
    pub frame: Rect,
}

impl StreamHeader {
    /// Frame rate in frames per second, 0.0 if the scale is missing.
    pub fn frame_rate(&self) -> f64 {
        if self.scale > 0 {
            self.rate as f64 / self.scale as f64
        } else {
            0.0
        }
    }
}

/// Rectangle stored in `strh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

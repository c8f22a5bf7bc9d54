//! MJPEG/AVI Container Format
//!
//! This crate reads and writes AVI (Audio Video Interleave) files in the
//! subset used for Motion-JPEG video: a single `vids`/`MJPG` stream with a
//! legacy `idx1` index. AVI is based on the RIFF (Resource Interchange
//! File Format) structure.
//!
//! # Features
//!
//! - RIFF chunk traversal and `idx1` index parsing, with a linear `movi`
//!   scan as the fallback for unindexed files
//! - Frame-at-a-time AVI assembly with back-patched size fields
//! - A buffered bit sink with the JPEG-side write disciplines (big-endian
//!   emission, `0xFF 00` byte-stuffing, entropy-buffer flush) so a JPEG
//!   encoder can write straight into the open video chunk
//! - Concatenated `RIFF/AVI ` + `RIFF/AVIX` sections on the read side
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_avi::{AviDemuxer, AviMuxer, ChunkKind, Codec};
//!
//! // Write two JPEG payloads into an AVI file
//! let mut muxer = AviMuxer::create("out.avi", 30.0, 640, 480, true).unwrap();
//! muxer.start_avi(1);
//! muxer.write_stream_header(Codec::Mjpeg);
//! for jpeg in [&b"\xFF\xD8\xFF\xD9"[..], &b"\xFF\xD8\x00\xFF\xD9"[..]] {
//!     muxer.start_frame();
//!     muxer.put_bytes(jpeg);
//!     muxer.end_frame();
//! }
//! muxer.write_index(0, ChunkKind::VideoCompressed);
//! muxer.finish().unwrap();
//!
//! // Read them back
//! let mut demuxer = AviDemuxer::open("out.avi").unwrap();
//! if demuxer.parse() {
//!     for frame in demuxer.frames().to_vec() {
//!         let jpeg = demuxer.read_frame(&frame).unwrap();
//!         println!("{} bytes", jpeg.len());
//!     }
//! }
//! ```

mod chunks;
mod demuxer;
mod error;
mod muxer;
mod sink;
mod source;
mod types;

pub use chunks::{chunk_ids, stream_chunk, ChunkKind, FourCC, IndexEntry, RiffChunk, RiffList};
pub use demuxer::{AviDemuxer, FrameDescriptor};
pub use error::{AviError, Result};
pub use muxer::AviMuxer;
pub use sink::BitSink;
pub use source::ByteSource;
pub use types::{AviHeader, Codec, Rect, StreamHeader};

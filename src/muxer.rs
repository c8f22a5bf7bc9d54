//! AVI muxer: lays down the header skeleton, frames the JPEG payloads, and
//! emits the legacy `idx1` index.

use std::path::Path;

use crate::chunks::{chunk_ids, stream_chunk, ChunkKind, FourCC};
use crate::error::{AviError, Result};
use crate::sink::BitSink;
use crate::types::{
    Codec, AVIH_STRH_SIZE, AVIIF_KEYFRAME, AVI_DWFLAG, AVI_DWQUALITY, AVI_DWSCALE, JUNK_SEEK,
    MAX_BYTES_PER_SEC, STRF_SIZE, SUG_BUFFER_SIZE,
};

/// Writer for AVI files carrying a single MJPEG video stream.
///
/// The file is assembled one frame at a time: the caller brackets each
/// frame with [`start_frame`](AviMuxer::start_frame) /
/// [`end_frame`](AviMuxer::end_frame) and pushes the JPEG payload through
/// the sink passthroughs in between. Every size field that cannot be known
/// up front is reserved as a zero slot and back-patched, so the output file
/// must be seekable.
///
/// ```no_run
/// use mjpeg_avi::{AviMuxer, ChunkKind, Codec};
///
/// let mut muxer = AviMuxer::create("out.avi", 30.0, 640, 480, true).unwrap();
/// muxer.start_avi(1);
/// muxer.write_stream_header(Codec::Mjpeg);
/// muxer.start_frame();
/// muxer.put_bytes(&[0xFF, 0xD8, 0xFF, 0xD9]);
/// muxer.end_frame();
/// muxer.write_index(0, ChunkKind::VideoCompressed);
/// muxer.finish().unwrap();
/// ```
#[derive(Debug)]
pub struct AviMuxer {
    sink: BitSink,
    fps: u32,
    width: u32,
    height: u32,
    channels: u32,
    /// Position of the `movi` type word; frame offsets are relative to it.
    movi_pointer: u64,
    frame_offset: Vec<u64>,
    frame_size: Vec<u64>,
    /// Size slots of the chunks currently open, innermost last.
    chunk_slots: Vec<u64>,
    /// The header slots that receive the final frame count.
    frame_count_slots: Vec<u64>,
}

impl AviMuxer {
    /// Create the output file.
    pub fn create<P: AsRef<Path>>(
        path: P,
        fps: f64,
        width: u32,
        height: u32,
        is_color: bool,
    ) -> Result<Self> {
        let sink = BitSink::create(path)?;
        Ok(AviMuxer {
            sink,
            fps: fps.round() as u32,
            width,
            height,
            channels: if is_color { 3 } else { 1 },
            movi_pointer: 0,
            frame_offset: Vec::new(),
            frame_size: Vec::new(),
            chunk_slots: Vec::new(),
            frame_count_slots: Vec::new(),
        })
    }

    /// Open the outer `RIFF/AVI ` chunk and write the main header.
    pub fn start_avi(&mut self, stream_count: u32) {
        self.start_chunk(chunk_ids::RIFF);
        self.sink.put_fourcc(chunk_ids::AVI);

        self.start_chunk(chunk_ids::LIST);
        self.sink.put_fourcc(chunk_ids::HDRL);
        self.sink.put_fourcc(chunk_ids::AVIH);
        self.sink.put_int(AVIH_STRH_SIZE);
        self.sink.put_int((1e6 / f64::from(self.fps)).round() as u32);
        self.sink.put_int(MAX_BYTES_PER_SEC);
        self.sink.put_int(0);
        self.sink.put_int(AVI_DWFLAG);

        self.frame_count_slots.push(self.sink.pos());

        self.sink.put_int(0); // total frames, patched at finish
        self.sink.put_int(0);
        self.sink.put_int(stream_count);
        self.sink.put_int(SUG_BUFFER_SIZE);
        self.sink.put_int(self.width);
        self.sink.put_int(self.height);
        for _ in 0..4 {
            self.sink.put_int(0);
        }
    }

    /// Write the `strl` list, the `odml/dmlh` placeholder, the `JUNK`
    /// padding, and open the `movi` list.
    pub fn write_stream_header(&mut self, codec: Codec) {
        // strh
        self.start_chunk(chunk_ids::LIST);
        self.sink.put_fourcc(chunk_ids::STRL);
        self.sink.put_fourcc(chunk_ids::STRH);
        self.sink.put_int(AVIH_STRH_SIZE);
        self.sink.put_fourcc(chunk_ids::VIDS);
        self.sink.put_fourcc(codec.handler());
        self.sink.put_int(0);
        self.sink.put_int(0);
        self.sink.put_int(0);
        self.sink.put_int(AVI_DWSCALE);
        self.sink.put_int(self.fps);
        self.sink.put_int(0);

        self.frame_count_slots.push(self.sink.pos());

        self.sink.put_int(0); // stream length, patched at finish
        self.sink.put_int(SUG_BUFFER_SIZE);
        self.sink.put_int(AVI_DWQUALITY as u32);
        self.sink.put_int(0);
        self.sink.put_short(0);
        self.sink.put_short(0);
        self.sink.put_short(self.width as u16);
        self.sink.put_short(self.height as u16);

        // strf (the BITMAPINFOHEADER for video)
        self.start_chunk(chunk_ids::STRF);
        self.sink.put_int(STRF_SIZE);
        self.sink.put_int(self.width);
        self.sink.put_int(self.height);
        self.sink.put_short(1); // planes
        self.sink.put_short((8 * self.channels) as u16);
        self.sink.put_fourcc(codec.handler());
        self.sink.put_int(self.width * self.height * self.channels);
        self.sink.put_int(0);
        self.sink.put_int(0);
        self.sink.put_int(0);
        self.sink.put_int(0);
        self.end_chunk(); // strf

        self.end_chunk(); // strl

        // odml/dmlh placeholder; its frame count is patched at finish
        self.start_chunk(chunk_ids::LIST);
        self.sink.put_fourcc(chunk_ids::ODML);
        self.start_chunk(chunk_ids::DMLH);

        self.frame_count_slots.push(self.sink.pos());

        self.sink.put_int(0);
        self.sink.put_int(0);
        self.end_chunk(); // dmlh
        self.end_chunk(); // odml

        self.end_chunk(); // hdrl

        // zero-pad with JUNK so movi starts at a fixed offset
        self.start_chunk(chunk_ids::JUNK);
        let mut pos = self.sink.pos();
        while pos < JUNK_SEEK {
            self.sink.put_int(0);
            pos += 4;
        }
        self.end_chunk(); // JUNK

        // movi
        self.start_chunk(chunk_ids::LIST);
        self.movi_pointer = self.sink.pos();
        self.sink.put_fourcc(chunk_ids::MOVI);
    }

    /// Emit a chunk tag, reserve its size slot, and leave the chunk open.
    pub fn start_chunk(&mut self, fourcc: FourCC) {
        assert!(fourcc.as_u32() != 0);
        self.sink.put_fourcc(fourcc);
        self.chunk_slots.push(self.sink.pos());
        self.sink.put_int(0); // size, patched by end_chunk
    }

    /// Close the innermost open chunk, back-patching its size slot.
    pub fn end_chunk(&mut self) {
        if let Some(slot) = self.chunk_slots.pop() {
            let size = self.sink.pos() - (slot + 4);
            self.sink.patch_int(size as u32, slot);
        }
    }

    /// Open the video chunk for the next frame and record its offset
    /// relative to the `movi` list.
    pub fn start_frame(&mut self) {
        self.frame_offset.push(self.sink.pos() - self.movi_pointer);
        self.start_chunk(stream_chunk(0, ChunkKind::VideoCompressed));
    }

    /// Record the finished frame's payload size and close its chunk.
    pub fn end_frame(&mut self) {
        if let Some(&slot) = self.chunk_slots.last() {
            self.frame_size.push(self.sink.pos() - (slot + 4));
        }
        self.end_chunk();
    }

    /// Close the `movi` list and emit the legacy `idx1` index, one
    /// keyframe entry per frame written.
    pub fn write_index(&mut self, stream_number: u8, kind: ChunkKind) {
        self.end_chunk(); // movi

        self.start_chunk(chunk_ids::IDX1);
        let tag = stream_chunk(stream_number, kind);
        for (&offset, &size) in self.frame_offset.iter().zip(&self.frame_size) {
            self.sink.put_fourcc(tag);
            self.sink.put_int(AVIIF_KEYFRAME);
            self.sink.put_int(offset as u32);
            self.sink.put_int(size as u32);
        }
        self.end_chunk(); // idx1
    }

    /// Patch the recorded frame-count slots, close every chunk still open
    /// (the outer `RIFF` last), and flush the file.
    pub fn finish(&mut self) -> Result<()> {
        let nframes = self.frame_offset.len() as u32;
        while let Some(slot) = self.frame_count_slots.pop() {
            self.sink.patch_int(nframes, slot);
        }
        while !self.chunk_slots.is_empty() {
            self.end_chunk();
        }
        self.sink.close();
        if self.sink.is_valid() {
            Ok(())
        } else {
            Err(AviError::Truncated)
        }
    }

    /// Number of frames written so far.
    pub fn frame_count(&self) -> usize {
        self.frame_offset.len()
    }

    /// Whether the output file is open.
    pub fn is_opened(&self) -> bool {
        self.sink.is_opened()
    }

    /// Logical offset of the next byte the sink will write.
    pub fn stream_pos(&self) -> u64 {
        self.sink.pos()
    }

    /// Write one raw byte into the open chunk.
    pub fn put_byte(&mut self, val: u8) {
        self.sink.put_byte(val);
    }

    /// Write raw bytes into the open chunk.
    pub fn put_bytes(&mut self, data: &[u8]) {
        self.sink.put_bytes(data);
    }

    /// Write a big-endian 16-bit value (JPEG segment sizes).
    pub fn jput_short(&mut self, val: u16) {
        self.sink.jput_short(val);
    }

    /// Write 32 bits of JPEG entropy data with `0xFF 00` stuffing.
    pub fn jput(&mut self, currval: u32) {
        self.sink.jput(currval);
    }

    /// Flush a partial JPEG entropy bit buffer with one-bit padding.
    pub fn jflush(&mut self, currval: u32, bit_idx: u32) {
        self.sink.jflush(currval, bit_idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    // Offsets of the three frame-count slots in the fixed header layout:
    // total frames in avih, stream length in strh, total frames in dmlh.
    const AVIH_FRAMES_SLOT: usize = 48;
    const STRH_LENGTH_SLOT: usize = 140;
    const DMLH_FRAMES_SLOT: usize = 232;

    fn write_avi(frames: &[&[u8]]) -> (tempfile::TempDir, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");
        let mut muxer = AviMuxer::create(&path, 10.0, 16, 16, true).unwrap();
        muxer.start_avi(1);
        muxer.write_stream_header(Codec::Mjpeg);
        for frame in frames {
            muxer.start_frame();
            muxer.put_bytes(frame);
            muxer.end_frame();
        }
        muxer.write_index(0, ChunkKind::VideoCompressed);
        muxer.finish().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        (dir, bytes)
    }

    fn u32_at(bytes: &[u8], pos: usize) -> u32 {
        LittleEndian::read_u32(&bytes[pos..pos + 4])
    }

    #[test]
    fn test_empty_file_structure() {
        let (_dir, bytes) = write_avi(&[]);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(u32_at(&bytes, 4), bytes.len() as u32 - 8);

        // no frames: all three frame-count slots hold zero
        assert_eq!(u32_at(&bytes, AVIH_FRAMES_SLOT), 0);
        assert_eq!(u32_at(&bytes, STRH_LENGTH_SLOT), 0);
        assert_eq!(u32_at(&bytes, DMLH_FRAMES_SLOT), 0);
    }

    #[test]
    fn test_header_values() {
        let (_dir, bytes) = write_avi(&[]);

        assert_eq!(u32_at(&bytes, 28), AVIH_STRH_SIZE); // avih size
        assert_eq!(u32_at(&bytes, 32), 100_000); // 1e6 / 10 fps
        assert_eq!(u32_at(&bytes, 44), AVI_DWFLAG);
        assert_eq!(u32_at(&bytes, 56), 1); // stream count
        assert_eq!(u32_at(&bytes, 64), 16); // width
        assert_eq!(u32_at(&bytes, 68), 16); // height

        assert_eq!(&bytes[108..112], b"vids");
        assert_eq!(&bytes[112..116], b"MJPG");
        assert_eq!(u32_at(&bytes, 128), AVI_DWSCALE);
        assert_eq!(u32_at(&bytes, 132), 10); // rate
        assert_eq!(u32_at(&bytes, 148), AVI_DWQUALITY as u32);

        // strf: 40-byte BITMAPINFOHEADER, 3 color channels
        assert_eq!(&bytes[164..168], b"strf");
        assert_eq!(u32_at(&bytes, 168), STRF_SIZE);
        assert_eq!(LittleEndian::read_u16(&bytes[186..188]), 24); // bits per pixel
        assert_eq!(&bytes[188..192], b"MJPG");

        // JUNK pads the movi list out to a fixed offset
        assert_eq!(&bytes[240..244], b"JUNK");
        assert_eq!(&bytes[4096..4100], b"LIST");
        assert_eq!(&bytes[4104..4108], b"movi");
    }

    #[test]
    fn test_frame_counts_patched() {
        let (_dir, bytes) = write_avi(&[b"\xFF\xD8\xFF\xD9", b"\xFF\xD8\x00\xFF\xD9"]);

        assert_eq!(u32_at(&bytes, AVIH_FRAMES_SLOT), 2);
        assert_eq!(u32_at(&bytes, STRH_LENGTH_SLOT), 2);
        assert_eq!(u32_at(&bytes, DMLH_FRAMES_SLOT), 2);
    }

    #[test]
    fn test_single_frame_layout() {
        let payload = b"\xFF\xD8\xFF\xD9";
        let (_dir, bytes) = write_avi(&[payload]);

        // the first frame chunk starts right after the `movi` type word
        assert_eq!(&bytes[4108..4112], b"00dc");
        assert_eq!(u32_at(&bytes, 4112), 4);
        assert_eq!(&bytes[4116..4120], payload);

        // idx1 follows the movi list and holds one keyframe entry
        assert_eq!(&bytes[4120..4124], b"idx1");
        assert_eq!(u32_at(&bytes, 4124), 16);
        assert_eq!(&bytes[4128..4132], b"00dc");
        assert_eq!(u32_at(&bytes, 4132), AVIIF_KEYFRAME);
        assert_eq!(u32_at(&bytes, 4136), 4); // offset from movi
        assert_eq!(u32_at(&bytes, 4140), 4); // length

        // movi list size covers the type word plus the frame chunk
        assert_eq!(u32_at(&bytes, 4100), 4 + 8 + 4);
    }

    #[test]
    fn test_chunk_size_slots_consistent() {
        let (_dir, bytes) = write_avi(&[b"abcdef"]);

        // hdrl list: from past its size slot to the start of JUNK
        assert_eq!(u32_at(&bytes, 16) as usize, 240 - 20);
        // strf size
        assert_eq!(u32_at(&bytes, 168), 40);
        // dmlh payload is two dwords
        assert_eq!(u32_at(&bytes, 228), 8);
    }

    #[test]
    fn test_jpeg_passthrough_writes_into_open_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");
        let mut muxer = AviMuxer::create(&path, 10.0, 16, 16, false).unwrap();
        muxer.start_avi(1);
        muxer.write_stream_header(Codec::Mjpeg);

        muxer.start_frame();
        muxer.put_byte(0xFF);
        muxer.put_byte(0xD8);
        muxer.jput_short(0x0004);
        muxer.jput(0xFFA0_FFFF);
        muxer.jflush(0xFF80_0000, 17);
        muxer.end_frame();
        muxer.write_index(0, ChunkKind::VideoCompressed);
        muxer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let payload = &bytes[4116..4116 + 14];
        assert_eq!(
            payload,
            [0xFF, 0xD8, 0x00, 0x04, 0xFF, 0x00, 0xA0, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0x81]
        );
        // the chunk size slot reflects the stuffed length
        assert_eq!(u32_at(&bytes, 4112), 14);
    }
}

//! AVI demuxer: walks the RIFF tree of an MJPEG file and indexes its frames.

use byteorder::{ByteOrder, LittleEndian};

use crate::chunks::{chunk_ids, stream_chunk, ChunkKind, FourCC, IndexEntry, RiffChunk, RiffList};
use crate::error::{AviError, Result};
use crate::source::ByteSource;
use crate::types::{AviHeader, Codec, Rect, StreamHeader, AVIH_STRH_SIZE};

/// Location of one frame inside the file.
///
/// `position` is the absolute offset of the frame chunk's 8-byte header;
/// [`AviDemuxer::read_frame`] consumes that header and then `length` bytes
/// of JPEG payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Absolute file offset of the frame's chunk header.
    pub position: u64,
    /// Length of the frame data.
    pub length: u32,
}

/// Reader for AVI files carrying a single MJPEG video stream.
///
/// [`parse`](AviDemuxer::parse) walks the RIFF tree, locates the MJPEG
/// stream, and builds the frame index; individual payloads are then
/// fetched with [`read_frame`](AviDemuxer::read_frame). Concatenated
/// `RIFF/AVI ` + `RIFF/AVIX` sections are accepted and their frames land
/// in one list.
///
/// Structural problems are reported through [`log`] and abort the current
/// subtree; `parse` simply answers whether any frames were found.
#[derive(Debug)]
pub struct AviDemuxer {
    source: ByteSource,
    stream_id: Option<FourCC>,
    movi_start: u64,
    movi_end: u64,
    width: u32,
    height: u32,
    fps: f64,
    index_present: bool,
    frames: Vec<FrameDescriptor>,
}

impl AviDemuxer {
    /// Bind a demuxer to an already opened source.
    pub fn new(source: ByteSource) -> Self {
        AviDemuxer {
            source,
            stream_id: None,
            movi_start: 0,
            movi_end: 0,
            width: 0,
            height: 0,
            fps: 0.0,
            index_present: false,
            frames: Vec::new(),
        }
    }

    /// Open a file and bind a demuxer to it.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ByteSource::open(path)?))
    }

    /// Walk the RIFF tree and index every MJPEG frame.
    ///
    /// Returns `true` iff at least one frame was indexed.
    pub fn parse(&mut self) -> bool {
        while self.source.is_valid() {
            let Some(riff) = RiffList::read_from(&mut self.source) else {
                break;
            };
            if riff.fourcc == chunk_ids::RIFF
                && (riff.list_type == chunk_ids::AVI || riff.list_type == chunk_ids::AVIX)
            {
                // the list size counts the type word already consumed
                let next_riff = self.source.position() + u64::from(riff.size) - 4;
                self.parse_avi(Codec::Mjpeg);
                self.source.seek(next_riff);
            } else {
                break;
            }
        }
        !self.frames.is_empty()
    }

    /// The ordered frame list produced by [`parse`](AviDemuxer::parse).
    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    /// Fetch one frame's JPEG payload.
    ///
    /// Seeks to the descriptor, consumes the chunk header there, and reads
    /// exactly the chunk's declared size. The header tag is trusted, not
    /// checked against the stream id.
    pub fn read_frame(&mut self, frame: &FrameDescriptor) -> Result<Vec<u8>> {
        self.source.seek(frame.position);
        let Some(chunk) = RiffChunk::read_from(&mut self.source) else {
            return Err(AviError::UnexpectedEof);
        };
        let mut data = vec![0u8; chunk.size as usize];
        if !self.source.read(&mut data) {
            return Err(AviError::UnexpectedEof);
        }
        Ok(data)
    }

    /// Frame rate of the MJPEG stream, from `strh` (`rate / scale`).
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Width in pixels, from the main header.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels, from the main header.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Release the underlying source.
    pub fn close(&mut self) {
        self.source.close();
    }

    /// Parse one `RIFF/AVI ` or `RIFF/AVIX` section.
    ///
    /// Returns `true` iff the cumulative frame list is non-empty.
    fn parse_avi(&mut self, codec: Codec) -> bool {
        let hdrl = RiffList::read_from(&mut self.source);
        match hdrl {
            Some(list)
                if self.source.is_valid()
                    && list.fourcc == chunk_ids::LIST
                    && list.list_type == chunk_ids::HDRL =>
            {
                let next_list = self.source.position() + u64::from(list.size) - 4;
                if self.parse_hdrl(codec) {
                    self.source.seek(next_list);
                    self.parse_movi_section();
                }
            }
            other => self.report_list(other.as_ref(), chunk_ids::HDRL),
        }
        !self.frames.is_empty()
    }

    /// Handle everything after `hdrl`: optional `INFO`, `JUNK` padding,
    /// the `movi` list, and the index.
    fn parse_movi_section(&mut self) {
        let Some(mut some_list) = RiffList::read_from(&mut self.source) else {
            self.report_list(None, chunk_ids::MOVI);
            return;
        };

        // an optional INFO section; contents are not interpreted
        if some_list.fourcc == chunk_ids::LIST && some_list.list_type == chunk_ids::INFO {
            let next_list = self.source.position() + u64::from(some_list.size) - 4;
            log::debug!("skipping INFO list of {} bytes", some_list.size);
            self.source.seek(next_list);
            match RiffList::read_from(&mut self.source) {
                Some(list) => some_list = list,
                None => {
                    self.report_list(None, chunk_ids::MOVI);
                    return;
                }
            }
        }

        // optional JUNK padding
        let Some(some_list) = self.skip_junk_list(some_list) else {
            self.report_list(None, chunk_ids::MOVI);
            return;
        };

        // the movi list must be present
        if !(self.source.is_valid()
            && some_list.fourcc == chunk_ids::LIST
            && some_list.list_type == chunk_ids::MOVI)
        {
            self.report_list(Some(&some_list), chunk_ids::MOVI);
            return;
        }

        // movi_start is the position of the `movi` type word itself
        self.movi_start = self.source.position() - 4;
        self.movi_end = self.movi_start + u64::from(some_list.size);

        let mut index_found = false;
        if self.index_present {
            // the index section sits right after the movi list
            let idx_pos = self.movi_start + 4 + (u64::from(some_list.size) - 4);
            self.source.seek(idx_pos);

            let index_chunk = RiffChunk::read_from(&mut self.source);
            match index_chunk {
                Some(chunk) if self.source.is_valid() && chunk.fourcc == chunk_ids::IDX1 => {
                    index_found = self.parse_index(chunk.size);
                }
                other => self.report_chunk(other.as_ref(), chunk_ids::IDX1),
            }
        }

        if !index_found {
            self.parse_movi();
            log::error!("failed to parse avi: index was not found");
        }
    }

    /// Parse `hdrl`: the main header plus one `strl` list per stream.
    ///
    /// Returns `true` iff an MJPEG video stream was seen; streams of other
    /// types are ignored.
    fn parse_hdrl(&mut self, codec: Codec) -> bool {
        let avih = RiffChunk::read_from(&mut self.source);
        let mut result = false;
        match avih {
            Some(chunk) if self.source.is_valid() && chunk.fourcc == chunk_ids::AVIH => {
                let mut next_strl = self.source.position() + u64::from(chunk.size);
                let Some(header) = self.read_avi_header() else {
                    return false;
                };
                self.index_present = header.has_index();
                self.width = header.width;
                self.height = header.height;
                assert!(header.streams < 0xFF);

                // the number of strl lists must equal the stream count
                // declared in the main header
                for i in 0..header.streams {
                    self.source.seek(next_strl);
                    let strl = RiffList::read_from(&mut self.source);
                    match strl {
                        Some(list)
                            if self.source.is_valid()
                                && list.fourcc == chunk_ids::LIST
                                && list.list_type == chunk_ids::STRL =>
                        {
                            next_strl = self.source.position() + u64::from(list.size) - 4;
                            result = self.parse_strl(i as u8, codec) || result;
                        }
                        other => self.report_list(other.as_ref(), chunk_ids::STRL),
                    }
                }
            }
            other => self.report_chunk(other.as_ref(), chunk_ids::AVIH),
        }
        result
    }

    /// Parse one `strl` list. The first MJPEG video stream becomes the
    /// tracked stream; further ones are diagnosed and ignored.
    fn parse_strl(&mut self, stream_index: u8, codec: Codec) -> bool {
        let strh = RiffChunk::read_from(&mut self.source);
        match strh {
            Some(chunk) if self.source.is_valid() && chunk.fourcc == chunk_ids::STRH => {
                let Some(header) = self.read_stream_header() else {
                    return false;
                };
                match codec {
                    Codec::Mjpeg => {
                        if header.fcc_type == chunk_ids::VIDS
                            && header.fcc_handler == chunk_ids::MJPG
                        {
                            let tag = stream_chunk(stream_index, ChunkKind::VideoCompressed);
                            if self.stream_id.is_none() {
                                self.stream_id = Some(tag);
                                self.fps = header.frame_rate();
                            } else {
                                log::warn!(
                                    "more than one video stream found within AVI/AVIX list; \
                                     stream {} would be ignored",
                                    tag
                                );
                            }
                            return true;
                        }
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Parse `idx1` records covering `index_size` bytes.
    ///
    /// Returns `true` iff at least one record was read, whether or not it
    /// matched the tracked stream.
    fn parse_index(&mut self, index_size: u32) -> bool {
        let index_end = self.source.position() + u64::from(index_size);
        let mut result = false;
        while self.source.is_valid() && self.source.position() < index_end {
            let Some(entry) = IndexEntry::read_from(&mut self.source) else {
                break;
            };
            if Some(entry.chunk_id) == self.stream_id {
                let absolute = self.movi_start + u64::from(entry.offset);
                if absolute < self.movi_end {
                    self.frames.push(FrameDescriptor {
                        position: absolute,
                        length: entry.size,
                    });
                } else {
                    log::warn!(
                        "frame offset {} points outside movi section",
                        entry.offset
                    );
                }
            }
            result = true;
        }
        result
    }

    /// Fallback when no usable index exists: linear scan of the `movi`
    /// list collecting the tracked stream's chunks.
    fn parse_movi(&mut self) -> bool {
        let before = self.frames.len();
        let Some(stream_id) = self.stream_id else {
            return false;
        };

        let mut pos = self.movi_start + 4;
        while self.source.is_valid() && pos + 8 <= self.movi_end {
            if !self.source.seek(pos) {
                break;
            }
            let Some(chunk) = RiffChunk::read_from(&mut self.source) else {
                break;
            };
            let Some(chunk) = self.skip_junk_chunk(chunk) else {
                break;
            };
            let header_pos = self.source.position() - 8;
            if header_pos + 8 > self.movi_end {
                break;
            }
            if chunk.fourcc == stream_id {
                self.frames.push(FrameDescriptor {
                    position: header_pos,
                    length: chunk.size,
                });
            }
            pos = header_pos + 8 + u64::from(chunk.size);
        }
        self.frames.len() > before
    }

    /// Skip chunk-shaped `JUNK` elements: `size` payload bytes follow the
    /// 8-byte header. Returns the first element after the padding.
    fn skip_junk_chunk(&mut self, mut chunk: RiffChunk) -> Option<RiffChunk> {
        while chunk.fourcc == chunk_ids::JUNK {
            let next = self.source.position() + u64::from(chunk.size);
            if !self.source.seek(next) {
                return None;
            }
            chunk = RiffChunk::read_from(&mut self.source)?;
        }
        Some(chunk)
    }

    /// Skip list-shaped `JUNK` elements. A JUNK element read through a
    /// 12-byte list header has already had 4 payload bytes consumed as the
    /// type word, so it advances by `size - 4`.
    fn skip_junk_list(&mut self, mut list: RiffList) -> Option<RiffList> {
        while list.fourcc == chunk_ids::JUNK {
            let next = self.source.position() + u64::from(list.size) - 4;
            if !self.source.seek(next) {
                return None;
            }
            list = RiffList::read_from(&mut self.source)?;
        }
        Some(list)
    }

    fn read_avi_header(&mut self) -> Option<AviHeader> {
        let mut buf = [0u8; AVIH_STRH_SIZE as usize];
        if !self.source.read(&mut buf) {
            return None;
        }
        Some(AviHeader {
            micro_sec_per_frame: LittleEndian::read_u32(&buf[0..4]),
            max_bytes_per_sec: LittleEndian::read_u32(&buf[4..8]),
            reserved1: LittleEndian::read_u32(&buf[8..12]),
            flags: LittleEndian::read_u32(&buf[12..16]),
            total_frames: LittleEndian::read_u32(&buf[16..20]),
            initial_frames: LittleEndian::read_u32(&buf[20..24]),
            streams: LittleEndian::read_u32(&buf[24..28]),
            suggested_buffer_size: LittleEndian::read_u32(&buf[28..32]),
            width: LittleEndian::read_u32(&buf[32..36]),
            height: LittleEndian::read_u32(&buf[36..40]),
            // 16 reserved bytes follow
        })
    }

    fn read_stream_header(&mut self) -> Option<StreamHeader> {
        let mut buf = [0u8; AVIH_STRH_SIZE as usize];
        if !self.source.read(&mut buf) {
            return None;
        }
        Some(StreamHeader {
            fcc_type: FourCC([buf[0], buf[1], buf[2], buf[3]]),
            fcc_handler: FourCC([buf[4], buf[5], buf[6], buf[7]]),
            flags: LittleEndian::read_u32(&buf[8..12]),
            priority: LittleEndian::read_u32(&buf[12..16]),
            initial_frames: LittleEndian::read_u32(&buf[16..20]),
            scale: LittleEndian::read_u32(&buf[20..24]),
            rate: LittleEndian::read_u32(&buf[24..28]),
            start: LittleEndian::read_u32(&buf[28..32]),
            length: LittleEndian::read_u32(&buf[32..36]),
            suggested_buffer_size: LittleEndian::read_u32(&buf[36..40]),
            quality: LittleEndian::read_u32(&buf[40..44]),
            sample_size: LittleEndian::read_u32(&buf[44..48]),
            frame: Rect {
                left: LittleEndian::read_i16(&buf[48..50]),
                top: LittleEndian::read_i16(&buf[50..52]),
                right: LittleEndian::read_i16(&buf[52..54]),
                bottom: LittleEndian::read_i16(&buf[54..56]),
            },
        })
    }

    fn report_list(&self, list: Option<&RiffList>, expected: FourCC) {
        match list {
            _ if !self.source.is_valid() => {
                log::error!("unexpected end of file while searching for {} list", expected);
            }
            Some(list) if list.fourcc != chunk_ids::LIST => {
                log::error!(
                    "unexpected element; expected: {}, got: {}",
                    chunk_ids::LIST,
                    list.fourcc
                );
            }
            Some(list) => {
                log::error!(
                    "unexpected list type; expected: {}, got: {}",
                    expected,
                    list.list_type
                );
            }
            None => {
                log::error!("unexpected end of file while searching for {} list", expected);
            }
        }
    }

    fn report_chunk(&self, chunk: Option<&RiffChunk>, expected: FourCC) {
        match chunk {
            Some(chunk) if self.source.is_valid() => {
                log::error!(
                    "unexpected element; expected: {}, got: {}",
                    expected,
                    chunk.fourcc
                );
            }
            _ => {
                log::error!(
                    "unexpected end of file while searching for {} chunk",
                    expected
                );
            }
        }
    }
}

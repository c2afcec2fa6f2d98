//! Sequential decoder for trace log files.
//!
//! [`LogReader`] walks the head region and then the ring region in logical
//! (oldest-first) order, yielding one [`RawRecord`] per call. It tracks how
//! many bytes have been consumed for progress reporting, whether the last
//! record came from the ring region, and the union of all levels seen.

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::DateTime;
use std::io::{self, Read, Seek, SeekFrom};

use super::format::{
    CALLER_VERSION, HEADER_LEN, MAGIC, MAX_VERSION, MIN_VERSION, RING_HEADER_LEN, TAG_ENTRY,
    TAG_EXIT, TAG_MESSAGE, TAG_WRAP,
};
use crate::model::error::{FormatError, FormatErrorKind};
use crate::model::record::{LevelMask, RawRecord, RecordKind, TraceLevel};
use crate::model::store::ReadSummary;

/// Ring region geometry from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    /// Absolute offset of the ring header.
    pub offset: u64,
    pub capacity: u64,
    /// Offset of the oldest surviving record, relative to the ring data.
    pub oldest: u64,
    /// Offset just past the newest record, relative to the ring data.
    pub end: u64,
    pub wrapped: bool,
}

impl RingLayout {
    fn data_start(&self) -> u64 {
        self.offset + RING_HEADER_LEN
    }
}

/// A contiguous byte range read in order.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: u64,
    end: u64,
    circular: bool,
}

enum Decoded {
    Record(RawRecord),
    WrapMarker,
}

/// Sequential binary decoder over any seekable byte source.
#[derive(Debug)]
pub struct LogReader<R> {
    source: Option<R>,
    version: u32,
    ring: Option<RingLayout>,
    segments: Vec<Segment>,
    segment: usize,
    pos: u64,
    bytes_read: u64,
    total_bytes: u64,
    in_circular: bool,
    levels_found: LevelMask,
}

impl<R: Read + Seek> LogReader<R> {
    /// Parse the file header and position at the first head record.
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` if the header is missing, has the wrong magic,
    /// an unsupported version, or a ring layout that does not fit the file.
    pub fn new(mut source: R) -> Result<Self, FormatError> {
        let total_bytes = source
            .seek(SeekFrom::End(0))
            .map_err(|e| FormatError::new(0, e.into()))?;
        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| FormatError::new(0, e.into()))?;

        let mut header = Counted::new(&mut source);
        let mut magic = [0u8; 4];
        header
            .read_exact(&mut magic)
            .map_err(|e| FormatError::new(0, e.into()))?;
        if magic != MAGIC {
            return Err(FormatError::new(0, FormatErrorKind::BadMagic));
        }
        let version = header
            .read_u32::<LittleEndian>()
            .map_err(|e| FormatError::new(4, e.into()))?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(FormatError::new(
                4,
                FormatErrorKind::UnsupportedVersion(version),
            ));
        }
        let ring_offset = header
            .read_u64::<LittleEndian>()
            .map_err(|e| FormatError::new(8, e.into()))?;
        let ring_capacity = header
            .read_u64::<LittleEndian>()
            .map_err(|e| FormatError::new(16, e.into()))?;

        let (ring, segments) = if ring_offset == 0 {
            let head = Segment {
                start: HEADER_LEN,
                end: total_bytes,
                circular: false,
            };
            (None, vec![head])
        } else {
            let ring = read_ring_layout(&mut source, ring_offset, ring_capacity, total_bytes)?;
            (Some(ring), ring_segments(&ring))
        };

        source
            .seek(SeekFrom::Start(HEADER_LEN))
            .map_err(|e| FormatError::new(HEADER_LEN, e.into()))?;

        let header_bytes = HEADER_LEN + if ring.is_some() { RING_HEADER_LEN } else { 0 };
        Ok(Self {
            source: Some(source),
            version,
            ring,
            segments,
            segment: 0,
            pos: HEADER_LEN,
            bytes_read: header_bytes,
            total_bytes,
            in_circular: false,
            levels_found: LevelMask::NONE,
        })
    }

    /// Decode the next record, or `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` for a malformed or truncated record. Records
    /// returned before the error remain valid.
    pub fn read_record(&mut self) -> Result<Option<RawRecord>, FormatError> {
        loop {
            let Some(segment) = self.segments.get(self.segment).copied() else {
                return Ok(None);
            };
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };
            if self.pos >= segment.end {
                self.advance_segment()?;
                continue;
            }

            let start = self.pos;
            let mut counted = Counted::new(source);
            let decoded = decode_record(&mut counted, self.version, segment.circular)
                .map_err(|kind| FormatError::new(start, kind))?;
            let consumed = counted.consumed;
            self.pos += consumed;
            self.bytes_read += consumed;

            match decoded {
                Decoded::WrapMarker => {
                    self.bytes_read += segment.end.saturating_sub(self.pos);
                    self.advance_segment()?;
                }
                Decoded::Record(record) => {
                    if self.pos > segment.end {
                        return Err(FormatError::new(start, FormatErrorKind::Truncated));
                    }
                    self.in_circular = segment.circular;
                    self.levels_found.insert(record.level);
                    return Ok(Some(record));
                }
            }
        }
    }

    fn advance_segment(&mut self) -> Result<(), FormatError> {
        self.segment += 1;
        if let (Some(next), Some(source)) = (self.segments.get(self.segment), self.source.as_mut())
        {
            source
                .seek(SeekFrom::Start(next.start))
                .map_err(|e| FormatError::new(next.start, e.into()))?;
            self.pos = next.start;
        }
        Ok(())
    }
}

impl<R> LogReader<R> {
    /// True once the reader has returned a record from the ring region.
    pub fn in_circular_part(&self) -> bool {
        self.in_circular
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Percentage of the file consumed so far, capped at 100.
    pub fn percent_read(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        (self.bytes_read.saturating_mul(100) / self.total_bytes).min(100) as u8
    }

    pub fn levels_found(&self) -> LevelMask {
        self.levels_found
    }

    pub fn format_version(&self) -> u32 {
        self.version
    }

    pub fn ring(&self) -> Option<RingLayout> {
        self.ring
    }

    /// Whether records stored in the caller back-reference field are present.
    pub fn has_caller_field(&self) -> bool {
        self.version >= CALLER_VERSION
    }

    pub fn summary(&self) -> ReadSummary {
        ReadSummary {
            format_version: self.version,
            levels_found: self.levels_found,
            ring_wrapped: self.ring.is_some_and(|ring| ring.wrapped),
        }
    }

    /// Release the underlying handle. Further reads return end of stream.
    pub fn close_log_file(&mut self) {
        self.source = None;
    }
}

fn read_ring_layout<R: Read + Seek>(
    source: &mut R,
    offset: u64,
    capacity: u64,
    total_bytes: u64,
) -> Result<RingLayout, FormatError> {
    let bad_layout = || FormatError::new(8, FormatErrorKind::BadRingLayout);
    if offset < HEADER_LEN || offset.saturating_add(RING_HEADER_LEN) > total_bytes {
        return Err(bad_layout());
    }

    source
        .seek(SeekFrom::Start(offset))
        .map_err(|e| FormatError::new(offset, e.into()))?;
    let mut header = Counted::new(source);
    let read_err = |e: io::Error| FormatError::new(offset, e.into());
    let oldest = header.read_u64::<LittleEndian>().map_err(read_err)?;
    let end = header.read_u64::<LittleEndian>().map_err(read_err)?;
    let wrapped = header.read_u8().map_err(read_err)? != 0;

    if oldest > capacity || end > capacity || (!wrapped && oldest > end) {
        return Err(FormatError::new(offset, FormatErrorKind::BadRingLayout));
    }

    Ok(RingLayout {
        offset,
        capacity,
        oldest,
        end,
        wrapped,
    })
}

fn ring_segments(ring: &RingLayout) -> Vec<Segment> {
    let data = ring.data_start();
    let head = Segment {
        start: HEADER_LEN,
        end: ring.offset,
        circular: false,
    };
    if ring.wrapped {
        vec![
            head,
            Segment {
                start: data + ring.oldest,
                end: data + ring.capacity,
                circular: true,
            },
            Segment {
                start: data,
                end: data + ring.end,
                circular: true,
            },
        ]
    } else {
        vec![
            head,
            Segment {
                start: data + ring.oldest,
                end: data + ring.end,
                circular: true,
            },
        ]
    }
}

fn decode_record<R: Read>(
    r: &mut Counted<'_, R>,
    version: u32,
    allow_wrap: bool,
) -> Result<Decoded, FormatErrorKind> {
    let kind = match r.read_u8()? {
        TAG_WRAP if allow_wrap => return Ok(Decoded::WrapMarker),
        TAG_MESSAGE => RecordKind::Message,
        TAG_ENTRY => RecordKind::Entry,
        TAG_EXIT => RecordKind::Exit,
        other => return Err(FormatErrorKind::UnknownTag(other)),
    };

    let msg_num = r.read_u32::<LittleEndian>()?;
    let micros = r.read_i64::<LittleEndian>()?;
    let time =
        DateTime::from_timestamp_micros(micros).ok_or(FormatErrorKind::InvalidTimestamp(micros))?;
    let thread_id = r.read_u32::<LittleEndian>()?;
    let thread_name = read_str(r)?;
    let logger = read_str(r)?;
    let level_bits = r.read_u8()?;
    let level = TraceLevel::from_bits(level_bits).ok_or(FormatErrorKind::InvalidLevel(level_bits))?;
    let depth = r.read_u8()?;
    let method = read_str(r)?;
    let text = read_str(r)?;
    let caller_msg_num = if version >= CALLER_VERSION {
        Some(r.read_u32::<LittleEndian>()?).filter(|&n| n != 0)
    } else {
        None
    };

    Ok(Decoded::Record(RawRecord {
        msg_num,
        time,
        thread_id,
        thread_name,
        logger,
        level,
        kind,
        depth,
        method,
        text,
        caller_msg_num,
    }))
}

fn read_str<R: Read>(r: &mut R) -> Result<String, FormatErrorKind> {
    let len = r.read_u16::<LittleEndian>()?;
    let mut bytes = vec![0u8; usize::from(len)];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| FormatErrorKind::InvalidUtf8)
}

/// Byte-counting adapter so record sizes need not be computed by hand.
struct Counted<'a, R> {
    inner: &'a mut R,
    consumed: u64,
}

impl<'a, R> Counted<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        Self { inner, consumed: 0 }
    }
}

impl<R: Read> Read for Counted<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;

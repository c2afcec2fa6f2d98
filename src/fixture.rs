//! Builders for synthetic trace logs.
//!
//! [`TraceScript`] describes a run of traced calls the way the tracing
//! library would emit them (depths, message numbers and caller references are
//! tracked automatically). [`LogFileBuilder`] encodes records into the binary
//! file format, including a wrapped ring region. Tests and benchmarks use
//! both; the module is hidden from the documented API.

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use crate::model::record::{LevelMask, RawRecord, RecordKind, TraceLevel};
use crate::model::store::{ReadSummary, RecordStore, StoreBuilder};
use crate::parser::format::{
    CALLER_VERSION, HEADER_LEN, MAGIC, MAX_VERSION, TAG_ENTRY, TAG_EXIT, TAG_MESSAGE, TAG_WRAP,
};

/// Filler for ring bytes that no record occupies.
const GARBAGE: u8 = 0xEE;

// ===== LogFileBuilder =====

#[derive(Debug, Clone)]
struct RingSpec {
    records: Vec<RawRecord>,
    wrapped: bool,
}

/// Encoder for complete log files.
#[derive(Debug, Clone)]
pub struct LogFileBuilder {
    version: u32,
    head: Vec<RawRecord>,
    ring: Option<RingSpec>,
}

impl LogFileBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            head: Vec::new(),
            ring: None,
        }
    }

    pub fn head(mut self, records: impl IntoIterator<Item = RawRecord>) -> Self {
        self.head.extend(records);
        self
    }

    /// Add a ring region holding `records` in logical order.
    ///
    /// A wrapped ring stores the newer half at the start of the ring data and
    /// the older half after a gap of overwritten bytes, followed by a wrap
    /// marker.
    pub fn ring(mut self, records: impl IntoIterator<Item = RawRecord>, wrapped: bool) -> Self {
        self.ring = Some(RingSpec {
            records: records.into_iter().collect(),
            wrapped,
        });
        self
    }

    pub fn build(&self) -> io::Result<Vec<u8>> {
        let mut head = Vec::new();
        for record in &self.head {
            encode_record(&mut head, record, self.version)?;
        }

        let ring = match &self.ring {
            Some(spec) => Some(self.encode_ring(spec)?),
            None => None,
        };

        let mut out = Vec::with_capacity(HEADER_LEN as usize + head.len());
        out.write_all(&MAGIC)?;
        out.write_u32::<LittleEndian>(self.version)?;
        match &ring {
            Some(ring) => {
                out.write_u64::<LittleEndian>(HEADER_LEN + head.len() as u64)?;
                out.write_u64::<LittleEndian>(ring.data.len() as u64)?;
            }
            None => {
                out.write_u64::<LittleEndian>(0)?;
                out.write_u64::<LittleEndian>(0)?;
            }
        }
        out.extend_from_slice(&head);

        if let Some(ring) = ring {
            out.write_u64::<LittleEndian>(ring.oldest)?;
            out.write_u64::<LittleEndian>(ring.end)?;
            out.write_u8(u8::from(ring.wrapped))?;
            out.extend_from_slice(&ring.data);
        }
        Ok(out)
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.build()?)
    }

    fn encode_ring(&self, spec: &RingSpec) -> io::Result<EncodedRing> {
        let mut encoded = Vec::with_capacity(spec.records.len());
        for record in &spec.records {
            let mut bytes = Vec::new();
            encode_record(&mut bytes, record, self.version)?;
            encoded.push(bytes);
        }

        if !spec.wrapped {
            let mut data = encoded.concat();
            let end = data.len() as u64;
            data.extend_from_slice(&[0, 0]);
            return Ok(EncodedRing {
                data,
                oldest: 0,
                end,
                wrapped: false,
            });
        }

        let split = encoded.len().div_ceil(2);
        let (older, newer) = encoded.split_at(split);
        let front = newer.concat();
        let tail = older.concat();

        let mut data = front;
        let end = data.len() as u64;
        data.extend_from_slice(&[GARBAGE; 3]);
        let oldest = data.len() as u64;
        data.extend_from_slice(&tail);
        data.push(TAG_WRAP);
        data.extend_from_slice(&[GARBAGE; 2]);

        Ok(EncodedRing {
            data,
            oldest,
            end,
            wrapped: true,
        })
    }
}

struct EncodedRing {
    data: Vec<u8>,
    oldest: u64,
    end: u64,
    wrapped: bool,
}

/// Append one record in the on-disk encoding for `version`.
pub fn encode_record<W: Write>(out: &mut W, record: &RawRecord, version: u32) -> io::Result<()> {
    let tag = match record.kind {
        RecordKind::Message => TAG_MESSAGE,
        RecordKind::Entry => TAG_ENTRY,
        RecordKind::Exit => TAG_EXIT,
    };
    out.write_u8(tag)?;
    out.write_u32::<LittleEndian>(record.msg_num)?;
    out.write_i64::<LittleEndian>(record.time.timestamp_micros())?;
    out.write_u32::<LittleEndian>(record.thread_id)?;
    write_str(out, &record.thread_name)?;
    write_str(out, &record.logger)?;
    out.write_u8(record.level.bit())?;
    out.write_u8(record.depth)?;
    write_str(out, &record.method)?;
    write_str(out, &record.text)?;
    if version >= CALLER_VERSION {
        out.write_u32::<LittleEndian>(record.caller_msg_num.unwrap_or(0))?;
    }
    Ok(())
}

fn write_str<W: Write>(out: &mut W, value: &str) -> io::Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {} bytes exceeds the u16 length prefix", value.len()),
        )
    })?;
    out.write_u16::<LittleEndian>(len)?;
    out.write_all(value.as_bytes())
}

// ===== TraceScript =====

/// Scripted trace output for one or more threads.
///
/// ```
/// use txview::fixture::TraceScript;
///
/// let mut script = TraceScript::new();
/// script.enter("Main").message("hello").exit();
/// assert_eq!(script.records().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct TraceScript {
    records: Vec<RawRecord>,
    ring_start: Option<usize>,
    wrapped: bool,
    next_msg: u32,
    clock: DateTime<Utc>,
    step: TimeDelta,
    thread: u32,
    thread_names: HashMap<u32, String>,
    logger: String,
    level: TraceLevel,
    stacks: HashMap<u32, Vec<(String, u32)>>,
}

impl Default for TraceScript {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceScript {
    /// Thread 1 ("Main"), logger "Root", level Info, one record per millisecond
    /// starting at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        let clock = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        Self {
            records: Vec::new(),
            ring_start: None,
            wrapped: false,
            next_msg: 1,
            clock,
            step: TimeDelta::milliseconds(1),
            thread: 1,
            thread_names: HashMap::from([(1, "Main".to_string())]),
            logger: "Root".to_string(),
            level: TraceLevel::Info,
            stacks: HashMap::new(),
        }
    }

    /// Switch subsequent records to thread `id`, naming it.
    pub fn thread(&mut self, id: u32, name: &str) -> &mut Self {
        self.thread = id;
        self.thread_names.insert(id, name.to_string());
        self
    }

    pub fn logger(&mut self, name: &str) -> &mut Self {
        self.logger = name.to_string();
        self
    }

    pub fn level(&mut self, level: TraceLevel) -> &mut Self {
        self.level = level;
        self
    }

    /// Move the clock forward without emitting anything.
    pub fn advance(&mut self, delta: TimeDelta) -> &mut Self {
        self.clock += delta;
        self
    }

    pub fn enter(&mut self, method: &str) -> &mut Self {
        let msg_num = self.next_msg;
        self.push(RecordKind::Entry, method.to_string(), String::new());
        self.stacks
            .entry(self.thread)
            .or_default()
            .push((method.to_string(), msg_num));
        self
    }

    /// Exit the innermost open method on the current thread. Ignored when
    /// nothing is open.
    pub fn exit(&mut self) -> &mut Self {
        let Some((method, entry_msg)) = self.stacks.entry(self.thread).or_default().pop() else {
            return self;
        };
        self.push_with_caller(RecordKind::Exit, method, String::new(), Some(entry_msg));
        self
    }

    pub fn message(&mut self, text: &str) -> &mut Self {
        let method = self
            .stack()
            .last()
            .map(|(method, _)| method.clone())
            .unwrap_or_default();
        self.push(RecordKind::Message, method, text.to_string());
        self
    }

    /// Records from here on are written to the ring region.
    pub fn start_ring(&mut self) -> &mut Self {
        self.ring_start.get_or_insert(self.records.len());
        self
    }

    /// Simulate the ring overwriting its `count` oldest records.
    pub fn overwrite_oldest(&mut self, count: usize) -> &mut Self {
        let start = *self.ring_start.get_or_insert(self.records.len());
        let end = (start + count).min(self.records.len());
        self.records.drain(start..end);
        self.wrapped = true;
        self
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn head_records(&self) -> &[RawRecord] {
        &self.records[..self.head_len()]
    }

    pub fn ring_records(&self) -> &[RawRecord] {
        &self.records[self.head_len()..]
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Encoder for this script at the newest format version.
    pub fn to_file(&self) -> LogFileBuilder {
        self.to_file_version(MAX_VERSION)
    }

    pub fn to_file_version(&self, version: u32) -> LogFileBuilder {
        let builder = LogFileBuilder::new(version).head(self.head_records().iter().cloned());
        match self.ring_start {
            Some(_) => builder.ring(self.ring_records().iter().cloned(), self.wrapped),
            None => builder,
        }
    }

    /// Build a store directly, as if the encoded file had been read.
    pub fn build_store(&self) -> RecordStore {
        let head_len = self.head_len();
        let mut builder = StoreBuilder::with_capacity(self.records.len());
        let mut levels = LevelMask::NONE;
        for (index, raw) in self.records.iter().enumerate() {
            levels.insert(raw.level);
            builder.push(raw.clone(), index >= head_len);
        }
        builder.finish(ReadSummary {
            format_version: MAX_VERSION,
            levels_found: levels,
            ring_wrapped: self.ring_start.is_some() && self.wrapped,
        })
    }

    fn head_len(&self) -> usize {
        self.ring_start
            .unwrap_or(self.records.len())
            .min(self.records.len())
    }

    fn stack(&mut self) -> &mut Vec<(String, u32)> {
        self.stacks.entry(self.thread).or_default()
    }

    fn push(&mut self, kind: RecordKind, method: String, text: String) {
        let caller = self.stack().last().map(|(_, msg_num)| *msg_num);
        self.push_with_caller(kind, method, text, caller);
    }

    fn push_with_caller(
        &mut self,
        kind: RecordKind,
        method: String,
        text: String,
        caller_msg_num: Option<u32>,
    ) {
        let depth = self.stack().len() as u8;
        let record = RawRecord {
            msg_num: self.next_msg,
            time: self.clock,
            thread_id: self.thread,
            thread_name: self
                .thread_names
                .get(&self.thread)
                .cloned()
                .unwrap_or_default(),
            logger: self.logger.clone(),
            level: self.level,
            kind,
            depth,
            method,
            text,
            caller_msg_num,
        };
        self.records.push(record);
        self.next_msg += 1;
        self.clock += self.step;
    }
}

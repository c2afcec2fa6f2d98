//! Tests for the sequential log reader.

use super::*;
use crate::fixture::{encode_record, LogFileBuilder, TraceScript};
use std::io::Cursor;

fn reader(bytes: Vec<u8>) -> LogReader<Cursor<Vec<u8>>> {
    LogReader::new(Cursor::new(bytes)).expect("header should parse")
}

fn read_all(reader: &mut LogReader<Cursor<Vec<u8>>>) -> Vec<RawRecord> {
    let mut out = Vec::new();
    while let Some(record) = reader.read_record().expect("record should decode") {
        out.push(record);
    }
    out
}

fn simple_script() -> TraceScript {
    let mut script = TraceScript::new();
    script
        .enter("Program.Main")
        .level(TraceLevel::Warn)
        .message("careful")
        .level(TraceLevel::Info)
        .exit();
    script
}

// ===== Header =====

#[test]
fn rejects_bad_magic() {
    let mut bytes = simple_script().to_file().build().unwrap();
    bytes[0] = b'X';
    let err = LogReader::new(Cursor::new(bytes)).unwrap_err();
    assert_eq!(err, FormatError::new(0, FormatErrorKind::BadMagic));
}

#[test]
fn rejects_versions_outside_supported_range() {
    for version in [1u32, 6] {
        let bytes = LogFileBuilder::new(version).build().unwrap();
        let err = LogReader::new(Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::UnsupportedVersion(version));
    }
}

#[test]
fn rejects_short_header_as_truncated() {
    let err = LogReader::new(Cursor::new(b"TXLG\x05\x00".to_vec())).unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::Truncated);
}

#[test]
fn rejects_ring_offset_past_end_of_file() {
    let mut bytes = simple_script().to_file().build().unwrap();
    bytes[8..16].copy_from_slice(&10_000u64.to_le_bytes());
    let err = LogReader::new(Cursor::new(bytes)).unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::BadRingLayout);
}

#[test]
fn empty_file_body_reads_nothing() {
    let bytes = LogFileBuilder::new(5).build().unwrap();
    let mut reader = reader(bytes);
    assert_eq!(reader.read_record().unwrap(), None);
    assert_eq!(reader.percent_read(), 100);
}

// ===== Head region =====

#[test]
fn reads_head_records_in_order() {
    let script = simple_script();
    let mut reader = reader(script.to_file().build().unwrap());
    let records = read_all(&mut reader);

    assert_eq!(records, script.records());
    assert!(!reader.in_circular_part());
    assert_eq!(reader.bytes_read(), reader.total_bytes());
    assert_eq!(
        reader.levels_found(),
        LevelMask::from(TraceLevel::Info) | TraceLevel::Warn
    );
}

#[test]
fn versions_before_five_carry_no_caller() {
    let script = simple_script();
    let mut reader = reader(script.to_file_version(4).build().unwrap());
    let records = read_all(&mut reader);

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.caller_msg_num.is_none()));
    assert!(!reader.has_caller_field());
    assert_eq!(reader.format_version(), 4);
}

#[test]
fn truncated_record_reports_its_start_offset() {
    let script = simple_script();
    let mut bytes = script.to_file().build().unwrap();
    bytes.truncate(bytes.len() - 3);

    let mut first_two = Vec::new();
    for record in &script.records()[..2] {
        encode_record(&mut first_two, record, 5).unwrap();
    }
    let third_offset = HEADER_LEN + first_two.len() as u64;

    let mut reader = reader(bytes);
    assert!(reader.read_record().unwrap().is_some());
    assert!(reader.read_record().unwrap().is_some());
    let err = reader.read_record().unwrap_err();
    assert_eq!(err, FormatError::new(third_offset, FormatErrorKind::Truncated));
}

#[test]
fn unknown_tag_is_reported() {
    let mut bytes = simple_script().to_file().build().unwrap();
    bytes[HEADER_LEN as usize] = 9;
    let mut reader = reader(bytes);
    let err = reader.read_record().unwrap_err();
    assert_eq!(err.offset, HEADER_LEN);
    assert_eq!(err.kind, FormatErrorKind::UnknownTag(9));
}

#[test]
fn wrap_tag_outside_ring_is_unknown() {
    let mut bytes = simple_script().to_file().build().unwrap();
    bytes[HEADER_LEN as usize] = TAG_WRAP;
    let err = reader(bytes).read_record().unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::UnknownTag(0));
}

#[test]
fn combined_level_bits_are_invalid() {
    let mut script = TraceScript::new();
    script.message("m");
    let mut bytes = script.to_file().build().unwrap();
    // tag, msg_num, time, thread id and two strings precede the level byte.
    let name_len = "Main".len();
    let logger_len = "Root".len();
    let level_at = HEADER_LEN as usize + 1 + 4 + 8 + 4 + 2 + name_len + 2 + logger_len;
    assert_eq!(bytes[level_at], TraceLevel::Info.bit());
    bytes[level_at] = 0x0c;

    let err = reader(bytes).read_record().unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::InvalidLevel(0x0c));
}

#[test]
fn close_log_file_ends_the_stream() {
    let mut reader = reader(simple_script().to_file().build().unwrap());
    assert!(reader.read_record().unwrap().is_some());
    reader.close_log_file();
    assert_eq!(reader.read_record().unwrap(), None);
}

// ===== Ring region =====

fn ringed_script(wrapped: bool) -> TraceScript {
    let mut script = TraceScript::new();
    script.enter("Outer").message("head");
    script.start_ring();
    for i in 0..5 {
        script.message(&format!("ring {i}"));
    }
    if wrapped {
        script.overwrite_oldest(2);
    }
    script
}

#[test]
fn unwrapped_ring_follows_head() {
    let script = ringed_script(false);
    let mut reader = reader(script.to_file().build().unwrap());

    let head: Vec<_> = (0..2)
        .map(|_| reader.read_record().unwrap().unwrap())
        .collect();
    assert!(!reader.in_circular_part());
    assert_eq!(head, script.head_records());

    let ring = read_all(&mut reader);
    assert!(reader.in_circular_part());
    assert_eq!(ring, script.ring_records());
    assert!(!reader.summary().ring_wrapped);
}

#[test]
fn wrapped_ring_is_read_oldest_first() {
    let script = ringed_script(true);
    let mut reader = reader(script.to_file().build().unwrap());
    let records = read_all(&mut reader);

    assert_eq!(records, script.records());
    let texts: Vec<_> = records[2..].iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["ring 2", "ring 3", "ring 4"]);

    let layout = reader.ring().unwrap();
    assert!(layout.wrapped);
    assert!(layout.end < layout.oldest);
    assert!(reader.summary().ring_wrapped);
}

#[test]
fn ring_without_head_records() {
    let mut script = TraceScript::new();
    script.start_ring().message("a").message("b").overwrite_oldest(1);
    let mut reader = reader(script.to_file().build().unwrap());

    let first = reader.read_record().unwrap().unwrap();
    assert!(reader.in_circular_part());
    assert_eq!(first.text, "b");
    assert_eq!(reader.read_record().unwrap(), None);
}

#[test]
fn progress_is_monotonic() {
    let mut reader = reader(ringed_script(true).to_file().build().unwrap());
    let mut last = reader.percent_read();
    while reader.read_record().unwrap().is_some() {
        let now = reader.percent_read();
        assert!(now >= last);
        last = now;
    }
    assert!(last <= 100);
}

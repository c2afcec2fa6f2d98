//! On-disk layout constants.
//!
//! ```text
//! file header   magic "TXLG" | version u32 | ring_offset u64 | ring_capacity u64
//! head region   records from HEADER_LEN to ring_offset (or EOF without a ring)
//! ring header   oldest u64 | end u64 | wrapped u8          (at ring_offset)
//! ring data     ring_capacity bytes; logical order [oldest, end) or, once
//!               wrapped, [oldest, capacity) then [0, end)
//! record        tag u8 | msg_num u32 | time_us i64 | thread_id u32
//!               | thread_name str | logger str | level u8 | depth u8
//!               | method str | text str | caller_msg_num u32 (version >= 5)
//! str           len u16 | UTF-8 bytes
//! ```
//!
//! All integers are little-endian.

pub const MAGIC: [u8; 4] = *b"TXLG";

pub const HEADER_LEN: u64 = 24;
pub const RING_HEADER_LEN: u64 = 17;

pub const MIN_VERSION: u32 = 2;
pub const MAX_VERSION: u32 = 5;
/// First version that stores the caller's message number in each record.
pub const CALLER_VERSION: u32 = 5;

/// Padding marker: the rest of the ring's tail segment holds no records.
pub const TAG_WRAP: u8 = 0;
pub const TAG_MESSAGE: u8 = 1;
pub const TAG_ENTRY: u8 = 2;
pub const TAG_EXIT: u8 = 3;

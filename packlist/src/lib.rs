//! Packed inline list codec
//!
//! A packlist is a single contiguous byte buffer that stores a sequence of
//! entries (byte strings or signed 64-bit integers) in a variable-width
//! encoding, trading O(1) random access for very low per-element overhead.
//! Entries can be walked in both directions: forward via the encoded length
//! of each record, backward via a per-entry field holding the previous
//! record's length.
//!
//! Layout of the buffer:
//!
//! ```text
//! <total-bytes u32 LE> <tail-offset u32 LE> <entry-count u16 LE>
//! <entry> <entry> ... <entry> <0xFF>
//! ```
//!
//! `total-bytes` is the size of the whole buffer, `tail-offset` is the byte
//! offset of the last entry (or the entry area start when empty), and
//! `entry-count` saturates at `0xFFFF`, after which the real count is
//! recomputed by scanning. Each entry record is `<prev-entry-length>
//! <encoding> <payload>`; the encoding module documents the prefix
//! assignment.

mod encoding;
mod error;
mod list;

pub use error::{Error, Result};
pub use list::{End, Entry, Iter, Packlist};

/// Size in bytes of the fixed segment header.
pub const HEADER_SIZE: usize = 10;

/// Byte value terminating the entry area. Never a valid first byte of an
/// entry encoding.
pub const TERMINATOR: u8 = 0xFF;

/// Stored entry-count value meaning "too many, recount by scanning".
pub const COUNT_OVERFLOW: u16 = u16::MAX;

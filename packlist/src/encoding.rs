//! Entry record encoding
//!
//! Every entry record is `<prev-entry-length> <encoding> <payload>`. The
//! prev-entry-length field stores the full byte length of the preceding
//! record (0 for the first entry) in 1 byte, or in 5 bytes (`0xFE` marker
//! plus u32 LE) when the value does not fit. The encoding prefix both
//! classifies the entry and carries its length:
//!
//! ```text
//! 00pppppp                      string, length 0..=63
//! 01pppppp qqqqqqqq             string, length 0..=16383 (big end first)
//! 10000000 <u32 LE>             string, length 0..=2^32-1
//! 11000000 <i16 BE>             integer, 16 bit
//! 11010000 <i32 BE>             integer, 32 bit
//! 11100000 <i64 BE>             integer, 64 bit
//! 11110000 <i24 BE>             integer, 24 bit
//! 11111110 <i8>                 integer, 8 bit
//! 1111xxxx, x in 1..=13         integer x-1 (0..=12), no payload
//! ```
//!
//! `0xFF` is reserved as the segment terminator and never starts a record.
//! Integer payloads are two's-complement big-endian.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::TERMINATOR;

pub(crate) const PREVLEN_MARKER: u8 = 0xFE;

const STR_LONG: u8 = 0x80;
const INT16: u8 = 0xC0;
const INT32: u8 = 0xD0;
const INT64: u8 = 0xE0;
const INT24: u8 = 0xF0;
const INT8: u8 = 0xFE;

const INT24_MIN: i64 = -(1 << 23);
const INT24_MAX: i64 = (1 << 23) - 1;

/// Width of the prev-entry-length field needed to store `len`.
pub(crate) fn prevlen_size(len: usize) -> usize {
    if len < PREVLEN_MARKER as usize { 1 } else { 5 }
}

/// Append a prev-entry-length field in its natural width.
pub(crate) fn write_prevlen(out: &mut Vec<u8>, len: usize) {
    write_prevlen_sized(out, len, prevlen_size(len));
}

/// Append a prev-entry-length field of exactly `size` bytes (1 or 5). The
/// wide form is valid for any value, which is what lets a grown field stay
/// wide across later deletes.
pub(crate) fn write_prevlen_sized(out: &mut Vec<u8>, len: usize, size: usize) {
    debug_assert!(size == 1 || size == 5);
    if size == 1 {
        debug_assert!(len < PREVLEN_MARKER as usize);
        out.push(len as u8);
    } else {
        out.push(PREVLEN_MARKER);
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, len as u32);
        out.extend_from_slice(&raw);
    }
}

/// Overwrite the prev-entry-length field at `at`, keeping its current
/// `size`.
pub(crate) fn rewrite_prevlen(buf: &mut [u8], at: usize, len: usize, size: usize) {
    debug_assert!(size == 1 || size == 5);
    if size == 1 {
        buf[at] = len as u8;
    } else {
        buf[at] = PREVLEN_MARKER;
        LittleEndian::write_u32(&mut buf[at + 1..at + 5], len as u32);
    }
}

/// Read the prev-entry-length field at `at`, returning `(value, width)`.
pub(crate) fn decode_prevlen(buf: &[u8], at: usize) -> (usize, usize) {
    if buf[at] == PREVLEN_MARKER {
        (LittleEndian::read_u32(&buf[at + 1..at + 5]) as usize, 5)
    } else {
        (buf[at] as usize, 1)
    }
}

/// What an entry holds, as classified by its encoding prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Str,
    Int,
    /// Small integer stored directly in the prefix byte.
    Immediate(i64),
}

/// Decoded entry record header: field widths and payload length, enough to
/// size and classify the record without touching the payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryHeader {
    pub(crate) prevlen: usize,
    pub(crate) prevlen_size: usize,
    pub(crate) kind: EntryKind,
    pub(crate) head_size: usize,
    pub(crate) payload_len: usize,
}

impl EntryHeader {
    pub(crate) fn record_len(&self) -> usize {
        self.prevlen_size + self.head_size + self.payload_len
    }

    /// Offset of the payload relative to the record start.
    pub(crate) fn payload_start(&self) -> usize {
        self.prevlen_size + self.head_size
    }

    /// Decode the record header at `at`, or `None` if the bytes do not form
    /// one. Used by the integrity checker; internal walks use [`read`].
    ///
    /// [`read`]: EntryHeader::read
    pub(crate) fn parse(buf: &[u8], at: usize) -> Option<Self> {
        let first = *buf.get(at)?;
        if first == TERMINATOR {
            return None;
        }
        let (prevlen, prevlen_size) = if first == PREVLEN_MARKER {
            let raw = buf.get(at + 1..at + 5)?;
            (LittleEndian::read_u32(raw) as usize, 5)
        } else {
            (first as usize, 1)
        };
        let enc = *buf.get(at + prevlen_size)?;
        let (kind, head_size, payload_len) = match enc >> 6 {
            0b00 => (EntryKind::Str, 1, (enc & 0x3F) as usize),
            0b01 => {
                let lo = *buf.get(at + prevlen_size + 1)?;
                (EntryKind::Str, 2, (((enc & 0x3F) as usize) << 8) | lo as usize)
            }
            _ => match enc {
                STR_LONG => {
                    let raw = buf.get(at + prevlen_size + 1..at + prevlen_size + 5)?;
                    (EntryKind::Str, 5, LittleEndian::read_u32(raw) as usize)
                }
                INT16 => (EntryKind::Int, 1, 2),
                INT32 => (EntryKind::Int, 1, 4),
                INT64 => (EntryKind::Int, 1, 8),
                INT24 => (EntryKind::Int, 1, 3),
                INT8 => (EntryKind::Int, 1, 1),
                0xF1..=0xFD => (EntryKind::Immediate((enc & 0x0F) as i64 - 1), 1, 0),
                _ => return None,
            },
        };
        Some(EntryHeader {
            prevlen,
            prevlen_size,
            kind,
            head_size,
            payload_len,
        })
    }

    /// Decode the record header at `at` of a well-formed segment.
    pub(crate) fn read(buf: &[u8], at: usize) -> Self {
        match Self::parse(buf, at) {
            Some(header) => header,
            None => unreachable!("corrupt packlist entry at offset {at}"),
        }
    }
}

/// Encode a full entry record for `value` following an entry of `prevlen`
/// bytes. Values whose bytes are the canonical decimal form of a signed
/// 64-bit integer are stored in the narrowest integer encoding.
pub(crate) fn encode_record(prevlen: usize, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(10 + value.len());
    write_prevlen(&mut out, prevlen);
    match parse_decimal_i64(value) {
        Some(v) => write_int(&mut out, v),
        None => write_str(&mut out, value),
    }
    out
}

fn write_int(out: &mut Vec<u8>, v: i64) {
    if (0..=12).contains(&v) {
        out.push(0xF1 + v as u8);
    } else if let Ok(b) = i8::try_from(v) {
        out.push(INT8);
        out.push(b as u8);
    } else if let Ok(s) = i16::try_from(v) {
        out.push(INT16);
        let mut raw = [0u8; 2];
        BigEndian::write_i16(&mut raw, s);
        out.extend_from_slice(&raw);
    } else if (INT24_MIN..=INT24_MAX).contains(&v) {
        out.push(INT24);
        let mut raw = [0u8; 3];
        BigEndian::write_i24(&mut raw, v as i32);
        out.extend_from_slice(&raw);
    } else if let Ok(w) = i32::try_from(v) {
        out.push(INT32);
        let mut raw = [0u8; 4];
        BigEndian::write_i32(&mut raw, w);
        out.extend_from_slice(&raw);
    } else {
        out.push(INT64);
        let mut raw = [0u8; 8];
        BigEndian::write_i64(&mut raw, v);
        out.extend_from_slice(&raw);
    }
}

fn write_str(out: &mut Vec<u8>, value: &[u8]) {
    let len = value.len();
    if len <= 0x3F {
        out.push(len as u8);
    } else if len <= 0x3FFF {
        out.push(0x40 | (len >> 8) as u8);
        out.push((len & 0xFF) as u8);
    } else {
        assert!(
            u32::try_from(len).is_ok(),
            "value of {len} bytes exceeds the segment entry limit"
        );
        out.push(STR_LONG);
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, len as u32);
        out.extend_from_slice(&raw);
    }
    out.extend_from_slice(value);
}

/// Decode a big-endian two's-complement integer payload.
pub(crate) fn read_int(payload: &[u8]) -> i64 {
    match payload.len() {
        1 => payload[0] as i8 as i64,
        2 => i64::from(BigEndian::read_i16(payload)),
        3 => i64::from(BigEndian::read_i24(payload)),
        4 => i64::from(BigEndian::read_i32(payload)),
        _ => BigEndian::read_i64(payload),
    }
}

/// Parse `bytes` as a base-10 signed 64-bit integer, accepting only the
/// canonical rendering. Inputs like `b"01"`, `b"+7"` or `b" 7"` stay
/// strings so they round-trip verbatim.
pub(crate) fn parse_decimal_i64(bytes: &[u8]) -> Option<i64> {
    // i64::MIN is 20 characters
    if bytes.is_empty() || bytes.len() > 20 {
        return None;
    }
    let s = std::str::from_utf8(bytes).ok()?;
    let v: i64 = s.parse().ok()?;
    if v.to_string().as_bytes() == bytes {
        Some(v)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_string_record() {
        let rec = encode_record(0, b"hello");
        assert_eq!(rec, vec![0x00, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn medium_string_record() {
        let value = vec![0xAB; 300];
        let rec = encode_record(7, &value);
        assert_eq!(rec[0], 7);
        assert_eq!(rec[1], 0x40 | 0x01); // 300 = 0x012C
        assert_eq!(rec[2], 0x2C);
        assert_eq!(rec.len(), 1 + 2 + 300);
    }

    #[test]
    fn long_string_record() {
        let value = vec![0u8; 0x4000];
        let rec = encode_record(0, &value);
        assert_eq!(rec[1], 0x80);
        assert_eq!(&rec[2..6], &[0x00, 0x40, 0x00, 0x00]); // u32 LE
        assert_eq!(rec.len(), 1 + 5 + 0x4000);
    }

    #[test]
    fn integer_records_use_narrowest_width() {
        // 0..=12 live in the prefix byte
        assert_eq!(encode_record(0, b"0"), vec![0x00, 0xF1]);
        assert_eq!(encode_record(0, b"12"), vec![0x00, 0xFD]);
        // 13 no longer fits inline
        assert_eq!(encode_record(0, b"13"), vec![0x00, INT8, 13]);
        assert_eq!(encode_record(0, b"-1"), vec![0x00, INT8, 0xFF]);
        assert_eq!(encode_record(0, b"1111"), vec![0x00, INT16, 0x04, 0x57]);
        assert_eq!(
            encode_record(0, b"-70000"),
            vec![0x00, INT24, 0xFE, 0xEE, 0x90]
        );
        assert_eq!(
            encode_record(0, b"70000000"),
            vec![0x00, INT32, 0x04, 0x2C, 0x1D, 0x80]
        );
        let rec = encode_record(0, b"9223372036854775807");
        assert_eq!(rec[1], INT64);
        assert_eq!(read_int(&rec[2..10]), i64::MAX);
    }

    #[test]
    fn integer_payloads_round_trip() {
        for v in [
            13i64,
            -1,
            127,
            -128,
            128,
            32767,
            -32768,
            32768,
            INT24_MAX,
            INT24_MIN,
            INT24_MAX + 1,
            i64::from(i32::MAX),
            i64::from(i32::MIN),
            i64::from(i32::MAX) + 1,
            i64::MAX,
            i64::MIN,
        ] {
            let rec = encode_record(0, v.to_string().as_bytes());
            let header = EntryHeader::read(&rec, 0);
            assert_eq!(header.kind, EntryKind::Int, "for {v}");
            let start = header.payload_start();
            assert_eq!(read_int(&rec[start..start + header.payload_len]), v);
        }
    }

    #[test]
    fn non_canonical_numbers_stay_strings() {
        for bytes in [
            &b"01"[..],
            b"+7",
            b"-0",
            b" 1",
            b"1 ",
            b"",
            b"12345678901234567890123",
            b"9223372036854775808", // i64::MAX + 1
            b"1.5",
        ] {
            assert_eq!(parse_decimal_i64(bytes), None, "for {bytes:?}");
        }
        assert_eq!(parse_decimal_i64(b"-9223372036854775808"), Some(i64::MIN));
    }

    #[test]
    fn prevlen_widths() {
        assert_eq!(prevlen_size(0), 1);
        assert_eq!(prevlen_size(253), 1);
        assert_eq!(prevlen_size(254), 5);

        let mut out = Vec::new();
        write_prevlen(&mut out, 253);
        assert_eq!(out, vec![253]);

        out.clear();
        write_prevlen(&mut out, 254);
        assert_eq!(out, vec![0xFE, 254, 0, 0, 0]);
        assert_eq!(decode_prevlen(&out, 0), (254, 5));

        // forced wide form holds small values too
        out.clear();
        write_prevlen_sized(&mut out, 9, 5);
        assert_eq!(decode_prevlen(&out, 0), (9, 5));
    }

    #[test]
    fn parse_rejects_terminator_and_unknown_prefixes() {
        assert!(EntryHeader::parse(&[0xFF], 0).is_none());
        // 0b10xxxxxx other than 0x80 is unassigned
        assert!(EntryHeader::parse(&[0x00, 0x81, 0x00], 0).is_none());
        // truncated medium string prefix
        assert!(EntryHeader::parse(&[0x00, 0x41], 0).is_none());
    }
}

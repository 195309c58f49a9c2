//! The packed list buffer and its mutation primitives

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::encoding::{self, EntryHeader, EntryKind};
use crate::{COUNT_OVERFLOW, Error, HEADER_SIZE, Result, TERMINATOR};

/// Which end of the list to push to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

/// A decoded entry, borrowed from the segment buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    Bytes(&'a [u8]),
    Int(i64),
}

/// A packed list of byte-string and integer entries in one contiguous
/// buffer.
///
/// Cursors handed out by [`index`], [`next`], [`prev`] and [`find`] are
/// byte offsets into the buffer and are invalidated by any mutation.
///
/// [`index`]: Packlist::index
/// [`next`]: Packlist::next
/// [`prev`]: Packlist::prev
/// [`find`]: Packlist::find
#[derive(Clone)]
pub struct Packlist {
    buf: Vec<u8>,
}

impl Packlist {
    /// Create an empty list: header plus terminator, no entries.
    pub fn new() -> Self {
        let mut buf = vec![0u8; HEADER_SIZE + 1];
        LittleEndian::write_u32(&mut buf[0..4], (HEADER_SIZE + 1) as u32);
        LittleEndian::write_u32(&mut buf[4..8], HEADER_SIZE as u32);
        buf[HEADER_SIZE] = TERMINATOR;
        Packlist { buf }
    }

    /// Number of entries. O(1) until the stored count saturates, then a
    /// full scan.
    pub fn len(&self) -> usize {
        let stored = self.stored_count();
        if stored == COUNT_OVERFLOW {
            self.iter().count()
        } else {
            stored as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf[HEADER_SIZE] == TERMINATOR
    }

    /// Size in bytes of the whole packed buffer.
    pub fn blob_len(&self) -> usize {
        self.buf.len()
    }

    /// Raw packed bytes, header and terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Push `value` at either end of the list.
    pub fn push(&mut self, value: &[u8], end: End) {
        match end {
            End::Head => self.insert_at(HEADER_SIZE, value),
            End::Tail => self.insert_at(self.buf.len() - 1, value),
        }
    }

    /// Insert `value` before the entry at cursor `at`. Passing the
    /// end-of-entries position appends.
    pub fn insert(&mut self, at: usize, value: &[u8]) {
        self.insert_at(at, value);
    }

    /// Delete the entry at cursor `at`. Returns the cursor of the entry
    /// that took its place, or `None` when it was the last one.
    pub fn delete(&mut self, at: usize) -> Option<usize> {
        self.delete_at(at, 1);
        if self.buf[at] == TERMINATOR { None } else { Some(at) }
    }

    /// Delete up to `count` consecutive entries starting at index `start`
    /// (negative counts from the tail, `-1` being the last entry). Counts
    /// larger than what remains delete through the end. Returns the number
    /// of entries deleted.
    pub fn delete_range(&mut self, start: isize, count: usize) -> usize {
        match self.index(start) {
            Some(at) => self.delete_at(at, count),
            None => 0,
        }
    }

    /// Replace the entry at cursor `at` with `value`.
    pub fn replace(&mut self, at: usize, value: &[u8]) {
        self.delete_at(at, 1);
        self.insert_at(at, value);
    }

    /// Cursor of the entry at index `i`: O(i) from the head for `i >= 0`,
    /// O(-i) from the tail for `i < 0` (`-1` is the last entry). `None`
    /// when out of range.
    pub fn index(&self, i: isize) -> Option<usize> {
        if i >= 0 {
            let mut at = self.first_entry()?;
            for _ in 0..i {
                at = self.next(at)?;
            }
            Some(at)
        } else {
            if self.is_empty() {
                return None;
            }
            let mut at = self.tail_offset();
            for _ in 0..-(i + 1) {
                at = self.prev(at)?;
            }
            Some(at)
        }
    }

    /// Cursor of the entry after `at`, or `None` at the tail.
    pub fn next(&self, at: usize) -> Option<usize> {
        let n = at + self.record_len(at);
        if self.buf[n] == TERMINATOR { None } else { Some(n) }
    }

    /// Cursor of the entry before `at`, or `None` at the head.
    pub fn prev(&self, at: usize) -> Option<usize> {
        if at == HEADER_SIZE {
            return None;
        }
        let (prevlen, _) = encoding::decode_prevlen(&self.buf, at);
        Some(at - prevlen)
    }

    /// Decode the entry at cursor `at`.
    pub fn get(&self, at: usize) -> Entry<'_> {
        let header = EntryHeader::read(&self.buf, at);
        let start = at + header.payload_start();
        match header.kind {
            EntryKind::Str => Entry::Bytes(&self.buf[start..start + header.payload_len]),
            EntryKind::Int => {
                Entry::Int(encoding::read_int(&self.buf[start..start + header.payload_len]))
            }
            EntryKind::Immediate(v) => Entry::Int(v),
        }
    }

    /// Whether the entry at `at` equals `other`: byte equality for string
    /// entries, numeric equality (after canonical decimal parsing of
    /// `other`) for integer entries.
    pub fn entry_eq(&self, at: usize, other: &[u8]) -> bool {
        self.entry_matches(at, other, encoding::parse_decimal_i64(other))
    }

    /// Find the next entry equal to `target` starting at cursor `from`,
    /// comparing only every `skip + 1`-th entry.
    pub fn find(&self, from: usize, target: &[u8], skip: usize) -> Option<usize> {
        let target_int = encoding::parse_decimal_i64(target);
        let mut at = Some(from);
        let mut skipcnt = 0;
        while let Some(p) = at {
            if skipcnt == 0 {
                if self.entry_matches(p, target, target_int) {
                    return Some(p);
                }
                skipcnt = skip;
            } else {
                skipcnt -= 1;
            }
            at = self.next(p);
        }
        None
    }

    /// Iterate entries head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            at: self.first_entry(),
        }
    }

    /// Deep structural validation: header fields, encodings, the
    /// prev-entry-length chain and the terminator must all agree.
    pub fn check_integrity(&self) -> Result<()> {
        if self.buf.len() < HEADER_SIZE + 1 {
            return Err(Error::Truncated {
                len: self.buf.len(),
            });
        }
        let total = LittleEndian::read_u32(&self.buf[0..4]) as usize;
        if total != self.buf.len() {
            return Err(Error::TotalBytes {
                stored: total,
                actual: self.buf.len(),
            });
        }
        if self.buf[total - 1] != TERMINATOR {
            return Err(Error::MissingTerminator(self.buf[total - 1]));
        }

        let mut at = HEADER_SIZE;
        let mut prev_record = 0usize;
        let mut last_entry = None;
        let mut entries = 0usize;
        while self.buf[at] != TERMINATOR {
            let header = EntryHeader::parse(&self.buf, at).ok_or(Error::BadEncoding { at })?;
            if header.prevlen != prev_record {
                return Err(Error::PrevLen {
                    at,
                    stored: header.prevlen,
                    expected: prev_record,
                });
            }
            let record = header.record_len();
            if at + record > total - 1 {
                return Err(Error::Overrun { at });
            }
            prev_record = record;
            last_entry = Some(at);
            at += record;
            entries += 1;
        }
        if at != total - 1 {
            return Err(Error::EarlyTerminator { at });
        }

        let stored = self.stored_count();
        if stored != COUNT_OVERFLOW && stored as usize != entries {
            return Err(Error::Count {
                stored: stored as usize,
                actual: entries,
            });
        }
        let tail = self.tail_offset();
        let expected_tail = last_entry.unwrap_or(HEADER_SIZE);
        if tail != expected_tail {
            return Err(Error::TailOffset {
                stored: tail,
                actual: expected_tail,
            });
        }
        Ok(())
    }

    // ---- header fields ----

    fn tail_offset(&self) -> usize {
        LittleEndian::read_u32(&self.buf[4..8]) as usize
    }

    fn set_tail_offset(&mut self, at: usize) {
        LittleEndian::write_u32(&mut self.buf[4..8], at as u32);
    }

    fn stored_count(&self) -> u16 {
        LittleEndian::read_u16(&self.buf[8..10])
    }

    fn set_total_bytes(&mut self) {
        let total = self.buf.len() as u32;
        LittleEndian::write_u32(&mut self.buf[0..4], total);
    }

    /// Adjust the stored entry count. Once the field has saturated it is
    /// left alone and `len` falls back to scanning.
    fn bump_count(&mut self, delta: i64) {
        let stored = self.stored_count();
        if stored != COUNT_OVERFLOW {
            let updated = (i64::from(stored) + delta).clamp(0, i64::from(COUNT_OVERFLOW));
            LittleEndian::write_u16(&mut self.buf[8..10], updated as u16);
        }
    }

    // ---- cursor helpers ----

    fn first_entry(&self) -> Option<usize> {
        if self.is_empty() { None } else { Some(HEADER_SIZE) }
    }

    fn record_len(&self, at: usize) -> usize {
        EntryHeader::read(&self.buf, at).record_len()
    }

    fn entry_matches(&self, at: usize, target: &[u8], target_int: Option<i64>) -> bool {
        match self.get(at) {
            Entry::Bytes(b) => b == target,
            Entry::Int(v) => target_int == Some(v),
        }
    }

    // ---- mutation ----

    /// Insert `value` at byte position `p`, which must be an entry cursor
    /// (insert before it) or the terminator position (append).
    fn insert_at(&mut self, p: usize, value: &[u8]) {
        debug_assert!(p >= HEADER_SIZE && p < self.buf.len());
        let appending = self.buf[p] == TERMINATOR;
        let prevlen = if appending {
            if self.is_empty() {
                0
            } else {
                self.record_len(self.tail_offset())
            }
        } else {
            encoding::decode_prevlen(&self.buf, p).0
        };

        let record = encoding::encode_record(prevlen, value);
        let record_len = record.len();

        if appending {
            self.buf.splice(p..p, record);
            self.set_tail_offset(p);
        } else {
            // The entry at p becomes the successor of the new one: its
            // prev-entry-length field is rewritten as part of the same
            // splice, possibly changing width.
            let (_, old_size) = encoding::decode_prevlen(&self.buf, p);
            let new_size = encoding::prevlen_size(record_len);
            let mut patch = record;
            encoding::write_prevlen_sized(&mut patch, record_len, new_size);
            self.buf.splice(p..p + old_size, patch);

            let shift = record_len as isize + new_size as isize - old_size as isize;
            let old_tail = self.tail_offset();
            if old_tail == p {
                // The successor is the tail; its record starts right after
                // the new one.
                self.set_tail_offset(p + record_len);
            } else {
                self.set_tail_offset((old_tail as isize + shift) as usize);
            }
            if new_size != old_size {
                self.cascade_update(p + record_len);
            }
        }
        self.set_total_bytes();
        self.bump_count(1);
    }

    /// Delete up to `count` entries starting at cursor `p`. Returns how
    /// many were removed.
    fn delete_at(&mut self, p: usize, count: usize) -> usize {
        if count == 0 || self.buf[p] == TERMINATOR {
            return 0;
        }
        let first_prevlen = encoding::decode_prevlen(&self.buf, p).0;
        let mut end = p;
        let mut deleted = 0;
        while deleted < count && self.buf[end] != TERMINATOR {
            end += self.record_len(end);
            deleted += 1;
        }
        let removed = end - p;

        if self.buf[end] == TERMINATOR {
            // Deleting through the end; the entry before p becomes the tail.
            self.buf.splice(p..end, std::iter::empty::<u8>());
            let tail = if p == HEADER_SIZE {
                HEADER_SIZE
            } else {
                p - first_prevlen
            };
            self.set_tail_offset(tail);
        } else {
            // The first survivor inherits first_prevlen. A field already in
            // wide form stays wide.
            let (_, old_size) = encoding::decode_prevlen(&self.buf, end);
            let new_size = if old_size == 5 {
                5
            } else {
                encoding::prevlen_size(first_prevlen)
            };
            let mut patch = Vec::with_capacity(new_size);
            encoding::write_prevlen_sized(&mut patch, first_prevlen, new_size);
            self.buf.splice(p..end + old_size, patch);

            let grown = new_size as isize - old_size as isize;
            let old_tail = self.tail_offset();
            if old_tail == end {
                self.set_tail_offset(p);
            } else {
                self.set_tail_offset((old_tail as isize - removed as isize + grown) as usize);
            }
            self.cascade_update(p);
        }
        self.set_total_bytes();
        self.bump_count(-(deleted as i64));
        deleted
    }

    /// Propagate a record-length change forward: whenever an entry's length
    /// no longer matches its successor's prev-entry-length field, rewrite
    /// that field, growing it from 1 to 5 bytes when needed. A grown field
    /// changes the successor's own length, so the walk continues until the
    /// chain settles.
    fn cascade_update(&mut self, mut p: usize) {
        loop {
            if self.buf[p] == TERMINATOR {
                return;
            }
            let record = self.record_len(p);
            let next = p + record;
            if self.buf[next] == TERMINATOR {
                return;
            }
            let (stored, stored_size) = encoding::decode_prevlen(&self.buf, next);
            if stored == record {
                return;
            }
            let needed = encoding::prevlen_size(record);
            if stored_size >= needed {
                // The field is wide enough; rewrite the value in place.
                // A wide field keeps its width even for a small value.
                encoding::rewrite_prevlen(&mut self.buf, next, record, stored_size);
                return;
            }
            trace!("prev-entry-length at offset {next} grew to wide form");
            let mut field = Vec::with_capacity(5);
            encoding::write_prevlen_sized(&mut field, record, 5);
            self.buf.splice(next..next + stored_size, field);
            if self.tail_offset() != next {
                let tail = self.tail_offset();
                self.set_tail_offset(tail + 4);
            }
            self.set_total_bytes();
            p = next;
        }
    }
}

impl Default for Packlist {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Packlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Forward iterator over decoded entries.
pub struct Iter<'a> {
    list: &'a Packlist,
    at: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Entry<'a>> {
        let at = self.at?;
        let entry = self.list.get(at);
        self.at = self.list.next(at);
        Some(entry)
    }
}

//! Error types for packlist structural validation

use thiserror::Error;

/// Result type for packlist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural defects reported by [`Packlist::check_integrity`][0].
///
/// Ordinary mutations never produce these; they exist for validating
/// buffers of unknown provenance and for test assertions.
///
/// [0]: crate::Packlist::check_integrity
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer is smaller than a header plus terminator
    #[error("truncated segment: {len} bytes cannot hold header and terminator")]
    Truncated { len: usize },

    /// The total-bytes header field disagrees with the buffer size
    #[error("total-bytes field says {stored} but the buffer holds {actual}")]
    TotalBytes { stored: usize, actual: usize },

    /// The last byte is not the terminator
    #[error("segment does not end with the terminator byte, got {0:#04x}")]
    MissingTerminator(u8),

    /// A terminator byte appears before the end of the entry area
    #[error("terminator appears before the end of the segment at offset {at}")]
    EarlyTerminator { at: usize },

    /// An entry header cannot be decoded
    #[error("unreadable entry header at offset {at}")]
    BadEncoding { at: usize },

    /// An entry's declared payload runs past the terminator
    #[error("entry at offset {at} overruns the segment")]
    Overrun { at: usize },

    /// A prev-entry-length field disagrees with its predecessor
    #[error("prev-entry-length at offset {at} is {stored}, expected {expected}")]
    PrevLen {
        at: usize,
        stored: usize,
        expected: usize,
    },

    /// The entry-count header field disagrees with a full scan
    #[error("entry-count field says {stored} but the segment holds {actual}")]
    Count { stored: usize, actual: usize },

    /// The tail-offset header field does not name the last entry
    #[error("tail-offset field says {stored} but the last entry starts at {actual}")]
    TailOffset { stored: usize, actual: usize },
}

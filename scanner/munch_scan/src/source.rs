//! Incremental UTF-8 decoding over an `io::Read` source.
//!
//! The engine consumes one `char` at a time and never looks at the source
//! again after a symbol is pulled, so the decoder is strictly forward-only:
//! read the leading byte, derive the sequence width from it, read the
//! continuation bytes, validate. A malformed or truncated sequence is fatal
//! (the offset of its first byte is reported); so is any read failure other
//! than end-of-input.

use std::io::{ErrorKind, Read};

use crate::error::ScanError;

/// Number of bytes in the UTF-8 sequence introduced by `byte`.
///
/// Continuation and invalid leading bytes report width 1 so the offending
/// byte itself is flagged by validation.
fn utf8_width(byte: u8) -> usize {
    match byte {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

/// Pull-based `char` decoder over a byte source.
pub(crate) struct CharSource<R> {
    inner: R,
    /// Byte offset of the next unread byte, for error reporting.
    offset: u64,
}

impl<R: Read> CharSource<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Decode the next character. `Ok(None)` at end of input.
    pub(crate) fn next_char(&mut self) -> Result<Option<char>, ScanError> {
        let start = self.offset;
        let mut buf = [0u8; 4];

        if !self.fill(&mut buf[..1], start)? {
            return Ok(None);
        }

        let width = utf8_width(buf[0]);
        if width > 1 && !self.fill(&mut buf[1..width], start)? {
            // Input ended inside a multi-byte sequence.
            return Err(ScanError::InvalidUtf8 { offset: start });
        }

        match std::str::from_utf8(&buf[..width]) {
            Ok(s) => Ok(s.chars().next()),
            Err(_) => Err(ScanError::InvalidUtf8 { offset: start }),
        }
    }

    /// Read exactly `buf.len()` bytes. `Ok(false)` on clean EOF before the
    /// first byte; a partial read inside the span is an error surfaced by
    /// the caller via `start`.
    fn fill(&mut self, buf: &mut [u8], start: u64) -> Result<bool, ScanError> {
        let mut read = 0;
        while read < buf.len() {
            match self.inner.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        return Ok(false);
                    }
                    return Err(ScanError::InvalidUtf8 { offset: start });
                }
                Ok(n) => {
                    read += n;
                    self.offset += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(ScanError::Read(e)),
            }
        }
        Ok(true)
    }
}

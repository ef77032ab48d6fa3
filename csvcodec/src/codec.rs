//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::event::{FrameEvent, FrameViolation};
use crate::record::Record;
use crate::result::CodecError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Record terminator and control bytes recognized by the decoder.
mod consts {
    pub const NUL: u8 = 0x00;
    pub const LF: u8 = 0x0A;
    pub const CR: u8 = 0x0D;
}

/// Default cap on the accumulated length of a single record, in bytes.
pub const DEFAULT_MAX_RECORD_LENGTH: usize = 8192;

/// Progress toward a record terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EolState {
    /// No terminator in sight; bytes accumulate into the record buffer.
    NotYet,
    /// A `\r` was just consumed; the next byte decides whether this was a
    /// `\r\n` terminator.
    SeenCr,
}

/// A codec for delimiter-separated records over a byte stream.
///
/// `CsvCodec` is responsible for managing the state and buffer required to
/// frame a live byte stream into complete records. It recognizes three
/// terminator conventions (`\0`, `\n`, `\r\n`), skips zero-length records,
/// and reports malformed records as recoverable [`FrameEvent::Violation`]s
/// rather than stream errors.
///
/// It is typically paired with a [`Framed`](tokio_util::codec::Framed)
/// transport; each connection owns exactly one instance.
#[derive(Debug, Clone)]
pub struct CsvCodec {
    buffer: BytesMut,
    eol: EolState,
    delimiters: Vec<char>,
    max_record_length: usize,
    overflowed: bool,
}

impl CsvCodec {
    /// Creates a new codec with the default delimiter set (`,`) and the
    /// default maximum record length.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the delimiter set used to split decoded lines into fields.
    #[must_use]
    pub fn with_delimiters(mut self, delimiters: impl Into<Vec<char>>) -> Self {
        self.delimiters = delimiters.into();
        self
    }

    /// Caps the accumulated length of a single record.
    ///
    /// A record growing past the cap is discarded up to its terminator and
    /// reported as [`FrameViolation::InvalidCsv`].
    #[must_use]
    pub fn with_max_record_length(mut self, max: usize) -> Self {
        self.max_record_length = max;
        self
    }

    /// The current delimiter set.
    pub fn delimiters(&self) -> &[char] {
        &self.delimiters
    }

    /// The current maximum record length.
    pub fn max_record_length(&self) -> usize {
        self.max_record_length
    }

    fn push_byte(&mut self, byte: u8) {
        if self.buffer.len() >= self.max_record_length {
            if !self.overflowed {
                warn!(
                    max = self.max_record_length,
                    "record exceeded maximum length, discarding until terminator"
                );
            }
            self.overflowed = true;
            return;
        }
        self.buffer.put_u8(byte);
    }

    /// Completes the pending record, if any.
    ///
    /// Returns `None` for zero-length records, which are skipped without
    /// emitting anything.
    fn finish_record(&mut self) -> Option<FrameEvent> {
        let raw = self.buffer.split();
        if std::mem::take(&mut self.overflowed) {
            return Some(FrameEvent::Violation(FrameViolation::InvalidCsv));
        }
        if raw.is_empty() {
            return None;
        }
        match std::str::from_utf8(&raw) {
            Ok(line) => Some(FrameEvent::Record(Record::parse(line, &self.delimiters))),
            Err(_) => {
                warn!("record payload was not valid UTF-8");
                Some(FrameEvent::Violation(FrameViolation::InvalidUtf8))
            }
        }
    }
}

impl Default for CsvCodec {
    fn default() -> Self {
        Self {
            buffer: BytesMut::new(),
            eol: EolState::NotYet,
            delimiters: vec![','],
            max_record_length: DEFAULT_MAX_RECORD_LENGTH,
            overflowed: false,
        }
    }
}

impl Decoder for CsvCodec {
    type Item = FrameEvent;
    type Error = CodecError;

    /// Consumes bytes from `src` until a complete record is framed.
    ///
    /// The decoder is stateful: partial records survive across calls, so a
    /// record split over many reads is reassembled transparently. Returns
    /// `Ok(None)` when `src` is exhausted without completing a record.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>, Self::Error> {
        while src.remaining() > 0 {
            let byte = src.get_u8();
            match (self.eol, byte) {
                (EolState::NotYet, consts::NUL | consts::LF) => {
                    if let Some(event) = self.finish_record() {
                        return Ok(Some(event));
                    }
                }
                (EolState::NotYet, consts::CR) => {
                    self.eol = EolState::SeenCr;
                }
                (EolState::NotYet, _) => {
                    self.push_byte(byte);
                }
                (EolState::SeenCr, consts::LF) => {
                    self.eol = EolState::NotYet;
                    if let Some(event) = self.finish_record() {
                        return Ok(Some(event));
                    }
                }
                (EolState::SeenCr, _) => {
                    // A bare \r is not a terminator. Both the \r and this
                    // byte have been consumed and are dropped; the record
                    // buffer is left intact and scanning resumes. Known
                    // quirk, see the crate docs.
                    self.eol = EolState::NotYet;
                }
            }
        }
        Ok(None)
    }
}

impl Encoder<&str> for CsvCodec {
    type Error = CodecError;

    /// Writes a reply line: the string followed by `\n`.
    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(consts::LF);
        Ok(())
    }
}

impl Encoder<String> for CsvCodec {
    type Error = CodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(item.as_str(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut CsvCodec, input: &[u8]) -> Vec<FrameEvent> {
        let mut src = BytesMut::from(input);
        let mut events = Vec::new();
        while let Some(event) = codec.decode(&mut src).unwrap() {
            events.push(event);
        }
        events
    }

    fn record(fields: &[&str]) -> FrameEvent {
        FrameEvent::Record(Record::from_fields(
            fields.iter().map(|f| f.to_string()).collect(),
        ))
    }

    #[test]
    fn test_decode_lf_terminator() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b"a,b,c\n");
        assert_eq!(events, vec![record(&["a", "b", "c"])]);
    }

    #[test]
    fn test_decode_nul_terminator() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b"a,b,c\0");
        assert_eq!(events, vec![record(&["a", "b", "c"])]);
    }

    #[test]
    fn test_decode_crlf_terminator() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b"a,b,c\r\n");
        assert_eq!(events, vec![record(&["a", "b", "c"])]);
    }

    #[test]
    fn test_bare_cr_is_not_a_terminator() {
        let mut codec = CsvCodec::new();
        // The \r and the byte after it are dropped; "ab" + "cd" frame as one
        // record once the real terminator arrives. The 'X' after \r is lost.
        let events = decode_all(&mut codec, b"ab\rXcd\n");
        assert_eq!(events, vec![record(&["abcd"])]);
    }

    #[test]
    fn test_cr_then_nul_does_not_terminate() {
        let mut codec = CsvCodec::new();
        // Even a would-be terminator byte after \r is swallowed by the quirk.
        let events = decode_all(&mut codec, b"ab\r\0cd\n");
        assert_eq!(events, vec![record(&["abcd"])]);
    }

    #[test]
    fn test_empty_record_is_skipped() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b"\n\r\n\0one\n");
        assert_eq!(events, vec![record(&["one"])]);
    }

    #[test]
    fn test_partial_record_across_reads() {
        let mut codec = CsvCodec::new();
        assert!(decode_all(&mut codec, b"a,").is_empty());
        assert!(decode_all(&mut codec, b"b").is_empty());
        let events = decode_all(&mut codec, b",c\n");
        assert_eq!(events, vec![record(&["a", "b", "c"])]);
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let mut codec = CsvCodec::new();
        assert!(decode_all(&mut codec, b"abc\r").is_empty());
        let events = decode_all(&mut codec, b"\n");
        assert_eq!(events, vec![record(&["abc"])]);
    }

    #[test]
    fn test_multiple_records_in_one_read() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b"one\ntwo\0three\r\n");
        assert_eq!(
            events,
            vec![record(&["one"]), record(&["two"]), record(&["three"])]
        );
    }

    #[test]
    fn test_invalid_utf8_is_recoverable() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b"\xFF\xFE\nok\n");
        assert_eq!(
            events,
            vec![
                FrameEvent::Violation(FrameViolation::InvalidUtf8),
                record(&["ok"]),
            ]
        );
    }

    #[test]
    fn test_over_length_record_is_recoverable() {
        let mut codec = CsvCodec::new().with_max_record_length(4);
        let events = decode_all(&mut codec, b"abcdefgh\nok\n");
        assert_eq!(
            events,
            vec![
                FrameEvent::Violation(FrameViolation::InvalidCsv),
                record(&["ok"]),
            ]
        );
    }

    #[test]
    fn test_custom_delimiters() {
        let mut codec = CsvCodec::new().with_delimiters(vec![';', '|']);
        let events = decode_all(&mut codec, b"a;b|c\n");
        assert_eq!(events, vec![record(&["a", "b", "c"])]);
    }

    #[test]
    fn test_fields_are_trimmed() {
        let mut codec = CsvCodec::new();
        let events = decode_all(&mut codec, b" a , b ,c\n");
        assert_eq!(events, vec![record(&["a", "b", "c"])]);
    }

    #[test]
    fn test_encode_reply_line() {
        let mut codec = CsvCodec::new();
        let mut dst = BytesMut::new();
        codec.encode("OK", &mut dst).unwrap();
        assert_eq!(&dst[..], b"OK\n");
    }

    #[test]
    fn test_encode_empty_reply_is_bare_newline() {
        let mut codec = CsvCodec::new();
        let mut dst = BytesMut::new();
        codec.encode("", &mut dst).unwrap();
        assert_eq!(&dst[..], b"\n");
    }
}

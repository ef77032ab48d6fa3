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

//! # Wireline Delimited-Record Codec
//!
//! This crate provides the byte framer for the wireline pipeline: a stateful
//! codec that turns a raw byte stream into complete delimited records, one at
//! a time. It is designed to work with asynchronous networking libraries like
//! Tokio and implements the `tokio_util::codec` traits so it can be dropped
//! into a [`Framed`](tokio_util::codec::Framed) transport.
//!
//! ## Overview
//!
//! The codec accepts three record-terminator conventions on input:
//!
//! - a single `0x00` (NUL) byte
//! - a single `0x0A` (`\n`)
//! - the two-byte sequence `0x0D 0x0A` (`\r\n`)
//!
//! On emit, the accumulated bytes are decoded as UTF-8 and split by a
//! configurable set of delimiter characters (comma by default). Empty split
//! entries are removed and the surviving fields trimmed, producing a
//! [`Record`]. Zero-length records (a terminator with no payload) are
//! silently skipped and never reach the application.
//!
//! Malformed input does not tear the stream down. Invalid UTF-8 and
//! over-length records surface as [`FrameViolation`] events with a
//! peer-facing diagnostic line; the codec resets and keeps scanning.
//!
//! ## Core Components
//!
//! ### [`CsvCodec`]
//!
//! The codec itself, implementing [`Decoder`](tokio_util::codec::Decoder)
//! (bytes to [`FrameEvent`]) and [`Encoder`](tokio_util::codec::Encoder)
//! (reply strings to newline-terminated bytes). The decoder is a three-phase
//! state machine tracking progress toward a record terminator.
//!
//! ### [`Record`]
//!
//! One complete decoded record: an ordered, immutable sequence of string
//! fields. This is the protocol data unit the rest of the pipeline consumes.
//!
//! ### [`FrameEvent`]
//!
//! What the decoder produces: either a complete [`Record`] or a recoverable
//! [`FrameViolation`].
//!
//! ## Usage Example
//!
//! ```rust
//! use wireline_csvcodec::{CsvCodec, FrameEvent};
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut codec = CsvCodec::new();
//! let mut input = BytesMut::from(&b"alpha, beta ,gamma\r\n"[..]);
//!
//! if let Some(FrameEvent::Record(record)) = codec.decode(&mut input)? {
//!     assert_eq!(record.fields(), &["alpha", "beta", "gamma"]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Known Quirk
//!
//! A bare `\r` that is not followed by `\n` never terminates a record. The
//! `\r` and the byte that follows it are both consumed and dropped before
//! scanning resumes. This asymmetry is deliberate and preserved for
//! compatibility with peers that depend on the historical framing behavior.
//!
//! ## Thread Safety
//!
//! `CsvCodec` is **not** thread-safe; each connection owns its own instance
//! and the framing state never escapes that connection.

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod codec;
mod event;
mod record;
mod result;

pub use self::codec::{CsvCodec, DEFAULT_MAX_RECORD_LENGTH};
pub use self::event::{FrameEvent, FrameViolation};
pub use self::record::Record;
pub use self::result::{CodecError, CodecResult};

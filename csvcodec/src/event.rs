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

use crate::record::Record;
use std::fmt;

/// What the decoder produces for each complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete, well-formed record.
    Record(Record),
    /// A recoverable framing violation.
    ///
    /// The owning connection should write [`FrameViolation::diagnostic`] back
    /// to the peer and keep reading; violations never terminate the stream.
    Violation(FrameViolation),
}

/// Recoverable framing violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameViolation {
    /// The record bytes were not valid UTF-8.
    InvalidUtf8,
    /// The record could not be split into fields (it exceeded the codec's
    /// maximum record length).
    InvalidCsv,
}

impl FrameViolation {
    /// The exact diagnostic line written back to the peer.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            Self::InvalidUtf8 => "Protocol Error: Invalid UTF8 encoding!",
            Self::InvalidCsv => "Protocol Error: Invalid CSV data!",
        }
    }
}

impl fmt::Display for FrameViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnostic())
    }
}

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

use std::fmt;

/// One complete decoded record: an ordered sequence of string fields.
///
/// Records are immutable once produced by the decoder. Fields are the result
/// of splitting the decoded line by the configured delimiter set, removing
/// empty split entries, and trimming what remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    /// Parse a decoded line into a record.
    ///
    /// Splitting never fails; a line consisting solely of delimiters yields a
    /// record with zero fields.
    pub fn parse(line: &str, delimiters: &[char]) -> Self {
        let fields = line
            .split(|ch| delimiters.contains(&ch))
            .filter(|field| !field.is_empty())
            .map(|field| field.trim().to_string())
            .collect();
        Self { fields }
    }

    /// Construct a record directly from fields.
    ///
    /// Mostly useful for handlers and tests that need to fabricate records.
    pub fn from_fields(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// The ordered fields of this record.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields in this record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether this record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a single field by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Consume the record, yielding its fields.
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let record = Record::parse("a,b,c", &[',']);
        assert_eq!(record.fields(), &["a", "b", "c"]);
    }

    #[test]
    fn test_parse_trims_fields() {
        let record = Record::parse(" a , b ,c ", &[',']);
        assert_eq!(record.fields(), &["a", "b", "c"]);
    }

    #[test]
    fn test_parse_removes_empty_entries() {
        let record = Record::parse("a,,b,", &[',']);
        assert_eq!(record.fields(), &["a", "b"]);
    }

    #[test]
    fn test_parse_whitespace_field_survives_removal() {
        // Removal happens before trimming, so a field of spaces is kept and
        // trimmed down to the empty string.
        let record = Record::parse("a, ,b", &[',']);
        assert_eq!(record.fields(), &["a", "", "b"]);
    }

    #[test]
    fn test_parse_only_delimiters() {
        let record = Record::parse(",,,", &[',']);
        assert!(record.is_empty());
    }

    #[test]
    fn test_parse_multiple_delimiters() {
        let record = Record::parse("a,b;c", &[',', ';']);
        assert_eq!(record.fields(), &["a", "b", "c"]);
    }

    #[test]
    fn test_accessors() {
        let record = Record::parse("x,y", &[',']);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get(0), Some("x"));
        assert_eq!(record.get(2), None);
        assert_eq!(record.to_string(), "x,y");
        assert_eq!(record.into_fields(), vec!["x".to_string(), "y".to_string()]);
    }
}

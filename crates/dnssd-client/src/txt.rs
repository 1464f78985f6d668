//! Attribute (TXT) record codec
//!
//! A flat, ordered sequence of `key[=value]` pairs encoded as
//! length-prefixed entries, as attached to a registered service and
//! returned by service resolution. Pair order survives an
//! encode/decode round trip, so entries live in a `Vec` rather than a
//! map.

use crate::error::TxtError;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: Option<Vec<u8>>,
}

/// An ordered key/value attribute record.
///
/// Keys are unique; `set` on an existing key replaces the value in
/// place, keeping the key's original position. A key without `=` in
/// the wire form has an absent value, distinct from `key=` which has
/// an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtRecord {
    entries: Vec<Entry>,
}

impl TxtRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the length-prefixed wire form.
    ///
    /// Fails without a partial result if any length prefix claims more
    /// bytes than remain in the input.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxtError> {
        let mut entries = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let declared = bytes[i] as usize;
            let remaining = bytes.len() - i - 1;
            if declared > remaining {
                return Err(TxtError::Truncated {
                    offset: i,
                    declared,
                    remaining,
                });
            }
            let entry = &bytes[i + 1..i + 1 + declared];
            i += 1 + declared;

            let (key, value) = match entry.iter().position(|&b| b == b'=') {
                Some(eq) => (&entry[..eq], Some(entry[eq + 1..].to_vec())),
                None => (entry, None),
            };
            entries.push(Entry {
                key: String::from_utf8_lossy(key).into_owned(),
                value,
            });
        }
        Ok(Self { entries })
    }

    /// Produces the canonical length-prefixed byte form.
    ///
    /// Entries longer than 255 bytes are not representable on the
    /// wire; the value is truncated to fit.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let mut body = entry.key.as_bytes().to_vec();
            if let Some(value) = &entry.value {
                body.push(b'=');
                body.extend_from_slice(value);
            }
            body.truncate(255);
            out.push(body.len() as u8);
            out.extend_from_slice(&body);
        }
        out
    }

    /// Inserts a pair, or replaces the value of an existing key in
    /// place.
    pub fn set(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        self.set_entry(key, Some(value.into()));
    }

    /// Inserts a presence-only pair with no value.
    pub fn set_valueless(&mut self, key: &str) {
        self.set_entry(key, None);
    }

    fn set_entry(&mut self, key: &str, value: Option<Vec<u8>>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.value = value;
        } else {
            self.entries.push(Entry {
                key: key.to_string(),
                value,
            });
        }
    }

    /// Whether the record holds a pair with this key.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.value.as_deref())
    }

    /// Returns the key at `index`, or `None` once `index` reaches the
    /// entry count. Callers use the `None` as an end-of-sequence
    /// signal, not an error.
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.key.as_str())
    }

    /// Returns the value at `index`; `None` for a valueless entry or
    /// an index past the end.
    pub fn value_at(&self, index: usize) -> Option<&[u8]> {
        self.entries.get(index).and_then(|e| e.value.as_deref())
    }

    /// Returns the value at `index` as text.
    pub fn value_str_at(&self, index: usize) -> Option<Cow<'_, str>> {
        self.value_at(index).map(String::from_utf8_lossy)
    }

    /// Number of pairs in the record.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[u8]>)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_single_entry() {
        let src = [6, b'a', b't', b'=', b'X', b'Y', b'Z'];
        let record = TxtRecord::decode(&src).unwrap();

        assert_eq!(record.len(), 1);
        assert_eq!(record.key_at(0), Some("at"));
        assert_eq!(record.value_at(0), Some(&b"XYZ"[..]));
    }

    #[test]
    fn set_and_contains_scenario() {
        let src = [6, b'a', b't', b'=', b'X', b'Y', b'Z'];
        let mut record = TxtRecord::decode(&src).unwrap();
        record.set("path", "~/names");
        record.set("ttl", "4");

        assert!(record.contains("ttl"));
        assert!(!record.contains("timeout"));

        let keys: Vec<_> = (0..).map_while(|i| record.key_at(i)).collect();
        assert_eq!(keys, vec!["at", "path", "ttl"]);
        assert_eq!(record.value_str_at(2).as_deref(), Some("4"));
    }

    #[test]
    fn key_at_past_end_is_sentinel() {
        let mut record = TxtRecord::new();
        record.set("a", "1");

        assert_eq!(record.key_at(0), Some("a"));
        assert_eq!(record.key_at(1), None);
        assert_eq!(record.key_at(100), None);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut record = TxtRecord::new();
        record.set("a", "1");
        record.set("b", "2");
        record.set("a", "3");

        assert_eq!(record.len(), 2);
        assert_eq!(record.key_at(0), Some("a"));
        assert_eq!(record.get("a"), Some(&b"3"[..]));
    }

    #[test]
    fn round_trip_is_idempotent() {
        let src = [6, b'a', b't', b'=', b'X', b'Y', b'Z', 4, b'f', b'l', b'a', b'g'];
        let decoded = TxtRecord::decode(&src).unwrap();
        let reencoded = decoded.encode();

        assert_eq!(reencoded, src);
        assert_eq!(TxtRecord::decode(&reencoded).unwrap(), decoded);
    }

    #[test]
    fn valueless_and_empty_values_are_distinct() {
        let src = [4, b'f', b'l', b'a', b'g', 4, b'k', b'e', b'y', b'='];
        let record = TxtRecord::decode(&src).unwrap();

        assert_eq!(record.value_at(0), None);
        assert_eq!(record.value_at(1), Some(&[][..]));
        assert_eq!(record.encode(), src);
    }

    #[test]
    fn truncated_length_prefix_is_rejected() {
        let src = [6, b'a', b't'];
        let err = TxtRecord::decode(&src).unwrap_err();

        assert_eq!(
            err,
            TxtError::Truncated {
                offset: 0,
                declared: 6,
                remaining: 2,
            }
        );
    }

    #[test]
    fn empty_input_decodes_to_empty_record() {
        let record = TxtRecord::decode(&[]).unwrap();
        assert!(record.is_empty());
        assert!(record.encode().is_empty());
    }
}

//! HTTP headers handling
//!
//! Headers are kept in wire order. Lookups are case-insensitive and scan from
//! the most recently parsed header backwards, so when a name repeats,
//! [`Headers::get`] returns the *last* occurrence on the wire. Duplicates are
//! never merged.

use super::{BadRequest, Error, Result, MAX_HEADERS};
use std::fmt;

/// Ordered header collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header
    ///
    /// Returns `false`, leaving the collection untouched, once
    /// [`MAX_HEADERS`] entries are held.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        if self.headers.len() >= MAX_HEADERS {
            return false;
        }
        self.headers.push((name.into(), value.into()));
        true
    }

    /// Value of the most recent header named `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name` in wire order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Split a header line into trimmed name and value
    ///
    /// The `:` separator may be neither the first nor the last character,
    /// and neither side may be blank once surrounding spaces are removed.
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        let malformed = || Error::BadRequest(BadRequest::MalformedHeader);

        let colon = line.find(':').ok_or_else(malformed)?;
        if colon == 0 || colon == line.len() - 1 {
            return Err(malformed());
        }

        let is_space = |c: char| c == ' ' || c == '\t';
        let name = line[..colon].trim_matches(is_space);
        let value = line[colon + 1..].trim_matches(is_space);
        if name.is_empty() || value.is_empty() {
            return Err(malformed());
        }

        Ok((name.to_string(), value.to_string()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

//! An AccessPath identifies a value inside a JSON document used in a request
//! or response body. It is an ordered list of segments, where a segment of
//! the form `[n]` descends into the n-th element of an array and every other
//! segment descends into a named property.
//!
//! Access paths appear in two textual forms: the bracket form used in
//! grammar variable names and dependency listings (`a/b/[0]/id`), and the
//! JSON pointer form used in annotation files (`/a/b/0/id`). Both parse back
//! to the same segment sequence; equality is segment-sequence equality.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AccessPath {
    segments: Vec<String>,
}

impl AccessPath {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn from_segments<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses the JSON pointer form: `/a/b/0/id`. Numeric segments become
    /// array hops. Returns None when the input does not start with `/`.
    pub fn from_json_pointer(pointer: &str) -> Option<Self> {
        let rest = pointer.strip_prefix('/')?;
        Some(Self {
            segments: rest
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    if segment.chars().all(|c| c.is_ascii_digit()) {
                        format!("[{segment}]")
                    } else {
                        segment.to_owned()
                    }
                })
                .collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns a copy of this path extended with one more property segment.
    pub fn with_segment(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a copy of this path extended with an array hop.
    pub fn with_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{index}]"));
        Self { segments }
    }

    /// The path without its final segment, or None at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn ends_in_array_index(&self) -> bool {
        self.last().is_some_and(is_array_index)
    }

    /// The name of the innermost enclosing property, skipping array hops.
    /// For `archives/[0]/name` the body container of `name` is `archives`.
    pub fn container(&self) -> Option<&str> {
        self.segments
            .iter()
            .rev()
            .skip(1)
            .map(String::as_str)
            .find(|segment| !is_array_index(segment))
    }

    /// Property names along the path, array hops skipped.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .map(String::as_str)
            .filter(|segment| !is_array_index(segment))
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &AccessPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// JSON pointer rendering: `/` + segments joined by `/`, array hops
    /// printed as their bare index.
    pub fn to_json_pointer(&self) -> String {
        let mut pointer = String::new();
        for segment in &self.segments {
            pointer.push('/');
            match array_index(segment) {
                Some(index) => pointer.push_str(index),
                None => pointer.push_str(segment),
            }
        }
        pointer
    }
}

/// Whether the segment is an `[n]` array hop.
pub fn is_array_index(segment: &str) -> bool {
    array_index(segment).is_some()
}

fn array_index(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
}

impl Display for AccessPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<Vec<String>> for AccessPath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

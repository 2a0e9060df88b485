/*!
 * Session Identifier
 * Hierarchical SID value type and its environment encoding
 */

use crate::core::limits::{MAX_SEGMENT_LEN, MAX_SID_DEPTH, SID_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hierarchical session identifier
///
/// One segment per process in the spawn tree, root first. A child's SID is
/// always its parent's SID with exactly one segment appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId {
    segments: Vec<String>,
}

/// Reasons an encoded SID is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SidParseError {
    #[error("empty session id")]
    Empty,

    #[error("empty segment at position {0}")]
    EmptySegment(usize),

    #[error("segment {0} contains invalid characters")]
    InvalidSegment(usize),

    #[error("segment {0} exceeds {MAX_SEGMENT_LEN} bytes")]
    SegmentTooLong(usize),

    #[error("session id deeper than {MAX_SID_DEPTH} segments")]
    TooDeep,
}

impl SessionId {
    pub(crate) fn from_segment(segment: String) -> Self {
        Self {
            segments: vec![segment],
        }
    }

    /// Extend this SID by one segment
    pub(crate) fn child(&self, segment: String) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self { segments }
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of processes between the root and this one, inclusive
    #[inline]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// The segment minted for this process
    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<SessionId> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True when `other` is this SID plus exactly one segment
    pub fn is_parent_of(&self, other: &SessionId) -> bool {
        other.segments.len() == self.segments.len() + 1
            && other.segments.starts_with(&self.segments)
    }
}

fn valid_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

impl FromStr for SessionId {
    type Err = SidParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SidParseError::Empty);
        }

        let mut segments = Vec::new();
        for (idx, segment) in raw.split(SID_SEPARATOR).enumerate() {
            if idx >= MAX_SID_DEPTH {
                return Err(SidParseError::TooDeep);
            }
            if segment.is_empty() {
                return Err(SidParseError::EmptySegment(idx));
            }
            if segment.len() > MAX_SEGMENT_LEN {
                return Err(SidParseError::SegmentTooLong(idx));
            }
            if !segment.chars().all(valid_segment_char) {
                return Err(SidParseError::InvalidSegment(idx));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }
}

impl TryFrom<String> for SessionId {
    type Error = SidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(sid: SessionId) -> Self {
        sid.to_string()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", SID_SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Encode a SID for the child's environment
pub fn encode_for_environment(sid: &SessionId) -> String {
    sid.to_string()
}

/// Recover a SID from the environment
///
/// Returns `None` when the variable is absent or unusable; the caller is
/// expected to mint a fresh root instead of failing.
pub fn decode_from_environment(raw: Option<&str>) -> Option<SessionId> {
    let raw = raw?;
    match raw.parse::<SessionId>() {
        Ok(sid) => Some(sid),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring inherited session id");
            None
        }
    }
}

//! Hierarchical sibling position keys.
//!
//! Grammar: `key := segment ("." segment)*`, `segment := [1-9][0-9]*`.
//! Keys compare segment by segment as integers, so `"1.10"` sorts after `"1.2"`,
//! and a key sorts before every key it is a strict prefix of.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderKey {
    segments: Vec<u32>,
}

impl OrderKey {
    /// Parses and validates a key.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(TaskError::validation("order key is empty"));
        }
        let segments = s
            .split('.')
            .map(|seg| parse_segment(seg).ok_or_else(|| malformed(s)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Top-level key with the given position.
    pub fn root(position: u32) -> Result<Self> {
        if position == 0 {
            return Err(TaskError::validation("order key segments start at 1"));
        }
        Ok(Self {
            segments: vec![position],
        })
    }

    /// Key of this key's `position`-th child.
    pub fn child(&self, position: u32) -> Result<Self> {
        if position == 0 {
            return Err(TaskError::validation("order key segments start at 1"));
        }
        let mut segments = self.segments.clone();
        segments.push(position);
        Ok(Self { segments })
    }

    /// Strips the last segment. `None` for top-level keys.
    pub fn parent_of(&self) -> Option<OrderKey> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Position among siblings.
    pub fn last_segment(&self) -> u32 {
        self.segments.last().copied().unwrap_or(0)
    }

    /// Number of segments minus one; equals the level of a well-formed task.
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    pub fn is_prefix_of(&self, other: &OrderKey) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// Whether this key sits directly under `parent` (`None` = top level).
    pub fn is_child_of(&self, parent: Option<&OrderKey>) -> bool {
        match parent {
            Some(p) => {
                self.segments.len() == p.segments.len() + 1 && self.segments.starts_with(&p.segments)
            }
            None => self.segments.len() == 1,
        }
    }
}

fn parse_segment(seg: &str) -> Option<u32> {
    let mut chars = seg.chars();
    match chars.next() {
        Some('1'..='9') => {}
        _ => return None,
    }
    if !chars.all(|c| c.is_ascii_digit()) {
        return None;
    }
    seg.parse().ok()
}

fn malformed(s: &str) -> TaskError {
    TaskError::validation(format!("malformed order key '{s}'"))
}

/// Mints the key one past the largest sibling directly under `parent`.
///
/// Keys in `existing_siblings` that are not direct children of `parent` are ignored.
/// Callers must serialize minting per parent.
pub fn next_key<'a>(
    parent: Option<&OrderKey>,
    existing_siblings: impl IntoIterator<Item = &'a OrderKey>,
) -> Result<OrderKey> {
    let max = existing_siblings
        .into_iter()
        .filter(|k| k.is_child_of(parent))
        .map(OrderKey::last_segment)
        .max()
        .unwrap_or(0);
    let next = max
        .checked_add(1)
        .ok_or_else(|| TaskError::validation("order key segment overflow"))?;
    match parent {
        Some(p) => p.child(next),
        None => OrderKey::root(next),
    }
}

/// Compares two textual keys numerically. Malformed keys are rejected.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(OrderKey::parse(a)?.cmp(&OrderKey::parse(b)?))
}

/// Textual form of [`OrderKey::parent_of`].
pub fn parent_of(key: &str) -> Result<Option<String>> {
    Ok(OrderKey::parse(key)?.parent_of().map(String::from))
}

impl FromStr for OrderKey {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        OrderKey::parse(s)
    }
}

impl TryFrom<String> for OrderKey {
    type Error = TaskError;

    fn try_from(s: String) -> Result<Self> {
        OrderKey::parse(&s)
    }
}

impl From<OrderKey> for String {
    fn from(key: OrderKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
            first = false;
        }
        Ok(())
    }
}

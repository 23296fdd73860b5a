//! Measurement and tag parsing
//!
//! Decomposes one line of line protocol into its measurement name, the tags
//! that follow it and the unparsed remainder (fields + timestamp).
//!
//! # Lifetimes
//!
//! `Tag`, `TagSet` and `ParsedLine` borrow from the line passed to
//! [`parse_tags`]. They are valid only as long as that line is. Callers that
//! need to retain tags (e.g. as a series key) must copy them with
//! [`Tag::to_owned_tag`] or [`TagSet::to_owned_tags`].
//!
//! # Escaping
//!
//! Escape sequences (`\,`, `\ `, `\=`) are not interpreted. A delimiter
//! preceded by a backslash still ends the current token.

use std::cmp::Ordering;
use std::ops::Deref;

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::token::split_token;

/// Delimiters ending the measurement and tag values
const NAME_DELIMITERS: &[u8] = b", ";

/// Delimiters ending a tag key
const KEY_DELIMITERS: &[u8] = b"= ,";

/// A key/value pair borrowed from a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

impl<'a> Tag<'a> {
    /// Create a tag from string slices
    #[inline]
    pub fn new(key: &'a str, value: &'a str) -> Self {
        Self {
            key: key.as_bytes(),
            value: value.as_bytes(),
        }
    }

    /// Compare two tags by key only, as raw bytes
    #[inline]
    pub fn key_cmp(&self, other: &Tag<'_>) -> Ordering {
        self.key.cmp(other.key)
    }

    /// Copy the tag out of the borrowed line
    pub fn to_owned_tag(&self) -> OwnedTag {
        OwnedTag {
            key: Bytes::copy_from_slice(self.key),
            value: Bytes::copy_from_slice(self.value),
        }
    }
}

/// A tag that owns its key and value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnedTag {
    pub key: Bytes,
    pub value: Bytes,
}

impl OwnedTag {
    /// Borrow as a `Tag`
    #[inline]
    pub fn as_tag(&self) -> Tag<'_> {
        Tag {
            key: &self.key[..],
            value: &self.value[..],
        }
    }
}

/// Tags in the order they appeared on the line
///
/// Duplicate keys are kept. Call [`TagSet::sort`] for the canonical
/// key-ordered form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet<'a> {
    tags: Vec<Tag<'a>>,
}

impl<'a> TagSet<'a> {
    /// Create an empty tag set
    #[inline]
    pub const fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Append a tag
    #[inline]
    pub fn push(&mut self, tag: Tag<'a>) {
        self.tags.push(tag);
    }

    /// Whether the tag at `i` sorts strictly before the tag at `j`
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[inline]
    pub fn less(&self, i: usize, j: usize) -> bool {
        self.tags[i].key_cmp(&self.tags[j]) == Ordering::Less
    }

    /// Swap the tags at `i` and `j`
    #[inline]
    pub fn swap(&mut self, i: usize, j: usize) {
        self.tags.swap(i, j);
    }

    /// Sort by key (stable, so duplicate keys keep their parse order)
    pub fn sort(&mut self) {
        self.tags.sort_by(|a, b| a.key_cmp(b));
    }

    /// Check whether the tags are in key order
    pub fn is_sorted(&self) -> bool {
        self.tags
            .windows(2)
            .all(|w| w[0].key_cmp(&w[1]) != Ordering::Greater)
    }

    /// Copy every tag out of the borrowed line
    pub fn to_owned_tags(&self) -> Vec<OwnedTag> {
        self.tags.iter().map(Tag::to_owned_tag).collect()
    }
}

impl<'a> Deref for TagSet<'a> {
    type Target = [Tag<'a>];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.tags
    }
}

impl<'a> From<Vec<Tag<'a>>> for TagSet<'a> {
    fn from(tags: Vec<Tag<'a>>) -> Self {
        Self { tags }
    }
}

impl<'a> FromIterator<Tag<'a>> for TagSet<'a> {
    fn from_iter<I: IntoIterator<Item = Tag<'a>>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for TagSet<'a> {
    type Item = Tag<'a>;
    type IntoIter = std::vec::IntoIter<Tag<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'s, 'a> IntoIterator for &'s TagSet<'a> {
    type Item = &'s Tag<'a>;
    type IntoIter = std::slice::Iter<'s, Tag<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Output of [`parse_tags`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    /// Measurement name
    pub measurement: &'a [u8],

    /// Tags in parse order
    pub tags: TagSet<'a>,

    /// Everything after the space that ends the tag section, `None` if the
    /// line stopped before one
    pub remainder: Option<&'a [u8]>,
}

impl<'a> ParsedLine<'a> {
    /// Take the tags sorted by key
    pub fn sorted_tags(mut self) -> TagSet<'a> {
        self.tags.sort();
        self.tags
    }
}

/// Extract the measurement, tags and remainder from a line
///
/// Returns [`ProtocolError::InvalidTag`] if a tag has no `=` or an empty
/// value. No partial result is returned in that case.
pub fn parse_tags(line: &[u8]) -> Result<ParsedLine<'_>, ProtocolError> {
    let head = split_token(line, NAME_DELIMITERS);
    let measurement = head.token;

    let mut tags = TagSet::new();
    let mut delimiter = head.delimiter;
    let mut rest = head.rest;

    loop {
        match delimiter {
            None => {
                return Ok(ParsedLine {
                    measurement,
                    tags,
                    remainder: None,
                });
            }
            Some(b' ') => {
                return Ok(ParsedLine {
                    measurement,
                    tags,
                    remainder: Some(rest),
                });
            }
            // Comma: another tag follows
            Some(_) => {}
        }

        let key = split_token(rest, KEY_DELIMITERS);
        if key.delimiter != Some(b'=') {
            return Err(ProtocolError::InvalidTag);
        }

        let value = split_token(key.rest, NAME_DELIMITERS);
        if value.token.is_empty() {
            return Err(ProtocolError::InvalidTag);
        }

        tags.push(Tag {
            key: key.token,
            value: value.token,
        });

        delimiter = value.delimiter;
        rest = value.rest;
    }
}

//! Spout Protocol - Zero-copy line protocol primitives
//!
//! This crate provides the building blocks for decomposing InfluxDB line
//! protocol without copying:
//! - `token` / `split_token` - Split a byte slice at the first delimiter
//! - `parse_tags` - Extract measurement, tag set and unparsed remainder
//! - `Tag` / `TagSet` - Borrowed views into the parsed line
//!
//! # Line Format
//!
//! ```text
//! measurement[,tag_key=tag_value]* field_set [timestamp]
//! ```
//!
//! Only the measurement and tags are decomposed. Fields and timestamp are
//! returned untouched as the remainder.
//!
//! # Design Principles
//!
//! - **Zero-copy**: All returned slices borrow from the input line
//! - **All-or-nothing**: A malformed tag yields an error and no partial tags
//! - **Byte-oriented**: Keys compare as raw bytes, no UTF-8 assumptions
//!
//! # Example
//!
//! ```
//! use spout_protocol::parse_tags;
//!
//! let line = b"cpu,host=a,region=us usage=0.5 1465839830100400200";
//! let parsed = parse_tags(line).unwrap();
//!
//! assert_eq!(parsed.measurement, b"cpu");
//! assert_eq!(parsed.tags.len(), 2);
//! assert_eq!(parsed.remainder, Some(&b"usage=0.5 1465839830100400200"[..]));
//! ```

mod error;
mod tags;
mod token;

pub use error::ProtocolError;
pub use tags::{OwnedTag, ParsedLine, Tag, TagSet, parse_tags};
pub use token::{Token, split_token, token};

// Re-export bytes for convenience
pub use bytes::Bytes;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

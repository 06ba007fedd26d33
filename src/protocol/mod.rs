//! Typed, length-prefixed message framing for the lottery wire protocol.
//!
//! Every packet exchanged with the server is a fixed 5-byte header followed
//! by a variable-length body:
//!
//! ```text
//!  0               1               2               3               4
//! +---------------+---------------+---------------+---------------+---------------+
//! |   type tag    |                    body length (u32)                          |
//! +---------------+---------------+---------------+---------------+---------------+
//! |   body ...                                                                    |
//! +-------------------------------------------------------------------------------+
//! ```
//!
//! All multi-byte integers are big-endian. The body layout depends on the
//! type tag:
//!
//! - [`TAG_PLAIN`]: the body is the raw UTF-8 bytes of a single string.
//! - [`TAG_LIST`]: the body is, for each element in order, a u32 length
//!   followed by that element's raw UTF-8 bytes. There is no separator and
//!   no element count; the list ends when the body does.
//!
//! [`codec`] performs the byte-level work; no I/O happens in this file.

use std::fmt;

pub mod codec;

pub use codec::{decode, encode, receive, send};

/// Type tag for a plain string message.
pub const TAG_PLAIN: u8 = 0x01;

/// Type tag for a string-list message.
pub const TAG_LIST: u8 = 0x02;

/// Byte length of the fixed header: tag (1) + body length (4).
pub const HEADER_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message on the wire, one variant per type tag.
///
/// Instances live for a single send or receive call; the session never
/// stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// One UTF-8 string (commands, acknowledgements, status replies).
    Plain(String),
    /// An ordered list of UTF-8 strings (bet batches, winner lists).
    /// Order is significant, duplicates are allowed, empty is valid.
    List(Vec<String>),
}

impl Message {
    /// The wire tag this variant encodes to.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Plain(_) => TAG_PLAIN,
            Message::List(_) => TAG_LIST,
        }
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Plain(_) => "plain",
            Message::List(_) => "list",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Plain(value) => write!(f, "plain({value})"),
            Message::List(items) => write!(f, "list({} items)", items.len()),
        }
    }
}

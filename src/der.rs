//! Minimal DER cursor.
//!
//! Only the handful of universal tags that appear in PKCS#1 `RSAPrivateKey`
//! and PKCS#8 `PrivateKeyInfo` are classified; anything else is reported as
//! [`Tag::Other`] so the caller can skip it.
//!
//! ```text
//! identifier | length (short or long form) | contents
//! ```

use std::fmt;

use thiserror::Error;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x30;

/// The identifier octets the key walk cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Universal, constructed, number 16.
    Sequence,
    /// Universal, primitive, number 2.
    Integer,
    /// Universal, primitive, number 4.
    OctetString,
    /// Any other identifier byte, kept verbatim.
    Other(u8),
}

impl Tag {
    fn from_byte(byte: u8) -> Self {
        match byte {
            TAG_SEQUENCE => Tag::Sequence,
            TAG_INTEGER => Tag::Integer,
            TAG_OCTET_STRING => Tag::OctetString,
            other => Tag::Other(other),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Sequence => f.write_str("SEQUENCE"),
            Tag::Integer => f.write_str("INTEGER"),
            Tag::OctetString => f.write_str("OCTET STRING"),
            Tag::Other(byte) => write!(f, "tag 0x{byte:02x}"),
        }
    }
}

/// Failures detected while walking DER. Offsets are absolute positions in
/// the buffer the outermost reader was created over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DerError {
    /// Ran off the end of the buffer, or a declared length overruns it.
    #[error("truncated input at byte {offset}")]
    TruncatedInput {
        /// Where the missing data should have started.
        offset: usize,
    },

    /// Found a different tag from the one required at this position.
    #[error("expected {expected} at byte {offset}, found {found}")]
    UnexpectedTag {
        /// Position of the identifier byte.
        offset: usize,
        /// What the grammar required.
        expected: Tag,
        /// What was actually there.
        found: Tag,
    },

    /// Indefinite or oversized long-form length.
    #[error("unsupported length encoding at byte {offset}")]
    InvalidLength {
        /// Position of the first length byte.
        offset: usize,
    },

    /// An INTEGER with no content octets.
    #[error("empty INTEGER at byte {offset}")]
    EmptyInteger {
        /// Position of the INTEGER's identifier byte.
        offset: usize,
    },
}

/// One tag-length-value element. Only lives for the duration of a walk.
#[derive(Debug, Clone, Copy)]
pub struct DerNode<'a> {
    /// Classified identifier.
    pub tag: Tag,
    /// Absolute offset of the identifier byte.
    pub offset: usize,
    /// Absolute offset of the first content byte.
    pub content_offset: usize,
    /// Content octets.
    pub value: &'a [u8],
}

impl<'a> DerNode<'a> {
    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Whether the element has no content octets.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// A reader over the nested elements of a constructed node.
    pub fn children(&self) -> DerReader<'a> {
        DerReader::with_base(self.value, self.content_offset)
    }
}

/// Forward-only cursor over a DER buffer.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> DerReader<'a> {
    /// Starts a cursor at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Starts a cursor over a slice that begins `base` bytes into some outer
    /// buffer, so reported offsets stay absolute.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether the cursor has consumed everything.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read_byte(&mut self) -> Result<u8, DerError> {
        let byte = *self.data.get(self.pos).ok_or(DerError::TruncatedInput {
            offset: self.offset(),
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DerError> {
        if len > self.remaining() {
            return Err(DerError::TruncatedInput {
                offset: self.offset(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Classifies the next identifier byte without consuming it.
    pub fn peek_tag(&self) -> Result<Tag, DerError> {
        self.data
            .get(self.pos)
            .map(|byte| Tag::from_byte(*byte))
            .ok_or(DerError::TruncatedInput {
                offset: self.offset(),
            })
    }

    /// Reads one identifier byte.
    pub fn read_tag(&mut self) -> Result<Tag, DerError> {
        self.read_byte().map(Tag::from_byte)
    }

    /// Reads a short- or long-form length and checks that many content bytes
    /// remain.
    pub fn read_length(&mut self) -> Result<usize, DerError> {
        let start = self.offset();
        let first = self.read_byte()?;

        let length = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7f);
            // 0x80 is the BER indefinite form, never valid in DER.
            if count == 0 || count > std::mem::size_of::<usize>() {
                return Err(DerError::InvalidLength { offset: start });
            }
            self.take(count)?
                .iter()
                .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte))
        };

        if length > self.remaining() {
            return Err(DerError::TruncatedInput {
                offset: self.offset(),
            });
        }
        Ok(length)
    }

    /// Reads a whole element.
    pub fn read_node(&mut self) -> Result<DerNode<'a>, DerError> {
        let offset = self.offset();
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        let content_offset = self.offset();
        let value = self.take(len)?;
        Ok(DerNode {
            tag,
            offset,
            content_offset,
            value,
        })
    }

    /// Reads an element and requires it to carry `expected`.
    pub fn read_expected(&mut self, expected: Tag) -> Result<DerNode<'a>, DerError> {
        let offset = self.offset();
        let found = self.peek_tag()?;
        if found != expected {
            return Err(DerError::UnexpectedTag {
                offset,
                expected,
                found,
            });
        }
        self.read_node()
    }

    /// Reads a SEQUENCE and returns a cursor over its elements.
    pub fn read_sequence(&mut self) -> Result<DerReader<'a>, DerError> {
        self.read_expected(Tag::Sequence).map(|node| node.children())
    }

    /// Reads an INTEGER as unsigned big-endian bytes, dropping the single
    /// `0x00` sign pad DER adds when the top bit of the value is set.
    pub fn read_integer(&mut self) -> Result<&'a [u8], DerError> {
        let node = self.read_expected(Tag::Integer)?;
        match node.value {
            [] => Err(DerError::EmptyInteger {
                offset: node.offset,
            }),
            [0x00, rest @ ..] if !rest.is_empty() => Ok(rest),
            value => Ok(value),
        }
    }

    /// Reads an OCTET STRING's content.
    pub fn read_octet_string(&mut self) -> Result<DerNode<'a>, DerError> {
        self.read_expected(Tag::OctetString)
    }

    /// Advances `len` bytes without interpreting them.
    pub fn skip(&mut self, len: usize) -> Result<(), DerError> {
        self.take(len).map(|_| ())
    }

    /// Skips one whole element of any tag and reports what it was.
    pub fn skip_node(&mut self) -> Result<Tag, DerError> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        self.skip(len)?;
        Ok(tag)
    }
}

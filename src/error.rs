//! Adlens errors

use crate::AdvertisementRecord;

/// The error returned when an advertising payload cannot be decoded to the end.
///
/// Decoding stops at the offending structure, but everything decoded before it is kept and can be recovered with
/// [`ParseError::partial`] or [`ParseError::into_partial`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    offset: usize,
    partial: Box<AdvertisementRecord>,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, offset: usize, partial: AdvertisementRecord) -> Self {
        ParseError {
            kind,
            offset,
            partial: Box::new(partial),
        }
    }

    /// Returns the corresponding [ParseErrorKind] for this error.
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Byte offset of the length octet of the structure that could not be decoded.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The record built from every structure decoded before the error.
    pub fn partial(&self) -> &AdvertisementRecord {
        &self.partial
    }

    /// Consumes the error, returning the partially decoded record.
    pub fn into_partial(self) -> AdvertisementRecord {
        *self.partial
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", &self.kind, self.offset)
    }
}

impl std::error::Error for ParseError {}

/// A list of reasons an advertising payload could not be decoded.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParseErrorKind {
    /// truncated AD structure: declared {declared} bytes, {available} available
    TruncatedStructure {
        /// Length declared by the structure's length octet
        declared: usize,
        /// Bytes remaining in the payload after the length octet
        available: usize,
    },
}

/// A problem found while decoding that did not stop the decoder.
#[derive(Debug, displaydoc::Display, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParseWarning {
    /// local name in AD type {ad_type:#04x} is not valid UTF-8
    TextDecode {
        /// Tag of the local name structure
        ad_type: u8,
    },
    /// AD type {ad_type:#04x} has an invalid length of {len}; kept as a raw data section
    MalformedStructure {
        /// Tag of the malformed structure
        ad_type: u8,
        /// Length of the structure's data field
        len: usize,
    },
}

/// The error returned when a record cannot be encoded as AD structures.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeError {
    /// AD type {ad_type:#04x} needs {len} data bytes but a structure holds at most 254
    FieldTooLong {
        /// Tag of the field that does not fit
        ad_type: u8,
        /// Length of the field's data
        len: usize,
    },
}

impl std::error::Error for EncodeError {}

/// Reasons a GATT lookup can fail.
///
/// Failures are always attributed to the single identifier that was being looked up.
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LookupError {
    /// NotFound
    NotFound,
    /// AccessDenied
    AccessDenied,
    /// Timeout
    Timeout,
}

impl std::error::Error for LookupError {}

impl LookupError {
    /// Ordering used when two failed attempts are merged: the more informative failure wins.
    ///
    /// Policy failures outrank transient ones, which outrank absence.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            LookupError::AccessDenied => 2,
            LookupError::Timeout => 1,
            LookupError::NotFound => 0,
        }
    }
}

use core::{fmt, ops};
use std::{error, io, path::PathBuf};

use crate::TableTag;

/// Kind of a font [`ParseError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Unexpected end of the font data.
    UnexpectedEof,
    /// Unexpected sfnt version of the font.
    UnexpectedFontVersion(u32),
    /// Font collection contains no fonts.
    EmptyCollection,
    /// Missing required font table (e.g., `head`).
    MissingTable,
    /// No supported subtable in the `cmap` table.
    NoSupportedCmap,
    /// Offset inferred from the table data is out of bounds.
    OffsetOutOfBounds(usize),
    /// Range inferred from the table data is out of bounds.
    RangeOutOfBounds {
        /// Inferred range.
        range: ops::Range<usize>,
        /// Length of the indexed data.
        len: usize,
    },
    /// Unexpected table version.
    UnexpectedTableVersion(u32),
    /// Unexpected table length.
    UnexpectedTableLen {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// Unexpected table format (e.g., for a `cmap` subtable).
    UnexpectedTableFormat(u16),
    /// Unexpected value of `indexToLocFormat` in the `head` table.
    UnexpectedLocaFormat(u16),
    /// Glyph index is not present in the font (or in the processed glyph set).
    UnknownGlyph(u16),
    /// Data is too large to be encoded in the requested format.
    DataTooLarge {
        /// Actual data length.
        len: usize,
        /// Maximum supported length.
        max: usize,
    },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => formatter.write_str("unexpected end of the font data"),
            Self::UnexpectedFontVersion(version) => {
                write!(formatter, "unexpected font version ({version:#010x})")
            }
            Self::EmptyCollection => formatter.write_str("font collection contains no fonts"),
            Self::MissingTable => formatter.write_str("missing required font table"),
            Self::NoSupportedCmap => {
                formatter.write_str("no supported subtable in the `cmap` table")
            }
            Self::OffsetOutOfBounds(val) => {
                write!(
                    formatter,
                    "offset ({val}) inferred from the table data is out of bounds"
                )
            }
            Self::RangeOutOfBounds { range, len } => {
                write!(
                    formatter,
                    "range ({range:?}) inferred from the table data is out of bounds (..{len})"
                )
            }
            Self::UnexpectedTableVersion(val) => {
                write!(formatter, "unexpected table version ({val:#x})")
            }
            Self::UnexpectedTableLen { expected, actual } => {
                write!(
                    formatter,
                    "unexpected table length: expected {expected}, got {actual}"
                )
            }
            Self::UnexpectedTableFormat(val) => {
                write!(formatter, "unexpected table format ({val})")
            }
            Self::UnexpectedLocaFormat(val) => {
                write!(formatter, "unexpected `loca` table format ({val})")
            }
            Self::UnknownGlyph(idx) => write!(formatter, "unknown glyph #{idx}"),
            Self::DataTooLarge { len, max } => {
                write!(formatter, "data is too large ({len} bytes, max {max})")
            }
        }
    }
}

impl error::Error for ParseErrorKind {}

/// Errors that can occur when parsing or re-encoding a [`Font`](crate::Font).
#[derive(Debug)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: usize,
    pub(crate) table: Option<TableTag>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = self.table {
            write!(formatter, "[{table}] ")?;
        }
        if self.offset > 0 {
            write!(formatter, "{}: ", self.offset)?;
        }
        fmt::Display::fmt(&self.kind, formatter)
    }
}

impl error::Error for ParseError {}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn missing_table(tag: TableTag) -> Self {
        Self {
            kind: ParseErrorKind::MissingTable,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn in_table(mut self, tag: TableTag) -> Self {
        self.table = Some(tag);
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the table this error relates to.
    pub fn table(&self) -> Option<TableTag> {
        self.table
    }

    /// Gets the offset in the font data.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Invalid pipeline configuration. Always detected before any file I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Several mutually exclusive output formats are requested.
    ConflictingFormats {
        /// First requested format.
        first: &'static str,
        /// Second requested format.
        second: &'static str,
    },
    /// Malformed `\uXXXX` escape sequence in the subset string.
    MalformedEscape {
        /// Byte position of the offending part of the string.
        position: usize,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// Zero iterations were requested.
    ZeroIterations,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingFormats { first, second } => {
                write!(
                    formatter,
                    "{first} and {second} output formats are mutually exclusive"
                )
            }
            Self::MalformedEscape { position, reason } => {
                write!(
                    formatter,
                    "malformed escape in subset string at position {position}: {reason}"
                )
            }
            Self::ZeroIterations => formatter.write_str("number of iterations must be positive"),
        }
    }
}

impl error::Error for ConfigError {}

/// Errors produced by the subsetting pipeline. All of them are fatal for a run.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Mutually exclusive or malformed options.
    Configuration(ConfigError),
    /// Input font lacks data needed for the requested operation, or is malformed.
    UnsupportedFont(ParseError),
    /// Requested repertoire yields no coverable glyphs.
    InvalidRepertoire {
        /// Number of distinct characters in the repertoire.
        char_count: usize,
    },
    /// Unreadable input or unwritable output.
    Io {
        /// Path to the file the operation failed on.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(formatter, "invalid configuration: {err}"),
            Self::UnsupportedFont(err) => write!(formatter, "unsupported font: {err}"),
            Self::InvalidRepertoire { char_count: 0 } => {
                formatter.write_str("invalid repertoire: no characters requested")
            }
            Self::InvalidRepertoire { char_count } => {
                write!(
                    formatter,
                    "invalid repertoire: none of {char_count} requested characters is covered by the font"
                )
            }
            Self::Io { path, source } => {
                write!(formatter, "I/O error on `{}`: {source}", path.display())
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::UnsupportedFont(err) => Some(err),
            Self::InvalidRepertoire { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::UnsupportedFont(err)
    }
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

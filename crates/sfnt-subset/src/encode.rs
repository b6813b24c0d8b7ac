//! Output font formats.

use core::fmt;

use crate::{Font, ParseError};

/// Container format of the output font.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain OpenType (sfnt) serialization.
    #[default]
    Sfnt,
    /// WOFF 1.0 with zlib-compressed tables.
    Woff,
    /// WOFF2 with a single Brotli stream.
    Woff2,
    /// Embedded OpenType.
    Eot {
        /// Whether to wrap font data in a MicroType Express container. Container blocks
        /// are zlib-compressed rather than LZCOMP-compressed, so MTX-aware EOT consumers
        /// cannot decode the output even though it is flagged as compressed.
        mtx: bool,
    },
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

impl OutputFormat {
    /// Returns a short human-readable name of this format.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sfnt => "sfnt",
            Self::Woff => "WOFF",
            Self::Woff2 => "WOFF2",
            Self::Eot { mtx: false } => "EOT",
            Self::Eot { mtx: true } => "EOT (MTX)",
        }
    }

    /// Encodes the font in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if the font lacks data required by the format (e.g., `OS/2` and `name` tables
    /// for EOT), or if this data is malformed.
    pub fn encode(self, font: &Font) -> Result<Vec<u8>, ParseError> {
        let encoded = match self {
            Self::Sfnt => font.to_sfnt(),
            Self::Woff => font.to_woff(),
            Self::Woff2 => font.to_woff2(),
            Self::Eot { mtx } => font.to_eot(mtx)?,
        };
        tracing::debug!(format = self.name(), len = encoded.len(), "encoded font");
        Ok(encoded)
    }
}

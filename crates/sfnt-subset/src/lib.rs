//! TrueType font subsetting, hint stripping and web font encoding.
//!
//! The crate provides a [`Pipeline`] transforming a single font in up to 3 stages:
//!
//! 1. Subsetting the font to a [`Repertoire`] of chars (see [`GlyphSet`] and [`FontSubset`]).
//!    Glyphs are renumbered, and tables referencing glyph IDs that are not rebuilt
//!    ([`RemovalSet::SUBSETTING`]) are dropped.
//! 2. Stripping hinting instructions ([`strip_hints()`]), which drops tables
//!    from [`RemovalSet::HINT_STRIPPING`].
//! 3. Encoding the font in one of the [`OutputFormat`]s: plain OpenType, WOFF, WOFF2 or EOT.
//!
//! Fonts are immutable; each stage produces a new [`Font`] sharing unchanged table data
//! with the input.
//!
//! # Examples
//!
//! ```
//! # use sfnt_subset::{Font, OutputFormat, PipelineConfig, Pipeline, Repertoire};
//! # fn test_wrapper(font_bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let font = Font::new(font_bytes)?;
//! let config = PipelineConfig::default()
//!     .with_repertoire(Repertoire::from("Hello, world!"))
//!     .with_hint_stripping()
//!     .with_format(OutputFormat::Woff2);
//! let woff2 = Pipeline::new(config).transform(&font)?;
//! assert!(woff2.starts_with(b"wOF2"));
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/sfnt-subset/0.1.0")]

mod coverage;
mod encode;
mod errors;
mod font;
mod hints;
mod pipeline;
mod policy;
mod repertoire;
mod subset;
#[cfg(test)]
pub(crate) mod tests;
mod write;

pub use crate::{
    coverage::GlyphSet,
    encode::OutputFormat,
    errors::{ConfigError, Error, ParseError, ParseErrorKind},
    font::{CmapId, Font, TableTag},
    hints::strip_hints,
    pipeline::{Pipeline, PipelineConfig, PipelineOptions, RunReport, BENCHMARK_ITERATIONS},
    policy::RemovalSet,
    repertoire::Repertoire,
    subset::FontSubset,
};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

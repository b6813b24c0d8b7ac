//! Resolving a character repertoire to the set of glyphs needed to render it.

use std::collections::BTreeSet;

use crate::{Error, Font, ParseError, Repertoire, TableTag};

/// Ordered set of glyphs retained by subsetting.
///
/// The set always starts with glyph 0 (`.notdef`), followed by other glyphs in the ascending order
/// of their IDs in the original font. Components of composite glyphs are included transitively.
/// The position of a glyph in the set is its ID in the subsetted font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphSet {
    glyphs: Vec<u16>,
    /// Covered chars and their glyph IDs in the original font, sorted by char.
    char_map: Vec<(char, u16)>,
}

impl GlyphSet {
    /// Resolves glyphs covering the repertoire in the specified font.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::InvalidRepertoire`] if the repertoire is empty, or none of its chars
    ///   is mapped to a glyph.
    /// - Returns [`Error::UnsupportedFont`] if the font doesn't have a supported `cmap` subtable
    ///   or TrueType outlines, or if these tables are malformed.
    pub fn new(font: &Font, repertoire: &Repertoire) -> Result<Self, Error> {
        let chars = repertoire.distinct_chars();
        if chars.is_empty() {
            return Err(Error::InvalidRepertoire { char_count: 0 });
        }

        let cmap = font.char_map()?;
        let outlines = font.outlines()?;
        let mut char_map = Vec::with_capacity(chars.len());
        for &ch in &chars {
            let glyph_idx = cmap
                .map_char(ch)
                .map_err(|kind| ParseError::new(kind).in_table(TableTag::CMAP))?;
            if glyph_idx != 0 {
                char_map.push((ch, glyph_idx));
            }
        }
        if char_map.is_empty() {
            return Err(Error::InvalidRepertoire {
                char_count: chars.len(),
            });
        }

        let mut glyphs = BTreeSet::new();
        let mut pending: Vec<_> = char_map.iter().map(|&(_, idx)| idx).collect();
        pending.push(0);
        while let Some(glyph_idx) = pending.pop() {
            if glyphs.insert(glyph_idx) {
                let glyph = outlines.glyph(glyph_idx)?;
                pending.extend(glyph.component_indices());
            }
        }

        tracing::debug!(
            chars = chars.len(),
            covered_chars = char_map.len(),
            glyphs = glyphs.len(),
            "resolved glyph coverage"
        );
        Ok(Self {
            glyphs: glyphs.into_iter().collect(),
            char_map,
        })
    }

    /// Returns the number of glyphs in this set.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Always returns `false`: a set contains at least the `.notdef` glyph.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Checks whether the set contains a glyph with the specified ID in the original font.
    pub fn contains(&self, old_idx: u16) -> bool {
        self.glyphs.binary_search(&old_idx).is_ok()
    }

    /// Iterates over original glyph IDs in the set; the iteration order is the order of glyphs
    /// in the subsetted font.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = u16> + '_ {
        self.glyphs.iter().copied()
    }

    /// Maps an original glyph ID to the ID in the subsetted font.
    pub fn new_idx(&self, old_idx: u16) -> Option<u16> {
        let pos = self.glyphs.binary_search(&old_idx).ok()?;
        // `unwrap()` is safe: the set cannot contain more than u16::MAX + 1 distinct `u16` values,
        // and index 0 is always occupied by `.notdef`.
        Some(u16::try_from(pos).unwrap())
    }

    /// Returns covered chars with their glyph IDs in the original font, sorted by char.
    pub(crate) fn char_map(&self) -> &[(char, u16)] {
        &self.char_map
    }

    pub(crate) fn old_ids(&self) -> &[u16] {
        &self.glyphs
    }
}

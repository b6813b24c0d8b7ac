//! Renumbering subsetter.

use crate::{
    errors::ParseErrorKind,
    font::CmapTable,
    write::{write_glyphs, write_head, write_hmtx, write_u32},
    CmapId, Font, GlyphSet, ParseError, RemovalSet, TableTag,
};

/// Subset of a [`Font`] retaining only the glyphs from a [`GlyphSet`].
///
/// Glyphs are renumbered densely in the order of the glyph set. Tables describing glyphs
/// (`glyf`, `loca`, `hmtx`, `cmap` etc.) are rebuilt; other tables are copied verbatim, except for
/// the tables in the [`RemovalSet`], which are dropped.
#[derive(Debug)]
pub struct FontSubset<'a> {
    font: &'a Font,
    glyphs: &'a GlyphSet,
    removed_tables: RemovalSet,
    cmap_ids: Vec<CmapId>,
}

impl<'a> FontSubset<'a> {
    const POST_HEADER_LEN: usize = 32;
    const POST_VERSION_3: u32 = 0x_0003_0000;

    /// Creates a subset with the default options: tables from [`RemovalSet::SUBSETTING`]
    /// are dropped, and `cmap` contains a single [`CmapId::WINDOWS_BMP`] subtable.
    pub fn new(font: &'a Font, glyphs: &'a GlyphSet) -> Self {
        Self {
            font,
            glyphs,
            removed_tables: RemovalSet::SUBSETTING,
            cmap_ids: vec![CmapId::WINDOWS_BMP],
        }
    }

    /// Sets `cmap` subtables to write. Unsupported IDs are skipped; if no supported IDs
    /// are specified, a [`CmapId::WINDOWS_BMP`] subtable is written.
    #[must_use]
    pub fn with_cmap_ids(mut self, ids: &[CmapId]) -> Self {
        self.cmap_ids = ids.to_vec();
        self
    }

    /// Sets tables to remove from the subset.
    #[must_use]
    pub fn with_removed_tables(mut self, tables: RemovalSet) -> Self {
        self.removed_tables = tables;
        self
    }

    fn new_idx(&self, old_idx: u16) -> Result<u16, ParseError> {
        self.glyphs.new_idx(old_idx).ok_or_else(|| {
            ParseError::new(ParseErrorKind::UnknownGlyph(old_idx)).in_table(TableTag::GLYF)
        })
    }

    /// Builds the subsetted font.
    ///
    /// # Errors
    ///
    /// Returns an error if the font misses required tables (e.g., has no TrueType outlines),
    /// or if they are malformed.
    pub fn build(&self) -> Result<Font, ParseError> {
        let old_ids = self.glyphs.old_ids();
        let outlines = self.font.outlines()?;
        let (glyf, loca, loca_format) = write_glyphs(old_ids.len(), |i, buffer| {
            let mut glyph = outlines.glyph(old_ids[i])?;
            glyph.remap_components(|idx| self.new_idx(idx))?;
            glyph.write(buffer);
            Ok::<_, ParseError>(())
        })?;

        let mut head = vec![];
        write_head(self.font.head_table()?.bytes, loca_format, &mut head);

        let (hhea, hmtx) = self.font.horizontal_metrics()?;
        let metrics = old_ids
            .iter()
            .map(|&idx| hmtx.metrics(idx))
            .collect::<Result<Vec<_>, _>>()?;
        let mut hmtx_table = vec![];
        let number_of_h_metrics = write_hmtx(&metrics, &mut hmtx_table);
        let mut hhea_table = vec![];
        hhea.write(number_of_h_metrics, &mut hhea_table);

        // `maxp` is checked to contain `numGlyphs` when reading outlines
        let mut maxp = self.font.required_table(TableTag::MAXP)?.bytes.to_vec();
        // `unwrap()` is safe: the subset cannot have more glyphs than the original font
        let glyph_count = u16::try_from(old_ids.len()).unwrap();
        maxp[4..6].copy_from_slice(&glyph_count.to_be_bytes());

        let char_map = self
            .glyphs
            .char_map()
            .iter()
            .map(|&(ch, old_idx)| Ok((ch, self.new_idx(old_idx)?)))
            .collect::<Result<Vec<_>, ParseError>>()?;
        let mut cmap = vec![];
        CmapTable::write_for_ids(&char_map, &self.cmap_ids, &mut cmap)?;

        let mut replaced = vec![
            (TableTag::GLYF, glyf),
            (TableTag::LOCA, loca),
            (TableTag::HEAD, head),
            (TableTag::HMTX, hmtx_table),
            (TableTag::HHEA, hhea_table),
            (TableTag::MAXP, maxp),
            (TableTag::CMAP, cmap),
        ];
        if let Some(post) = self.truncated_post()? {
            replaced.push((TableTag::POST, post));
        }

        let subset = self
            .font
            .derive(replaced, |tag| self.removed_tables.contains(tag));
        tracing::debug!(
            glyphs = glyph_count,
            tables = subset.table_tags().len(),
            removed = self.removed_tables.name(),
            "built font subset"
        );
        Ok(subset)
    }

    /// Truncates the `post` table to version 3.0 since glyph names are indexed by glyph ID.
    fn truncated_post(&self) -> Result<Option<Vec<u8>>, ParseError> {
        let Some(post) = self.font.table(TableTag::POST) else {
            return Ok(None);
        };
        if post.len() < Self::POST_HEADER_LEN {
            let err = ParseErrorKind::UnexpectedTableLen {
                expected: Self::POST_HEADER_LEN,
                actual: post.len(),
            };
            return Err(ParseError::new(err).in_table(TableTag::POST));
        }

        let mut truncated = Vec::with_capacity(Self::POST_HEADER_LEN);
        write_u32(&mut truncated, Self::POST_VERSION_3);
        truncated.extend_from_slice(&post[4..Self::POST_HEADER_LEN]);
        Ok(Some(truncated))
    }
}

//! Hint stripping.

use crate::{
    write::{write_glyphs, write_head},
    Font, ParseError, RemovalSet, TableTag,
};

const MAXP_VERSION_1: [u8; 4] = [0, 1, 0, 0];
/// Range of `maxp` v1.0 fields related to instructions, from `maxTwilightPoints`
/// to `maxSizeOfInstructions` inclusive.
const MAXP_HINTING_RANGE: std::ops::Range<usize> = 16..28;

/// Removes TrueType hinting instructions from all glyphs in the font and drops tables
/// from the `removed_tables` set (normally, [`RemovalSet::HINT_STRIPPING`]).
///
/// Glyph IDs and the glyph count are unchanged. Instruction limits in the `maxp` table are zeroed.
/// If the font has no `glyf` table (e.g., it has CFF outlines), only the tables are removed.
///
/// # Errors
///
/// Returns an error if the font outlines are malformed.
pub fn strip_hints(font: &Font, removed_tables: RemovalSet) -> Result<Font, ParseError> {
    if !font.has_table(TableTag::GLYF) {
        tracing::debug!(
            removed = removed_tables.name(),
            "font has no TrueType outlines; only removing tables"
        );
        return Ok(font.derive([], |tag| removed_tables.contains(tag)));
    }

    let outlines = font.outlines()?;
    let mut stripped_instructions = 0_usize;
    let (glyf, loca, loca_format) =
        write_glyphs(usize::from(outlines.glyph_count), |i, buffer| {
            // `unwrap()` is safe: `i` is less than the glyph count
            let mut glyph = outlines.glyph(u16::try_from(i).unwrap())?;
            let len_before = buffer.len();
            glyph.write(buffer);
            let original_len = buffer.len() - len_before;
            buffer.truncate(len_before);

            glyph.strip_instructions();
            glyph.write(buffer);
            stripped_instructions += original_len - (buffer.len() - len_before);
            Ok::<_, ParseError>(())
        })?;

    let mut head = vec![];
    write_head(font.head_table()?.bytes, loca_format, &mut head);
    let mut replaced = vec![
        (TableTag::GLYF, glyf),
        (TableTag::LOCA, loca),
        (TableTag::HEAD, head),
    ];

    // `maxp` is checked to be present when reading outlines
    let maxp = font.required_table(TableTag::MAXP)?.bytes;
    if maxp.starts_with(&MAXP_VERSION_1) && maxp.len() >= MAXP_HINTING_RANGE.end {
        let mut maxp = maxp.to_vec();
        maxp[MAXP_HINTING_RANGE].fill(0);
        replaced.push((TableTag::MAXP, maxp));
    }

    let stripped = font.derive(replaced, |tag| removed_tables.contains(tag));
    tracing::debug!(
        glyphs = outlines.glyph_count,
        stripped_instructions,
        tables = stripped.table_tags().len(),
        removed = removed_tables.name(),
        "stripped hints"
    );
    Ok(stripped)
}

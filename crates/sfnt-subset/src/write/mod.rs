//! Logic for serializing `Font`s in the OpenType format and web font containers.

use core::iter;

use crate::{
    font::{HheaTable, LocaFormat},
    Font, TableTag,
};

mod brotli;
mod eot;
mod woff;
mod woff2;

pub(crate) fn write_u16(writer: &mut Vec<u8>, value: u16) {
    writer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u32(writer: &mut Vec<u8>, value: u32) {
    writer.extend_from_slice(&value.to_be_bytes());
}

fn pad_to_4_bytes(buffer: &mut Vec<u8>) {
    if buffer.len() % 4 != 0 {
        let padding = 4 - buffer.len() % 4;
        buffer.extend(iter::repeat_n(0, padding));
    }
}

impl Font {
    /// Serializes this font in the OpenType (sfnt) format.
    pub fn to_sfnt(&self) -> Vec<u8> {
        FontWriter::new(self).into_opentype()
    }

    /// Serializes this font in the WOFF 1.0 format.
    pub fn to_woff(&self) -> Vec<u8> {
        FontWriter::new(self).into_woff()
    }

    /// Serializes this font in the WOFF2 format. Tables are not transformed.
    pub fn to_woff2(&self) -> Vec<u8> {
        FontWriter::new(self).into_woff2()
    }
}

/// Writes a `hmtx` table for glyphs with the specified `(advance, lsb)` metrics
/// and returns the number of long metrics.
pub(crate) fn write_hmtx(metrics: &[(u16, u16)], writer: &mut Vec<u8>) -> u16 {
    let mut number_of_h_metrics = metrics.len();
    while let Some([(prev_advance, _), (advance, _)]) =
        metrics[..number_of_h_metrics].last_chunk::<2>()
    {
        if prev_advance != advance {
            break;
        }
        number_of_h_metrics -= 1;
    }

    for (i, &(advance, lsb)) in metrics.iter().enumerate() {
        if i < number_of_h_metrics {
            write_u16(writer, advance);
        }
        write_u16(writer, lsb);
    }

    // `unwrap()` should be safe: `number_of_h_metrics` <= number of glyphs, which doesn't exceed u16::MAX
    number_of_h_metrics.try_into().unwrap()
}

impl HheaTable<'_> {
    pub(crate) fn write(&self, number_of_h_metrics: u16, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.raw[..Self::EXPECTED_LEN - 2]);
        write_u16(writer, number_of_h_metrics);
    }
}

/// Writes `loca` table entries for the glyph locations, choosing the most compact format.
pub(crate) fn write_loca(locations: &[usize], writer: &mut Vec<u8>) -> LocaFormat {
    let all_even = locations.iter().all(|&loc| loc % 2 == 0);
    let in_bounds = locations
        .last()
        .is_none_or(|&loc| loc <= usize::from(u16::MAX) * 2);
    if all_even && in_bounds {
        for &loc in locations {
            #[allow(clippy::cast_possible_truncation)]
            // doesn't happen due to the preceding check
            write_u16(writer, (loc / 2) as u16);
        }
        LocaFormat::Short
    } else {
        for &loc in locations {
            write_u32(writer, u32::try_from(loc).expect("glyph location overflow"));
        }
        LocaFormat::Long
    }
}

/// Copies the `head` table patching `indexToLocFormat` and zeroing `checkSumAdjustment`.
/// The table must have the expected length (this is checked when loading a font).
pub(crate) fn write_head(original: &[u8], loca_format: LocaFormat, writer: &mut Vec<u8>) {
    const LOCA_FORMAT_OFFSET: usize = Font::HEAD_LOCA_FORMAT_OFFSET;

    writer.extend_from_slice(&original[..Font::HEAD_CHECKSUM_OFFSET]);
    write_u32(writer, 0); // Zero the checksum as per spec. It will be adjusted on serialization
    writer.extend_from_slice(&original[Font::HEAD_CHECKSUM_OFFSET + 4..LOCA_FORMAT_OFFSET]);
    write_u16(
        writer,
        match loca_format {
            LocaFormat::Short => 0,
            LocaFormat::Long => 1,
        },
    );
    writer.extend_from_slice(&original[LOCA_FORMAT_OFFSET + 2..]);
}

/// Writes `glyf` table data produced by `write_glyph` for each glyph, and the corresponding
/// `loca` table. Returns `(glyf, loca, loca_format)`.
pub(crate) fn write_glyphs<E>(
    glyph_count: usize,
    mut write_glyph: impl FnMut(usize, &mut Vec<u8>) -> Result<(), E>,
) -> Result<(Vec<u8>, Vec<u8>, LocaFormat), E> {
    let mut glyf = vec![];
    let mut locations = Vec::with_capacity(glyph_count + 1);
    locations.push(0);
    for i in 0..glyph_count {
        write_glyph(i, &mut glyf)?;
        locations.push(glyf.len());
    }
    let mut loca = vec![];
    let loca_format = write_loca(&locations, &mut loca);
    Ok((glyf, loca, loca_format))
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(test, derive(PartialEq))]
struct TableRecord {
    tag: TableTag,
    checksum: u32,
    /// Offset is initially recorded relative to the table data start. It's always 4-byte aligned.
    offset: u32,
    length: u32,
}

impl TableRecord {
    const BYTE_LEN: usize = 16;

    fn write_opentype(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.tag.0);
        write_u32(writer, self.checksum);
        write_u32(writer, self.offset);
        write_u32(writer, self.length);
    }

    fn self_checksum(&self) -> u32 {
        u32::from_be_bytes(self.tag.0)
            .wrapping_add(self.checksum)
            .wrapping_add(self.offset)
            .wrapping_add(self.length)
    }

    fn padded_len(&self) -> usize {
        (self.length as usize).next_multiple_of(4)
    }
}

#[derive(Debug, Clone)]
struct FontWriter {
    sfnt_version: u32,
    tables: Vec<TableRecord>,
    /// Contains *aligned* table data
    table_data: Vec<u8>,
}

impl FontWriter {
    const SFNT_HEADER_LEN: usize = 12;

    /// Writes all tables of the font. Tables are written in the tag order, except for `loca`,
    /// which immediately follows `glyf` (this is required by WOFF2).
    fn new(font: &Font) -> Self {
        let mut this = Self {
            sfnt_version: font.sfnt_version(),
            tables: Vec::with_capacity(font.table_tags().len()),
            table_data: vec![],
        };

        let loca = font.table(TableTag::LOCA);
        for (tag, data) in font.tables() {
            match tag {
                TableTag::LOCA if font.has_table(TableTag::GLYF) => { /* written after `glyf` */ }
                TableTag::HEAD if data.len() >= Font::HEAD_CHECKSUM_OFFSET + 4 => {
                    this.write_table(tag, |buffer| {
                        buffer.extend_from_slice(&data[..Font::HEAD_CHECKSUM_OFFSET]);
                        write_u32(buffer, 0); // will be adjusted later
                        buffer.extend_from_slice(&data[Font::HEAD_CHECKSUM_OFFSET + 4..]);
                    });
                }
                TableTag::GLYF => {
                    this.write_raw_table(tag, data);
                    if let Some(loca) = loca {
                        this.write_raw_table(TableTag::LOCA, loca);
                    }
                }
                _ => this.write_raw_table(tag, data),
            }
        }
        this
    }

    fn write_table<T>(&mut self, tag: TableTag, with: impl FnOnce(&mut Vec<u8>) -> T) -> T {
        let offset = self.table_data.len();
        debug_assert_eq!(offset % 4, 0, "unaligned offset: {offset}");

        let output = with(&mut self.table_data);
        let length = self.table_data.len() - offset;
        // Pad the table heap to a 4-byte boundary.
        pad_to_4_bytes(&mut self.table_data);

        let checksum = Font::checksum(&self.table_data[offset..]);
        self.tables.push(TableRecord {
            tag,
            checksum,
            offset: u32::try_from(offset).expect("table offset overflow"),
            length: u32::try_from(length).expect("table length overflow"),
        });
        output
    }

    fn write_raw_table(&mut self, tag: TableTag, content: &[u8]) {
        self.write_table(tag, |buffer| buffer.extend_from_slice(content));
    }

    fn write_sfnt_header(&self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u32(&mut buffer, self.sfnt_version);

        // `unwrap()` is safe: a font cannot contain more than u16::MAX tables.
        let table_count = u16::try_from(self.tables.len()).unwrap();
        write_u16(&mut buffer, table_count);
        let entry_selector = table_count.checked_ilog2().unwrap_or(0);
        // Search params overflow u16 for fonts with 4096+ tables; they are clamped in this case.
        let clamp = |val: u32| u16::try_from(val).unwrap_or(u16::MAX);
        let search_range = 16_u32 << entry_selector;
        write_u16(&mut buffer, clamp(search_range));
        write_u16(&mut buffer, clamp(entry_selector));
        let range_shift = (16 * u32::from(table_count)).saturating_sub(search_range);
        write_u16(&mut buffer, clamp(range_shift));

        debug_assert_eq!(buffer.len(), Self::SFNT_HEADER_LEN);
        buffer
    }

    /// Returns the starting offset of table data.
    fn data_offset(&self) -> usize {
        Self::SFNT_HEADER_LEN + self.tables.len() * TableRecord::BYTE_LEN
    }

    /// Returns the total size of the font in the sfnt format.
    fn sfnt_len(&self) -> usize {
        self.data_offset() + self.table_data.len()
    }

    fn into_opentype(self) -> Vec<u8> {
        self.into_opentype_with_adjustment().0
    }

    /// Serializes the font, additionally returning the computed `head.checkSumAdjustment`.
    fn into_opentype_with_adjustment(mut self) -> (Vec<u8>, u32) {
        let mut buffer = self.write_sfnt_header();
        self.adjust_data(Font::checksum(&buffer));
        let checksum_adjustment = self.checksum_adjustment();

        self.tables.sort_unstable_by_key(|record| record.tag);
        for record in &self.tables {
            record.write_opentype(&mut buffer);
        }
        buffer.extend(self.table_data);
        (buffer, checksum_adjustment)
    }

    /// Shifts table offsets by the table directory length and patches `head.checkSumAdjustment`.
    fn adjust_data(&mut self, sfnt_header_checksum: u32) {
        let data_offset = self.data_offset();
        let data_offset_u32 = u32::try_from(data_offset).expect("data_offset overflow");

        let mut file_checksum = sfnt_header_checksum;
        for record in &mut self.tables {
            record.offset += data_offset_u32;
            file_checksum = file_checksum
                .wrapping_add(record.self_checksum())
                .wrapping_add(record.checksum);
        }
        self.patch_head_table(file_checksum, data_offset);
    }

    fn patch_head_table(&mut self, file_checksum: u32, data_offset: usize) {
        let Some(head_table) = self
            .tables
            .iter()
            .find(|record| record.tag == TableTag::HEAD)
        else {
            return;
        };
        if (head_table.length as usize) < Font::HEAD_CHECKSUM_OFFSET + 4 {
            return;
        }

        let checksum_adjustment = Font::SFNT_CHECKSUM.wrapping_sub(file_checksum);
        // At this point, the table offset already includes the heap offset, so we need to subtract it.
        let offset = head_table.offset as usize + Font::HEAD_CHECKSUM_OFFSET - data_offset;
        self.table_data[offset..offset + 4].copy_from_slice(&checksum_adjustment.to_be_bytes());
    }

    /// Returns data for the specified table record (after `adjust_data()` was called).
    fn adjusted_table_data(&self, record: &TableRecord) -> &[u8] {
        let start = record.offset as usize - self.data_offset();
        &self.table_data[start..start + record.length as usize]
    }

    fn checksum_adjustment(&self) -> u32 {
        let head = self
            .tables
            .iter()
            .find(|record| record.tag == TableTag::HEAD);
        head.and_then(|record| {
            let data = self.adjusted_table_data(record);
            let bytes = data.get(Font::HEAD_CHECKSUM_OFFSET..Font::HEAD_CHECKSUM_OFFSET + 4)?;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        })
        .unwrap_or(0)
    }
}

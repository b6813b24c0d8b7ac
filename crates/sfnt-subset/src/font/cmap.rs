//! `cmap` table processing.

use core::mem;

use super::Cursor;
use crate::{
    errors::ParseErrorKind,
    write::{write_u16, write_u32},
    ParseError, TableTag,
};

/// Identifier of a `cmap` subtable: a combination of a platform ID and an encoding ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CmapId {
    /// Platform ID.
    pub platform: u16,
    /// Platform-specific encoding ID.
    pub encoding: u16,
}

impl CmapId {
    /// Unicode platform, BMP only (encoded with format 4).
    pub const UNICODE_BMP: Self = Self::new(CmapTable::UNICODE_PLATFORM, 3);
    /// Unicode platform, full repertoire (encoded with format 12).
    pub const UNICODE_FULL: Self = Self::new(CmapTable::UNICODE_PLATFORM, 4);
    /// Windows platform, Unicode BMP (encoded with format 4).
    pub const WINDOWS_BMP: Self = Self::new(CmapTable::WINDOWS_PLATFORM, 1);
    /// Windows platform, Unicode full repertoire (encoded with format 12).
    pub const WINDOWS_UCS4: Self = Self::new(CmapTable::WINDOWS_PLATFORM, 10);

    /// Creates an ID from the platform and encoding IDs.
    pub const fn new(platform: u16, encoding: u16) -> Self {
        Self { platform, encoding }
    }

    fn format(self) -> Option<CmapTableFormat> {
        match self {
            Self::UNICODE_BMP | Self::WINDOWS_BMP => Some(CmapTableFormat::SegmentDeltas),
            Self::UNICODE_FULL | Self::WINDOWS_UCS4 => Some(CmapTableFormat::SegmentedCoverage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmapTableFormat {
    /// Segment mapping to delta values (format 4).
    SegmentDeltas,
    /// Segmented coverage (format 12).
    SegmentedCoverage,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentWithDelta {
    pub(crate) start_code: u16,
    pub(crate) end_code: u16,
    pub(crate) id_delta: u16,
    pub(crate) id_range_offset: u16,
}

/// Segment mapping to delta values (format 4) subtable of the `cmap` table.
#[derive(Debug, Clone)]
pub(crate) struct SegmentDeltas<'a> {
    pub(crate) segments: Vec<SegmentWithDelta>,
    pub(crate) glyph_id_array: &'a [u8],
}

impl<'a> SegmentDeltas<'a> {
    /// Max segment count fitting into a subtable without `glyphIdArray`.
    const MAX_SEGMENTS: usize = (u16::MAX as usize - 16) / 8;

    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format != 4 {
                return Err(ParseErrorKind::UnexpectedTableFormat(format));
            }
            Ok(())
        })?;

        let remaining_len = cursor.read_u16_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(4)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        // Some fonts declare a subtable length exceeding the actual data; clamp it.
        cursor = cursor.range(0..remaining_len.min(cursor.bytes.len()))?;

        cursor.skip(2)?; // language
        let segment_count = cursor.read_u16()? / 2;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let vec_len = 2 * usize::from(segment_count);
        let mut end_codes = cursor.split_at(vec_len)?;
        cursor.skip(2)?; // reserved padding
        let mut start_codes = cursor.split_at(vec_len)?;
        let mut id_deltas = cursor.split_at(vec_len)?;
        let mut id_range_offsets = cursor.split_at(vec_len)?;

        let segments = (0..segment_count).map(|_| {
            Ok(SegmentWithDelta {
                start_code: start_codes.read_u16()?,
                end_code: end_codes.read_u16()?,
                id_delta: id_deltas.read_u16()?,
                id_range_offset: id_range_offsets.read_u16()?,
            })
        });

        Ok(Self {
            segments: segments.collect::<Result<_, ParseError>>()?,
            glyph_id_array: cursor.bytes,
        })
    }

    fn map_char(&self, ch: char) -> Result<u16, ParseErrorKind> {
        let Ok(c) = u16::try_from(u32::from(ch)) else {
            return Ok(0); // format 4 only covers the BMP
        };

        let segment_idx = self
            .segments
            .binary_search_by_key(&c, |segment| segment.end_code)
            .unwrap_or_else(|pos| pos);
        let Some(segment) = self.segments.get(segment_idx) else {
            return Ok(0);
        };
        if segment.start_code > c {
            return Ok(0); // missing glyph
        }

        if segment.id_range_offset == 0 {
            Ok(segment.id_delta.wrapping_add(c))
        } else {
            // Offset is counted from the start of `idRangeOffsets`
            let mut byte_offset = 2 * segment_idx;
            byte_offset += usize::from(segment.id_range_offset);
            byte_offset += 2 * usize::from(c - segment.start_code);

            if byte_offset < 2 * self.segments.len() {
                return Err(ParseErrorKind::OffsetOutOfBounds(byte_offset));
            }
            // Shift the offset to count from the start of `glyphIdArray`
            byte_offset -= 2 * self.segments.len();
            let glyph_id_bytes = self
                .glyph_id_array
                .get(byte_offset..(byte_offset + 2))
                .ok_or(ParseErrorKind::OffsetOutOfBounds(byte_offset))?;
            let glyph_id = u16::from_be_bytes([glyph_id_bytes[0], glyph_id_bytes[1]]);
            if glyph_id == 0 {
                Ok(0)
            } else {
                Ok(segment.id_delta.wrapping_add(glyph_id))
            }
        }
    }

    fn subtable_len(&self) -> usize {
        16 + 8 * self.segments.len() + self.glyph_id_array.len()
    }

    /// Writes the subtable. Must be called only if `subtable_len()` fits into `u16`.
    fn write(&self, writer: &mut Vec<u8>) {
        // `unwrap()`s are safe: the subtable length is checked on creation, which bounds
        // the segment count by `MAX_SEGMENTS`.
        write_u16(writer, 4); // subtable format
        write_u16(writer, u16::try_from(self.subtable_len()).unwrap());
        write_u16(writer, 0); // language

        let segment_count = u16::try_from(self.segments.len()).unwrap();
        write_u16(writer, 2 * segment_count);
        let entry_selector = segment_count.checked_ilog2().unwrap_or(0);
        let search_range = 2_u16 << entry_selector;
        write_u16(writer, search_range);
        write_u16(writer, u16::try_from(entry_selector).unwrap());
        write_u16(writer, 2 * segment_count - search_range);

        for segment in &self.segments {
            write_u16(writer, segment.end_code);
        }
        write_u16(writer, 0); // reserved padding
        for segment in &self.segments {
            write_u16(writer, segment.start_code);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_delta);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_range_offset);
        }
        writer.extend_from_slice(self.glyph_id_array);
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SequentialMapGroup {
    pub(crate) start_char_code: u32,
    pub(crate) end_char_code: u32,
    pub(crate) start_glyph_id: u32,
}

impl SequentialMapGroup {
    fn map_unchecked(&self, ch: char) -> u32 {
        u32::from(ch) - self.start_char_code + self.start_glyph_id
    }
}

/// Segmented coverage (format 12) subtable of the `cmap` table.
#[derive(Debug, Default, Clone)]
pub(crate) struct SegmentedCoverage {
    pub(crate) groups: Vec<SequentialMapGroup>,
}

impl SegmentedCoverage {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format != 12 {
                return Err(ParseErrorKind::UnexpectedTableFormat(format));
            }
            Ok(())
        })?;

        cursor.skip(2)?; // reserved

        let remaining_len = cursor.read_u32_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(8)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(4)?; // language
        let num_groups = cursor.read_u32()?;
        let groups = (0..num_groups).map(|_| {
            Ok(SequentialMapGroup {
                start_char_code: cursor.read_u32()?,
                end_char_code: cursor.read_u32()?,
                start_glyph_id: cursor.read_u32()?,
            })
        });

        Ok(Self {
            groups: groups.collect::<Result<_, ParseError>>()?,
        })
    }

    fn map_char(&self, ch: char) -> Result<u16, ParseErrorKind> {
        let ch = u32::from(ch);
        let group_idx = self
            .groups
            .binary_search_by_key(&ch, |group| group.end_char_code)
            .unwrap_or_else(|pos| pos);
        let Some(group) = self.groups.get(group_idx) else {
            return Ok(0); // `ch` exceeds `end_char_code` for the last segment
        };
        if group.start_char_code > ch {
            return Ok(0); // missing glyph
        }
        let glyph_id = ch - group.start_char_code + group.start_glyph_id;
        glyph_id
            .try_into()
            .map_err(|_| ParseErrorKind::UnknownGlyph(u16::MAX))
    }

    fn new(map: &[(char, u16)]) -> Self {
        let mut groups = vec![];
        let [(first_char, first_idx), rest @ ..] = map else {
            return Self::default();
        };
        let mut current_group = SequentialMapGroup {
            start_char_code: (*first_char).into(),
            end_char_code: (*first_char).into(),
            start_glyph_id: (*first_idx).into(),
        };

        for &(ch, glyph_idx) in rest {
            if u32::from(ch) == current_group.end_char_code + 1
                && u32::from(glyph_idx) == current_group.map_unchecked(ch)
            {
                current_group.end_char_code += 1;
            } else {
                let prev_group = mem::replace(
                    &mut current_group,
                    SequentialMapGroup {
                        start_char_code: ch.into(),
                        end_char_code: ch.into(),
                        start_glyph_id: glyph_idx.into(),
                    },
                );
                groups.push(prev_group);
            }
        }

        groups.push(current_group);
        Self { groups }
    }

    fn subtable_len(&self) -> usize {
        16 + 12 * self.groups.len()
    }

    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 12); // subtable format
        write_u16(writer, 0); // reserved
        write_u32(
            writer,
            self.subtable_len()
                .try_into()
                .expect("subtable_len overflow"),
        );
        write_u32(writer, 0); // language
        write_u32(
            writer,
            self.groups.len().try_into().expect("groups.len() overflow"),
        );
        for group in &self.groups {
            write_u32(writer, group.start_char_code);
            write_u32(writer, group.end_char_code);
            write_u32(writer, group.start_glyph_id);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum CmapTable<'a> {
    Deltas(SegmentDeltas<'a>),
    Coverage(SegmentedCoverage),
}

impl<'a> CmapTable<'a> {
    const UNICODE_PLATFORM: u16 = 0;
    const WINDOWS_PLATFORM: u16 = 3;

    /// Parses the table. If the table contains several supported subtables, a subtable
    /// covering the full Unicode repertoire is preferred.
    pub(super) fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        cursor.read_u16_checked(|version| {
            if version != 0 {
                return Err(ParseErrorKind::UnexpectedTableVersion(version.into()));
            }
            Ok(())
        })?;

        let num_tables = cursor.read_u16()?;
        let mut bmp_offset = None;
        let mut full_offset = None;
        for _ in 0..num_tables {
            let id = CmapId::new(cursor.read_u16()?, cursor.read_u16()?);
            let offset = cursor.read_u32()? as usize;
            match id.format() {
                Some(CmapTableFormat::SegmentDeltas) => {
                    bmp_offset.get_or_insert(offset);
                }
                Some(CmapTableFormat::SegmentedCoverage) => {
                    full_offset.get_or_insert(offset);
                }
                None => { /* unsupported subtable; skip */ }
            }
        }

        if let Some(offset) = full_offset {
            let mut subtable = table_cursor;
            subtable.skip(offset)?;
            Ok(Self::Coverage(SegmentedCoverage::parse(subtable)?))
        } else if let Some(offset) = bmp_offset {
            let mut subtable = table_cursor;
            subtable.skip(offset)?;
            Ok(Self::Deltas(SegmentDeltas::parse(subtable)?))
        } else {
            Err(cursor.err(ParseErrorKind::NoSupportedCmap))
        }
    }

    /// Maps a char to a glyph index. Returns 0 (the missing glyph) for unmapped chars.
    pub(crate) fn map_char(&self, ch: char) -> Result<u16, ParseErrorKind> {
        match self {
            Self::Deltas(deltas) => deltas.map_char(ch),
            Self::Coverage(coverage) => coverage.map_char(ch),
        }
    }
}

impl CmapTable<'static> {
    /// Creates a subtable for the specified char map, which must be sorted by chars.
    /// Chars outside the BMP are not encoded in format 4 subtables.
    ///
    /// Returns an error if the map has too many segments to be encoded in format 4.
    fn from_map(map: &[(char, u16)], format: CmapTableFormat) -> Result<Self, ParseError> {
        Ok(match format {
            CmapTableFormat::SegmentedCoverage => Self::Coverage(SegmentedCoverage::new(map)),
            CmapTableFormat::SegmentDeltas => {
                let bmp_len = map.partition_point(|&(ch, _)| u32::from(ch) < u32::from(u16::MAX));
                let coverage = SegmentedCoverage::new(&map[..bmp_len]);
                #[allow(clippy::cast_possible_truncation)]
                // `_ as u16` is safe due to the BMP filtering above
                let delta_segments = coverage.groups.iter().map(|group| {
                    let start_code = group.start_char_code as u16;
                    SegmentWithDelta {
                        start_code,
                        end_code: group.end_char_code as u16,
                        id_delta: (group.start_glyph_id as u16).wrapping_sub(start_code),
                        id_range_offset: 0,
                    }
                });
                // Add en empty segment with `start_code == end_code == 0xffff` as per spec.
                let delta_segments = delta_segments.chain([SegmentWithDelta {
                    start_code: u16::MAX,
                    end_code: u16::MAX,
                    id_delta: 1, // will map `start_code` to glyph #0 (the missing glyph) as recommended
                    id_range_offset: 0,
                }]);
                let deltas = SegmentDeltas {
                    segments: delta_segments.collect(),
                    glyph_id_array: &[],
                };
                if deltas.segments.len() > SegmentDeltas::MAX_SEGMENTS {
                    let err = ParseErrorKind::DataTooLarge {
                        len: deltas.subtable_len(),
                        max: u16::MAX.into(),
                    };
                    return Err(ParseError::new(err).in_table(TableTag::CMAP));
                }
                Self::Deltas(deltas)
            }
        })
    }

    /// Writes a `cmap` table with subtables for each of the specified IDs. Unsupported IDs
    /// are skipped; if no IDs are supported, [`CmapId::WINDOWS_BMP`] is used.
    ///
    /// # Errors
    ///
    /// Returns an error if a BMP subtable cannot hold the map, which happens for
    /// large repertoires with many discontinuities (roughly 8,000 or more).
    pub(crate) fn write_for_ids(
        map: &[(char, u16)],
        ids: &[CmapId],
        writer: &mut Vec<u8>,
    ) -> Result<(), ParseError> {
        let mut ids: Vec<_> = ids.iter().copied().filter(|id| id.format().is_some()).collect();
        if ids.is_empty() {
            ids.push(CmapId::WINDOWS_BMP);
        }
        // Encoding records must be sorted by platform ID and encoding ID.
        ids.sort_unstable();
        ids.dedup();

        let subtables: Vec<_> = ids
            .iter()
            .filter_map(|id| Some(Self::from_map(map, id.format()?)))
            .collect::<Result<_, _>>()?;

        write_u16(writer, 0); // table version
        let num_tables = u16::try_from(ids.len()).expect("too many cmap subtables");
        write_u16(writer, num_tables);

        let mut subtable_offset = 4 + 8 * ids.len();
        for (id, subtable) in ids.iter().zip(&subtables) {
            write_u16(writer, id.platform);
            write_u16(writer, id.encoding);
            write_u32(
                writer,
                u32::try_from(subtable_offset).expect("cmap offset overflow"),
            );
            subtable_offset += subtable.subtable_len();
        }
        for subtable in &subtables {
            subtable.write(writer);
        }
        Ok(())
    }

    fn subtable_len(&self) -> usize {
        match self {
            Self::Deltas(deltas) => deltas.subtable_len(),
            Self::Coverage(coverage) => coverage.subtable_len(),
        }
    }

    fn write(&self, writer: &mut Vec<u8>) {
        match self {
            Self::Deltas(deltas) => deltas.write(writer),
            Self::Coverage(coverage) => coverage.write(writer),
        }
    }
}

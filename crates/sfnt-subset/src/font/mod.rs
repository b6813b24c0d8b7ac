//! OpenType parsing logic.

use core::{fmt, ops};
use std::{collections::BTreeMap, sync::Arc};

pub use self::cmap::CmapId;
pub(crate) use self::{cmap::CmapTable, glyph::Glyph, name::NameTable};
use crate::errors::{ParseError, ParseErrorKind};

mod cmap;
mod glyph;
mod name;

/// 4-byte tag of a font table, such as `glyf` or `OS/2`.
///
/// Tags are compared byte-wise; the ordering of tags matches the ordering required
/// for the table directory of an sfnt font.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableTag(pub [u8; 4]);

impl fmt::Debug for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "TableTag({self})")
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|byte| (0x20..0x7f).contains(byte)) {
            // Safe: all bytes are printable ASCII chars.
            for &byte in &self.0 {
                fmt::Write::write_char(formatter, char::from(byte))?;
            }
            Ok(())
        } else {
            write!(formatter, "{:#010x}", u32::from_be_bytes(self.0))
        }
    }
}

#[allow(missing_docs)] // self-explanatory
impl TableTag {
    pub const CMAP: Self = Self(*b"cmap");
    pub const HEAD: Self = Self(*b"head");
    pub const HHEA: Self = Self(*b"hhea");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const MAXP: Self = Self(*b"maxp");
    pub const NAME: Self = Self(*b"name");
    pub const OS2: Self = Self(*b"OS/2");
    pub const POST: Self = Self(*b"post");
    pub const LOCA: Self = Self(*b"loca");
    pub const GLYF: Self = Self(*b"glyf");
    pub const CVT: Self = Self(*b"cvt ");
    pub const FPGM: Self = Self(*b"fpgm");
    pub const PREP: Self = Self(*b"prep");
    pub const GASP: Self = Self(*b"gasp");
    pub const GDEF: Self = Self(*b"GDEF");
    pub const GPOS: Self = Self(*b"GPOS");
    pub const GSUB: Self = Self(*b"GSUB");
    pub const KERN: Self = Self(*b"kern");
    pub const HDMX: Self = Self(*b"hdmx");
    pub const VMTX: Self = Self(*b"vmtx");
    pub const VDMX: Self = Self(*b"VDMX");
    pub const LTSH: Self = Self(*b"LTSH");
    pub const DSIG: Self = Self(*b"DSIG");
    pub const VHEA: Self = Self(*b"vhea");
}

/// Read-only view over font data with position tracking for errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    pub(crate) bytes: &'a [u8],
    offset: usize,
    table: Option<TableTag>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn for_table(tag: TableTag, bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.offset,
            table: self.table,
        }
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        if self.bytes.len() < len {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        }
        self.bytes = &self.bytes[len..];
        self.offset += len;
        Ok(())
    }

    /// Splits off the first `len` bytes into a separate cursor and advances this cursor past them.
    pub(crate) fn split_at(&mut self, len: usize) -> Result<Self, ParseError> {
        if self.bytes.len() < len {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        }
        let (head, tail) = self.bytes.split_at(len);
        let head = Self {
            bytes: head,
            ..*self
        };
        self.bytes = tail;
        self.offset += len;
        Ok(head)
    }

    /// Narrows the cursor to the specified range relative to the current position.
    pub(crate) fn range(&self, range: ops::Range<usize>) -> Result<Self, ParseError> {
        let bytes = self.bytes.get(range.clone()).ok_or_else(|| {
            self.err(ParseErrorKind::RangeOutOfBounds {
                range: range.clone(),
                len: self.bytes.len(),
            })
        })?;
        Ok(Self {
            bytes,
            offset: self.offset + range.start,
            table: self.table,
        })
    }

    pub(crate) fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let head = self.split_at(N)?;
        let mut array = [0_u8; N];
        array.copy_from_slice(head.bytes);
        Ok(array)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.read_byte_array::<1>().map(|[byte]| byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.read_byte_array().map(u16::from_be_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.read_byte_array().map(u32::from_be_bytes)
    }

    /// Reads a `u16` and checks it with the provided closure. On failure, the error
    /// will point to the start of the read value.
    pub(crate) fn read_u16_checked<T>(
        &mut self,
        check: impl FnOnce(u16) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u16()?;
        check(value).map_err(|kind| start.err(kind))
    }

    pub(crate) fn read_u32_checked<T>(
        &mut self,
        check: impl FnOnce(u32) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u32()?;
        check(value).map_err(|kind| start.err(kind))
    }
}

/// OpenType font (a single font from a font file or collection).
///
/// A font is an immutable collection of tables keyed by [`TableTag`]. Transformations
/// (subsetting, hint stripping) never modify a font in place; instead, they produce a new font
/// sharing unchanged table data with the original one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    sfnt_version: u32,
    tables: BTreeMap<TableTag, Arc<[u8]>>,
}

impl Font {
    /// sfnt version for fonts with TrueType outlines.
    pub(crate) const SFNT_VERSION: u32 = 0x_0001_0000;
    const CFF_VERSION: u32 = u32::from_be_bytes(*b"OTTO");
    const APPLE_VERSION: u32 = u32::from_be_bytes(*b"true");
    const COLLECTION_TAG: u32 = u32::from_be_bytes(*b"ttcf");

    pub(crate) const SFNT_CHECKSUM: u32 = 0x_b1b0_afba;
    pub(crate) const HEAD_CHECKSUM_OFFSET: usize = 8;
    pub(crate) const HEAD_LOCA_FORMAT_OFFSET: usize = 50;
    pub(crate) const HEAD_LEN: usize = 54;

    /// Parses the first font from the provided font data, which may be a single sfnt font
    /// or a TrueType collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the font data is malformed or misses required tables.
    pub fn new(bytes: &[u8]) -> Result<Self, ParseError> {
        let offset = *Self::font_offsets(bytes)?
            .first()
            .ok_or_else(|| ParseError::new(ParseErrorKind::EmptyCollection))?;
        Self::parse_at(bytes, offset)
    }

    /// Parses all fonts from the provided font data. For a single sfnt font, this returns
    /// a single font.
    ///
    /// # Errors
    ///
    /// Returns an error if the font data is malformed or misses required tables.
    pub fn load_all(bytes: &[u8]) -> Result<Vec<Self>, ParseError> {
        let offsets = Self::font_offsets(bytes)?;
        if offsets.is_empty() {
            return Err(ParseError::new(ParseErrorKind::EmptyCollection));
        }
        offsets
            .into_iter()
            .map(|offset| Self::parse_at(bytes, offset))
            .collect()
    }

    /// Creates a font from the specified tables.
    pub fn from_tables<T>(sfnt_version: u32, tables: impl IntoIterator<Item = (TableTag, T)>) -> Self
    where
        T: Into<Arc<[u8]>>,
    {
        Self {
            sfnt_version,
            tables: tables
                .into_iter()
                .map(|(tag, data)| (tag, data.into()))
                .collect(),
        }
    }

    fn font_offsets(bytes: &[u8]) -> Result<Vec<usize>, ParseError> {
        let mut cursor = Cursor::new(bytes);
        let tag = cursor.read_u32()?;
        if tag != Self::COLLECTION_TAG {
            return Ok(vec![0]);
        }

        cursor.read_u32_checked(|version| match version {
            0x_0001_0000 | 0x_0002_0000 => Ok(()),
            _ => Err(ParseErrorKind::UnexpectedTableVersion(version)),
        })?;
        let font_count = cursor.read_u32()?;
        (0..font_count)
            .map(|_| Ok(cursor.read_u32()? as usize))
            .collect()
    }

    fn parse_at(bytes: &[u8], offset: usize) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(bytes);
        cursor.skip(offset)?;
        let sfnt_version = cursor.read_u32_checked(|version| match version {
            Self::SFNT_VERSION | Self::CFF_VERSION | Self::APPLE_VERSION => Ok(version),
            _ => Err(ParseErrorKind::UnexpectedFontVersion(version)),
        })?;
        let table_count = cursor.read_u16()?;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut tables = BTreeMap::new();
        for _ in 0..table_count {
            let tag = TableTag(cursor.read_byte_array()?);
            cursor.skip(4)?; // checksum
            let offset = cursor.read_u32()? as usize;
            let len = cursor.read_u32()? as usize;
            let range = offset..offset.saturating_add(len);
            let table_bytes = bytes.get(range.clone()).ok_or_else(|| {
                ParseError::new(ParseErrorKind::RangeOutOfBounds {
                    range,
                    len: bytes.len(),
                })
                .in_table(tag)
            })?;
            tables.insert(tag, Arc::from(table_bytes));
        }

        let this = Self {
            sfnt_version,
            tables,
        };
        this.head_table()?;
        Ok(this)
    }

    /// Returns the sfnt version of this font (e.g., `0x00010000` for fonts with TrueType outlines).
    pub fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }

    /// Iterates over tags of all tables in this font in the ascending order.
    pub fn table_tags(&self) -> impl ExactSizeIterator<Item = TableTag> + '_ {
        self.tables.keys().copied()
    }

    /// Checks whether this font contains a table with the specified tag.
    pub fn has_table(&self, tag: TableTag) -> bool {
        self.tables.contains_key(&tag)
    }

    /// Returns raw data of the specified table, if it is present in the font.
    pub fn table(&self, tag: TableTag) -> Option<&[u8]> {
        self.tables.get(&tag).map(AsRef::as_ref)
    }

    pub(crate) fn tables(&self) -> impl ExactSizeIterator<Item = (TableTag, &[u8])> + '_ {
        self.tables.iter().map(|(tag, data)| (*tag, data.as_ref()))
    }

    /// Returns the `head` table checking that it has the expected length.
    pub(crate) fn head_table(&self) -> Result<Cursor<'_>, ParseError> {
        let head = self.required_table(TableTag::HEAD)?;
        if head.bytes.len() < Self::HEAD_LEN {
            return Err(head.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::HEAD_LEN,
                actual: head.bytes.len(),
            }));
        }
        Ok(head)
    }

    pub(crate) fn required_table(&self, tag: TableTag) -> Result<Cursor<'_>, ParseError> {
        let bytes = self
            .table(tag)
            .ok_or_else(|| ParseError::missing_table(tag))?;
        Ok(Cursor::for_table(tag, bytes))
    }

    /// Returns the number of glyphs in this font as recorded in the `maxp` table.
    ///
    /// # Errors
    ///
    /// Returns an error if the `maxp` table is missing or malformed.
    pub fn glyph_count(&self) -> Result<u16, ParseError> {
        let mut maxp = self.required_table(TableTag::MAXP)?;
        maxp.read_u32_checked(|version| match version {
            0x_0000_5000 | 0x_0001_0000 => Ok(()),
            _ => Err(ParseErrorKind::UnexpectedTableVersion(version)),
        })?;
        maxp.read_u16()
    }

    pub(crate) fn char_map(&self) -> Result<CmapTable<'_>, ParseError> {
        CmapTable::parse(self.required_table(TableTag::CMAP)?)
    }

    pub(crate) fn outlines(&self) -> Result<Outlines<'_>, ParseError> {
        let glyph_count = self.glyph_count()?;
        let loca_format = LocaFormat::parse(self.head_table()?)?;
        let loca = LocaTable::new(
            loca_format,
            glyph_count,
            self.required_table(TableTag::LOCA)?,
        )?;
        Ok(Outlines {
            glyph_count,
            loca,
            glyf: self.required_table(TableTag::GLYF)?,
        })
    }

    pub(crate) fn horizontal_metrics(&self) -> Result<(HheaTable<'_>, HmtxTable<'_>), ParseError> {
        let hhea = HheaTable::parse(self.required_table(TableTag::HHEA)?)?;
        let hmtx = HmtxTable {
            raw: self.required_table(TableTag::HMTX)?,
            number_of_h_metrics: hhea.number_of_h_metrics,
        };
        Ok((hhea, hmtx))
    }

    /// Creates a new font based on this one. Tables from `replaced` are added or override
    /// existing tables, and tables matching `removed` are dropped.
    pub(crate) fn derive(
        &self,
        replaced: impl IntoIterator<Item = (TableTag, Vec<u8>)>,
        removed: impl Fn(TableTag) -> bool,
    ) -> Self {
        let mut tables = self.tables.clone();
        for (tag, data) in replaced {
            tables.insert(tag, data.into());
        }
        tables.retain(|&tag, _| !removed(tag));
        Self {
            sfnt_version: self.sfnt_version,
            tables,
        }
    }

    /// Computes the checksum of a table as per the OpenType spec. The data is implicitly
    /// zero-padded to a 4-byte boundary.
    pub(crate) fn checksum(data: &[u8]) -> u32 {
        let mut chunks = data.chunks_exact(4);
        let mut checksum = chunks.by_ref().fold(0_u32, |acc, chunk| {
            acc.wrapping_add(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        });
        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let mut padded = [0_u8; 4];
            padded[..remainder.len()].copy_from_slice(remainder);
            checksum = checksum.wrapping_add(u32::from_be_bytes(padded));
        }
        checksum
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HheaTable<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) number_of_h_metrics: u16,
}

impl<'a> HheaTable<'a> {
    pub(crate) const EXPECTED_LEN: usize = 36; // 18 words as per spec

    fn parse(cursor: Cursor<'a>) -> Result<Self, ParseError> {
        if cursor.bytes.len() != Self::EXPECTED_LEN {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::EXPECTED_LEN,
                actual: cursor.bytes.len(),
            }));
        }
        let mut tail = cursor.range(Self::EXPECTED_LEN - 2..Self::EXPECTED_LEN)?;
        Ok(Self {
            raw: cursor.bytes,
            number_of_h_metrics: tail.read_u16()?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct HmtxTable<'a> {
    raw: Cursor<'a>,
    number_of_h_metrics: u16,
}

impl HmtxTable<'_> {
    /// Returns the advance width and left side bearing for a glyph.
    pub(crate) fn metrics(&self, glyph_idx: u16) -> Result<(u16, u16), ParseError> {
        if self.number_of_h_metrics == 0 {
            return Err(self.raw.err(ParseErrorKind::UnknownGlyph(glyph_idx)));
        }

        if glyph_idx < self.number_of_h_metrics {
            let offset = usize::from(glyph_idx) * 4;
            let mut cursor = self.raw.range(offset..offset + 4)?;
            Ok((cursor.read_u16()?, cursor.read_u16()?))
        } else {
            let advance_offset = usize::from(self.number_of_h_metrics - 1) * 4;
            let advance = self
                .raw
                .range(advance_offset..advance_offset + 2)?
                .read_u16()?;

            let lsb_offset = usize::from(self.number_of_h_metrics) * 4
                + usize::from(glyph_idx - self.number_of_h_metrics) * 2;
            let lsb = self.raw.range(lsb_offset..lsb_offset + 2)?.read_u16()?;
            Ok((advance, lsb))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocaFormat {
    Short,
    Long,
}

impl LocaFormat {
    fn parse(head: Cursor<'_>) -> Result<Self, ParseError> {
        let mut cursor = head.range(Font::HEAD_LOCA_FORMAT_OFFSET..Font::HEAD_LEN - 2)?;
        cursor.read_u16_checked(|raw_format| match raw_format {
            0 => Ok(Self::Short),
            1 => Ok(Self::Long),
            _ => Err(ParseErrorKind::UnexpectedLocaFormat(raw_format)),
        })
    }

    const fn bytes_per_offset(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 4,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LocaTable<'a> {
    format: LocaFormat,
    cursor: Cursor<'a>,
}

impl<'a> LocaTable<'a> {
    fn new(format: LocaFormat, glyph_count: u16, cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let expected_len = format.bytes_per_offset() * (usize::from(glyph_count) + 1);
        // Some fonts have trailing bytes in `loca`, so we only check the lower bound
        if cursor.bytes.len() < expected_len {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: expected_len,
                actual: cursor.bytes.len(),
            }));
        }
        Ok(Self { format, cursor })
    }

    fn glyph_range(&self, glyph_idx: u16) -> Result<ops::Range<usize>, ParseError> {
        let glyph_idx = usize::from(glyph_idx);
        let bytes_per_offset = self.format.bytes_per_offset();
        let mut cursor = self
            .cursor
            .range(glyph_idx * bytes_per_offset..(glyph_idx + 2) * bytes_per_offset)?;
        Ok(match self.format {
            LocaFormat::Short => {
                let start_offset = usize::from(cursor.read_u16()?) * 2;
                let end_offset = usize::from(cursor.read_u16()?) * 2;
                start_offset..end_offset
            }
            LocaFormat::Long => {
                let start_offset = cursor.read_u32()? as usize;
                let end_offset = cursor.read_u32()? as usize;
                start_offset..end_offset
            }
        })
    }
}

/// TrueType glyph outlines (`loca` + `glyf` tables).
#[derive(Debug)]
pub(crate) struct Outlines<'a> {
    pub(crate) glyph_count: u16,
    loca: LocaTable<'a>,
    glyf: Cursor<'a>,
}

impl<'a> Outlines<'a> {
    pub(crate) fn glyph(&self, glyph_idx: u16) -> Result<Glyph<'a>, ParseError> {
        if glyph_idx >= self.glyph_count {
            return Err(self.glyf.err(ParseErrorKind::UnknownGlyph(glyph_idx)));
        }
        let range = self.loca.glyph_range(glyph_idx)?;
        if range.start > range.end {
            return Err(self.glyf.err(ParseErrorKind::RangeOutOfBounds {
                range,
                len: self.glyf.bytes.len(),
            }));
        }
        Glyph::new(self.glyf.range(range)?)
    }
}

//! Embedded OpenType (EOT) container with optional MicroType Express (MTX) compression.

use miniz_oxide::deflate::compress_to_vec_zlib;

use super::{woff::ZLIB_LEVEL, FontWriter};
use crate::{
    errors::ParseErrorKind,
    font::{Cursor, NameTable},
    Font, ParseError, TableTag,
};

fn write_u16_le(writer: &mut Vec<u8>, value: u16) {
    writer.extend_from_slice(&value.to_le_bytes());
}

fn write_u32_le(writer: &mut Vec<u8>, value: u32) {
    writer.extend_from_slice(&value.to_le_bytes());
}

/// `OS/2` fields copied to the EOT header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Os2Fields {
    weight: u16,
    fs_type: u16,
    panose: [u8; 10],
    italic: bool,
    unicode_ranges: [u32; 4],
    codepage_ranges: [u32; 2],
}

impl Default for Os2Fields {
    fn default() -> Self {
        Self {
            weight: 400,
            fs_type: 0,
            panose: [0; 10],
            italic: false,
            unicode_ranges: [0; 4],
            codepage_ranges: [0; 2],
        }
    }
}

impl Os2Fields {
    /// Codepage ranges are only present in `OS/2` version 1+.
    const LEN_WITH_CODEPAGES: usize = 86;

    fn parse(font: &Font) -> Result<Self, ParseError> {
        let Some(raw) = font.table(TableTag::OS2) else {
            return Ok(Self::default());
        };
        let table = Cursor::for_table(TableTag::OS2, raw);

        let weight = table.range(4..6)?.read_u16()?;
        let fs_type = table.range(8..10)?.read_u16()?;
        let panose = table.range(32..42)?.read_byte_array()?;
        let mut ranges = table.range(42..58)?;
        let unicode_ranges = [
            ranges.read_u32()?,
            ranges.read_u32()?,
            ranges.read_u32()?,
            ranges.read_u32()?,
        ];
        let fs_selection = table.range(62..64)?.read_u16()?;
        let codepage_ranges = if raw.len() >= Self::LEN_WITH_CODEPAGES {
            let mut ranges = table.range(78..Self::LEN_WITH_CODEPAGES)?;
            [ranges.read_u32()?, ranges.read_u32()?]
        } else {
            [0; 2]
        };

        Ok(Self {
            weight,
            fs_type,
            panose,
            italic: fs_selection & 1 != 0,
            unicode_ranges,
            codepage_ranges,
        })
    }
}

/// UTF-16LE names recorded in the EOT header, in the header order.
#[derive(Debug, Default)]
struct EotNames([Vec<u8>; 4]);

impl EotNames {
    const IDS: [u16; 4] = [
        NameTable::FAMILY,
        NameTable::SUBFAMILY,
        NameTable::VERSION,
        NameTable::FULL_NAME,
    ];

    fn parse(font: &Font) -> Result<Self, ParseError> {
        let Some(raw) = font.table(TableTag::NAME) else {
            return Ok(Self::default());
        };
        let table = NameTable::parse(Cursor::for_table(TableTag::NAME, raw))?;
        let mut names = Self::default();
        for (name, id) in names.0.iter_mut().zip(Self::IDS) {
            if let Some(utf16_be) = table.utf16_name(id)? {
                *name = utf16_be
                    .chunks_exact(2)
                    .flat_map(|pair| [pair[1], pair[0]])
                    .collect();
            }
        }
        Ok(names)
    }
}

/// Wraps font data into a MicroType Express container: a 10-byte header followed by 3 blocks.
/// The first block holds the entire sfnt data; the other blocks are empty. Each block
/// is zlib-compressed.
fn compress_mtx(font_data: &[u8]) -> Result<Vec<u8>, ParseError> {
    const VERSION: u8 = 3;
    const HEADER_LEN: usize = 10;
    const MAX_U24: usize = (1 << 24) - 1;

    fn check_u24(value: usize) -> Result<u32, ParseError> {
        if value > MAX_U24 {
            return Err(ParseError::new(ParseErrorKind::DataTooLarge {
                len: value,
                max: MAX_U24,
            }));
        }
        // `unwrap()` is safe due to the check above
        Ok(u32::try_from(value).unwrap())
    }

    fn write_u24(writer: &mut Vec<u8>, value: u32) {
        writer.extend_from_slice(&value.to_be_bytes()[1..]);
    }

    let empty: &[u8] = &[];
    let blocks = [font_data, empty, empty].map(|block| compress_to_vec_zlib(block, ZLIB_LEVEL));
    let copy_limit = check_u24(font_data.len().min(MAX_U24))?;
    let block2_offset = check_u24(HEADER_LEN + blocks[0].len())?;
    let block3_offset = check_u24(HEADER_LEN + blocks[0].len() + blocks[1].len())?;

    let total_len = HEADER_LEN + blocks.iter().map(Vec::len).sum::<usize>();
    let mut buffer = Vec::with_capacity(total_len);
    buffer.push(VERSION);
    write_u24(&mut buffer, copy_limit);
    write_u24(&mut buffer, block2_offset);
    write_u24(&mut buffer, block3_offset);
    debug_assert_eq!(buffer.len(), HEADER_LEN);
    for block in blocks {
        buffer.extend(block);
    }
    Ok(buffer)
}

impl Font {
    /// Version 2.2 of the EOT header.
    const EOT_VERSION: u32 = 0x_0002_0002;
    const EOT_MAGIC: u16 = 0x_504c;
    /// Font data is compressed with MicroType Express.
    const TTEMBED_TTCOMPRESSED: u32 = 0x4;
    const DEFAULT_CHARSET: u8 = 1;
    /// Checksum of an empty root string.
    const ROOT_STRING_CHECKSUM_KEY: u32 = 0x_5047_5342;

    /// Serializes this font as Embedded OpenType. If `mtx` is set, font data is additionally
    /// wrapped in a MicroType Express container with zlib-compressed blocks (not LZCOMP);
    /// such output is not readable by MTX-aware consumers.
    ///
    /// # Errors
    ///
    /// Returns an error if the `OS/2` or `name` table is malformed, or if the font is too large
    /// for the MTX container.
    pub fn to_eot(&self, mtx: bool) -> Result<Vec<u8>, ParseError> {
        let os2 = Os2Fields::parse(self)?;
        let names = EotNames::parse(self)?;
        let (sfnt, checksum_adjustment) = FontWriter::new(self).into_opentype_with_adjustment();
        let (flags, font_data) = if mtx {
            (Self::TTEMBED_TTCOMPRESSED, compress_mtx(&sfnt)?)
        } else {
            (0, sfnt)
        };

        let mut header = vec![];
        write_u32_le(&mut header, 0); // EOTSize; patched below
        write_u32_le(
            &mut header,
            font_data.len().try_into().expect("font data length overflow"),
        );
        write_u32_le(&mut header, Self::EOT_VERSION);
        write_u32_le(&mut header, flags);
        header.extend_from_slice(&os2.panose);
        header.push(Self::DEFAULT_CHARSET);
        header.push(u8::from(os2.italic));
        write_u32_le(&mut header, os2.weight.into());
        write_u16_le(&mut header, os2.fs_type);
        write_u16_le(&mut header, Self::EOT_MAGIC);
        for range in os2.unicode_ranges {
            write_u32_le(&mut header, range);
        }
        for range in os2.codepage_ranges {
            write_u32_le(&mut header, range);
        }
        write_u32_le(&mut header, checksum_adjustment);
        for _ in 0..4 {
            write_u32_le(&mut header, 0); // reserved
        }

        for name in &names.0 {
            write_u16_le(&mut header, 0); // padding
            // `unwrap()` is safe: name lengths are stored as u16 in the `name` table
            write_u16_le(&mut header, name.len().try_into().unwrap());
            header.extend_from_slice(name);
        }
        write_u16_le(&mut header, 0); // padding
        write_u16_le(&mut header, 0); // root string size
        write_u32_le(&mut header, Self::ROOT_STRING_CHECKSUM_KEY);
        write_u32_le(&mut header, 0); // EUDC code page
        write_u16_le(&mut header, 0); // padding
        write_u16_le(&mut header, 0); // signature size
        write_u32_le(&mut header, 0); // EUDC flags
        write_u32_le(&mut header, 0); // EUDC font size

        let eot_len = u32::try_from(header.len() + font_data.len()).expect("EOT length overflow");
        header[..4].copy_from_slice(&eot_len.to_le_bytes());
        header.extend(font_data);
        Ok(header)
    }
}

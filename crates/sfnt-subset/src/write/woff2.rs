//! WOFF2 container. Tables are stored with null transforms in a single Brotli stream.

use super::{pad_to_4_bytes, write_u16, write_u32, FontWriter, TableRecord};
use crate::{Font, TableTag};

/// Tags with predefined indices in the WOFF2 table directory.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];
/// Flag value signaling that an arbitrary tag follows the flags byte.
const ARBITRARY_TAG: u8 = 63;

fn known_tag_index(tag: TableTag) -> Option<u8> {
    let idx = KNOWN_TAGS.iter().position(|&known| *known == tag.0)?;
    // `unwrap()` is safe: there are 63 known tags
    Some(u8::try_from(idx).unwrap())
}

fn uint_base128_len(val: u32) -> usize {
    if val == 0 {
        1
    } else {
        val.ilog2() as usize / 7 + 1
    }
}

#[allow(clippy::cast_possible_truncation)] // intentional
fn write_uint_base128(buffer: &mut Vec<u8>, val: u32) {
    for shift in [28, 21, 14, 7] {
        if val >= 1 << shift {
            buffer.push(0x80 | (val >> shift) as u8);
        }
    }
    buffer.push((val & 127) as u8);
}

impl TableRecord {
    fn woff2_len(&self) -> usize {
        let tag_len = if known_tag_index(self.tag).is_some() { 0 } else { 4 };
        1 /* flags */ + tag_len + uint_base128_len(self.length)
    }

    fn write_woff2(&self, buffer: &mut Vec<u8>) {
        /// Transform version 3 for `glyf` / `loca` means no transform.
        const NULL_TRANSFORM: u8 = 0b_1100_0000;

        if let Some(idx) = known_tag_index(self.tag) {
            let flags = match self.tag {
                TableTag::GLYF | TableTag::LOCA => idx | NULL_TRANSFORM,
                _ => idx,
            };
            buffer.push(flags);
        } else {
            buffer.push(ARBITRARY_TAG);
            buffer.extend_from_slice(&self.tag.0);
        }
        write_uint_base128(buffer, self.length);
    }
}

impl FontWriter {
    const WOFF2_HEADER_LEN: usize = 48;

    pub(super) fn into_woff2(mut self) -> Vec<u8> {
        const WOFF2_SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");

        self.adjust_data(Font::checksum(&self.write_sfnt_header()));

        let compressed_data = self.compress_data();
        let tables_len = self
            .tables
            .iter()
            .map(TableRecord::woff2_len)
            .sum::<usize>();
        let file_len =
            (Self::WOFF2_HEADER_LEN + tables_len + compressed_data.len()).next_multiple_of(4);

        let mut buffer = Vec::with_capacity(file_len);
        write_u32(&mut buffer, WOFF2_SIGNATURE);
        write_u32(&mut buffer, self.sfnt_version);
        write_u32(
            &mut buffer,
            file_len.try_into().expect("file length overflow"),
        );
        // `unwrap()` is safe: a font cannot contain more than u16::MAX tables
        write_u16(&mut buffer, self.tables.len().try_into().unwrap());
        write_u16(&mut buffer, 0); // reserved

        // `unwrap`s are safe, since `file_len` fits into u32.
        write_u32(&mut buffer, self.sfnt_len().try_into().unwrap());
        write_u32(&mut buffer, compressed_data.len().try_into().unwrap());
        let (major, minor) = self.font_revision();
        write_u16(&mut buffer, major);
        write_u16(&mut buffer, minor);
        write_u32(&mut buffer, 0); // metadata offset
        write_u32(&mut buffer, 0); // metadata length
        write_u32(&mut buffer, 0); // original metadata length
        write_u32(&mut buffer, 0); // private block offset
        write_u32(&mut buffer, 0); // private block length
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN);

        // The table directory order must match the order of tables in the compressed stream.
        for record in &self.tables {
            record.write_woff2(&mut buffer);
        }
        debug_assert_eq!(buffer.len(), Self::WOFF2_HEADER_LEN + tables_len);
        buffer.extend(compressed_data);

        // Required even though we don't have metadata or private blocks.
        pad_to_4_bytes(&mut buffer);
        debug_assert_eq!(buffer.len(), file_len);
        buffer
    }
}

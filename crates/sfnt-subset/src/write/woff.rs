//! WOFF 1.0 container with per-table zlib compression.

use miniz_oxide::deflate::compress_to_vec_zlib;

use super::{pad_to_4_bytes, write_u16, write_u32, FontWriter};
use crate::{Font, TableTag};

/// Compression level used for WOFF tables and MTX blocks.
pub(super) const ZLIB_LEVEL: u8 = 6;

impl FontWriter {
    const WOFF_HEADER_LEN: usize = 44;
    const WOFF_ENTRY_LEN: usize = 20;

    /// Returns the major and minor font version from `head.fontRevision`.
    pub(super) fn font_revision(&self) -> (u16, u16) {
        let head = self
            .tables
            .iter()
            .find(|record| record.tag == TableTag::HEAD);
        let revision = head.and_then(|record| {
            let data = self.adjusted_table_data(record);
            Some([data.get(4..6)?, data.get(6..8)?])
        });
        revision.map_or((0, 0), |[major, minor]| {
            (
                u16::from_be_bytes([major[0], major[1]]),
                u16::from_be_bytes([minor[0], minor[1]]),
            )
        })
    }

    pub(super) fn into_woff(mut self) -> Vec<u8> {
        const WOFF_SIGNATURE: u32 = u32::from_be_bytes(*b"wOFF");

        self.adjust_data(Font::checksum(&self.write_sfnt_header()));
        self.tables.sort_unstable_by_key(|record| record.tag);

        let compressed_tables: Vec<_> = self
            .tables
            .iter()
            .map(|record| {
                let data = self.adjusted_table_data(record);
                let compressed = compress_to_vec_zlib(data, ZLIB_LEVEL);
                if compressed.len() < data.len() {
                    compressed
                } else {
                    data.to_vec()
                }
            })
            .collect();

        let directory_len = Self::WOFF_HEADER_LEN + self.tables.len() * Self::WOFF_ENTRY_LEN;
        let mut offset = directory_len;
        let mut directory = Vec::with_capacity(directory_len);
        for (record, data) in self.tables.iter().zip(&compressed_tables) {
            directory.extend_from_slice(&record.tag.0);
            write_u32(&mut directory, offset.try_into().expect("offset overflow"));
            write_u32(&mut directory, data.len().try_into().expect("table length overflow"));
            write_u32(&mut directory, record.length);
            write_u32(&mut directory, record.checksum);
            offset = (offset + data.len()).next_multiple_of(4);
        }
        let file_len = offset;

        let mut buffer = Vec::with_capacity(file_len);
        write_u32(&mut buffer, WOFF_SIGNATURE);
        write_u32(&mut buffer, self.sfnt_version);
        write_u32(&mut buffer, file_len.try_into().expect("file length overflow"));
        // `unwrap()` is safe: a font cannot contain more than u16::MAX tables
        write_u16(&mut buffer, self.tables.len().try_into().unwrap());
        write_u16(&mut buffer, 0); // reserved
        write_u32(&mut buffer, self.sfnt_len().try_into().expect("sfnt length overflow"));
        let (major, minor) = self.font_revision();
        write_u16(&mut buffer, major);
        write_u16(&mut buffer, minor);
        write_u32(&mut buffer, 0); // metadata offset
        write_u32(&mut buffer, 0); // metadata length
        write_u32(&mut buffer, 0); // original metadata length
        write_u32(&mut buffer, 0); // private block offset
        write_u32(&mut buffer, 0); // private block length
        debug_assert_eq!(buffer.len(), Self::WOFF_HEADER_LEN);

        buffer.extend(directory);
        for data in compressed_tables {
            buffer.extend(data);
            pad_to_4_bytes(&mut buffer);
        }
        debug_assert_eq!(buffer.len(), file_len);
        buffer
    }
}

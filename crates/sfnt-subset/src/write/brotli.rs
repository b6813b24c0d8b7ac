//! Brotli compression of table data for WOFF2.

use std::io;

use brotli::enc::{backward_references::BrotliEncoderMode, BrotliEncoderParams};

use super::FontWriter;

/// Reads table data in the table directory order without padding between tables,
/// as required for the WOFF2 compressed stream.
struct TableDataReader<'a> {
    writer: &'a FontWriter,
    /// Offset of the first table; table offsets may be already adjusted by the directory length.
    data_offset: usize,
    table_idx: usize,
    pos_in_table: usize,
}

impl<'a> TableDataReader<'a> {
    fn new(writer: &'a FontWriter) -> Self {
        debug_assert!(
            writer
                .tables
                .windows(2)
                .all(|pair| pair[0].offset + pair[0].length <= pair[1].offset),
            "table records need to be ordered by offsets"
        );
        let data_offset = writer.tables.first().map_or(0, |record| record.offset as usize);
        Self {
            writer,
            data_offset,
            table_idx: 0,
            pos_in_table: 0,
        }
    }

    /// Returns unread data of the current table, or `None` if all tables are read.
    fn remaining_in_table(&self) -> Option<&'a [u8]> {
        let writer = self.writer;
        let record = writer.tables.get(self.table_idx)?;
        let start = record.offset as usize - self.data_offset;
        let end = start + record.length as usize;
        Some(&writer.table_data[start + self.pos_in_table..end])
    }
}

impl io::Read for TableDataReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let Some(remaining) = self.remaining_in_table() else {
                break;
            };
            let chunk_len = remaining.len().min(buf.len() - total_read);
            buf[total_read..total_read + chunk_len].copy_from_slice(&remaining[..chunk_len]);
            total_read += chunk_len;

            if chunk_len == remaining.len() {
                self.table_idx += 1;
                self.pos_in_table = 0;
            } else {
                self.pos_in_table += chunk_len;
            }
        }
        Ok(total_read)
    }
}

impl FontWriter {
    /// Compresses table data (without padding between tables) into a single Brotli stream.
    pub(super) fn compress_data(&self) -> Vec<u8> {
        let mut params = BrotliEncoderParams::default();
        params.mode = BrotliEncoderMode::BROTLI_MODE_FONT;

        let mut compressed = vec![];
        brotli::BrotliCompress(&mut TableDataReader::new(self), &mut compressed, &params)
            .expect("in-memory compression never fails");
        compressed
    }
}

//! `name` table lookup.

use super::Cursor;
use crate::{errors::ParseErrorKind, ParseError};

#[derive(Debug, Clone, Copy)]
struct NameRecord {
    platform: u16,
    encoding: u16,
    language: u16,
    name_id: u16,
    len: u16,
    offset: u16,
}

/// Naming table providing access to UTF-16 encoded Windows platform names.
#[derive(Debug)]
pub(crate) struct NameTable<'a> {
    records: Vec<NameRecord>,
    storage: Cursor<'a>,
}

impl<'a> NameTable<'a> {
    pub(crate) const FAMILY: u16 = 1;
    pub(crate) const SUBFAMILY: u16 = 2;
    pub(crate) const FULL_NAME: u16 = 4;
    pub(crate) const VERSION: u16 = 5;

    const WINDOWS_PLATFORM: u16 = 3;
    const ENGLISH_US: u16 = 0x0409;

    pub(crate) fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let table = cursor;
        cursor.read_u16_checked(|version| match version {
            0 | 1 => Ok(()),
            _ => Err(ParseErrorKind::UnexpectedTableVersion(version.into())),
        })?;
        let count = cursor.read_u16()?;
        let storage_offset = usize::from(cursor.read_u16()?);
        let records = (0..count).map(|_| {
            Ok(NameRecord {
                platform: cursor.read_u16()?,
                encoding: cursor.read_u16()?,
                language: cursor.read_u16()?,
                name_id: cursor.read_u16()?,
                len: cursor.read_u16()?,
                offset: cursor.read_u16()?,
            })
        });
        let records = records.collect::<Result<_, ParseError>>()?;

        let storage = table.range(storage_offset.min(table.bytes.len())..table.bytes.len())?;
        Ok(Self { records, storage })
    }

    /// Returns the UTF-16BE encoded name with the specified ID. Windows Unicode names
    /// in US English are preferred; otherwise, the first Windows Unicode name is returned.
    pub(crate) fn utf16_name(&self, name_id: u16) -> Result<Option<&'a [u8]>, ParseError> {
        let candidates = self.records.iter().filter(|record| {
            record.name_id == name_id
                && record.platform == Self::WINDOWS_PLATFORM
                && matches!(record.encoding, 0 | 1 | 10)
        });
        let mut selected = None;
        for record in candidates {
            if record.language == Self::ENGLISH_US {
                selected = Some(record);
                break;
            }
            selected.get_or_insert(record);
        }

        let Some(record) = selected else {
            return Ok(None);
        };
        let start = usize::from(record.offset);
        let range = self.storage.range(start..start + usize::from(record.len))?;
        Ok(Some(range.bytes))
    }
}

// ndpak-parsers/src/pak/fixups.rs
//! Pointer fixup table.
//!
//! Every relative pointer stored in a page has one record naming the page
//! whose base it is relative to. Records are keyed by the absolute address
//! of the pointer field.

use std::collections::BTreeMap;

use serde::Serialize;

use super::pages::{PageTable, PAGE_HEADER_SIZE};
use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};

/// Rows in the fixed block at the start of the fixup table
pub const FIXUP_HEADER_ROWS: u64 = 8;
/// Size of the fixed block at the start of the fixup table
pub const FIXUP_HEADER_SIZE: u64 = FIXUP_HEADER_ROWS * 12;
/// First word after the fixed block in a file this tool already rewrote
pub const MODDED_MARKER: u32 = 0xFFFF_FFFF;
/// Size of one fixup record
pub const FIXUP_RECORD_SIZE: u64 = 8;

/// One fixup record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixupEntry {
    pub source_page: u16,
    pub target_page: u16,
    pub local_offset: u32,
    /// Absolute address of the `target_page` field of this record
    pub page_field_address: u64,
}

/// Address-keyed fixup records
#[derive(Debug, Clone, Default, Serialize)]
pub struct PointerFixupTable {
    /// Row 0 of the fixed block: `(pageEntryNumber, dataOffset, count)`
    pub page_entry_number: u32,
    pub data_offset: u32,
    pub count: u32,
    entries: BTreeMap<u64, FixupEntry>,
}

impl PointerFixupTable {
    /// Read the table at `offset`
    pub fn read(data: &[u8], offset: u64, pages: &PageTable) -> ParseResult<Self> {
        let mut cursor = ByteCursor::at(data, offset);
        let page_entry_number = cursor.read_u32()?;
        let data_offset = cursor.read_u32()?;
        let count = cursor.read_u32()?;

        let mut entries = BTreeMap::new();
        cursor.seek(u64::from(data_offset));
        for _ in 0..count {
            let record_start = cursor.tell();
            let source_page = cursor.read_u16()?;
            let target_page = cursor.read_u16()?;
            let local_offset = cursor.read_u32()?;
            let address = u64::from(local_offset) + pages.base(usize::from(source_page))?;
            entries.insert(
                address,
                FixupEntry {
                    source_page,
                    target_page,
                    local_offset,
                    page_field_address: record_start + 2,
                },
            );
        }

        Ok(Self {
            page_entry_number,
            data_offset,
            count,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: u64) -> Option<&FixupEntry> {
        self.entries.get(&address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &FixupEntry)> {
        self.entries.iter()
    }

    /// Page a pointer at `address` is relative to
    pub fn target_page(&self, address: u64) -> Option<usize> {
        self.entries.get(&address).map(|e| usize::from(e.target_page))
    }

    /// Resolve the pointer stored at `address`.
    ///
    /// A stored value of zero or less is null unless `zero_is_valid`. A
    /// non-null pointer without a record is [`ParseError::UnfixedPointer`]
    /// unless `tolerant`, which logs and returns the raw stored value.
    pub fn resolve(
        &self,
        data: &[u8],
        address: u64,
        pages: &PageTable,
        zero_is_valid: bool,
        tolerant: bool,
    ) -> ParseResult<Option<u64>> {
        let stored = ByteCursor::new(data).read_i64_at(address)?;
        if stored <= 0 && !zero_is_valid {
            return Ok(None);
        }
        match self.entries.get(&address) {
            Some(entry) => {
                let base = pages.base(usize::from(entry.target_page))?;
                Ok(Some(base.wrapping_add_signed(stored)))
            }
            None if tolerant => {
                tracing::warn!(address = %format!("{address:#X}"), stored, "pointer has no fixup record; using raw offset");
                Ok(u64::try_from(stored).ok())
            }
            None => Err(ParseError::UnfixedPointer { address }),
        }
    }
}

/// Stored value that makes a pointer resolve to `local_offset` within
/// its page's content
pub fn redirected_value(local_offset: u64) -> u64 {
    local_offset + PAGE_HEADER_SIZE
}

#[cfg(test)]
mod test_fixups {
    use super::*;
    use crate::pak::pages::Page;

    /// Two pages at 0x40 and 0x80, table at 0x00 with one record
    fn sample() -> (Vec<u8>, PageTable) {
        let mut data = vec![0u8; 0xC0];
        // fixed block row 0: pageEntryNumber, dataOffset, count
        data[0..4].copy_from_slice(&0u32.to_le_bytes());
        data[4..8].copy_from_slice(&0x60u32.to_le_bytes());
        data[8..12].copy_from_slice(&1u32.to_le_bytes());
        // record at 0x60: pointer at page0+0x10 relative to page 1
        data[0x60..0x62].copy_from_slice(&0u16.to_le_bytes());
        data[0x62..0x64].copy_from_slice(&1u16.to_le_bytes());
        data[0x64..0x68].copy_from_slice(&0x10u32.to_le_bytes());
        // the pointer itself
        data[0x50..0x58].copy_from_slice(&0x24i64.to_le_bytes());
        let pages = PageTable::new(vec![
            Page { base: 0x40, size: 0x40, owner: 0 },
            Page { base: 0x80, size: 0x40, owner: 0 },
        ]);
        (data, pages)
    }

    #[test]
    fn test_resolve_adds_target_page_base() {
        let (data, pages) = sample();
        let table = PointerFixupTable::read(&data, 0, &pages).unwrap();
        let entry = table.get(0x50).unwrap();
        assert_eq!(entry.page_field_address, 0x62);
        assert_eq!(table.resolve(&data, 0x50, &pages, false, false).unwrap(), Some(0x80 + 0x24));
    }

    #[test]
    fn test_null_and_zero_valid() {
        let (mut data, pages) = sample();
        let table = PointerFixupTable::read(&data, 0, &pages).unwrap();
        data[0x50..0x58].copy_from_slice(&0i64.to_le_bytes());
        assert_eq!(table.resolve(&data, 0x50, &pages, false, false).unwrap(), None);
        assert_eq!(table.resolve(&data, 0x50, &pages, true, false).unwrap(), Some(0x80));
    }

    #[test]
    fn test_missing_record_is_an_error_unless_tolerant() {
        let (mut data, pages) = sample();
        let table = PointerFixupTable::read(&data, 0, &pages).unwrap();
        data[0x70..0x78].copy_from_slice(&0x30i64.to_le_bytes());
        assert!(matches!(
            table.resolve(&data, 0x70, &pages, false, false),
            Err(ParseError::UnfixedPointer { address: 0x70 })
        ));
        assert_eq!(table.resolve(&data, 0x70, &pages, false, true).unwrap(), Some(0x30));
    }

    #[test]
    fn test_redirected_value_skips_page_header() {
        assert_eq!(redirected_value(0), 20);
        assert_eq!(redirected_value(0x100), 0x114);
    }
}

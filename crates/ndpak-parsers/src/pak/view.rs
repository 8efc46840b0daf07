// ndpak-parsers/src/pak/view.rs
//! Borrowed view tying the raw bytes to the page and fixup tables.

use super::fixups::PointerFixupTable;
use super::header::Revision;
use super::pages::PageTable;
use crate::config::PakOptions;
use crate::cursor::{read_cstring, ByteCursor};
use crate::traits::{ParseError, ParseResult};

/// Everything a decoder needs to follow pointers in one container
#[derive(Clone, Copy)]
pub struct PakView<'a> {
    pub data: &'a [u8],
    pub pages: &'a PageTable,
    pub fixups: &'a PointerFixupTable,
    pub revision: Revision,
    pub options: &'a PakOptions,
}

impl<'a> PakView<'a> {
    pub fn cursor_at(&self, offset: u64) -> ByteCursor<'a> {
        ByteCursor::at(self.data, offset)
    }

    pub fn item_padding(&self) -> u64 {
        self.revision.item_padding()
    }

    pub fn raw_data_start(&self) -> u64 {
        self.pages.raw_data_start()
    }

    pub fn u8_at(&self, offset: u64) -> ParseResult<u8> {
        self.cursor_at(offset).read_u8()
    }

    pub fn u16_at(&self, offset: u64) -> ParseResult<u16> {
        self.cursor_at(offset).read_u16()
    }

    pub fn u32_at(&self, offset: u64) -> ParseResult<u32> {
        self.cursor_at(offset).read_u32()
    }

    pub fn i32_at(&self, offset: u64) -> ParseResult<i32> {
        self.cursor_at(offset).read_i32()
    }

    pub fn u64_at(&self, offset: u64) -> ParseResult<u64> {
        self.cursor_at(offset).read_u64()
    }

    pub fn f32_at(&self, offset: u64) -> ParseResult<f32> {
        self.cursor_at(offset).read_f32()
    }

    pub fn bytes_at(&self, offset: u64, len: usize) -> ParseResult<&'a [u8]> {
        self.cursor_at(offset).read_bytes(len)
    }

    /// Pointer at `address`; zero or negative is null
    pub fn ptr(&self, address: u64) -> ParseResult<Option<u64>> {
        self.fixups.resolve(self.data, address, self.pages, false, self.options.tolerant_pointers)
    }

    /// Pointer at `address` for tables where a stored zero is a real offset
    pub fn ptr_zero_valid(&self, address: u64) -> ParseResult<Option<u64>> {
        self.fixups.resolve(self.data, address, self.pages, true, self.options.tolerant_pointers)
    }

    /// Pointer that must not be null
    pub fn ptr_required(&self, address: u64, what: &str) -> ParseResult<u64> {
        self.ptr(address)?.ok_or_else(|| {
            ParseError::InvalidStructure(format!("{what} pointer at 0x{address:X} is null"))
        })
    }

    pub fn string_at(&self, offset: u64) -> ParseResult<String> {
        read_cstring(self.data, offset)
    }

    /// String behind the pointer at `address`, if non-null
    pub fn string_ptr(&self, address: u64) -> ParseResult<Option<String>> {
        self.ptr(address)?.map(|at| self.string_at(at)).transpose()
    }

    /// String whose page-relative offset is stored raw at `address`
    pub fn page_relative_string(&self, address: u64, page_base: u64) -> ParseResult<String> {
        let stored = self.u64_at(address)?;
        self.string_at(page_base + stored)
    }
}

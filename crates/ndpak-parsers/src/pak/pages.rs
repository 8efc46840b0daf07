// ndpak-parsers/src/pak/pages.rs
//! Page table: `(base, size, owner)` rows, one per page.

use serde::Serialize;

use crate::cursor::{ByteCursor, ByteWriter};
use crate::traits::{ParseError, ParseResult};

/// Bytes of page header before page content
pub const PAGE_HEADER_SIZE: u64 = 20;
/// Largest amount of content the mutator packs into one new page
pub const PAGE_CAPACITY: usize = 1_048_032;
/// Marker written at the start of every page
pub const NEW_PAGE_MARKER: u64 = 0xDEAD_BEEF_DEAD_BEEF;
/// Size of one page-table row
pub const PAGE_ROW_SIZE: u64 = 12;

/// One page-table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub base: u32,
    pub size: u32,
    pub owner: u32,
}

impl Page {
    pub fn end(&self) -> u64 {
        u64::from(self.base) + u64::from(self.size)
    }
}

/// Header at the start of every page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageHeader {
    pub marker: u64,
    pub size: u32,
    pub owner: u16,
    pub entry_count: u16,
}

impl PageHeader {
    pub fn read(data: &[u8], base: u64) -> ParseResult<Self> {
        let mut cursor = ByteCursor::at(data, base);
        let marker = cursor.read_u64()?;
        cursor.skip(4)?;
        Ok(Self {
            marker,
            size: cursor.read_u32()?,
            owner: cursor.read_u16()?,
            entry_count: cursor.read_u16()?,
        })
    }

    /// Header for a page appended by the mutator
    pub fn for_new_page(content_len: usize, owner: u16) -> Self {
        Self {
            marker: NEW_PAGE_MARKER,
            size: (content_len as u64 + PAGE_HEADER_SIZE) as u32,
            owner,
            entry_count: 0,
        }
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_u64(self.marker);
        writer.write_u32(0);
        writer.write_u32(self.size);
        writer.write_u16(self.owner);
        writer.write_u16(self.entry_count);
    }
}

/// Ordered page rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageTable {
    pages: Vec<Page>,
}

impl PageTable {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Read `count` rows at `offset`
    pub fn read(data: &[u8], offset: u64, count: u32) -> ParseResult<Self> {
        let mut cursor = ByteCursor::at(data, offset);
        let pages = (0..count)
            .map(|_| {
                Ok(Page {
                    base: cursor.read_u32()?,
                    size: cursor.read_u32()?,
                    owner: cursor.read_u32()?,
                })
            })
            .collect::<ParseResult<Vec<_>>>()?;
        if pages.is_empty() {
            return Err(ParseError::InvalidStructure("container has no pages".into()));
        }
        Ok(Self { pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Base offset of page `index`
    pub fn base(&self, index: usize) -> ParseResult<u64> {
        self.pages
            .get(index)
            .map(|p| u64::from(p.base))
            .ok_or_else(|| {
                ParseError::InvalidStructure(format!(
                    "page index {index} out of range ({} pages)",
                    self.pages.len()
                ))
            })
    }

    pub fn last(&self) -> Option<&Page> {
        self.pages.last()
    }

    /// Offset just past the last page, where raw texture data starts
    pub fn raw_data_start(&self) -> u64 {
        self.pages.last().map_or(0, Page::end)
    }

    /// Index of the page containing `address`
    pub fn page_of(&self, address: u64) -> Option<usize> {
        self.pages
            .iter()
            .position(|p| address >= u64::from(p.base) && address < p.end())
    }

    /// Append a page row; returns its index
    pub fn append(&mut self, page: Page) -> usize {
        self.pages.push(page);
        self.pages.len() - 1
    }

    /// Move every existing page forward by `delta` bytes
    pub fn shift(&mut self, delta: u32) {
        for page in &mut self.pages {
            page.base += delta;
        }
    }

    /// Serialize rows in table order
    pub fn write_rows(&self, writer: &mut ByteWriter) {
        for page in &self.pages {
            writer.write_u32(page.base);
            writer.write_u32(page.size);
            writer.write_u32(page.owner);
        }
    }
}

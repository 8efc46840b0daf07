// ndpak-parsers/src/inject/builder.rs
//! New-page accumulation, pointer redirection and the final flatten that
//! splices appended pages into the container.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::pak::fixups::{redirected_value, PointerFixupTable, FIXUP_HEADER_SIZE, MODDED_MARKER};
use crate::pak::header::field;
use crate::pak::pages::{Page, PageHeader, PageTable, PAGE_CAPACITY, PAGE_ROW_SIZE};
use crate::traits::{ParseError, ParseResult};

/// Where a relocated buffer landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Index of the new page in the final page table
    pub page: usize,
    /// Offset within the page content
    pub offset: u64,
}

/// Accumulates relocated buffers into pages of at most [`PAGE_CAPACITY`]
/// content bytes. A buffer never straddles two pages.
#[derive(Debug)]
pub struct PageBuilder {
    first_index: usize,
    current: ByteWriter,
    sealed: Vec<Vec<u8>>,
}

impl PageBuilder {
    /// `first_index` is the page-table index the first new page will take
    pub fn new(first_index: usize) -> Self {
        Self {
            first_index,
            current: ByteWriter::new(),
            sealed: Vec::new(),
        }
    }

    /// Append `bytes`, sealing the open page first if they would overflow it
    pub fn place(&mut self, bytes: &[u8]) -> Placement {
        if !self.current.is_empty() && self.current.len() + bytes.len() > PAGE_CAPACITY {
            self.seal();
        }
        self.current.seek_end();
        let offset = self.current.tell();
        self.current.write_bytes(bytes);
        Placement {
            page: self.first_index + self.sealed.len(),
            offset,
        }
    }

    /// Align the open page after a submesh's buffers
    pub fn end_submesh(&mut self) {
        if self.current.is_empty() {
            return;
        }
        self.current.pad_until(16, 0);
        self.current.write_zeros(12);
    }

    fn seal(&mut self) {
        let page = std::mem::take(&mut self.current);
        tracing::debug!(index = self.first_index + self.sealed.len(), bytes = page.len(), "sealed new page");
        self.sealed.push(page.into_inner());
    }

    pub fn sealed_count(&self) -> usize {
        self.sealed.len()
    }

    pub fn open_len(&self) -> usize {
        self.current.len()
    }

    /// Seal the open page, even when empty, and return every page
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.seal();
        self.sealed
    }
}

/// A pointer that must be re-aimed at a placed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    /// Absolute address of the pointer field
    pub address: u64,
    pub target: Placement,
}

/// Pending pointer rewrites, applied in one pass once every read is done
#[derive(Debug, Default)]
pub struct MutationLog {
    redirects: Vec<Redirect>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(&mut self, address: u64, target: Placement) {
        self.redirects.push(Redirect { address, target });
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }

    /// Rewrite each pointer value and the target page of its fixup record
    pub fn apply(&self, out: &mut ByteWriter, fixups: &PointerFixupTable) -> ParseResult<()> {
        for redirect in &self.redirects {
            let entry = fixups
                .get(redirect.address)
                .ok_or(ParseError::UnfixedPointer { address: redirect.address })?;
            let page = u16::try_from(redirect.target.page).map_err(|_| {
                ParseError::InvalidStructure(format!("page index {} does not fit a fixup record", redirect.target.page))
            })?;
            out.seek(redirect.address);
            out.write_u64(redirected_value(redirect.target.offset));
            out.seek(entry.page_field_address);
            out.write_u16(page);
        }
        Ok(())
    }
}

/// Sizes computed for a flatten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenLayout {
    pub new_pages: usize,
    /// Bytes of new page-table rows
    pub rows: u64,
    /// Alignment padding inserted after the fixup header block
    pub padding: u64,
    /// Amount every byte after the page table moves forward
    pub shift: u64,
    pub modded: bool,
}

impl FlattenLayout {
    pub fn compute(fixup_table: u64, new_pages: usize, modded: bool) -> Self {
        let block_end = fixup_table + FIXUP_HEADER_SIZE;
        let rows = PAGE_ROW_SIZE * new_pages as u64;
        let original_pad = 16 - block_end % 16;
        let padding = 16 - (block_end + rows + original_pad) % 16 + 16;
        Self {
            new_pages,
            rows,
            padding,
            shift: rows + padding,
            modded,
        }
    }
}

/// The container was already flattened by a previous injection
pub fn is_modded(data: &[u8]) -> ParseResult<bool> {
    let cursor = ByteCursor::new(data);
    let fixup_table = u64::from(cursor.read_u32_at(field::FIXUP_TABLE)?);
    Ok(cursor.read_u32_at(fixup_table + FIXUP_HEADER_SIZE).ok() == Some(MODDED_MARKER))
}

/// Splice `new_pages` into `data`.
///
/// Page-table rows are inserted in front of the fixup table, the table's
/// data offset and every existing page base move by the inserted amount,
/// and the pages themselves go between the last page and the raw data.
pub fn flatten(data: &[u8], new_pages: &[Vec<u8>]) -> ParseResult<(Vec<u8>, FlattenLayout)> {
    let cursor = ByteCursor::new(data);
    let page_count = cursor.read_u32_at(field::PAGE_COUNT)?;
    let page_table = u64::from(cursor.read_u32_at(field::PAGE_TABLE)?);
    let fixup_table = u64::from(cursor.read_u32_at(field::FIXUP_TABLE)?);
    if page_table + PAGE_ROW_SIZE * u64::from(page_count) != fixup_table {
        return Err(ParseError::InvalidStructure(format!(
            "page table at {page_table:#X} does not end at the fixup table ({fixup_table:#X})"
        )));
    }
    let modded = is_modded(data)?;
    let layout = FlattenLayout::compute(fixup_table, new_pages.len(), modded);
    let mut pages = PageTable::read(data, page_table, page_count)?;
    let raw_start = pages.raw_data_start();
    let owner = pages.last().map_or(0, |p| p.owner);
    let block_end = fixup_table + FIXUP_HEADER_SIZE;
    if raw_start < block_end || raw_start as usize > data.len() {
        return Err(ParseError::InvalidStructure(format!("page data end {raw_start:#X} is out of range")));
    }

    let mut contents: Vec<Vec<u8>> = Vec::with_capacity(new_pages.len());
    let mut rows = PageTable::default();
    let mut address = raw_start;
    for page in new_pages {
        let mut content = page.clone();
        while (address + layout.shift + content.len() as u64) % 16 != 12 {
            content.push(0);
        }
        let size = u64::from(PageHeader::for_new_page(content.len(), 0).size);
        rows.append(Page {
            base: to_u32(address + layout.shift)?,
            size: to_u32(size)?,
            owner,
        });
        address += size;
        contents.push(content);
    }

    let mut head = ByteWriter::from_vec(data[..block_end as usize].to_vec());
    head.seek(field::FIXUP_TABLE);
    head.write_u32(to_u32(fixup_table + layout.rows)?);
    head.seek(field::PAGE_COUNT);
    head.write_u32(page_count + new_pages.len() as u32);
    let data_offset = cursor.read_u32_at(fixup_table + 4)?;
    head.seek(fixup_table + 4);
    head.write_u32(to_u32(u64::from(data_offset) + layout.shift)?);
    let header_size = cursor.read_u32_at(field::HEADER_SIZE)?;
    head.seek(field::HEADER_SIZE);
    head.write_u32(to_u32(u64::from(header_size) + layout.shift)?);
    pages.shift(to_u32(layout.shift)?);
    head.seek(page_table);
    pages.write_rows(&mut head);
    let head = head.into_inner();

    let mut out = ByteWriter::from_vec(Vec::with_capacity(data.len() + layout.shift as usize + address as usize - raw_start as usize));
    out.write_bytes(&head[..fixup_table as usize]);
    rows.write_rows(&mut out);
    out.write_bytes(&head[fixup_table as usize..(fixup_table + PAGE_ROW_SIZE) as usize]);
    out.write_zeros((FIXUP_HEADER_SIZE - PAGE_ROW_SIZE) as usize);
    let pad_start = out.tell();
    out.write_zeros(layout.padding as usize);
    if !modded {
        out.seek(pad_start);
        out.write_u32(MODDED_MARKER);
        out.write_u32(page_count);
        out.seek_end();
    }
    out.write_bytes(&data[block_end as usize..raw_start as usize]);
    for (content, row) in contents.iter().zip(rows.iter()) {
        let owner = u16::try_from(row.owner).unwrap_or(u16::MAX);
        PageHeader::for_new_page(content.len(), owner).write(&mut out);
        out.write_bytes(content);
    }
    out.write_bytes(&data[raw_start as usize..]);

    tracing::info!(pages = new_pages.len(), shift = layout.shift, modded, "appended new pages");
    Ok((out.into_inner(), layout))
}

fn to_u32(value: u64) -> ParseResult<u32> {
    u32::try_from(value).map_err(|_| ParseError::InvalidStructure(format!("offset {value:#X} exceeds 32 bits")))
}

#[cfg(test)]
mod test_builder {
    use super::*;
    use crate::pak::fixups::FIXUP_RECORD_SIZE;
    use crate::pak::pages::PAGE_HEADER_SIZE;

    /// Header, two-row page table, fixup table with one record, two
    /// pages and four bytes of raw data
    fn container() -> Vec<u8> {
        let mut w = ByteWriter::new();
        let page_table = 0x30u64;
        let fixup_table = page_table + 2 * PAGE_ROW_SIZE;
        let records = fixup_table + FIXUP_HEADER_SIZE;
        let page0 = 0x100u32;
        w.write_u32(0xA79);
        w.write_u32(page0);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u32(2);
        w.write_u32(page_table as u32);
        w.write_u32(1);
        w.write_u32(fixup_table as u32);
        w.write_u32(4);
        w.seek(page_table);
        PageTable::new(vec![
            Page { base: page0, size: 0x40, owner: 0 },
            Page { base: page0 + 0x40, size: 0x40, owner: 3 },
        ])
        .write_rows(&mut w);
        w.write_u32(1);
        w.write_u32(records as u32);
        w.write_u32(1);
        w.seek(records);
        w.write_u16(0);
        w.write_u16(1);
        w.write_u32(24);
        assert!(records + FIXUP_RECORD_SIZE <= u64::from(page0));
        w.seek(u64::from(page0) + 24);
        w.write_u64(PAGE_HEADER_SIZE + 4);
        w.seek(u64::from(page0) + 0x80);
        w.write_bytes(&[0xAA, 0xBB, 0xCC, 0xDD]);
        w.into_inner()
    }

    #[test]
    fn test_page_split_on_overflow() {
        let mut pages = PageBuilder::new(5);
        let first = pages.place(&[1u8; 1000]);
        let second = pages.place(&vec![2u8; PAGE_CAPACITY]);
        assert_eq!(first, Placement { page: 5, offset: 0 });
        assert_eq!(second, Placement { page: 6, offset: 0 });
        let sealed = pages.finish();
        assert_eq!(sealed.len(), 2);
        assert_eq!(sealed[1].len(), PAGE_CAPACITY);
    }

    #[test]
    fn test_oversized_buffer_in_empty_page() {
        let mut pages = PageBuilder::new(0);
        let placed = pages.place(&vec![0u8; PAGE_CAPACITY + 16]);
        assert_eq!(placed.page, 0);
        assert_eq!(pages.sealed_count(), 0);
    }

    #[test]
    fn test_submesh_alignment() {
        let mut pages = PageBuilder::new(0);
        pages.place(&[1u8; 5]);
        pages.end_submesh();
        assert_eq!(pages.open_len(), 28);
        let next = pages.place(&[2u8; 4]);
        assert_eq!(next.offset, 28);
    }

    #[test]
    fn test_finish_always_seals() {
        assert_eq!(PageBuilder::new(0).finish(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_redirect_rewrites_value_and_page() {
        let data = container();
        let pages = PageTable::read(&data, 0x30, 2).unwrap();
        let fixups = PointerFixupTable::read(&data, 0x48, &pages).unwrap();
        let mut log = MutationLog::new();
        log.redirect(0x100 + 24, Placement { page: 2, offset: 0x30 });
        let mut out = ByteWriter::from_vec(data);
        log.apply(&mut out, &fixups).unwrap();
        let out = out.into_inner();
        let cursor = ByteCursor::new(&out);
        assert_eq!(cursor.read_u64_at(0x118).unwrap(), 0x30 + PAGE_HEADER_SIZE);
        assert_eq!(cursor.read_u16_at(0x48 + FIXUP_HEADER_SIZE + 2).unwrap(), 2);
    }

    #[test]
    fn test_redirect_without_fixup_fails() {
        let data = container();
        let pages = PageTable::read(&data, 0x30, 2).unwrap();
        let fixups = PointerFixupTable::read(&data, 0x48, &pages).unwrap();
        let mut log = MutationLog::new();
        log.redirect(0x108, Placement { page: 2, offset: 0 });
        let mut out = ByteWriter::from_vec(data);
        assert!(matches!(log.apply(&mut out, &fixups), Err(ParseError::UnfixedPointer { address: 0x108 })));
    }

    #[test]
    fn test_flatten_layout() {
        let data = container();
        let (out, layout) = flatten(&data, &[vec![7u8; 10]]).unwrap();
        // block ends at 0xA8: rows 12, original pad 8, (0xA8 + 12 + 8) % 16 = 12
        assert_eq!(layout.rows, 12);
        assert_eq!(layout.padding, 20);
        assert_eq!(layout.shift, 32);
        assert!(!layout.modded);

        let cursor = ByteCursor::new(&out);
        assert_eq!(cursor.read_u32_at(field::PAGE_COUNT).unwrap(), 3);
        assert_eq!(cursor.read_u32_at(field::FIXUP_TABLE).unwrap(), 0x48 + 12);
        assert_eq!(cursor.read_u32_at(field::HEADER_SIZE).unwrap(), 0x100 + 32);

        let pages = PageTable::read(&out, 0x30, 3).unwrap();
        assert_eq!(pages.get(0).unwrap().base, 0x100 + 32);
        assert_eq!(pages.get(1).unwrap().base, 0x140 + 32);
        let new_page = *pages.get(2).unwrap();
        assert_eq!(new_page.base, 0x180 + 32);
        assert_eq!(new_page.size, 12 + 20);
        assert_eq!(new_page.owner, 3);
        assert_eq!(new_page.end() % 16, 0);

        let fixup_table = 0x48 + 12;
        assert_eq!(cursor.read_u32_at(fixup_table + 4).unwrap(), 0xA8 + 32);
        assert_eq!(cursor.read_u32_at(fixup_table + FIXUP_HEADER_SIZE).unwrap(), MODDED_MARKER);
        assert_eq!(cursor.read_u32_at(fixup_table + FIXUP_HEADER_SIZE + 4).unwrap(), 2);

        let fixups = PointerFixupTable::read(&out, fixup_table, &pages).unwrap();
        let moved = fixups.resolve(&out, 0x100 + 32 + 24, &pages, false, false).unwrap();
        assert_eq!(moved, Some(0x140 + 32 + PAGE_HEADER_SIZE + 4));

        let header = PageHeader::read(&out, u64::from(new_page.base)).unwrap();
        assert_eq!(header.size, new_page.size);
        assert_eq!(&out[out.len() - 4..], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(is_modded(&out).unwrap());
    }

    #[test]
    fn test_reflatten_keeps_single_marker() {
        let (once, _) = flatten(&container(), &[vec![1u8; 8]]).unwrap();
        let (twice, layout) = flatten(&once, &[vec![2u8; 8]]).unwrap();
        assert!(layout.modded);
        let cursor = ByteCursor::new(&twice);
        assert_eq!(cursor.read_u32_at(field::PAGE_COUNT).unwrap(), 4);
        let fixup_table = u64::from(cursor.read_u32_at(field::FIXUP_TABLE).unwrap());
        assert_ne!(cursor.read_u32_at(fixup_table + FIXUP_HEADER_SIZE).unwrap(), MODDED_MARKER);
        let markers = twice
            .chunks_exact(4)
            .filter(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == MODDED_MARKER)
            .count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn test_flatten_rejects_gap_before_fixups() {
        let mut data = container();
        data[field::FIXUP_TABLE as usize] = 0x50;
        assert!(matches!(flatten(&data, &[vec![0u8; 4]]), Err(ParseError::InvalidStructure(_))));
    }
}

// ndpak-parsers/src/pak/header.rs
//! Fixed container header and revision detection.

use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};

/// Magic values accepted at offset 0
pub const LEGACY_MAGICS: [u32; 3] = [0xA79, 0x10A79, 0x8000_0A79];
/// Magic values of the hashed-login layout
pub const HASHED_MAGICS: [u32; 2] = [0xA7D, 0x10A7D];

/// Login-table marker identifying the quantized-stream layout
pub const TLOU2_LOGIN_MARKER: u32 = 0x12345;

/// Byte offsets of the header fields that the mutator rewrites
pub mod field {
    pub const HEADER_SIZE: u64 = 0x04;
    pub const PAGE_COUNT: u64 = 0x10;
    pub const PAGE_TABLE: u64 = 0x14;
    pub const FIXUP_TABLE: u64 = 0x1C;
    pub const RAW_DATA_SIZE: u64 = 0x20;
}

/// Format revision, chosen once at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Revision {
    /// Page-header resource directory, fixed-stride streams
    Legacy,
    /// Page-header directory, quantized streams and 176-byte new-style submeshes
    Tlou2,
    /// Hashed login table, quantized streams
    Tloup1,
}

impl Revision {
    /// Size of the common resource-item header that precedes every body
    pub fn item_padding(self) -> u64 {
        match self {
            Revision::Legacy => 32,
            Revision::Tlou2 | Revision::Tloup1 => 48,
        }
    }

    /// Uses the 64-byte quantized stream descriptor and new submesh layout
    pub fn is_quantized(self) -> bool {
        !matches!(self, Revision::Legacy)
    }

    /// Geometry injection here is untested on real files; textures are the usual edit
    pub fn mesh_injection_unverified(self) -> bool {
        matches!(self, Revision::Tlou2)
    }
}

/// Container header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PakHeader {
    pub magic: u32,
    pub header_size: u32,
    pub login_page: u32,
    pub login_offset: u32,
    pub page_count: u32,
    pub page_table_offset: u32,
    pub fixup_page_count: u32,
    pub fixup_table_offset: u32,
    pub raw_data_size: u32,
    pub reserved: Vec<u32>,
}

impl PakHeader {
    /// Read and validate the header at offset 0
    pub fn read(data: &[u8]) -> ParseResult<Self> {
        let mut cursor = ByteCursor::new(data);
        let magic = cursor.read_u32()?;
        if !Self::is_known_magic(magic) {
            return Err(ParseError::UnrecognizedMagic { found: magic });
        }
        let hashed = HASHED_MAGICS.contains(&magic);

        let header = Self {
            magic,
            header_size: cursor.read_u32()?,
            login_page: cursor.read_u32()?,
            login_offset: cursor.read_u32()?,
            page_count: cursor.read_u32()?,
            page_table_offset: cursor.read_u32()?,
            fixup_page_count: cursor.read_u32()?,
            fixup_table_offset: cursor.read_u32()?,
            raw_data_size: cursor.read_u32()?,
            reserved: {
                let extra = if hashed { 5 } else { 2 };
                (0..extra).map(|_| cursor.read_u32()).collect::<ParseResult<_>>()?
            },
        };
        Ok(header)
    }

    pub fn is_known_magic(magic: u32) -> bool {
        LEGACY_MAGICS.contains(&magic) || HASHED_MAGICS.contains(&magic)
    }

    /// Resource items are found through the hashed login table
    pub fn uses_hashed_login(&self) -> bool {
        HASHED_MAGICS.contains(&self.magic)
    }

    /// Pick the revision once the login item address is known
    pub fn detect_revision(&self, data: &[u8], login_item: u64) -> ParseResult<Revision> {
        if self.uses_hashed_login() {
            return Ok(Revision::Tloup1);
        }
        let marker = ByteCursor::new(data).read_u32_at(login_item + 32)?;
        Ok(if marker == TLOU2_LOGIN_MARKER {
            Revision::Tlou2
        } else {
            Revision::Legacy
        })
    }
}

/// One row of the login table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoginEntry {
    pub page: u32,
    pub offset: u32,
}

/// Read the login table at `login_item + item_padding`
pub fn read_login_table(data: &[u8], login_item: u64, revision: Revision) -> ParseResult<Vec<LoginEntry>> {
    let mut cursor = ByteCursor::at(data, login_item + revision.item_padding());
    let count = cursor.read_u32()?;
    cursor.skip(4)?;
    (0..count)
        .map(|_| {
            Ok(LoginEntry {
                page: cursor.read_u32()?,
                offset: cursor.read_u32()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod test_header {
    use super::*;

    fn header_bytes(magic: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [magic, 0x40, 0, 0, 1, 0x30, 8, 0x3C, 0, 0, 0, 0, 0, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_reads_legacy_header() {
        let header = PakHeader::read(&header_bytes(0xA79)).unwrap();
        assert_eq!(header.page_count, 1);
        assert_eq!(header.fixup_table_offset, 0x3C);
        assert_eq!(header.reserved.len(), 2);
        assert!(!header.uses_hashed_login());
    }

    #[test]
    fn test_hashed_header_has_extra_words() {
        let header = PakHeader::read(&header_bytes(0x10A7D)).unwrap();
        assert_eq!(header.reserved.len(), 5);
        assert!(header.uses_hashed_login());
        assert_eq!(header.detect_revision(&[], 0).unwrap(), Revision::Tloup1);
    }

    #[test]
    fn test_rejects_unknown_magic() {
        assert!(matches!(
            PakHeader::read(&header_bytes(0x1234)),
            Err(ParseError::UnrecognizedMagic { found: 0x1234 })
        ));
    }

    #[test]
    fn test_revision_detection() {
        let header = PakHeader::read(&header_bytes(0xA79)).unwrap();
        let mut data = vec![0u8; 64];
        assert_eq!(header.detect_revision(&data, 0).unwrap(), Revision::Legacy);
        data[32..36].copy_from_slice(&TLOU2_LOGIN_MARKER.to_le_bytes());
        assert_eq!(header.detect_revision(&data, 0).unwrap(), Revision::Tlou2);
        assert_eq!(Revision::Tlou2.item_padding(), 48);
        assert!(Revision::Tlou2.mesh_injection_unverified());
        assert!(!Revision::Legacy.mesh_injection_unverified());
        assert!(!Revision::Tloup1.mesh_injection_unverified());
    }
}

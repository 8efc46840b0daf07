// ndpak-parsers/src/cursor.rs
//! Bounds-checked little-endian reader and growable writer.
//!
//! Every read is checked against the buffer length and fails with
//! [`ParseError::TruncatedData`]. The reader carries a separate bit cursor
//! for packed fields; byte reads are refused until it is back on a byte
//! boundary.

use byteorder::{ByteOrder, LittleEndian};
use half::f16;

use crate::traits::{ParseError, ParseResult};

/// Position-tracking reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    bit_pos: u8,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, bit_pos: 0 }
    }

    /// Reader positioned at `pos`
    pub fn at(data: &'a [u8], pos: u64) -> Self {
        let mut cursor = Self::new(data);
        cursor.seek(pos);
        cursor
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    /// Move to an absolute position. Resets the bit cursor.
    pub fn seek(&mut self, pos: u64) {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX);
        self.bit_pos = 0;
    }

    pub fn skip(&mut self, count: u64) -> ParseResult<()> {
        self.ensure_aligned()?;
        self.check(self.pos as u64, count)?;
        self.pos += count as usize;
        Ok(())
    }

    fn check(&self, offset: u64, wanted: u64) -> ParseResult<()> {
        let len = self.data.len() as u64;
        match offset.checked_add(wanted) {
            Some(end) if end <= len => Ok(()),
            _ => Err(ParseError::TruncatedData { offset, wanted, len }),
        }
    }

    fn ensure_aligned(&self) -> ParseResult<()> {
        if self.bit_pos == 0 {
            Ok(())
        } else {
            Err(ParseError::MisalignedBitRead {
                offset: self.pos as u64,
                bits: self.bit_pos,
            })
        }
    }

    /// Borrow `count` bytes at the cursor and advance
    pub fn read_bytes(&mut self, count: usize) -> ParseResult<&'a [u8]> {
        self.ensure_aligned()?;
        self.check(self.pos as u64, count as u64)?;
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> ParseResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> ParseResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> ParseResult<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> ParseResult<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> ParseResult<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> ParseResult<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_i64(&mut self) -> ParseResult<i64> {
        Ok(LittleEndian::read_i64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> ParseResult<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f16(&mut self) -> ParseResult<f32> {
        Ok(f16::from_bits(self.read_u16()?).to_f32())
    }

    pub fn read_f32x3(&mut self) -> ParseResult<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    pub fn read_f32x4(&mut self) -> ParseResult<[f32; 4]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Read `count` bits, least significant bit first.
    ///
    /// A run that ends exactly on a byte boundary leaves the cursor
    /// byte-aligned again.
    pub fn read_bits(&mut self, count: u8) -> ParseResult<u32> {
        if count > 32 {
            return Err(ParseError::InvalidStructure(format!(
                "cannot read {count} bits into a u32"
            )));
        }
        let mut value = 0u64;
        for i in 0..count {
            self.check(self.pos as u64, 1)?;
            let bit = (self.data[self.pos] >> self.bit_pos) & 1;
            value |= u64::from(bit) << i;
            self.bit_pos += 1;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.pos += 1;
            }
        }
        Ok(value as u32)
    }

    /// Discard pending bits and move to the next byte boundary
    pub fn align_to_byte(&mut self) {
        if self.bit_pos != 0 {
            self.bit_pos = 0;
            self.pos += 1;
        }
    }

    /// Null-terminated string at an absolute offset (lossy UTF-8).
    /// The cursor position is not changed.
    pub fn read_cstring_at(&self, offset: u64) -> ParseResult<String> {
        read_cstring(self.data, offset)
    }

    pub fn read_u16_at(&self, offset: u64) -> ParseResult<u16> {
        ByteCursor::at(self.data, offset).read_u16()
    }

    pub fn read_u32_at(&self, offset: u64) -> ParseResult<u32> {
        ByteCursor::at(self.data, offset).read_u32()
    }

    pub fn read_i32_at(&self, offset: u64) -> ParseResult<i32> {
        ByteCursor::at(self.data, offset).read_i32()
    }

    pub fn read_u64_at(&self, offset: u64) -> ParseResult<u64> {
        ByteCursor::at(self.data, offset).read_u64()
    }

    pub fn read_i64_at(&self, offset: u64) -> ParseResult<i64> {
        ByteCursor::at(self.data, offset).read_i64()
    }
}

/// Null-terminated string at `offset`; runs to the end of `data` when no
/// terminator is present
pub fn read_cstring(data: &[u8], offset: u64) -> ParseResult<String> {
    let len = data.len() as u64;
    if offset >= len {
        return Err(ParseError::TruncatedData { offset, wanted: 1, len });
    }
    let start = offset as usize;
    let end = data[start..]
        .iter()
        .position(|&b| b == 0)
        .map_or(data.len(), |p| start + p);
    Ok(String::from_utf8_lossy(&data[start..end]).into_owned())
}

/// Growable little-endian writer.
///
/// Writing past the end extends the buffer; seeking past the end and
/// writing zero-fills the gap.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
    pos: usize,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos as usize;
    }

    pub fn seek_end(&mut self) {
        self.pos = self.data.len();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_f16(&mut self, v: f32) {
        self.write_u16(f16::from_f32(v).to_bits());
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.write_bytes(&vec![0u8; count]);
    }

    /// Zero-pad until `len % modulus == remainder`
    pub fn pad_until(&mut self, modulus: usize, remainder: usize) {
        self.seek_end();
        while self.data.len() % modulus != remainder % modulus {
            self.write_u8(0);
        }
    }
}

/// Packs fields least significant bit first, the layout
/// [`ByteCursor::read_bits`] reads
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    acc: u64,
    used: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `count` bits of `value`
    pub fn write_bits(&mut self, value: u32, count: u8) {
        let count = u32::from(count.min(32));
        if count == 0 {
            return;
        }
        let mask = (1u64 << count) - 1;
        self.acc |= (u64::from(value) & mask) << self.used;
        self.used += count;
        while self.used >= 8 {
            self.data.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.used -= 8;
        }
    }

    /// Flush a partial byte and return the packed bytes
    pub fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.data.push((self.acc & 0xFF) as u8);
        }
        self.data
    }
}

#[cfg(test)]
mod test_cursor {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reads_little_endian() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xFF, 0xFF];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(cursor.read_u16().unwrap(), 0xFFFF);
        assert_eq!(cursor.tell(), 6);
    }

    #[test]
    fn test_out_of_range_is_truncated_data() {
        let data = [1u8, 2, 3];
        let mut cursor = ByteCursor::new(&data);
        match cursor.read_u32() {
            Err(ParseError::TruncatedData { offset, wanted, len }) => {
                assert_eq!((offset, wanted, len), (0, 4, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(cursor.read_u64_at(u64::MAX - 2).is_err());
    }

    #[test]
    fn test_bits_are_lsb_first() {
        let data = [0b1010_0011, 0x7F];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_bits(4).unwrap(), 0b0011);
        assert_eq!(cursor.read_bits(4).unwrap(), 0b1010);
        assert_eq!(cursor.read_u8().unwrap(), 0x7F);
    }

    #[test]
    fn test_byte_read_refused_mid_byte() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data);
        cursor.read_bits(3).unwrap();
        assert!(matches!(cursor.read_u8(), Err(ParseError::MisalignedBitRead { bits: 3, .. })));
        cursor.align_to_byte();
        assert_eq!(cursor.tell(), 1);
        assert!(cursor.read_u8().is_ok());
    }

    #[test]
    fn test_seek_resets_bit_cursor() {
        let data = [0xFFu8; 2];
        let mut cursor = ByteCursor::new(&data);
        cursor.read_bits(5).unwrap();
        cursor.seek(1);
        assert_eq!(cursor.read_u8().unwrap(), 0xFF);
    }

    #[test]
    fn test_cstring_at() {
        let data = b"xxbone_root\0tail";
        let cursor = ByteCursor::new(data);
        assert_eq!(cursor.read_cstring_at(2).unwrap(), "bone_root");
        assert_eq!(cursor.read_cstring_at(12).unwrap(), "tail");
        assert!(cursor.read_cstring_at(99).is_err());
    }

    #[test]
    fn test_bit_writer_matches_reader() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0x3FF, 10);
        writer.write_bits(7, 3);
        let bytes = writer.finish();
        assert_eq!(bytes.len(), 2);
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(cursor.read_bits(3).unwrap(), 0b101);
        assert_eq!(cursor.read_bits(10).unwrap(), 0x3FF);
        assert_eq!(cursor.read_bits(3).unwrap(), 7);
    }

    #[test]
    fn test_half_float() {
        let data = 0x3C00u16.to_le_bytes();
        assert_eq!(ByteCursor::new(&data).read_f16().unwrap(), 1.0);
    }

    #[test]
    fn test_writer_grows_and_pads() {
        let mut writer = ByteWriter::new();
        writer.seek(4);
        writer.write_u32(0xDEAD_BEEF);
        assert_eq!(writer.len(), 8);
        assert_eq!(&writer.as_slice()[..4], &[0, 0, 0, 0]);
        writer.pad_until(16, 12);
        assert_eq!(writer.len(), 12);
        writer.seek(0);
        writer.write_u8(9);
        assert_eq!(writer.len(), 12);
    }

    proptest! {
        #[test]
        fn test_bit_fields_round_trip(fields in proptest::collection::vec((1u8..=16, any::<u32>()), 1..12)) {
            let mut packed = Vec::new();
            let mut acc = 0u64;
            let mut used = 0u32;
            let mut expected = Vec::new();
            for (width, raw) in &fields {
                let value = u64::from(*raw) & ((1u64 << width) - 1);
                expected.push(value as u32);
                acc |= value << used;
                used += u32::from(*width);
                while used >= 8 {
                    packed.push((acc & 0xFF) as u8);
                    acc >>= 8;
                    used -= 8;
                }
            }
            if used > 0 {
                packed.push((acc & 0xFF) as u8);
            }
            let mut cursor = ByteCursor::new(&packed);
            for ((width, _), want) in fields.iter().zip(expected) {
                prop_assert_eq!(cursor.read_bits(*width).unwrap(), want);
            }
        }
    }
}

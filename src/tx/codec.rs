//! Little-endian binary reader and writer with variable-length integers.

use crate::types::{KazeError, KazeResult};

/// Upper bound accepted for any length prefix.
const MAX_VAR_LEN: u64 = 0x0100_0000;

#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `<0xfd` → 1 byte; `0xfd` + u16; `0xfe` + u32; `0xff` + u64.
    pub fn write_var_int(&mut self, v: u64) {
        if v < 0xfd {
            self.write_u8(v as u8);
        } else if v <= 0xffff {
            self.write_u8(0xfd);
            self.write_u16(v as u16);
        } else if v <= 0xffff_ffff {
            self.write_u8(0xfe);
            self.write_u32(v as u32);
        } else {
            self.write_u8(0xff);
            self.write_u64(v);
        }
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_var_int(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    pub fn write_var_string(&mut self, s: &str) {
        self.write_var_bytes(s.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a byte slice. Every read is bounds-checked.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> KazeResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(KazeError::MalformedWire(format!(
                "needed {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> KazeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> KazeResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> KazeResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> KazeResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> KazeResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> KazeResult<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Reads a varint, rejecting non-minimal encodings.
    pub fn read_var_int(&mut self) -> KazeResult<u64> {
        let offset = self.pos;
        let (value, min) = match self.read_u8()? {
            0xfd => (self.read_u16()? as u64, 0xfd),
            0xfe => (self.read_u32()? as u64, 0x1_0000),
            0xff => (self.read_u64()?, 0x1_0000_0000),
            b => return Ok(b as u64),
        };
        if value < min {
            return Err(KazeError::MalformedWire(format!(
                "non-canonical varint {} at offset {}",
                value, offset
            )));
        }
        Ok(value)
    }

    /// A varint count, bounded by what could possibly remain in the buffer.
    pub fn read_length(&mut self) -> KazeResult<usize> {
        let len = self.read_var_int()?;
        if len > MAX_VAR_LEN || len as usize > self.remaining() {
            return Err(KazeError::MalformedWire(format!(
                "length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        Ok(len as usize)
    }

    pub fn read_var_bytes(&mut self) -> KazeResult<&'a [u8]> {
        let len = self.read_length()?;
        self.read_bytes(len)
    }

    pub fn read_var_string(&mut self) -> KazeResult<String> {
        let bytes = self.read_var_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| KazeError::MalformedWire("string is not valid UTF-8".to_string()))
    }
}

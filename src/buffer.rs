//! Fixed-size octet buffers with typed access.
//!
//! A [`BufferData`] is a byte array with an internal cursor and an
//! endianness flag. Reads and writes happen either at the cursor (which then
//! advances) or at an explicit absolute offset. Out-of-range access never
//! panics; it reports an [`ErrorValue`] of kind `OutOfRange` that host
//! functions push back to the script.

use std::fmt;

use crate::value::ErrorValue;

/// Byte order for multi-byte buffer access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    Big,
    Little,
}

/// A fixed-size byte buffer with a cursor and byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferData {
    data: Vec<u8>,
    cursor: usize,
    order: Endianness,
}

impl BufferData {
    /// Allocate a zero-filled buffer of `size` bytes.
    pub fn new(size: usize, order: Endianness) -> Self {
        Self {
            data: vec![0; size],
            cursor: 0,
            order,
        }
    }

    /// Wrap existing bytes. The cursor starts at zero, big-endian.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            cursor: 0,
            order: Endianness::Big,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn order(&self) -> Endianness {
        self.order
    }

    pub fn set_order(&mut self, order: Endianness) {
        self.order = order;
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Move the cursor. Positions up to and including the buffer length are
    /// valid (a cursor at the end means "fully consumed").
    pub fn set_position(&mut self, position: usize) -> Result<(), ErrorValue> {
        if position > self.data.len() {
            return Err(ErrorValue::out_of_range(format!(
                "position {} exceeds buffer length {}",
                position,
                self.data.len()
            )));
        }
        self.cursor = position;
        Ok(())
    }

    /// Resolve an access of `size` bytes at `at` (or the cursor), advancing
    /// the cursor for cursor-relative access. Returns the start offset.
    fn span(&mut self, at: Option<usize>, size: usize) -> Result<usize, ErrorValue> {
        let start = at.unwrap_or(self.cursor);
        let end = start.checked_add(size).ok_or_else(|| {
            ErrorValue::out_of_range(format!("offset {} + {} overflows", start, size))
        })?;
        if end > self.data.len() {
            return Err(ErrorValue::out_of_range(format!(
                "access of {} bytes at offset {} exceeds buffer length {}",
                size,
                start,
                self.data.len()
            )));
        }
        if at.is_none() {
            self.cursor = end;
        }
        Ok(start)
    }

    fn read_raw<const N: usize>(&mut self, at: Option<usize>) -> Result<[u8; N], ErrorValue> {
        let start = self.span(at, N)?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.data[start..start + N]);
        if self.order == Endianness::Little {
            raw.reverse();
        }
        Ok(raw)
    }

    fn write_raw<const N: usize>(
        &mut self,
        at: Option<usize>,
        mut raw: [u8; N],
    ) -> Result<(), ErrorValue> {
        let start = self.span(at, N)?;
        if self.order == Endianness::Little {
            raw.reverse();
        }
        self.data[start..start + N].copy_from_slice(&raw);
        Ok(())
    }

    // -- Typed access. `at = None` reads at the cursor and advances it. ----

    pub fn read_i8(&mut self, at: Option<usize>) -> Result<i8, ErrorValue> {
        self.read_raw::<1>(at).map(|b| b[0] as i8)
    }

    pub fn read_u8(&mut self, at: Option<usize>) -> Result<u8, ErrorValue> {
        self.read_raw::<1>(at).map(|b| b[0])
    }

    pub fn read_i16(&mut self, at: Option<usize>) -> Result<i16, ErrorValue> {
        self.read_raw(at).map(i16::from_be_bytes)
    }

    pub fn read_u16(&mut self, at: Option<usize>) -> Result<u16, ErrorValue> {
        self.read_raw(at).map(u16::from_be_bytes)
    }

    pub fn read_i32(&mut self, at: Option<usize>) -> Result<i32, ErrorValue> {
        self.read_raw(at).map(i32::from_be_bytes)
    }

    pub fn read_i64(&mut self, at: Option<usize>) -> Result<i64, ErrorValue> {
        self.read_raw(at).map(i64::from_be_bytes)
    }

    pub fn read_f32(&mut self, at: Option<usize>) -> Result<f32, ErrorValue> {
        self.read_raw(at).map(f32::from_be_bytes)
    }

    pub fn read_f64(&mut self, at: Option<usize>) -> Result<f64, ErrorValue> {
        self.read_raw(at).map(f64::from_be_bytes)
    }

    /// Read `len` bytes as UTF-8 text; invalid sequences are replaced.
    pub fn read_str(&mut self, at: Option<usize>, len: usize) -> Result<String, ErrorValue> {
        let start = self.span(at, len)?;
        Ok(String::from_utf8_lossy(&self.data[start..start + len]).into_owned())
    }

    pub fn write_i8(&mut self, at: Option<usize>, v: i8) -> Result<(), ErrorValue> {
        self.write_raw(at, [v as u8])
    }

    pub fn write_u8(&mut self, at: Option<usize>, v: u8) -> Result<(), ErrorValue> {
        self.write_raw(at, [v])
    }

    pub fn write_i16(&mut self, at: Option<usize>, v: i16) -> Result<(), ErrorValue> {
        self.write_raw(at, v.to_be_bytes())
    }

    pub fn write_u16(&mut self, at: Option<usize>, v: u16) -> Result<(), ErrorValue> {
        self.write_raw(at, v.to_be_bytes())
    }

    pub fn write_i32(&mut self, at: Option<usize>, v: i32) -> Result<(), ErrorValue> {
        self.write_raw(at, v.to_be_bytes())
    }

    pub fn write_i64(&mut self, at: Option<usize>, v: i64) -> Result<(), ErrorValue> {
        self.write_raw(at, v.to_be_bytes())
    }

    pub fn write_f32(&mut self, at: Option<usize>, v: f32) -> Result<(), ErrorValue> {
        self.write_raw(at, v.to_be_bytes())
    }

    pub fn write_f64(&mut self, at: Option<usize>, v: f64) -> Result<(), ErrorValue> {
        self.write_raw(at, v.to_be_bytes())
    }

    /// Write a string's UTF-8 bytes. The whole string must fit.
    pub fn write_str(&mut self, at: Option<usize>, s: &str) -> Result<(), ErrorValue> {
        let bytes = s.as_bytes();
        let start = self.span(at, bytes.len())?;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl fmt::Display for BufferData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer[{}]", self.data.len())
    }
}

//! Byte cursor for walking a buffered WSI file.
//!
//! Every read is checked against the end of the buffer and fails with
//! [`WsiError::UnexpectedEnd`] instead of running off the data.

use crate::error::{WsiError, WsiResult};

/// First byte of a flag sequence.
pub const FLAG1: u8 = 0x00;
/// Second byte of a flag sequence.
pub const FLAG2: u8 = 0xF0;
/// Control byte marking a preceding `FLAG1 FLAG2` pair as image data.
pub const BIN_FLAG: u8 = 0x00;

/// A bounds-checked byte reader over a WSI file buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    /// The underlying byte data
    data: &'a [u8],
    /// Current byte position
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a new cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn end_error(&self) -> WsiError {
        WsiError::UnexpectedEnd { position: self.pos }
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::UnexpectedEnd` if the cursor is at the end of data.
    pub fn read_u8(&mut self) -> WsiResult<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a little-endian 16-bit value.
    pub fn read_u16_le(&mut self) -> WsiResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::UnexpectedEnd` if fewer than `n` bytes remain; the
    /// cursor is left unchanged in that case.
    pub fn read_bytes(&mut self, n: usize) -> WsiResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.end_error())?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> WsiResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.end_error())
    }

    /// Advances past `n` bytes.
    pub fn skip(&mut self, n: usize) -> WsiResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Inspects the bytes at the cursor for a flag sequence.
    ///
    /// Returns `Some(control)` when the next two bytes are `FLAG1 FLAG2`,
    /// where `control` is the byte that follows them, and `None` otherwise.
    /// Nothing is consumed.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::UnexpectedEnd` if a flag pair sits at the very end
    /// of the buffer with no control byte after it.
    pub fn peek_flag(&self) -> WsiResult<Option<u8>> {
        let rest = &self.data[self.pos..];
        match rest {
            [FLAG1, FLAG2, control, ..] => Ok(Some(*control)),
            [FLAG1, FLAG2] => Err(WsiError::UnexpectedEnd {
                position: self.data.len(),
            }),
            _ => Ok(None),
        }
    }

    /// Returns true if the cursor sits on a segment flag, i.e. a flag pair
    /// whose control byte is not [`BIN_FLAG`].
    pub fn at_segment_flag(&self) -> WsiResult<bool> {
        Ok(matches!(self.peek_flag()?, Some(control) if control != BIN_FLAG))
    }

    /// Advances to the next segment flag and returns the bytes skipped.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::UnexpectedEnd` if no segment flag follows.
    pub fn skip_to_segment_flag(&mut self) -> WsiResult<&'a [u8]> {
        let start = self.pos;
        while !self.at_segment_flag()? {
            if self.pos >= self.data.len() {
                return Err(self.end_error());
            }
            self.pos += 1;
        }
        Ok(&self.data[start..self.pos])
    }

    /// Returns true if more bytes are available.
    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Returns the current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns the total number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u8_and_end() {
        let data = [0x12, 0x34];
        let mut cur = ByteCursor::new(&data);

        assert_eq!(cur.read_u8().unwrap(), 0x12);
        assert_eq!(cur.read_u8().unwrap(), 0x34);
        assert!(!cur.has_more());
        assert!(matches!(
            cur.read_u8(),
            Err(WsiError::UnexpectedEnd { position: 2 })
        ));
    }

    #[test]
    fn test_read_u16_little_endian() {
        let data = [0x05, 0x01];
        let mut cur = ByteCursor::new(&data);

        assert_eq!(cur.read_u16_le().unwrap(), 0x0105);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_read_bytes_past_end_leaves_cursor() {
        let data = [1, 2, 3];
        let mut cur = ByteCursor::new(&data);

        cur.skip(1).unwrap();
        assert!(cur.read_bytes(3).is_err());
        assert_eq!(cur.position(), 1);
        assert_eq!(cur.read_bytes(2).unwrap(), &[2, 3]);
    }

    #[test]
    fn test_peek_flag() {
        let data = [FLAG1, FLAG2, 0x0C];
        let cur = ByteCursor::new(&data);
        assert_eq!(cur.peek_flag().unwrap(), Some(0x0C));
        assert!(cur.at_segment_flag().unwrap());

        let stuffed = [FLAG1, FLAG2, BIN_FLAG];
        let cur = ByteCursor::new(&stuffed);
        assert_eq!(cur.peek_flag().unwrap(), Some(BIN_FLAG));
        assert!(!cur.at_segment_flag().unwrap());

        let plain = [0x12, FLAG2, 0x0C];
        assert_eq!(ByteCursor::new(&plain).peek_flag().unwrap(), None);
    }

    #[test]
    fn test_peek_flag_truncated() {
        let data = [FLAG1, FLAG2];
        let cur = ByteCursor::new(&data);
        assert!(matches!(
            cur.peek_flag(),
            Err(WsiError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_skip_to_segment_flag_ignores_stuffed_pair() {
        let data = [b'a', FLAG1, FLAG2, BIN_FLAG, b'b', FLAG1, FLAG2, 0x02];
        let mut cur = ByteCursor::new(&data);

        let skipped = cur.skip_to_segment_flag().unwrap();
        assert_eq!(skipped.len(), 5);
        assert_eq!(cur.position(), 5);
    }

    #[test]
    fn test_skip_to_segment_flag_without_flag() {
        let data = [b'a', b'b', b'c'];
        let mut cur = ByteCursor::new(&data);
        assert!(matches!(
            cur.skip_to_segment_flag(),
            Err(WsiError::UnexpectedEnd { position: 3 })
        ));
    }
}

//! A bounds-checked cursor over untrusted binary input.
//!
//! All multi-byte reads are big-endian, as every structure this library
//! parses (authenticator data, TPM structures, the credential storage
//! format) is defined in network byte order.

use crate::error::{WebauthnError, WebauthnResult};

/// A forward-only reader over a borrowed byte slice. Every read is
/// bounds-checked and yields `ParseInsufficientBytesAvailable` rather
/// than panicking when the input is truncated.
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryCursor<'a> {
    /// Begin reading from the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        BinaryCursor { data, pos: 0 }
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read(&mut self, len: usize) -> WebauthnResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(WebauthnError::ParseInsufficientBytesAvailable)?;
        if end > self.data.len() {
            return Err(WebauthnError::ParseInsufficientBytesAvailable);
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> WebauthnResult<u8> {
        let b = self.read(1)?;
        Ok(b[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> WebauthnResult<u16> {
        let b = self.read(2)?;
        let arr: [u8; 2] = b
            .try_into()
            .map_err(|_| WebauthnError::ParseInsufficientBytesAvailable)?;
        Ok(u16::from_be_bytes(arr))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> WebauthnResult<u32> {
        let b = self.read(4)?;
        let arr: [u8; 4] = b
            .try_into()
            .map_err(|_| WebauthnError::ParseInsufficientBytesAvailable)?;
        Ok(u32::from_be_bytes(arr))
    }

    /// Read a big-endian u64.
    pub fn read_u64(&mut self) -> WebauthnResult<u64> {
        let b = self.read(8)?;
        let arr: [u8; 8] = b
            .try_into()
            .map_err(|_| WebauthnError::ParseInsufficientBytesAvailable)?;
        Ok(u64::from_be_bytes(arr))
    }

    /// Borrow everything that has not yet been read, advancing to the end.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// How many bytes remain unread.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::BinaryCursor;
    use crate::error::WebauthnError;

    #[test]
    fn cursor_reads_in_order() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut c = BinaryCursor::new(&data);
        assert_eq!(c.read_u8().unwrap(), 0x01);
        assert_eq!(c.read_u16().unwrap(), 0x0203);
        assert_eq!(c.read_u32().unwrap(), 0x0405_0607);
        assert_eq!(c.remaining(), 1);
        assert_eq!(c.read(1).unwrap(), &[0x08]);
        assert!(c.is_empty());
    }

    #[test]
    fn cursor_rejects_over_read() {
        let data = [0xff, 0xee];
        let mut c = BinaryCursor::new(&data);
        assert!(matches!(
            c.read_u32(),
            Err(WebauthnError::ParseInsufficientBytesAvailable)
        ));
        // A failed read does not consume input.
        assert_eq!(c.remaining(), 2);
        assert_eq!(c.read_u16().unwrap(), 0xffee);
        assert!(matches!(
            c.read_u8(),
            Err(WebauthnError::ParseInsufficientBytesAvailable)
        ));
    }

    #[test]
    fn cursor_read_remaining_drains() {
        let data = [0x0a, 0x0b, 0x0c];
        let mut c = BinaryCursor::new(&data);
        assert_eq!(c.read_u8().unwrap(), 0x0a);
        assert_eq!(c.read_remaining(), &[0x0b, 0x0c]);
        assert!(c.is_empty());
        assert_eq!(c.read_remaining(), &[] as &[u8]);
    }
}

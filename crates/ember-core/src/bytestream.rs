/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A simple cursor over an in-memory byte slice
//!
//! Decoders use this to walk segment headers, the entropy coded
//! data is handled by a dedicated bit reader in each decoder.

use core::fmt::{Debug, Formatter};

/// Errors raised by the byte reader
pub enum ZByteIoError {
    /// Requested bytes, bytes that were available
    NotEnoughBytes(usize, usize),
    Generic(&'static str)
}

impl Debug for ZByteIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ZByteIoError::NotEnoughBytes(expected, found) => {
                writeln!(f, "Not enough bytes, expected {expected} but found {found}")
            }
            ZByteIoError::Generic(err) => {
                writeln!(f, "Generic I/O error: {err}")
            }
        }
    }
}

impl core::fmt::Display for ZByteIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl std::error::Error for ZByteIoError {}

impl From<&'static str> for ZByteIoError {
    fn from(value: &'static str) -> Self {
        ZByteIoError::Generic(value)
    }
}

/// An encapsulation of a byte stream
///
/// The lifetime parameter is tied to the borrowed buffer, the reader
/// never copies the underlying data.
pub struct ZByteReader<'a> {
    stream:   &'a [u8],
    position: usize
}

impl<'a> ZByteReader<'a> {
    pub const fn new(buf: &'a [u8]) -> ZByteReader<'a> {
        ZByteReader {
            stream:   buf,
            position: 0
        }
    }

    /// Skip `bytes` ahead of the stream.
    ///
    /// Returns an error if that would move past the end, the position
    /// is left unchanged in that case.
    pub fn skip(&mut self, bytes: usize) -> Result<(), ZByteIoError> {
        let remaining = self.remaining();

        if bytes > remaining {
            return Err(ZByteIoError::NotEnoughBytes(bytes, remaining));
        }
        self.position += bytes;
        Ok(())
    }

    /// Move back `bytes` in the stream, saturating at the start
    pub fn rewind(&mut self, bytes: usize) {
        self.position = self.position.saturating_sub(bytes);
    }

    /// Number of bytes not yet consumed
    #[inline]
    pub const fn remaining(&self) -> usize {
        // Must be saturating to prevent underflow
        self.stream.len().saturating_sub(self.position)
    }

    /// The unconsumed tail of the stream
    pub fn remaining_bytes(&self) -> &'a [u8] {
        self.stream.get(self.position..).unwrap_or(&[])
    }

    #[inline]
    pub const fn eof(&self) -> bool {
        self.position >= self.stream.len()
    }

    pub const fn get_position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.stream.len());
    }

    pub const fn len(&self) -> usize {
        self.stream.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Look at a byte `offset` positions ahead without consuming anything
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.stream.get(self.position.checked_add(offset)?).copied()
    }

    /// Read a single byte, returning zero when the stream is exhausted
    #[inline(always)]
    pub fn get_u8(&mut self) -> u8 {
        match self.stream.get(self.position) {
            Some(byte) => {
                self.position += 1;
                *byte
            }
            None => 0
        }
    }

    #[inline]
    pub fn get_u8_err(&mut self) -> Result<u8, ZByteIoError> {
        match self.stream.get(self.position) {
            Some(byte) => {
                self.position += 1;
                Ok(*byte)
            }
            None => Err(ZByteIoError::NotEnoughBytes(1, 0))
        }
    }

    #[inline]
    pub fn get_u16_be_err(&mut self) -> Result<u16, ZByteIoError> {
        let bytes = self.get_fixed_bytes_or_err::<2>()?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read exactly `N` bytes into an array
    pub fn get_fixed_bytes_or_err<const N: usize>(&mut self) -> Result<[u8; N], ZByteIoError> {
        let mut space = [0; N];

        match self.stream.get(self.position..self.position + N) {
            Some(bytes) => {
                space.copy_from_slice(bytes);
                self.position += N;
                Ok(space)
            }
            None => Err(ZByteIoError::NotEnoughBytes(N, self.remaining()))
        }
    }

    /// Borrow the next `num` bytes and advance past them
    pub fn read_exact_bytes(&mut self, num: usize) -> Result<&'a [u8], ZByteIoError> {
        let remaining = self.remaining();

        if num > remaining {
            return Err(ZByteIoError::NotEnoughBytes(num, remaining));
        }
        let bytes = &self.stream[self.position..self.position + num];
        self.position += num;

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let mut reader = ZByteReader::new(&[0xFF, 0xD8, 0x01]);

        assert_eq!(reader.get_u16_be_err().unwrap(), 0xFFD8);
        assert_eq!(reader.remaining(), 1);
        assert!(reader.get_u16_be_err().is_err());
        // failed reads do not consume
        assert_eq!(reader.get_u8_err().unwrap(), 0x01);
        assert!(reader.eof());
        assert_eq!(reader.get_u8(), 0);
    }

    #[test]
    fn skip_past_end_is_an_error() {
        let mut reader = ZByteReader::new(&[1, 2, 3]);

        assert!(matches!(reader.skip(4), Err(ZByteIoError::NotEnoughBytes(4, 3))));
        reader.skip(2).unwrap();
        assert_eq!(reader.peek_at(0), Some(3));
        assert_eq!(reader.peek_at(1), None);
        reader.rewind(10);
        assert_eq!(reader.get_position(), 0);
        assert_eq!(reader.read_exact_bytes(3).unwrap(), &[1, 2, 3]);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binary primitives shared by the cache and update encodings of collections and members.
//!
//! Records are a fixed sequence of fields where every field carries its own length:
//!
//! ```text
//! handle           8 bytes, little-endian
//! node handle      6 bytes, little-endian
//! u32 / i64        4 / 8 bytes, little-endian
//! compressed u64   count byte n <= 8, then the n least significant bytes, little-endian
//! bytes / string   u32 length (little-endian), then the raw bytes
//! expansion flags  8 bytes, one per optional trailing field
//! ```
//!
//! A record always ends with the expansion flags. Writers announce optional trailing fields by
//! setting a flag, readers which do not know a flag ignore it together with any bytes after
//! the flags.
use thiserror::Error;
use tracing::warn;

use crate::attributes::{AttributeMap, Attributes};
use crate::handle::{HANDLE_LEN, Handle, NODE_HANDLE_LEN, NodeHandle};

/// Size of the expansion flags region closing every record.
pub const EXPANSION_FLAGS_LEN: usize = 8;

/// Appends record fields to a byte buffer.
#[derive(Debug)]
pub struct CacheWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> CacheWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn write_handle(&mut self, handle: Handle) {
        self.buf.extend_from_slice(&handle.to_bytes());
    }

    pub fn write_node_handle(&mut self, node: NodeHandle) {
        self.buf.extend_from_slice(&node.to_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes only the significant bytes of `value`, zero takes a single byte.
    pub fn write_compressed_u64(&mut self, value: u64) {
        let len = (u64::BITS - value.leading_zeros()).div_ceil(8) as usize;
        self.buf.push(len as u8);
        self.buf.extend_from_slice(&value.to_le_bytes()[..len]);
    }

    /// Writes a length-prefixed byte string.
    ///
    /// # Panics
    ///
    /// Panics if `value` is longer than `u32::MAX` bytes.
    pub fn write_bytes(&mut self, value: &[u8]) {
        let len = u32::try_from(value.len()).expect("byte string exceeds u32 length prefix");
        self.write_u32(len);
        self.buf.extend_from_slice(value);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Writes the attribute count followed by every tag and value.
    ///
    /// # Panics
    ///
    /// Panics if there are more than `u32::MAX` attributes.
    pub fn write_attributes(&mut self, attributes: &Attributes) {
        let len = u32::try_from(attributes.len()).expect("attribute count exceeds u32");
        self.write_u32(len);
        for (tag, value) in attributes.iter() {
            self.write_str(tag);
            self.write_str(value);
        }
    }

    /// Closes the record, `flags[i]` announces optional trailing field `i`.
    pub fn write_expansion_flags(&mut self, flags: &[bool]) {
        debug_assert!(flags.len() <= EXPANSION_FLAGS_LEN);
        let mut region = [0u8; EXPANSION_FLAGS_LEN];
        for (byte, flag) in region.iter_mut().zip(flags) {
            *byte = u8::from(*flag);
        }
        self.buf.extend_from_slice(&region);
    }
}

/// Reads record fields from a byte slice, failing on the first short or malformed field.
#[derive(Debug)]
pub struct CacheReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> CacheReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Number of bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(DecodeError::UnexpectedEnd {
                field,
                needed,
                remaining,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(field, N)?);
        Ok(array)
    }

    pub fn read_handle(&mut self, field: &'static str) -> Result<Handle, DecodeError> {
        Ok(Handle::from_bytes(self.take_array::<HANDLE_LEN>(field)?))
    }

    pub fn read_node_handle(&mut self, field: &'static str) -> Result<NodeHandle, DecodeError> {
        Ok(NodeHandle::from_bytes(
            self.take_array::<NODE_HANDLE_LEN>(field)?,
        ))
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array(field)?))
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take_array(field)?))
    }

    pub fn read_compressed_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let [len] = self.take_array::<1>(field)?;
        if len as usize > size_of::<u64>() {
            return Err(DecodeError::InvalidCompressedLength { field, len });
        }
        let mut buf = [0; 8];
        buf[..len as usize].copy_from_slice(self.take(field, len as usize)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32(field)? as usize;
        Ok(self.take(field, len)?.to_vec())
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        String::from_utf8(self.read_bytes(field)?).map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads the attribute count followed by every tag and value.
    pub fn read_attributes(&mut self) -> Result<Attributes, DecodeError> {
        let count = self.read_u32("attribute count")?;

        // The count is not trusted for pre-allocation, a bogus value fails on the first short
        // read instead.
        let mut map = AttributeMap::new();
        for _ in 0..count {
            let tag = self.read_string("attribute tag")?;
            let value = self.read_string("attribute value")?;
            map.insert(tag, value);
        }

        Ok(Attributes::from_map(map))
    }

    /// Consumes the expansion flags region.
    ///
    /// Only the first `known` flags are understood by this reader, any other set flag is
    /// reported and ignored.
    pub fn read_expansion_flags(
        &mut self,
        known: usize,
    ) -> Result<[bool; EXPANSION_FLAGS_LEN], DecodeError> {
        let region = self.take_array::<EXPANSION_FLAGS_LEN>("expansion flags")?;
        let mut flags = [false; EXPANSION_FLAGS_LEN];
        for (index, byte) in region.iter().enumerate() {
            flags[index] = *byte != 0;
            if flags[index] && index >= known {
                warn!(flag = index, "ignoring unknown expansion flag");
            }
        }
        Ok(flags)
    }
}

/// An error occurred while decoding a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before the field was complete.
    #[error("unexpected end of input while reading {field}: needed {needed} bytes, {remaining} left")]
    UnexpectedEnd {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// Compressed integer announced more bytes than a u64 holds.
    #[error("invalid compressed integer length {len} for {field}")]
    InvalidCompressedLength { field: &'static str, len: u8 },

    /// String field is not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },
}

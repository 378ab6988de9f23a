// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque identifiers for collections, members and the storage objects members point at.
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serde::{deserialize_hex, serialize_hex};

/// Size of a collection or member handle in bytes.
pub const HANDLE_LEN: usize = 8;

/// Size of a storage object ("node") handle in bytes.
pub const NODE_HANDLE_LEN: usize = 6;

const NODE_HANDLE_MASK: u64 = (1 << (NODE_HANDLE_LEN * 8)) - 1;

/// 64-bit handle identifying a collection, a member or a user.
///
/// The raw representation is the little-endian byte order of the inner value. [`Handle::UNDEF`]
/// (all bits set) stands for "no handle".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Handle(u64);

impl Handle {
    pub const UNDEF: Handle = Handle(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Create a `Handle` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    pub const fn to_bytes(&self) -> [u8; HANDLE_LEN] {
        self.0.to_le_bytes()
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn is_undef(&self) -> bool {
        self.0 == u64::MAX
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encodes the raw handle bytes with the URL-safe base64 alphabet, without padding.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    /// Decodes a handle from its base64 form.
    ///
    /// Returns `None` if the string is not valid base64 or does not carry exactly
    /// [`HANDLE_LEN`] bytes.
    pub fn from_base64(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        let bytes: [u8; HANDLE_LEN] = bytes.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }
}

impl From<u64> for Handle {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Handle> for u64 {
    fn from(value: Handle) -> Self {
        value.0
    }
}

impl From<[u8; HANDLE_LEN]> for Handle {
    fn from(value: [u8; HANDLE_LEN]) -> Self {
        Self::from_bytes(value)
    }
}

impl TryFrom<&[u8]> for Handle {
    type Error = HandleError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let checked_value: [u8; HANDLE_LEN] = value
            .try_into()
            .map_err(|_| HandleError::InvalidLength(value.len(), HANDLE_LEN))?;
        Ok(Self::from_bytes(checked_value))
    }
}

impl FromStr for Handle {
    type Err = HandleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undef() {
            f.write_str("Handle(UNDEF)")
        } else {
            write!(f, "Handle({})", self.to_hex())
        }
    }
}

impl Serialize for Handle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;

        bytes
            .as_slice()
            .try_into()
            .map_err(|err: HandleError| serde::de::Error::custom(err.to_string()))
    }
}

/// 48-bit handle of the storage object (file or folder) a member wraps.
///
/// Values are always truncated to the lower [`NODE_HANDLE_LEN`] bytes, the width used on the
/// wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub const UNDEF: NodeHandle = NodeHandle(NODE_HANDLE_MASK);

    pub const fn new(value: u64) -> Self {
        Self(value & NODE_HANDLE_MASK)
    }

    pub fn from_bytes(bytes: [u8; NODE_HANDLE_LEN]) -> Self {
        let mut buf = [0; 8];
        buf[..NODE_HANDLE_LEN].copy_from_slice(&bytes);
        Self(u64::from_le_bytes(buf))
    }

    pub fn to_bytes(&self) -> [u8; NODE_HANDLE_LEN] {
        let mut bytes = [0; NODE_HANDLE_LEN];
        bytes.copy_from_slice(&self.0.to_le_bytes()[..NODE_HANDLE_LEN]);
        bytes
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn is_undef(&self) -> bool {
        self.0 == NODE_HANDLE_MASK
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl From<u64> for NodeHandle {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl TryFrom<&[u8]> for NodeHandle {
    type Error = HandleError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let checked_value: [u8; NODE_HANDLE_LEN] = value
            .try_into()
            .map_err(|_| HandleError::InvalidLength(value.len(), NODE_HANDLE_LEN))?;
        Ok(Self::from_bytes(checked_value))
    }
}

impl FromStr for NodeHandle {
    type Err = HandleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undef() {
            f.write_str("NodeHandle(UNDEF)")
        } else {
            write!(f, "NodeHandle({})", self.to_hex())
        }
    }
}

impl Serialize for NodeHandle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for NodeHandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;

        bytes
            .as_slice()
            .try_into()
            .map_err(|err: HandleError| serde::de::Error::custom(err.to_string()))
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for NodeHandle {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::new(u64::arbitrary(u)?))
    }
}

/// Error types for `Handle` and `NodeHandle`.
#[derive(Error, Debug)]
pub enum HandleError {
    /// Handle has an invalid length.
    #[error("invalid handle length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Handle string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in handle string")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

//! Canonical binary reader and writer
//!
//! Integers are fixed-width little-endian, sequence lengths and enum variant
//! indices are ULEB128, `Option` is a 0/1 tag followed by the value, and
//! fields are produced and consumed strictly in declaration order.

use super::errors::{DecodeError, DecodeResult};
use crate::types::{Address, Digest, ObjectRef, Owner};

/// Maximum value of a sequence length or variant index
const MAX_ULEB_U32: u64 = u32::MAX as u64;

#[derive(Debug, Clone, Default)]
pub struct BcsWriter {
    buf: Vec<u8>,
}

impl BcsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u128(&mut self, value: u128) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// 7 bits per byte, MSB is the continuation flag
    pub fn write_uleb128(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    pub fn write_len(&mut self, len: usize) {
        self.write_uleb128(len as u64);
    }

    pub fn write_variant(&mut self, tag: u32) {
        self.write_uleb128(u64::from(tag));
    }

    /// Raw bytes with no length prefix (fixed-size arrays)
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed byte vector
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_option<T>(&mut self, value: Option<&T>, f: impl FnOnce(&mut Self, &T)) {
        match value {
            None => self.write_u8(0),
            Some(inner) => {
                self.write_u8(1);
                f(self, inner);
            }
        }
    }

    pub fn write_seq<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.write_len(items.len());
        for item in items {
            f(self, item);
        }
    }

    /// Sequence whose element encoding can fail
    pub fn try_write_seq<T, E>(
        &mut self,
        items: &[T],
        mut f: impl FnMut(&mut Self, &T) -> Result<(), E>,
    ) -> Result<(), E> {
        self.write_len(items.len());
        for item in items {
            f(self, item)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct BcsReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BcsReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn read_fixed<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(u16::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        Ok(u64::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_u128(&mut self) -> DecodeResult<u128> {
        Ok(u128::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { offset, value }),
        }
    }

    /// Rejects overflow and non-minimal encodings
    pub fn read_uleb128(&mut self) -> DecodeResult<u64> {
        let offset = self.pos;
        let mut value: u64 = 0;
        let mut shift: u32 = 0;

        loop {
            let byte = self.read_u8()?;
            let payload = u64::from(byte & 0x7F);

            if shift >= 64 || (shift == 63 && payload > 1) {
                return Err(DecodeError::InvalidUleb128 { offset });
            }

            value |= payload << shift;

            if byte & 0x80 == 0 {
                if byte == 0 && shift > 0 {
                    return Err(DecodeError::InvalidUleb128 { offset });
                }
                return Ok(value);
            }

            shift += 7;
        }
    }

    fn read_uleb_u32(&mut self) -> DecodeResult<u32> {
        let offset = self.pos;
        let value = self.read_uleb128()?;
        if value > MAX_ULEB_U32 {
            return Err(DecodeError::InvalidUleb128 { offset });
        }
        Ok(value as u32)
    }

    /// Sequence length; a length larger than the remaining input is truncation
    pub fn read_len(&mut self) -> DecodeResult<usize> {
        let offset = self.pos;
        let len = self.read_uleb_u32()? as usize;
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset,
                needed: len,
                available: self.remaining(),
            });
        }
        Ok(len)
    }

    pub fn read_variant(&mut self) -> DecodeResult<u32> {
        self.read_uleb_u32()
    }

    pub fn read_bytes(&mut self) -> DecodeResult<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> DecodeResult<String> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    pub fn read_option<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> DecodeResult<T>,
    ) -> DecodeResult<Option<T>> {
        if self.read_bool()? {
            Ok(Some(f(self)?))
        } else {
            Ok(None)
        }
    }

    /// Every element occupies at least one byte, so the length check in
    /// `read_len` bounds the allocation
    pub fn read_seq<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> DecodeResult<T>,
    ) -> DecodeResult<Vec<T>> {
        let len = self.read_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Fails if any input is left unread
    pub fn finish(self) -> DecodeResult<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { count }),
        }
    }
}

/// Ledger identifiers shared by the transaction and effects layouts
impl BcsWriter {
    pub fn write_address(&mut self, address: &Address) {
        self.write_fixed(address.as_bytes());
    }

    /// Digests travel as length-prefixed byte vectors
    pub fn write_digest(&mut self, digest: &Digest) {
        self.write_bytes(digest.as_bytes());
    }

    pub fn write_object_ref(&mut self, object_ref: &ObjectRef) {
        self.write_address(&object_ref.object_id);
        self.write_u64(object_ref.version);
        self.write_digest(&object_ref.digest);
    }

    pub fn write_owner(&mut self, owner: &Owner) {
        match owner {
            Owner::AddressOwner(address) => {
                self.write_variant(0);
                self.write_address(address);
            }
            Owner::ObjectOwner(address) => {
                self.write_variant(1);
                self.write_address(address);
            }
            Owner::Shared {
                initial_shared_version,
            } => {
                self.write_variant(2);
                self.write_u64(*initial_shared_version);
            }
            Owner::Immutable => self.write_variant(3),
            Owner::ConsensusAddressOwner {
                start_version,
                owner,
            } => {
                self.write_variant(4);
                self.write_u64(*start_version);
                self.write_address(owner);
            }
        }
    }
}

impl BcsReader<'_> {
    pub fn read_address(&mut self) -> DecodeResult<Address> {
        Ok(Address::new(self.read_fixed()?))
    }

    pub fn read_digest(&mut self) -> DecodeResult<Digest> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        Digest::from_slice(&bytes)
            .map_err(|e| DecodeError::Invalid(format!("digest at offset {offset}: {e}")))
    }

    pub fn read_object_ref(&mut self) -> DecodeResult<ObjectRef> {
        let object_id = self.read_address()?;
        let version = self.read_u64()?;
        let digest = self.read_digest()?;
        Ok(ObjectRef::new(object_id, version, digest))
    }

    pub fn read_owner(&mut self) -> DecodeResult<Owner> {
        match self.read_variant()? {
            0 => Ok(Owner::AddressOwner(self.read_address()?)),
            1 => Ok(Owner::ObjectOwner(self.read_address()?)),
            2 => Ok(Owner::Shared {
                initial_shared_version: self.read_u64()?,
            }),
            3 => Ok(Owner::Immutable),
            4 => Ok(Owner::ConsensusAddressOwner {
                start_version: self.read_u64()?,
                owner: self.read_address()?,
            }),
            tag => Err(DecodeError::UnknownVariant { kind: "Owner", tag }),
        }
    }
}

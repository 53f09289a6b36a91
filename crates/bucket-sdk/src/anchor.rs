//! Anchor framing: 8-byte discriminators and the Borsh subset the bucket
//! program uses (u8, u16, u32, u64, Pubkey and `Vec<T>`, all little-endian).

use sha2::{Digest, Sha256};
use sol_wire::Pubkey;

use crate::error::SdkError;

pub const DISCRIMINATOR_LEN: usize = 8;

fn sighash(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(format!("{namespace}:{name}"));
    let hash = hasher.finalize();
    let mut disc = [0u8; DISCRIMINATOR_LEN];
    disc.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    disc
}

/// `sha256("global:<name>")[..8]`; `name` is the snake_case instruction name.
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash("global", name)
}

/// `sha256("account:<Name>")[..8]`; `name` is the CamelCase account type.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash("account", name)
}

/// Instruction data builder: discriminator followed by Borsh arguments.
#[derive(Debug, Clone)]
pub struct ArgWriter {
    buf: Vec<u8>,
}

impl ArgWriter {
    pub fn new(instruction: &str) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&instruction_discriminator(instruction));
        Self { buf }
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn pubkey(mut self, key: &Pubkey) -> Self {
        self.buf.extend_from_slice(key.as_ref());
        self
    }

    /// `Vec<T>`: u32 length prefix, then each item via `write`.
    pub fn vec<T>(self, items: &[T], write: impl Fn(Self, &T) -> Self) -> Self {
        items
            .iter()
            .fold(self.u32(items.len() as u32), |w, item| write(w, item))
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over Anchor account data.
#[derive(Debug)]
pub struct AccountReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountReader<'a> {
    /// Check the discriminator for account type `name` and position the
    /// reader after it.
    pub fn new(data: &'a [u8], name: &str) -> Result<Self, SdkError> {
        let expected = account_discriminator(name);
        match data.get(..DISCRIMINATOR_LEN) {
            Some(actual) if actual == expected => Ok(Self {
                data,
                offset: DISCRIMINATOR_LEN,
            }),
            Some(_) => Err(SdkError::InvalidAccountData(format!(
                "discriminator does not match {name}"
            ))),
            None => Err(SdkError::InvalidAccountData(format!(
                "{} bytes is too short for {name}",
                data.len()
            ))),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SdkError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                SdkError::InvalidAccountData(format!(
                    "read of {len} bytes at offset {} overruns {} byte account",
                    self.offset,
                    self.data.len()
                ))
            })?;
        let out = &self.data[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SdkError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, SdkError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, SdkError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, SdkError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, SdkError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn pubkey(&mut self) -> Result<Pubkey, SdkError> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    /// `Vec<T>` with `item_len` bytes per element. The length prefix is
    /// checked against the remaining data before anything is allocated.
    pub fn vec<T>(
        &mut self,
        item_len: usize,
        mut read: impl FnMut(&mut Self) -> Result<T, SdkError>,
    ) -> Result<Vec<T>, SdkError> {
        let len = self.u32()? as usize;
        let remaining = self.data.len() - self.offset;
        if len.saturating_mul(item_len) > remaining {
            return Err(SdkError::InvalidAccountData(format!(
                "vec of {len} items does not fit in {remaining} remaining bytes"
            )));
        }
        (0..len).map(|_| read(self)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_differ_by_namespace() {
        assert_ne!(instruction_discriminator("bucket"), account_discriminator("bucket"));
        assert_ne!(instruction_discriminator("deposit"), instruction_discriminator("redeem"));
    }

    #[test]
    fn instruction_discriminator_is_sha256_prefix() {
        let hash = Sha256::digest(b"global:deposit");
        assert_eq!(instruction_discriminator("deposit"), hash[..8]);
    }

    #[test]
    fn writer_layout() {
        let key = Pubkey::new_from_array([9u8; 32]);
        let data = ArgWriter::new("authorize_collateral")
            .pubkey(&key)
            .u16(2500)
            .finish();
        assert_eq!(data.len(), 8 + 32 + 2);
        assert_eq!(&data[8..40], key.as_ref());
        assert_eq!(&data[40..], &[0xc4, 0x09]);
    }

    #[test]
    fn writer_vec_has_length_prefix() {
        let data = ArgWriter::new("x").vec(&[1u16, 2, 3], |w, v| w.u16(*v)).finish();
        assert_eq!(&data[8..12], &3u32.to_le_bytes());
        assert_eq!(&data[12..], &[1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn reader_rejects_wrong_discriminator() {
        let mut data = account_discriminator("Other").to_vec();
        data.push(1);
        assert!(matches!(
            AccountReader::new(&data, "Bucket"),
            Err(SdkError::InvalidAccountData(_))
        ));
        assert!(AccountReader::new(&[1, 2, 3], "Bucket").is_err());
    }

    #[test]
    fn reader_never_overruns() {
        let mut data = account_discriminator("Bucket").to_vec();
        data.extend_from_slice(&[1, 2]);
        let mut reader = AccountReader::new(&data, "Bucket").unwrap();
        assert_eq!(reader.u16().unwrap(), 0x0201);
        assert!(reader.u8().is_err());
    }

    #[test]
    fn reader_rejects_oversized_vec_prefix() {
        let mut data = account_discriminator("Bucket").to_vec();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        let mut reader = AccountReader::new(&data, "Bucket").unwrap();
        assert!(reader.vec(34, |r| r.u8()).is_err());
    }
}

//! Checksummed index IO
//!
//! Wraps a reader or writer and folds every byte into a running SHA-1 so
//! the index trailer can be produced on write and verified on read.

use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::LitError;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

#[derive(Debug)]
pub struct Checksum<F> {
    inner: F,
    digest: Sha1,
}

impl<F> Checksum<F> {
    pub fn new(inner: F) -> Self {
        Checksum {
            inner,
            digest: Sha1::new(),
        }
    }
}

impl<F: Read> Checksum<F> {
    pub fn read(&mut self, size: usize) -> anyhow::Result<Bytes> {
        let mut buffer = vec![0; size];
        self.inner.read_exact(&mut buffer).map_err(|_| LitError::Corrupt {
            kind: "index",
            detail: "unexpected end-of-file".to_string(),
        })?;

        self.digest.update(&buffer);
        Ok(Bytes::from(buffer))
    }

    /// Compare the trailer against the digest of everything read so far
    pub fn verify(&mut self) -> anyhow::Result<()> {
        let mut expected = [0u8; CHECKSUM_SIZE];
        self.inner.read_exact(&mut expected)?;

        let actual = self.digest.clone().finalize();
        if expected != actual.as_slice() {
            return Err(LitError::Corrupt {
                kind: "index",
                detail: "checksum does not match value stored on disk".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl<F: Write> Checksum<F> {
    pub fn write(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.inner.write_all(data)?;
        self.digest.update(data);
        Ok(())
    }

    pub fn write_checksum(&mut self) -> anyhow::Result<()> {
        let checksum = self.digest.clone().finalize();
        self.inner.write_all(checksum.as_slice())?;

        Ok(())
    }
}

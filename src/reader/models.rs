//! The byte source model.

use std::{fs::File, path::Path};

use memmap::Mmap;

use crate::error::{Error, Result};

/// Where the bytes of a [`ByteSource`] live.
#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    /// Zero-length files cannot be mapped.
    Empty,
    Owned(Vec<u8>),
}

/// A read-only, contiguous view over the whole input.
///
/// Every record span and key handed out during a run borrows from this; it must outlive
/// the run.
#[derive(Debug)]
pub struct ByteSource {
    backing: Backing,
}

impl ByteSource {
    /// Map the file at `path` into memory.
    ///
    /// Fails with [`Error::InputUnavailable`] if the file cannot be opened, inspected or
    /// mapped; never returns a partially usable instance.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |source| Error::InputUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unavailable)?;
        let len = file.metadata().map_err(unavailable)?.len();

        if len == 0 {
            log::debug!("ByteSource::open() {} is empty.", path.display());
            return Ok(Self {
                backing: Backing::Empty,
            });
        }

        // The mapping is read-only and the file is not expected to change during a run.
        let mmap = unsafe { Mmap::map(&file) }.map_err(unavailable)?;

        log::debug!(
            "ByteSource::open() mapped {len} bytes from {}.",
            path.display()
        );

        Ok(Self {
            backing: Backing::Mapped(mmap),
        })
    }

    /// Wrap bytes that are already in memory.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            backing: Backing::Owned(bytes),
        }
    }

    /// The whole input.
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Empty => &[],
            Backing::Owned(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl std::ops::Deref for ByteSource {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.bytes()
    }
}

//! Package block sources for LOAD
//!
//! A load file is sent as a sequence of LOAD commands. [`BlockSource`]
//! hands out those blocks lazily and in order; [`ChunkedPackage`] is the
//! in-memory implementation.

use bytes::Bytes;
use gpcard_apdu_core::CommandError;
use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::{
    Result,
    constants::{DEFAULT_BLOCK_SIZE, tags},
};

/// One block of a load file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBlock {
    /// Block contents
    pub payload: Bytes,
    /// Zero-based block index
    pub sequence: usize,
    /// Whether this is the last block
    pub is_final: bool,
}

/// Lazy, ordered, single-pass producer of load blocks
pub trait BlockSource {
    /// Total number of blocks, known before iteration starts
    fn estimated_blocks(&self) -> usize;

    /// Next block, `None` once the final block has been returned
    fn next_block(&mut self) -> Result<Option<LoadBlock>>;

    /// Length of the largest block this source will produce, if known up front
    fn max_block_len(&self) -> Option<usize> {
        None
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn estimated_blocks(&self) -> usize {
        (**self).estimated_blocks()
    }

    fn next_block(&mut self) -> Result<Option<LoadBlock>> {
        (**self).next_block()
    }

    fn max_block_len(&self) -> Option<usize> {
        (**self).max_block_len()
    }
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn estimated_blocks(&self) -> usize {
        (**self).estimated_blocks()
    }

    fn next_block(&mut self) -> Result<Option<LoadBlock>> {
        (**self).next_block()
    }

    fn max_block_len(&self) -> Option<usize> {
        (**self).max_block_len()
    }
}

/// Load file held in memory and cut into fixed-size blocks
#[derive(Debug, Clone)]
pub struct ChunkedPackage {
    data: Bytes,
    block_size: usize,
    position: usize,
    sequence: usize,
}

impl ChunkedPackage {
    /// Split `data` into blocks of at most `block_size` bytes
    ///
    /// `block_size` must leave room for the C-MAC, so it is limited to
    /// 1..=247. Encrypted channels need at most 239, see
    /// [`SecurityLevel::max_block_size`](crate::SecurityLevel::max_block_size).
    pub fn new(data: impl Into<Bytes>, block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size > DEFAULT_BLOCK_SIZE {
            return Err(CommandError::InvalidData("block size must be between 1 and 247").into());
        }

        Ok(Self {
            data: data.into(),
            block_size,
            position: 0,
            sequence: 0,
        })
    }

    /// Split `data` into 247-byte blocks
    pub fn with_default_block_size(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            position: 0,
            sequence: 0,
        }
    }

    /// Concatenate load file components and wrap them in the
    /// Load File Data Block (`C4`) TLV before chunking
    pub fn from_load_file<I, C>(components: I, block_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut contents = Vec::new();
        for component in components {
            contents.extend_from_slice(component.as_ref());
        }

        let tlv = Tlv::new(
            Tag::try_from(tags::LOAD_FILE_DATA_BLOCK)?,
            Value::Primitive(contents),
        )?;
        Self::new(tlv.to_vec(), block_size)
    }

    /// Start again from the first block
    pub const fn rewind(&mut self) {
        self.position = 0;
        self.sequence = 0;
    }

    /// Block size in bytes
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Full load file contents
    pub const fn data(&self) -> &Bytes {
        &self.data
    }
}

impl BlockSource for ChunkedPackage {
    fn estimated_blocks(&self) -> usize {
        self.data.len().div_ceil(self.block_size)
    }

    fn max_block_len(&self) -> Option<usize> {
        Some(self.block_size.min(self.data.len()))
    }

    fn next_block(&mut self) -> Result<Option<LoadBlock>> {
        if self.position >= self.data.len() {
            return Ok(None);
        }

        let end = (self.position + self.block_size).min(self.data.len());
        let block = LoadBlock {
            payload: self.data.slice(self.position..end),
            sequence: self.sequence,
            is_final: end == self.data.len(),
        };

        self.position = end;
        self.sequence += 1;

        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn collect(source: &mut impl BlockSource) -> Vec<LoadBlock> {
        let mut blocks = Vec::new();
        while let Some(block) = source.next_block().unwrap() {
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn test_chunking() {
        let mut package = ChunkedPackage::new(vec![0xAB; 10], 4).unwrap();
        assert_eq!(package.estimated_blocks(), 3);

        let blocks = collect(&mut package);
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks.iter().map(|b| b.payload.len()).collect::<Vec<_>>(),
            [4, 4, 2]
        );
        assert_eq!(
            blocks.iter().map(|b| b.sequence).collect::<Vec<_>>(),
            [0, 1, 2]
        );
        assert_eq!(
            blocks.iter().map(|b| b.is_final).collect::<Vec<_>>(),
            [false, false, true]
        );
        assert!(package.next_block().unwrap().is_none());
    }

    #[test]
    fn test_exact_multiple() {
        let mut package = ChunkedPackage::with_default_block_size(vec![0u8; 2 * 247]);
        assert_eq!(package.estimated_blocks(), 2);

        let blocks = collect(&mut package);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].is_final);
        assert_eq!(blocks[1].payload.len(), 247);
    }

    #[test]
    fn test_empty_package() {
        let mut package = ChunkedPackage::with_default_block_size(Bytes::new());
        assert_eq!(package.estimated_blocks(), 0);
        assert!(package.next_block().unwrap().is_none());
    }

    #[test]
    fn test_rewind() {
        let mut package = ChunkedPackage::new(vec![1, 2, 3], 2).unwrap();
        let first = collect(&mut package);

        package.rewind();
        assert_eq!(collect(&mut package), first);
    }

    #[test]
    fn test_invalid_block_size() {
        assert!(matches!(
            ChunkedPackage::new(vec![1], 0),
            Err(Error::Command(CommandError::InvalidData(_)))
        ));
        assert!(ChunkedPackage::new(vec![1], 248).is_err());
        assert!(ChunkedPackage::new(vec![1], 239).is_ok());
    }

    #[test]
    fn test_from_load_file() {
        let package = ChunkedPackage::from_load_file([&[0x01, 0x02][..], &[0x03][..]], 247).unwrap();
        assert_eq!(package.data().as_ref(), [0xC4, 0x03, 0x01, 0x02, 0x03]);

        let large = ChunkedPackage::from_load_file([vec![0u8; 300]], 247).unwrap();
        assert_eq!(&large.data()[..4], [0xC4, 0x82, 0x01, 0x2C]);
        assert_eq!(large.estimated_blocks(), 2);
    }
}

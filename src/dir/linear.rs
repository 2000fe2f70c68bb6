//! Unindexed, single/multi-block linear directory: circular scan with a
//! cached start hint, used until a directory grows enough to be promoted
//! to a [`crate::dir::index::HashedDirIndex`].

use alloc::vec::Vec;

use crate::device::{BlockId, Device};
use crate::dir::entry::Entry;
use crate::dir::leaf::DirLeaf;
use crate::error::FsError;

/// Readahead batch size, in blocks, matching the classic `RA_SIZE=32` but
/// kept small here since the core is block-count-agnostic about caching.
pub const READAHEAD_BLOCKS: u32 = 16;

pub struct LinearDir {
    pub blocks: Vec<BlockId>,

    /// Cached block index to resume scanning from; reset to 0 when a
    /// lookup fails so the next call starts a fresh circular sweep.
    pub start_hint: usize,
}

impl LinearDir {
    pub fn new(blocks: Vec<BlockId>) -> Self {
        LinearDir { blocks, start_hint: 0 }
    }

    /// Circular scan starting at `start_hint`: wraps around to block 0 and
    /// stops once every block has been visited once. If the directory grew
    /// while scanning (block count increased), the newly appended tail is
    /// swept once more before giving up.
    pub fn find<D: Device>(&mut self, device: &mut D, name: &[u8], epoch: u32) -> Result<Option<Entry>, FsError> {
        if name == b"." || name == b".." {
            let buf = device.read_block(self.blocks[0])?;
            let leaf = DirLeaf::from_bytes(buf);
            return leaf.scan(name, epoch);
        }

        let original_len = self.blocks.len();
        let mut visited = 0usize;
        let mut idx = self.start_hint % original_len.max(1);

        while visited < original_len {
            let buf = device.read_block(self.blocks[idx])?;
            let leaf = DirLeaf::from_bytes(buf);
            if let Some(entry) = leaf.scan(name, epoch)? {
                self.start_hint = idx;
                return Ok(Some(entry));
            }
            idx = (idx + 1) % original_len;
            visited += 1;
        }

        // Directory grew mid-scan: re-sweep only the newly appended tail.
        if self.blocks.len() > original_len {
            for block in &self.blocks[original_len..] {
                let buf = device.read_block(*block)?;
                let leaf = DirLeaf::from_bytes(buf);
                if let Some(entry) = leaf.scan(name, epoch)? {
                    return Ok(Some(entry));
                }
            }
        }

        self.start_hint = 0;
        Ok(None)
    }

    /// Inserts into the first block with slack; appends a new block via
    /// the device when every existing block is full.
    pub fn insert<D: Device>(
        &mut self,
        device: &mut D,
        dir_ino: crate::inode::InodeNumber,
        name: &[u8],
        inode: crate::inode::InodeNumber,
        epoch: u32,
    ) -> Result<(), FsError> {
        for &block in &self.blocks {
            let buf = device.read_block(block)?;
            let mut leaf = DirLeaf::from_bytes(buf);
            match leaf.insert(name, inode, epoch) {
                Ok(()) => return device.write_block(block, leaf.as_bytes()),
                Err(FsError::NoSpace) => continue,
                Err(e) => return Err(e),
            }
        }

        let new_block = device.append_block(dir_ino)?;
        let mut leaf = DirLeaf::new(device.block_size() as usize);
        leaf.insert(name, inode, epoch)?;
        device.write_block(new_block, leaf.as_bytes())?;
        self.blocks.push(new_block);
        Ok(())
    }

    /// Readahead candidates: the next `READAHEAD_BLOCKS` blocks from the
    /// current scan position, for a host that wants to prefetch.
    pub fn readahead_range(&self, from: usize) -> Vec<BlockId> {
        let n = self.blocks.len();
        if n == 0 {
            return Vec::new();
        }
        (0..READAHEAD_BLOCKS as usize)
            .map(|i| self.blocks[(from + i) % n])
            .collect()
    }
}

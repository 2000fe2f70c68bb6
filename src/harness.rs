//! In-memory [`Device`] standing in for the buffer cache, journal, inode
//! table and block allocator, so the engine can be exercised without a
//! real backing store. Enabled by the `std` feature or under `cfg(test)`.

use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::device::{BlockId, Device, HashVersion, Txn};
use crate::dir::DirLeaf;
use crate::error::FsError;
use crate::inode::{Inode, InodeNumber};

/// A trivial FNV-1a-style hash stand-in for `dirhash`. Real hash
/// algorithm selection (half-MD4, TEA, ...) is a host concern; the
/// harness only needs *a* stable, well-distributed hash.
fn fnv1a(bytes: &[u8], seed: u32) -> u32 {
    let mut hash = 0x811c_9dc5 ^ seed;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

pub struct MemDevice {
    block_size: u32,
    blocks: HashMap<u32, Vec<u8>>,
    next_block: u32,
    inodes: HashMap<u32, Inode>,
    next_inode: u32,
    dir_blocks: HashMap<u32, Vec<BlockId>>,
    orphan_head: Option<InodeNumber>,
    next_txn: u64,
}

impl MemDevice {
    pub fn new(block_size: u32) -> Self {
        MemDevice {
            block_size,
            blocks: HashMap::new(),
            next_block: 1,
            inodes: HashMap::new(),
            next_inode: u32::from(InodeNumber::ROOT_DIR) + 1,
            dir_blocks: HashMap::new(),
            orphan_head: None,
            next_txn: 1,
        }
    }

    /// Seeds the root directory's inode and its first (empty) block.
    pub fn with_root(mut self) -> Self {
        let root = InodeNumber::ROOT_DIR;
        let block = self.alloc_block();
        let leaf = DirLeaf::new(self.block_size as usize);
        self.blocks.insert(block.0, leaf.as_bytes().to_vec());
        self.dir_blocks.insert(root.into(), alloc::vec![block]);
        self.inodes.insert(
            root.into(),
            Inode {
                mode: 0o040755,
                nlink: 2,
                epoch_number: 1,
                ..Default::default()
            },
        );
        self
    }

    fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }
}

impl Device for MemDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn read_block(&mut self, block: BlockId) -> Result<Vec<u8>, FsError> {
        self.blocks.get(&block.0).cloned().ok_or(FsError::Io)
    }

    fn write_block(&mut self, block: BlockId, data: &[u8]) -> Result<(), FsError> {
        if data.len() != self.block_size as usize {
            return Err(FsError::Invalid);
        }
        self.blocks.insert(block.0, data.to_vec());
        Ok(())
    }

    fn append_block(&mut self, inode: InodeNumber) -> Result<BlockId, FsError> {
        let block = self.alloc_block();
        self.blocks.insert(block.0, alloc::vec![0u8; self.block_size as usize]);
        self.dir_blocks.entry(inode.into()).or_default().push(block);
        Ok(block)
    }

    fn dirhash(&self, name: &[u8], _version: HashVersion, seed: u32) -> u32 {
        fnv1a(name, seed)
    }

    fn read_inode(&mut self, ino: InodeNumber) -> Result<Inode, FsError> {
        self.inodes.get(&ino.into()).copied().ok_or(FsError::Stale)
    }

    fn write_inode(&mut self, ino: InodeNumber, inode: &Inode) -> Result<(), FsError> {
        self.inodes.insert(ino.into(), *inode);
        Ok(())
    }

    fn alloc_inode(&mut self) -> Result<InodeNumber, FsError> {
        let ino = InodeNumber(self.next_inode);
        self.next_inode += 1;
        Ok(ino)
    }

    fn begin_txn(&mut self, credits: u32) -> Txn {
        let id = self.next_txn;
        self.next_txn += 1;
        Txn { id, credits }
    }

    fn commit_txn(&mut self, _txn: Txn) -> Result<(), FsError> {
        Ok(())
    }

    fn orphan_head(&mut self) -> Option<InodeNumber> {
        self.orphan_head
    }

    fn set_orphan_head(&mut self, head: Option<InodeNumber>) {
        self.orphan_head = head;
    }

    fn directory_blocks(&mut self, ino: InodeNumber) -> Result<Vec<BlockId>, FsError> {
        self.dir_blocks.get(&ino.into()).cloned().ok_or(FsError::Invalid)
    }
}

/// A fixed clock for deterministic tests.
pub struct FixedClock(pub u64);

impl crate::epoch::Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0
    }
}

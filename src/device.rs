//! Host collaborator boundary.
//!
//! The block allocator, buffer cache, journal, inode table, and `dirhash`
//! family are out of scope for this crate; [`Device`] is the single trait
//! the engine is generic over so it never hard-codes a backing store. A
//! `std`-only in-memory implementation lives in [`crate::harness`] for
//! tests.

use bytemuck::{Pod, Zeroable};

use crate::error::FsError;
use crate::inode::{Inode, InodeNumber};

pub const BLOCK_SIZE_MIN: u32 = 1024;

/// Identifies a block on the backing device.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl From<u32> for BlockId {
    fn from(value: u32) -> Self {
        BlockId(value)
    }
}

impl From<BlockId> for u32 {
    fn from(value: BlockId) -> Self {
        value.0
    }
}

/// The selectable `dirhash` algorithms (see `dx_root_info.hash_version`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashVersion {
    Legacy,
    HalfMd4,
    Tea,
    LegacyUnsigned,
    HalfMd4Unsigned,
    TeaUnsigned,
}

impl HashVersion {
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Legacy),
            1 => Some(Self::HalfMd4),
            2 => Some(Self::Tea),
            3 => Some(Self::LegacyUnsigned),
            4 => Some(Self::HalfMd4Unsigned),
            5 => Some(Self::TeaUnsigned),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Legacy => 0,
            Self::HalfMd4 => 1,
            Self::Tea => 2,
            Self::LegacyUnsigned => 3,
            Self::HalfMd4Unsigned => 4,
            Self::TeaUnsigned => 5,
        }
    }
}

/// A live, in-progress metadata transaction handle.
///
/// The core never inspects the contents; it only opens one at the start of
/// a mutating op and commits it (or lets it drop) on every exit path.
#[derive(Debug)]
pub struct Txn {
    pub(crate) id: u64,
    pub(crate) credits: u32,
}

/// Everything the directory-namespace core needs from its host.
///
/// Implementors own the buffer cache, the journal, the inode table and the
/// block allocator; the core only ever calls through this trait.
pub trait Device {
    fn block_size(&self) -> u32;

    fn read_block(&mut self, block: BlockId) -> Result<alloc::vec::Vec<u8>, FsError>;

    fn write_block(&mut self, block: BlockId, data: &[u8]) -> Result<(), FsError>;

    /// Extends the owning inode's size by one block and returns it,
    /// zero-filled.
    fn append_block(&mut self, inode: InodeNumber) -> Result<BlockId, FsError>;

    fn dirhash(&self, name: &[u8], version: HashVersion, seed: u32) -> u32;

    fn read_inode(&mut self, ino: InodeNumber) -> Result<Inode, FsError>;

    fn write_inode(&mut self, ino: InodeNumber, inode: &Inode) -> Result<(), FsError>;

    fn alloc_inode(&mut self) -> Result<InodeNumber, FsError>;

    fn begin_txn(&mut self, credits: u32) -> Txn;

    fn commit_txn(&mut self, txn: Txn) -> Result<(), FsError>;

    /// Initializes quota tracking for an inode about to be modified.
    ///
    /// Quota accounting itself is out of scope; the core only needs to
    /// call the hook at the same points the original does.
    fn dquot_initialize(&mut self, _ino: InodeNumber) {}

    fn orphan_head(&mut self) -> Option<InodeNumber>;

    fn set_orphan_head(&mut self, head: Option<InodeNumber>);

    /// The blocks currently backing a directory's data, in logical order.
    /// For an indexed directory, `blocks[0]` is the root block.
    fn directory_blocks(&mut self, ino: InodeNumber) -> Result<alloc::vec::Vec<BlockId>, FsError>;
}

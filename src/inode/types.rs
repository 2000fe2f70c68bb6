//! On-disk inode representation.

use bytemuck::{Pod, Zeroable};

use crate::uint_field_display;

/// Sentinel meaning "has not died" for both inode and directory-entry epoch
/// fields.
pub const EPOCH_ALIVE: u32 = u32::MAX;

/// A number identifying a persistent inode, or (when drawn from the
/// reserved high range by [`crate::inode::FakeInodeFactory`]) an ephemeral
/// VFS-only one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    /// Inode 0 marks an unused directory-entry slot.
    pub const UNUSED: Self = Self(0);

    /// Inode 2 is reserved for the file system root.
    pub const ROOT_DIR: Self = Self(2);

    /// First inode number handed out by [`FakeInodeFactory`]; every fake
    /// inode number is `>= FAKE_RANGE_START`, disjoint from any persistent
    /// number an allocator would hand out.
    pub const FAKE_RANGE_START: Self = Self(0x8000_0000);
}

uint_field_display!(InodeNumber);

impl From<InodeNumber> for u32 {
    fn from(value: InodeNumber) -> Self {
        value.0
    }
}

impl From<u32> for InodeNumber {
    fn from(value: u32) -> Self {
        InodeNumber(value)
    }
}

/// Inode flags relevant to the versioning overlay.
///
/// Hand-rolled bitwise newtype rather than pulling in a flags crate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeFlags(pub u32);

impl InodeFlags {
    pub const NONE: Self = Self(0);

    /// Directory has a hashed index (root block + optional interior level).
    pub const INDEX: Self = Self(0x1);

    /// This version predates the current epoch and must not be mutated in
    /// place; any write targeting it must `dup_inode` first.
    pub const UNCHANGEABLE: Self = Self(0x2);

    /// This inode is never duplicated on write (e.g. quota files).
    pub const UNVERSIONABLE: Self = Self(0x4);

    /// VFS-only projection produced by [`crate::inode::FakeInodeFactory`];
    /// never written back to the device.
    pub const FAKEINODE: Self = Self(0x8);

    /// Forced alongside `FAKEINODE`; kept distinct because the original
    /// tracks them as separate bits.
    pub const IMMUTABLE: Self = Self(0x10);

    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn set(&mut self, flag: Self) {
        self.0 |= flag.0;
    }

    pub fn clear(&mut self, flag: Self) {
        self.0 &= !flag.0;
    }
}

impl core::ops::BitOr for InodeFlags {
    type Output = InodeFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        InodeFlags(self.0 | rhs.0)
    }
}

impl core::ops::BitAnd for InodeFlags {
    type Output = InodeFlags;

    fn bitand(self, rhs: Self) -> Self::Output {
        InodeFlags(self.0 & rhs.0)
    }
}

/// The slice of inode state the directory-namespace core cares about.
///
/// Block maps, ACLs and most timestamps are host concerns projected through
/// [`crate::device::Device`]; this struct only carries what versioning and
/// namespace operations touch directly.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Inode {
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub nlink: u16,
    pub flags: InodeFlags,

    /// Epoch this version was born in (the epoch at which it became the
    /// chain head, or the original creation epoch for a never-cloned
    /// inode).
    pub epoch_number: u32,

    /// Older version in this inode's chain, newest-to-oldest; `UNUSED`
    /// terminates the chain.
    pub next_inode: InodeNumber,

    /// Next inode on the superblock's orphan list; `UNUSED` terminates it.
    pub next_orphan: InodeNumber,

    /// Opaque bitmap tracking which data blocks have been copy-on-write
    /// duplicated; swapped between head and clone on `dup_inode`. Block-data
    /// COW itself is out of scope, so this is carried but never
    /// interpreted by the core.
    pub cow_bitmap: u64,
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }

    pub fn has_flag(&self, flag: InodeFlags) -> bool {
        self.flags.contains(flag)
    }
}

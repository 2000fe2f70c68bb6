//! Directory entry: fixed header plus a variable-length name tail.

use alloc::vec::Vec;
use bytemuck::{Pod, Zeroable};

use crate::error::FsError;
use crate::inode::{InodeNumber, EPOCH_ALIVE};

pub const MAX_NAME: usize = 255;

/// File type tag stored on disk, mirroring the classic `FT_*` constants.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Pod, Zeroable)]
#[repr(transparent)]
pub struct FileType(pub u8);

impl FileType {
    pub const UNKNOWN: Self = Self(0);
    pub const REGULAR: Self = Self(1);
    pub const DIRECTORY: Self = Self(2);
    pub const CHAR_DEVICE: Self = Self(3);
    pub const BLOCK_DEVICE: Self = Self(4);
    pub const FIFO: Self = Self(5);
    pub const SOCKET: Self = Self(6);
    pub const SYMLINK: Self = Self(7);
}

/// Fixed-size portion of a directory entry record, as laid out on disk.
/// The name bytes follow immediately and are padded out to `rec_len`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EntryHeader {
    pub inode: InodeNumber,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: FileType,
    pub birth_epoch: u32,
    pub death_epoch: u32,
}

pub const HEADER_LEN: usize = core::mem::size_of::<EntryHeader>();

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Minimal on-disk size to hold `name_len` bytes of name.
pub fn min_rec_len(name_len: usize) -> u16 {
    align8(HEADER_LEN + name_len) as u16
}

/// A directory entry with its name materialized, as produced by directory
/// iteration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub header: EntryHeader,
    pub name: Vec<u8>,

    /// Byte offset of this record within its leaf.
    pub offset: usize,
}

impl Entry {
    pub fn is_free(&self) -> bool {
        self.header.inode == InodeNumber::UNUSED
    }

    pub fn is_alive(&self) -> bool {
        self.header.death_epoch == EPOCH_ALIVE
    }

    /// Whether this entry is visible to a lookup scoped at `epoch`.
    pub fn in_scope(&self, epoch: u32) -> bool {
        !self.is_free() && self.header.birth_epoch <= epoch && epoch < self.header.death_epoch
    }

    pub fn rec_len(&self) -> usize {
        self.header.rec_len as usize
    }

    /// Serializes header + name into a caller-provided, `rec_len`-sized
    /// slice (the tail beyond the name is left untouched, matching how a
    /// shrunk record still leaves slack bytes behind it).
    pub fn write_into(&self, buf: &mut [u8]) -> Result<(), FsError> {
        if buf.len() < HEADER_LEN + self.name.len() {
            return Err(FsError::Invalid);
        }
        buf[..HEADER_LEN].copy_from_slice(bytemuck::bytes_of(&self.header));
        buf[HEADER_LEN..HEADER_LEN + self.name.len()].copy_from_slice(&self.name);
        Ok(())
    }

    pub fn parse(buf: &[u8], offset: usize) -> Result<Self, FsError> {
        if buf.len() < HEADER_LEN {
            return Err(FsError::Invalid);
        }
        let header: EntryHeader = *bytemuck::from_bytes(&buf[..HEADER_LEN]);
        if header.rec_len as usize > buf.len() || (header.rec_len as usize) < HEADER_LEN {
            return Err(FsError::Invalid);
        }
        let name_len = header.name_len as usize;
        if HEADER_LEN + name_len > header.rec_len as usize {
            return Err(FsError::Invalid);
        }
        let name = buf[HEADER_LEN..HEADER_LEN + name_len].to_vec();
        Ok(Entry { header, name, offset })
    }

    pub fn new_live(name: &[u8], inode: InodeNumber, rec_len: u16, birth_epoch: u32) -> Result<Self, FsError> {
        if name.len() > MAX_NAME {
            return Err(FsError::NameTooLong);
        }
        Ok(Entry {
            header: EntryHeader {
                inode,
                rec_len,
                name_len: name.len() as u8,
                file_type: FileType::UNKNOWN,
                birth_epoch,
                death_epoch: EPOCH_ALIVE,
            },
            name: name.to_vec(),
            offset: 0,
        })
    }
}

//! Directory storage: entries, leaves, the hashed index, and the linear
//! fallback used before a directory is promoted.

pub mod entry;
pub mod index;
pub mod leaf;
pub mod linear;

pub use entry::{Entry, FileType, MAX_NAME};
pub use index::HashedDirIndex;
pub use leaf::DirLeaf;
pub use linear::LinearDir;

use crate::device::Device;
use crate::error::FsError;
use crate::inode::{Inode, InodeFlags, InodeNumber};

/// Either directory storage shape a directory inode can be in.
pub enum DirStorage {
    Linear(LinearDir),
    Indexed(HashedDirIndex),
}

impl DirStorage {
    /// Loads whichever shape `dir` is currently in, as recorded by its
    /// `INDEX` flag.
    pub fn load<D: Device>(
        device: &mut D,
        dir: &Inode,
        dir_ino: InodeNumber,
        seed: u32,
    ) -> Result<Self, FsError> {
        let blocks = device.directory_blocks(dir_ino)?;
        if blocks.is_empty() {
            return Err(FsError::Invalid);
        }
        if dir.has_flag(InodeFlags::INDEX) {
            let idx = HashedDirIndex::load(device, blocks[0], seed)?;
            Ok(DirStorage::Indexed(idx))
        } else {
            Ok(DirStorage::Linear(LinearDir::new(blocks)))
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, DirStorage::Indexed(_))
    }

    /// Every record (live or tombstoned) across every leaf, for callers
    /// like `empty_dir` that need to inspect the whole directory rather
    /// than a single name.
    pub fn all_entries<D: Device>(&self, device: &mut D) -> Result<alloc::vec::Vec<Entry>, FsError> {
        let leaf_blocks = match self {
            DirStorage::Linear(lin) => lin.blocks.clone(),
            DirStorage::Indexed(idx) => idx.all_leaf_blocks(device)?,
        };
        let mut out = alloc::vec::Vec::new();
        for block in leaf_blocks {
            let buf = device.read_block(block)?;
            let leaf = DirLeaf::from_bytes(buf);
            out.extend(leaf.entries()?);
        }
        Ok(out)
    }

    pub fn find<D: Device>(
        &mut self,
        device: &mut D,
        name: &[u8],
        epoch: u32,
    ) -> Result<Option<Entry>, FsError> {
        match self {
            DirStorage::Linear(lin) => lin.find(device, name, epoch),
            DirStorage::Indexed(idx) => match idx.find_entry(device, name, epoch) {
                Err(FsError::BadDxDir) => Err(FsError::BadDxDir),
                other => other,
            },
        }
    }

    /// Inserts a name, promoting from linear to indexed on first overflow
    /// when `allow_promotion` is set and clearing the `INDEX` flag on the
    /// owning inode (returned to the caller) if a hashed insert hits
    /// structural corruption and must fall back.
    pub fn insert<D: Device>(
        &mut self,
        device: &mut D,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        inode: InodeNumber,
        epoch: u32,
        allow_promotion: bool,
        hash_version: crate::device::HashVersion,
        seed: u32,
    ) -> Result<(), FsError> {
        match self {
            DirStorage::Indexed(idx) => match idx.insert_entry(device, dir_ino, name, inode, epoch) {
                Err(FsError::BadDxDir) => {
                    dir.flags.clear(InodeFlags::INDEX);
                    Err(FsError::BadDxDir)
                }
                other => other,
            },
            DirStorage::Linear(lin) => {
                match lin.insert(device, dir_ino, name, inode, epoch) {
                    Err(FsError::NoSpace) if allow_promotion && lin.blocks.len() == 1 => {
                        let promoted = HashedDirIndex::promote_from_linear(
                            device,
                            dir_ino,
                            lin.blocks[0],
                            hash_version,
                            seed,
                        )?;
                        dir.flags.set(InodeFlags::INDEX);
                        *self = DirStorage::Indexed(promoted);
                        if let DirStorage::Indexed(idx) = self {
                            idx.insert_entry(device, dir_ino, name, inode, epoch)
                        } else {
                            unreachable!()
                        }
                    }
                    other => other,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HashVersion;
    use crate::dir::entry::Entry;
    use crate::harness::MemDevice;

    #[test]
    fn insert_on_a_corrupt_index_clears_the_index_flag_so_the_caller_can_retry_linear() {
        let mut device = MemDevice::new(128);
        let dir_ino = InodeNumber(80);
        let mut idx = HashedDirIndex::create(&mut device, dir_ino, HashVersion::HalfMd4, 0).unwrap();
        idx.insert_entry(&mut device, dir_ino, b"existing", InodeNumber(1), 1).unwrap();

        // Corrupt the root's info_length byte so any future parse trips
        // the `BadDxDir` guard in `HashedDirIndex::parse_root`.
        let mut root_bytes = device.read_block(idx.root_block).unwrap();
        let dot = Entry::parse(&root_bytes, 0).unwrap();
        let dotdot = Entry::parse(&root_bytes[dot.rec_len()..], dot.rec_len()).unwrap();
        let info_off = dot.rec_len() + dotdot.rec_len();
        root_bytes[info_off + 5] = 0xFF;
        device.write_block(idx.root_block, &root_bytes).unwrap();

        let mut dir = Inode { flags: InodeFlags::INDEX, epoch_number: 1, ..Default::default() };
        let mut storage = DirStorage::Indexed(idx);
        let result = storage.insert(
            &mut device,
            &mut dir,
            dir_ino,
            b"new",
            InodeNumber(2),
            1,
            false,
            HashVersion::HalfMd4,
            0,
        );

        assert_eq!(result, Err(FsError::BadDxDir));
        assert!(!dir.has_flag(InodeFlags::INDEX));
    }
}

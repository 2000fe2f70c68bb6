//! Namespace operations: `lookup`, `create`, `link`, `unlink`, `rmdir`,
//! `mkdir`, `rename`, `symlink`, `mknod`.
//!
//! Every mutating operation runs through [`is_unchangeable`] first, and
//! every insertion that required a [`dup_inode`](crate::inode::dup_inode)
//! is wrapped in a [`DupGuard`] so a failure downstream rolls the
//! duplication back exactly once.

pub mod orphan;

use log::{debug, warn};

use crate::device::{Device, HashVersion};
use crate::dir::entry::FileType;
use crate::dir::{DirStorage, Entry};
use crate::epoch::{Clock, EpochResolver, Resolved};
use crate::error::FsError;
use crate::inode::{dup_inode, DupGuard, FakeInodeFactory, Inode, InodeFlags, InodeNumber};
use crate::superblock::{FsConfig, Superblock};

pub const LINK_MAX: u16 = 65_000;

/// Bundles the config and clock every operation needs; device and
/// superblock state are threaded explicitly so the engine never hides
/// mutable state behind `self`.
pub struct NamespaceOps<'c> {
    pub config: FsConfig,
    pub clock: &'c dyn Clock,
}

/// The result of a successful `lookup`.
pub enum Looked {
    /// A live binding resolved to its persistent inode.
    Live { ino: InodeNumber, inode: Inode },

    /// A historical binding, projected read-only.
    Historical { ino: InodeNumber, inode: Inode },
}

impl<'c> NamespaceOps<'c> {
    pub fn new(config: FsConfig, clock: &'c dyn Clock) -> Self {
        NamespaceOps { config, clock }
    }

    /// Whether `name` (resolved against `dir`) denies mutation: either the
    /// parent directory itself predates the current epoch, or the name's
    /// own flux suffix addresses a past epoch or a version listing.
    pub fn is_unchangeable<D: Device>(
        &self,
        device: &mut D,
        dir: &Inode,
        name: &[u8],
        sb: &Superblock,
    ) -> Result<bool, FsError> {
        let _ = device;
        if dir.has_flag(InodeFlags::UNCHANGEABLE) {
            return Ok(true);
        }
        match EpochResolver::resolve(name, dir, false, sb.system_epoch, self.clock)? {
            Resolved::Scoped { epoch, .. } => Ok(epoch < sb.system_epoch),
            Resolved::VersionListing { .. } => Ok(true),
            // `parent_name_has_flux` is always `false` here, so `resolve`
            // cannot produce this, but mutation through a cycle can never
            // be allowed if it somehow did.
            Resolved::Cycle => Ok(true),
        }
    }

    pub fn lookup<D: Device>(
        &self,
        device: &mut D,
        dir: &Inode,
        dir_ino: InodeNumber,
        raw_name: &[u8],
        parent_name_has_flux: bool,
        sb: &Superblock,
    ) -> Result<Option<Looked>, FsError> {
        let resolved = EpochResolver::resolve(raw_name, dir, parent_name_has_flux, sb.system_epoch, self.clock)?;

        // A version listing of a version listing is a silent null dentry:
        // no further lookup against `dir`'s storage is ever performed.
        if matches!(resolved, Resolved::Cycle) {
            return Ok(None);
        }

        let (name, scope_epoch, version_listing) = match resolved {
            Resolved::Scoped { name, epoch } => (name, epoch, false),
            Resolved::VersionListing { name } => (name, sb.system_epoch, true),
            Resolved::Cycle => unreachable!("handled above"),
        };

        let storage = DirStorage::load(device, dir, dir_ino, self.config.hash_seed)?;
        let entry = find_with_fallback(device, dir, dir_ino, &storage, &name, scope_epoch, self.config.hash_version, self.config.hash_seed)?;

        let Some(entry) = entry else { return Ok(None) };
        if entry.header.inode == InodeNumber::UNUSED {
            return Ok(None);
        }

        let mut inode = device.read_inode(entry.header.inode)?;

        if !version_listing && scope_epoch >= sb.system_epoch {
            return Ok(Some(Looked::Live { ino: entry.header.inode, inode }));
        }

        // Walk the version chain down to the member covering `scope_epoch`.
        let mut ino = entry.header.inode;
        while inode.epoch_number > scope_epoch && inode.next_inode != InodeNumber::UNUSED {
            ino = inode.next_inode;
            inode = device.read_inode(ino)?;
        }

        let fake_ino = FakeInodeFactory::next_number();
        let fake_inode = FakeInodeFactory::project(&inode, scope_epoch);
        Ok(Some(Looked::Historical { ino: fake_ino, inode: fake_inode }))
    }

    /// Shared insertion path behind `create`/`mknod`/`symlink`/`link` and
    /// the insert half of a directory rename.
    pub fn add_entry<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        inode: InodeNumber,
    ) -> Result<(), FsError> {
        if self.is_unchangeable(device, dir, name, sb)? {
            return Err(FsError::ReadOnly);
        }

        let mut guard = None;
        if dir.epoch_number < sb.system_epoch {
            let clone_ino = dup_inode(device, dir_ino, sb.system_epoch)?;
            *dir = device.read_inode(dir_ino)?;
            guard = Some(DupGuard::new(dir_ino, clone_ino));
        }

        let mut storage = DirStorage::load(device, dir, dir_ino, self.config.hash_seed)?;
        let result = storage.insert(
            device,
            dir,
            dir_ino,
            name,
            inode,
            sb.system_epoch,
            self.config.allow_index_promotion,
            self.config.hash_version,
            self.config.hash_seed,
        );

        match result {
            Ok(()) => {
                device.write_inode(dir_ino, dir)?;
                if let Some(mut g) = guard {
                    g.disarm();
                }
                Ok(())
            }
            Err(FsError::BadDxDir) => {
                // Structural corruption: retry once via a forced linear
                // fallback (the `INDEX` flag was already cleared by
                // `DirStorage::insert`).
                device.write_inode(dir_ino, dir)?;
                let mut linear = DirStorage::load(device, dir, dir_ino, self.config.hash_seed)?;
                let retry = linear.insert(
                    device,
                    dir,
                    dir_ino,
                    name,
                    inode,
                    sb.system_epoch,
                    false,
                    self.config.hash_version,
                    self.config.hash_seed,
                );
                if retry.is_ok() {
                    device.write_inode(dir_ino, dir)?;
                }
                if let Some(mut g) = guard {
                    if retry.is_err() {
                        g.reclaim(device)?;
                    } else {
                        g.disarm();
                    }
                }
                retry
            }
            Err(e) => {
                if let Some(mut g) = guard {
                    g.reclaim(device)?;
                }
                Err(e)
            }
        }
    }

    pub fn create<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        mode: u16,
    ) -> Result<InodeNumber, FsError> {
        let ino = device.alloc_inode()?;
        let mut inode = Inode { mode, nlink: 1, epoch_number: sb.system_epoch, ..Default::default() };
        device.write_inode(ino, &inode)?;
        device.dquot_initialize(ino);

        match self.add_entry(device, sb, dir, dir_ino, name, ino) {
            Ok(()) => Ok(ino),
            Err(e) => {
                inode.nlink = 0;
                let _ = device.write_inode(ino, &inode);
                Err(e)
            }
        }
    }

    pub fn mknod<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        mode: u16,
    ) -> Result<InodeNumber, FsError> {
        self.create(device, sb, dir, dir_ino, name, mode)
    }

    pub fn symlink<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        target_len: u64,
    ) -> Result<InodeNumber, FsError> {
        let ino = self.create(device, sb, dir, dir_ino, name, 0o120777)?;
        let mut inode = device.read_inode(ino)?;
        inode.size = target_len;
        device.write_inode(ino, &inode)?;
        Ok(ino)
    }

    pub fn mkdir<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
    ) -> Result<InodeNumber, FsError> {
        if self.is_unchangeable(device, dir, name, sb)? {
            return Err(FsError::ReadOnly);
        }

        let new_ino = device.alloc_inode()?;
        let mut new_dir = Inode {
            mode: 0o040755,
            nlink: 2,
            epoch_number: dir.epoch_number,
            ..Default::default()
        };

        let block = device.append_block(new_ino)?;
        let mut leaf = crate::dir::DirLeaf::new(self.config.block_size as usize);
        // "." is born at the superblock's current epoch; ".." inherits the
        // parent directory's own epoch. The asymmetry matches how the
        // original stamps these two synthetic entries.
        leaf.insert(b".", new_ino, sb.system_epoch)?;
        leaf.insert(b"..", dir_ino, dir.epoch_number)?;
        device.write_block(block, leaf.as_bytes())?;
        device.write_inode(new_ino, &new_dir)?;

        match self.add_entry(device, sb, dir, dir_ino, name, new_ino) {
            Ok(()) => {
                dir.nlink = dir.nlink.saturating_add(1);
                device.write_inode(dir_ino, dir)?;
                new_dir.epoch_number = sb.system_epoch;
                device.write_inode(new_ino, &new_dir)?;
                Ok(new_ino)
            }
            Err(e) => {
                new_dir.nlink = 0;
                let _ = device.write_inode(new_ino, &new_dir);
                Err(e)
            }
        }
    }

    pub fn link<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &mut Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        target_ino: InodeNumber,
    ) -> Result<(), FsError> {
        let mut target = device.read_inode(target_ino)?;
        if target.nlink as u32 >= u32::from(LINK_MAX) {
            return Err(FsError::LinkMaxExceeded);
        }

        self.add_entry(device, sb, dir, dir_ino, name, target_ino)?;
        target.nlink += 1;
        device.write_inode(target_ino, &target)
    }

    /// Locates the physical record for `name`, tombstones it at the
    /// current epoch, and coalesces it into a physical predecessor when it
    /// was born and died in the same epoch (see
    /// [`crate::dir::leaf::DirLeaf::tombstone`]). A name that is already
    /// dead is a no-op success, matching the original's early return.
    pub fn delete_entry<D: Device>(
        &self,
        device: &mut D,
        sb: &Superblock,
        dir: &Inode,
        dir_ino: InodeNumber,
        name: &[u8],
    ) -> Result<InodeNumber, FsError> {
        let storage = DirStorage::load(device, dir, dir_ino, self.config.hash_seed)?;
        let leaf_blocks = match &storage {
            DirStorage::Linear(lin) => lin.blocks.clone(),
            DirStorage::Indexed(idx) => idx.all_leaf_blocks(device)?,
        };

        for block in leaf_blocks {
            let buf = device.read_block(block)?;
            let mut leaf = crate::dir::DirLeaf::from_bytes(buf);
            let Some(found) = leaf.scan(name, sb.system_epoch)? else { continue };
            if !found.is_alive() {
                return Ok(found.header.inode);
            }
            let ino = found.header.inode;
            leaf.tombstone(found, sb.system_epoch)?;
            device.write_block(block, leaf.as_bytes())?;
            return Ok(ino);
        }

        Err(FsError::NotFound)
    }

    /// Precondition for `rmdir`: every remaining live entry other than
    /// `.`/`..` must be out of scope for the directory's own epoch.
    pub fn empty_dir<D: Device>(
        &self,
        device: &mut D,
        dir: &Inode,
        dir_ino: InodeNumber,
    ) -> Result<bool, FsError> {
        let storage = DirStorage::load(device, dir, dir_ino, self.config.hash_seed)?;
        for entry in storage.all_entries(device)? {
            if entry.name == b"." || entry.name == b".." {
                continue;
            }
            if entry.in_scope(dir.epoch_number) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn unlink<D: Device>(
        &self,
        device: &mut D,
        sb: &mut Superblock,
        dir: &Inode,
        dir_ino: InodeNumber,
        name: &[u8],
    ) -> Result<(), FsError> {
        if self.is_unchangeable(device, dir, name, sb)? {
            return Err(FsError::ReadOnly);
        }

        let ino = self.delete_entry(device, sb, dir, dir_ino, name)?;
        let mut inode = device.read_inode(ino)?;

        if inode.epoch_number == sb.system_epoch {
            // Born this epoch: the unlink is a real removal.
            inode.nlink = inode.nlink.saturating_sub(1);
            device.write_inode(ino, &inode)?;
            if inode.nlink == 0 {
                orphan::orphan_add(device, sb, ino)?;
            }
        } else {
            // Predates this epoch: the entry stays addressable historically.
            // Only the link-count-reaches-zero case marks the inode
            // unchangeable; an nlink above 1 still has other live names.
            if inode.nlink <= 1 {
                inode.flags.set(InodeFlags::UNCHANGEABLE);
                device.write_inode(ino, &inode)?;
            }
        }
        Ok(())
    }

    pub fn rmdir<D: Device>(
        &self,
        device: &mut D,
        sb: &mut Superblock,
        dir: &Inode,
        dir_ino: InodeNumber,
        name: &[u8],
    ) -> Result<(), FsError> {
        if self.is_unchangeable(device, dir, name, sb)? {
            return Err(FsError::ReadOnly);
        }

        let target_ino = self.find_live_child(device, dir, dir_ino, name, sb.system_epoch)?;
        let target = device.read_inode(target_ino)?;
        if !self.empty_dir(device, &target, target_ino)? {
            return Err(FsError::NotEmpty);
        }

        self.delete_entry(device, sb, dir, dir_ino, name)?;
        let mut target = target;

        if target.epoch_number == sb.system_epoch {
            target.nlink = 0;
            orphan::orphan_add(device, sb, target_ino)?;
        }
        target.flags.set(InodeFlags::UNCHANGEABLE);
        device.write_inode(target_ino, &target)
    }

    /// Both endpoints of a rename must be mutable: neither can be a past
    /// version, and (for a directory rename) the entry's `..` must still
    /// point at `old_dir`.
    pub fn rename<D: Device>(
        &self,
        device: &mut D,
        sb: &mut Superblock,
        old_dir: &mut Inode,
        old_dir_ino: InodeNumber,
        old_name: &[u8],
        new_dir: &mut Inode,
        new_dir_ino: InodeNumber,
        new_name: &[u8],
    ) -> Result<(), FsError> {
        if self.is_unchangeable(device, old_dir, old_name, sb)?
            || self.is_unchangeable(device, new_dir, new_name, sb)?
        {
            return Err(FsError::ReadOnly);
        }

        let moved_ino = self.find_live_child(device, old_dir, old_dir_ino, old_name, sb.system_epoch)?;
        let moved = device.read_inode(moved_ino)?;

        if moved.is_dir() && old_dir_ino != new_dir_ino {
            let dotdot = self
                .find_live_child(device, &moved, moved_ino, b"..", sb.system_epoch)
                .ok();
            if dotdot != Some(old_dir_ino) {
                return Err(FsError::Invalid);
            }
        }

        self.add_entry(device, sb, new_dir, new_dir_ino, new_name, moved_ino)?;
        self.delete_entry(device, sb, old_dir, old_dir_ino, old_name)?;
        debug!("rename: {moved_ino} moved from directory {old_dir_ino} to {new_dir_ino}");

        if moved.is_dir() && old_dir_ino != new_dir_ino {
            self.update_dotdot(device, moved_ino, new_dir_ino, sb.system_epoch)?;
            old_dir.nlink = old_dir.nlink.saturating_sub(1);
            new_dir.nlink = new_dir.nlink.saturating_add(1);
            device.write_inode(old_dir_ino, old_dir)?;
            device.write_inode(new_dir_ino, new_dir)?;
        }

        Ok(())
    }

    fn update_dotdot<D: Device>(
        &self,
        device: &mut D,
        dir_ino: InodeNumber,
        new_parent: InodeNumber,
        epoch: u32,
    ) -> Result<(), FsError> {
        let dir = device.read_inode(dir_ino)?;
        let storage = DirStorage::load(device, &dir, dir_ino, self.config.hash_seed)?;
        let leaf_blocks = match &storage {
            DirStorage::Linear(lin) => lin.blocks.clone(),
            DirStorage::Indexed(idx) => idx.all_leaf_blocks(device)?,
        };
        for block in leaf_blocks {
            let buf = device.read_block(block)?;
            let mut leaf = crate::dir::DirLeaf::from_bytes(buf);
            if let Some(mut entry) = leaf.scan(b"..", epoch)? {
                entry.header.inode = new_parent;
                let off = entry.offset;
                let end = off + crate::dir::entry::HEADER_LEN + entry.name.len();
                let mut raw = leaf.as_bytes().to_vec();
                entry.write_into(&mut raw[off..end])?;
                leaf = crate::dir::DirLeaf::from_bytes(raw);
                device.write_block(block, leaf.as_bytes())?;
                return Ok(());
            }
        }
        Ok(())
    }

    fn find_live_child<D: Device>(
        &self,
        device: &mut D,
        dir: &Inode,
        dir_ino: InodeNumber,
        name: &[u8],
        epoch: u32,
    ) -> Result<InodeNumber, FsError> {
        let storage = DirStorage::load(device, dir, dir_ino, self.config.hash_seed)?;
        let entry = find_with_fallback(device, dir, dir_ino, &storage, name, epoch, self.config.hash_version, self.config.hash_seed)?;
        entry.map(|e| e.header.inode).ok_or(FsError::NotFound)
    }
}

/// Probes the hashed index when present, falling back to a linear scan
/// of every leaf on `BadDxDir` (structural corruption) exactly as the
/// original does for reads.
fn find_with_fallback<D: Device>(
    device: &mut D,
    _dir: &Inode,
    _dir_ino: InodeNumber,
    storage: &DirStorage,
    name: &[u8],
    epoch: u32,
    _hash_version: HashVersion,
    _seed: u32,
) -> Result<Option<Entry>, FsError> {
    match storage {
        DirStorage::Indexed(idx) => match idx.find_entry(device, name, epoch) {
            Ok(r) => Ok(r),
            Err(FsError::BadDxDir) => {
                warn!("hashed index corrupt, falling back to linear scan");
                let leaves = idx.all_leaf_blocks(device)?;
                for block in leaves {
                    let buf = device.read_block(block)?;
                    let leaf = crate::dir::DirLeaf::from_bytes(buf);
                    if let Some(e) = leaf.scan(name, epoch)? {
                        return Ok(Some(e));
                    }
                }
                Ok(None)
            }
            Err(e) => Err(e),
        },
        DirStorage::Linear(lin) => {
            let mut lin = crate::dir::LinearDir::new(lin.blocks.clone());
            lin.find(device, name, epoch)
        }
    }
}

/// File-type tag derivation from mode, used once the `FILETYPE` feature is
/// assumed present (see the Open Question on `FT_UNKNOWN`, resolved in
/// favor of always deriving the tag rather than leaving it `UNKNOWN`).
pub fn file_type_for_mode(mode: u16) -> FileType {
    match mode & 0o170000 {
        0o100000 => FileType::REGULAR,
        0o040000 => FileType::DIRECTORY,
        0o020000 => FileType::CHAR_DEVICE,
        0o060000 => FileType::BLOCK_DEVICE,
        0o010000 => FileType::FIFO,
        0o140000 => FileType::SOCKET,
        0o120000 => FileType::SYMLINK,
        _ => FileType::UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{FixedClock, MemDevice};

    #[test]
    fn file_type_for_mode_derives_known_types() {
        assert_eq!(file_type_for_mode(0o100644), FileType::REGULAR);
        assert_eq!(file_type_for_mode(0o040755), FileType::DIRECTORY);
        assert_eq!(file_type_for_mode(0o120777), FileType::SYMLINK);
    }

    #[test]
    fn is_unchangeable_when_the_parent_itself_is_frozen() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        root.flags.set(InodeFlags::UNCHANGEABLE);
        let sb = Superblock::new();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        assert!(ns.is_unchangeable(&mut device, &root, b"anything", &sb).unwrap());
    }

    /// End-to-end scenario: enough creations in a single block-size-128
    /// directory to overflow the initial linear block, forcing promotion
    /// to a hashed index, with every name still resolvable afterward.
    #[test]
    fn insert_through_split_promotes_the_directory_and_keeps_every_entry_findable() {
        let mut device = MemDevice::new(128).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let sb = Superblock::new();
        let clock = FixedClock(0);
        let config = FsConfig { block_size: 128, ..Default::default() };
        let ns = NamespaceOps::new(config, &clock);

        let names: alloc::vec::Vec<alloc::vec::Vec<u8>> =
            (0..20).map(|i| alloc::format!("file-{i:03}").into_bytes()).collect();
        for name in &names {
            ns.create(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, name, 0o100644).unwrap();
        }

        assert!(root.has_flag(InodeFlags::INDEX), "enough entries should have promoted the directory");

        for name in &names {
            let looked = ns.lookup(&mut device, &root, InodeNumber::ROOT_DIR, name, false, &sb).unwrap();
            assert!(matches!(looked, Some(Looked::Live { .. })));
        }
    }

    /// End-to-end scenario: a name with an explicit past-epoch flux suffix
    /// cannot be used as the target of a mutation.
    #[test]
    fn mutating_through_an_explicit_past_epoch_flux_name_is_rejected() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock::new();
        sb.advance_epoch();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        let err = ns
            .create(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"file@1", 0o100644)
            .unwrap_err();
        assert_eq!(err, FsError::ReadOnly);
    }

    /// End-to-end scenario: `name@yesterday` projects a read-only view
    /// from before the epoch advanced, when epoch numbers track wall time.
    #[test]
    fn symbolic_flux_lookup_returns_a_historical_projection() {
        const DAY: u64 = 86_400;
        let now = 10 * DAY;

        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock { system_epoch: now as u32, orphan_head: None };
        let clock = FixedClock(now + DAY);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        ns.create(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"report", 0o100644).unwrap();

        // A day passes.
        sb.system_epoch = (now + DAY) as u32;

        let looked = ns
            .lookup(&mut device, &root, InodeNumber::ROOT_DIR, b"report@yesterday", false, &sb)
            .unwrap();
        match looked {
            Some(Looked::Historical { inode, .. }) => assert_eq!(inode.mode, 0o100644),
            _ => panic!("expected a historical projection"),
        }
    }

    /// End-to-end scenario: a numeric flux epoch resolves through a
    /// `dup_inode`-produced version chain rather than the current head.
    #[test]
    fn looking_up_a_numeric_flux_epoch_walks_the_version_chain() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock::new();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        let ino = ns.create(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"doc", 0o100644).unwrap();
        sb.advance_epoch();
        let clone_ino = dup_inode(&mut device, ino, sb.system_epoch).unwrap();

        let looked = ns.lookup(&mut device, &root, InodeNumber::ROOT_DIR, b"doc@2", false, &sb).unwrap();
        match looked {
            Some(Looked::Historical { ino: fake_ino, inode }) => {
                assert_ne!(fake_ino, ino);
                assert_ne!(fake_ino, clone_ino);
                assert_eq!(inode.epoch_number, 1);
                assert_eq!(inode.mode, 0o100644);
            }
            _ => panic!("expected a historical projection"),
        }
    }

    /// End-to-end scenario: removing a directory in the epoch it was born
    /// in orphans it immediately; removing it in a later epoch preserves
    /// it, unchangeable, for history instead.
    #[test]
    fn rmdir_orphans_immediately_when_removed_in_its_birth_epoch() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock::new();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        let sub_ino = ns.mkdir(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"sub").unwrap();
        ns.rmdir(&mut device, &mut sb, &root, InodeNumber::ROOT_DIR, b"sub").unwrap();

        let sub = device.read_inode(sub_ino).unwrap();
        assert_eq!(sub.nlink, 0);
        assert!(sub.has_flag(InodeFlags::UNCHANGEABLE));
        assert_eq!(sb.orphan_head, Some(sub_ino));
    }

    #[test]
    fn rmdir_in_a_later_epoch_preserves_the_inode_for_history_instead_of_orphaning_it() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock::new();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        let sub_ino = ns.mkdir(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"sub").unwrap();
        sb.advance_epoch();
        ns.rmdir(&mut device, &mut sb, &root, InodeNumber::ROOT_DIR, b"sub").unwrap();

        let sub = device.read_inode(sub_ino).unwrap();
        assert_ne!(sub.nlink, 0, "an older-epoch directory is preserved, not zeroed, on removal");
        assert!(sub.has_flag(InodeFlags::UNCHANGEABLE));
        assert_eq!(sb.orphan_head, None);
    }

    #[test]
    fn rename_across_directories_updates_dotdot_and_adjusts_nlink() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock::new();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        let a_ino = ns.mkdir(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"a").unwrap();
        let b_ino = ns.mkdir(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"b").unwrap();
        let mut a = device.read_inode(a_ino).unwrap();
        let mut b = device.read_inode(b_ino).unwrap();

        let sub_ino = ns.mkdir(&mut device, &sb, &mut a, a_ino, b"sub").unwrap();

        ns.rename(&mut device, &mut sb, &mut a, a_ino, b"sub", &mut b, b_ino, b"sub").unwrap();

        assert!(ns.lookup(&mut device, &a, a_ino, b"sub", false, &sb).unwrap().is_none());
        let looked = ns.lookup(&mut device, &b, b_ino, b"sub", false, &sb).unwrap();
        assert!(matches!(looked, Some(Looked::Live { ino, .. }) if ino == sub_ino));

        let moved = device.read_inode(sub_ino).unwrap();
        let dotdot = ns.lookup(&mut device, &moved, sub_ino, b"..", false, &sb).unwrap();
        assert!(matches!(dotdot, Some(Looked::Live { ino, .. }) if ino == b_ino));

        assert_eq!(a.nlink, 2, "losing the subdirectory drops a's link count back to 2");
        assert_eq!(b.nlink, 3, "gaining the subdirectory bumps b's link count to 3");
    }

    #[test]
    fn link_increments_nlink_and_unlink_decrements_it_back_to_zero_then_orphans() {
        let mut device = MemDevice::new(4096).with_root();
        let mut root = device.read_inode(InodeNumber::ROOT_DIR).unwrap();
        let mut sb = Superblock::new();
        let clock = FixedClock(0);
        let ns = NamespaceOps::new(FsConfig::default(), &clock);

        let ino = ns.create(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"a", 0o100644).unwrap();
        ns.link(&mut device, &sb, &mut root, InodeNumber::ROOT_DIR, b"b", ino).unwrap();
        assert_eq!(device.read_inode(ino).unwrap().nlink, 2);

        ns.unlink(&mut device, &mut sb, &root, InodeNumber::ROOT_DIR, b"a").unwrap();
        assert_eq!(device.read_inode(ino).unwrap().nlink, 1);
        assert_eq!(sb.orphan_head, None);

        ns.unlink(&mut device, &mut sb, &root, InodeNumber::ROOT_DIR, b"b").unwrap();
        assert_eq!(device.read_inode(ino).unwrap().nlink, 0);
        assert_eq!(sb.orphan_head, Some(ino));
    }
}

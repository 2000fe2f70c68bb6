//! Hashed directory index: root block, one optional interior level, leaves.
//!
//! Mirrors the classic `dx_root` / `dx_node` / `dx_frame` design: a root
//! page carries the synthetic `.`/`..` entries plus an index array, an
//! optional interior level doubles the fan-out, and leaves are plain
//! [`crate::dir::leaf::DirLeaf`] blocks.

use alloc::vec::Vec;
use log::{debug, trace, warn};

use crate::device::{BlockId, Device, HashVersion};
use crate::dir::entry::{min_rec_len, Entry};
use crate::dir::leaf::DirLeaf;
use crate::error::FsError;
use crate::inode::InodeNumber;

pub const ROOT_INFO_LEN: u8 = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexEntry {
    pub hash: u32,
    pub block: BlockId,
}

impl IndexEntry {
    /// Low bit of the stored hash: set when the referenced leaf continues
    /// the previous leaf's hash bucket rather than starting a new one.
    pub fn continued(self) -> bool {
        self.hash & 1 != 0
    }

    pub fn bucket_hash(self) -> u32 {
        self.hash & !1
    }
}

/// A loaded index level: the raw entry array plus the cursor (`at`) left
/// by the last probe, mirroring a `dx_frame`.
#[derive(Clone, Debug)]
pub struct Frame {
    pub block: BlockId,
    pub entries: Vec<IndexEntry>,
    pub at: usize,
}

#[derive(Clone, Debug)]
pub struct RootInfo {
    pub hash_version: HashVersion,
    pub indirect_levels: u8,
}

pub struct HashedDirIndex {
    pub root_block: BlockId,
    pub info: RootInfo,
    pub seed: u32,
}

fn root_limit(block_size: usize) -> usize {
    // Space left after the synthetic `.`/`..` records and the info header.
    let dot_len = min_rec_len(1) as usize;
    let dotdot_len = min_rec_len(2) as usize;
    let header = dot_len + dotdot_len + ROOT_INFO_LEN as usize;
    (block_size - header) / core::mem::size_of::<u64>()
}

fn node_limit(block_size: usize) -> usize {
    let fake_dirent = min_rec_len(0) as usize;
    (block_size - fake_dirent) / core::mem::size_of::<u64>()
}

fn encode_entries(entries: &[IndexEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 8);
    for e in entries {
        out.extend_from_slice(&e.hash.to_le_bytes());
        out.extend_from_slice(&u32::from(e.block).to_le_bytes());
    }
    out
}

fn decode_entries(buf: &[u8], count: usize) -> Result<Vec<IndexEntry>, FsError> {
    if buf.len() < count * 8 {
        return Err(FsError::BadDxDir);
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let off = i * 8;
        let hash = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let block = u32::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
        out.push(IndexEntry { hash, block: BlockId(block) });
    }
    Ok(out)
}

impl HashedDirIndex {
    pub fn create<D: Device>(
        device: &mut D,
        dir_ino: InodeNumber,
        hash_version: HashVersion,
        seed: u32,
    ) -> Result<Self, FsError> {
        let root_block = device.append_block(dir_ino)?;
        let first_leaf = device.append_block(dir_ino)?;
        let leaf = DirLeaf::new(device.block_size() as usize);
        device.write_block(first_leaf, leaf.as_bytes())?;
        let index = HashedDirIndex {
            root_block,
            info: RootInfo { hash_version, indirect_levels: 0 },
            seed,
        };
        index.write_root(device, &[IndexEntry { hash: 0, block: first_leaf }])?;
        Ok(index)
    }

    pub fn load<D: Device>(
        device: &mut D,
        root_block: BlockId,
        seed: u32,
    ) -> Result<Self, FsError> {
        let buf = device.read_block(root_block)?;
        let (info, _entries) = Self::parse_root(&buf)?;
        Ok(HashedDirIndex { root_block, info, seed })
    }

    fn parse_root(buf: &[u8]) -> Result<(RootInfo, Vec<IndexEntry>), FsError> {
        let dot = Entry::parse(buf, 0)?;
        let dotdot = Entry::parse(&buf[dot.rec_len()..], dot.rec_len())?;
        let info_off = dot.rec_len() + dotdot.rec_len();
        if info_off + ROOT_INFO_LEN as usize > buf.len() {
            return Err(FsError::BadDxDir);
        }
        let hash_version = HashVersion::from_wire(buf[info_off + 4]).ok_or(FsError::BadDxDir)?;
        let info_length = buf[info_off + 5];
        let indirect_levels = buf[info_off + 6];
        if info_length != ROOT_INFO_LEN || indirect_levels > 1 {
            return Err(FsError::BadDxDir);
        }

        let entries_off = info_off + ROOT_INFO_LEN as usize;
        let limit = root_limit(buf.len());
        let count_bytes = buf.len() - entries_off;
        let count = count_bytes / 8;
        if count == 0 || count > limit {
            return Err(FsError::BadDxDir);
        }
        let entries = decode_entries(&buf[entries_off..], count)?;
        Ok((
            RootInfo { hash_version, indirect_levels },
            entries,
        ))
    }

    fn write_root<D: Device>(&self, device: &mut D, entries: &[IndexEntry]) -> Result<(), FsError> {
        let block_size = device.block_size() as usize;
        let mut buf = alloc::vec![0u8; block_size];

        let dot = Entry::new_live(b".", InodeNumber::UNUSED, min_rec_len(1), 0)?;
        let dotdot_len = block_size - dot.rec_len() - ROOT_INFO_LEN as usize - entries.len() * 8;
        let mut dotdot = Entry::new_live(b"..", InodeNumber::UNUSED, dotdot_len as u16, 0)?;
        dotdot.offset = dot.rec_len();

        let mut off = 0;
        dot.write_into(&mut buf[off..off + crate::dir::entry::HEADER_LEN + 1])?;
        off += dot.rec_len();
        dotdot.write_into(&mut buf[off..off + crate::dir::entry::HEADER_LEN + 2])?;
        off += dotdot.rec_len();

        buf[off + 4] = self.info.hash_version.to_wire();
        buf[off + 5] = ROOT_INFO_LEN;
        buf[off + 6] = self.info.indirect_levels;
        off += ROOT_INFO_LEN as usize;

        buf[off..off + entries.len() * 8].copy_from_slice(&encode_entries(entries));

        device.write_block(self.root_block, &buf)
    }

    fn read_node<D: Device>(&self, device: &mut D, block: BlockId, is_root: bool) -> Result<Vec<IndexEntry>, FsError> {
        let buf = device.read_block(block)?;
        if is_root {
            let (_info, entries) = Self::parse_root(&buf)?;
            Ok(entries)
        } else {
            let fake = Entry::parse(&buf, 0)?;
            let entries_off = fake.rec_len();
            let limit = node_limit(buf.len());
            let count = (buf.len() - entries_off) / 8;
            if count == 0 || count > limit {
                return Err(FsError::BadDxDir);
            }
            decode_entries(&buf[entries_off..], count)
        }
    }

    fn write_node<D: Device>(
        device: &mut D,
        block: BlockId,
        entries: &[IndexEntry],
    ) -> Result<(), FsError> {
        let block_size = device.block_size() as usize;
        let mut buf = alloc::vec![0u8; block_size];
        let fake_len = block_size - entries.len() * 8;
        let fake = Entry::new_live(b"", InodeNumber::UNUSED, fake_len as u16, 0)?;
        fake.write_into(&mut buf[..crate::dir::entry::HEADER_LEN])?;
        buf[fake.rec_len()..fake.rec_len() + entries.len() * 8]
            .copy_from_slice(&encode_entries(entries));
        device.write_block(block, &buf)
    }

    fn hash<D: Device>(&self, device: &D, name: &[u8]) -> u32 {
        device.dirhash(name, self.info.hash_version, self.seed)
    }

    /// Binary-searches `entries` for the frame position covering `hash`:
    /// the last entry whose bucket hash is `<= hash`.
    fn probe_position(entries: &[IndexEntry], hash: u32) -> usize {
        match entries.binary_search_by(|e| e.bucket_hash().cmp(&hash)) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        }
    }

    /// Walks from the root down to the leaf that should hold `name`,
    /// returning the frame stack (root first, deepest last) and the leaf
    /// block id. On any structural inconsistency returns `BadDxDir`; the
    /// caller is expected to fall back to a linear scan.
    pub fn probe<D: Device>(&self, device: &mut D, name: &[u8]) -> Result<(Vec<Frame>, BlockId), FsError> {
        let target_hash = self.hash(device, name);
        let mut frames = Vec::new();

        let root_entries = self.read_node(device, self.root_block, true)?;
        let at = Self::probe_position(&root_entries, target_hash);
        let mut block = root_entries[at].block;
        frames.push(Frame { block: self.root_block, entries: root_entries, at });

        if self.info.indirect_levels == 1 {
            let node_entries = self.read_node(device, block, false)?;
            if node_entries.is_empty() {
                return Err(FsError::BadDxDir);
            }
            let at = Self::probe_position(&node_entries, target_hash);
            block = node_entries[at].block;
            frames.push(Frame { block, entries: node_entries, at });
        }

        Ok((frames, block))
    }

    /// Looks up `name`/`epoch` across the whole tree. A hash bucket that
    /// outgrew a single leaf spills into the next leaf in index order, with
    /// the low bit of that leaf's [`IndexEntry::hash`] marking the
    /// continuation; on a scan miss this walks forward through the chain
    /// for as long as the continuation bit holds, mirroring
    /// `ext3cow_dx_find_entry`'s own `search_dirblock`/`htree_next_block`
    /// loop.
    pub fn find_entry<D: Device>(
        &self,
        device: &mut D,
        name: &[u8],
        epoch: u32,
    ) -> Result<Option<Entry>, FsError> {
        let (mut frames, mut leaf_block) = self.probe(device, name)?;
        loop {
            let buf = device.read_block(leaf_block)?;
            let leaf = DirLeaf::from_bytes(buf);
            if let Some(entry) = leaf.scan(name, epoch)? {
                return Ok(Some(entry));
            }
            match self.next_leaf(device, &mut frames)? {
                Some((next_block, true)) => leaf_block = next_block,
                _ => return Ok(None),
            }
        }
    }

    /// Advances the frame stack to the leaf immediately following the one
    /// it currently points at, crossing up into the parent frame (and back
    /// down into a freshly-read sibling node) when the deepest frame is
    /// exhausted. Returns the next leaf's block and whether its index
    /// entry carries the continuation bit; `None` once the tree is
    /// exhausted. The tree is at most two levels deep (root, optional
    /// interior), so crossing never needs to go more than one level up.
    fn next_leaf<D: Device>(&self, device: &mut D, frames: &mut Vec<Frame>) -> Result<Option<(BlockId, bool)>, FsError> {
        let deepest = frames.last_mut().expect("probe always pushes at least the root frame");
        if deepest.at + 1 < deepest.entries.len() {
            deepest.at += 1;
            let e = deepest.entries[deepest.at];
            return Ok(Some((e.block, e.continued())));
        }

        if frames.len() == 1 {
            return Ok(None);
        }

        frames.pop();
        let root = frames.last_mut().expect("popped only the non-root frame");
        if root.at + 1 >= root.entries.len() {
            return Ok(None);
        }
        root.at += 1;
        let node_block = root.entries[root.at].block;
        let node_entries = self.read_node(device, node_block, false)?;
        let Some(first) = node_entries.first().copied() else {
            return Err(FsError::BadDxDir);
        };
        frames.push(Frame { block: node_block, entries: node_entries, at: 0 });
        Ok(Some((first.block, first.continued())))
    }

    /// Inserts `name -> inode` born at `epoch`. Splits the target leaf (and
    /// promotes/splits the index) on overflow.
    pub fn insert_entry<D: Device>(
        &mut self,
        device: &mut D,
        dir_ino: InodeNumber,
        name: &[u8],
        inode: InodeNumber,
        epoch: u32,
    ) -> Result<(), FsError> {
        let (mut frames, leaf_block) = self.probe(device, name)?;
        let buf = device.read_block(leaf_block)?;
        let mut leaf = DirLeaf::from_bytes(buf);

        match leaf.insert(name, inode, epoch) {
            Ok(()) => {
                device.write_block(leaf_block, leaf.as_bytes())?;
                Ok(())
            }
            Err(FsError::NoSpace) => {
                self.split_and_insert(device, dir_ino, &mut frames, leaf_block, name, inode, epoch)
            }
            Err(e) => Err(e),
        }
    }

    fn split_and_insert<D: Device>(
        &mut self,
        device: &mut D,
        dir_ino: InodeNumber,
        frames: &mut [Frame],
        leaf_block: BlockId,
        name: &[u8],
        inode: InodeNumber,
        epoch: u32,
    ) -> Result<(), FsError> {
        debug!("leaf {leaf_block:?} full, splitting");
        let new_leaf_block = device.append_block(dir_ino)?;
        let split_hash = self.do_split(device, leaf_block, new_leaf_block)?;

        let target_block = if self.hash(device, name) >= split_hash {
            new_leaf_block
        } else {
            leaf_block
        };

        let buf = device.read_block(target_block)?;
        let mut leaf = DirLeaf::from_bytes(buf);
        leaf.insert(name, inode, epoch)?;
        device.write_block(target_block, leaf.as_bytes())?;

        self.insert_index_entry(device, dir_ino, frames, split_hash, new_leaf_block)
    }

    /// Splits `old_block`'s contents between `old_block` and `new_block`,
    /// choosing the cut point by scanning the hash-sorted map from the high
    /// end until more than half the original bytes would land in the
    /// second half. Returns the hash the new block now starts at (with the
    /// "continued" bit set when it shares its bucket with the predecessor).
    fn do_split<D: Device>(
        &self,
        device: &mut D,
        old_block: BlockId,
        new_block: BlockId,
    ) -> Result<u32, FsError> {
        let buf = device.read_block(old_block)?;
        let block_size = buf.len();
        let mut leaf = DirLeaf::from_bytes(buf);
        let packed = leaf.pack()?;
        let map = leaf.build_map(|name| {
            // `leaf.build_map` only needs the hash; recompute through the
            // device so split uses the same function as lookup.
            device.dirhash(name, self.info.hash_version, self.seed)
        })?;

        let mut size_from_top = 0usize;
        let mut split = map.len();
        for (i, m) in map.iter().enumerate().rev() {
            size_from_top += m.size;
            if size_from_top * 2 > block_size {
                split = i;
                break;
            }
        }
        if split == 0 {
            split = map.len() / 2;
        }

        let continued = split > 0 && map[split].hash == map[split - 1].hash;
        let split_hash = map[split].hash;

        let mut old_buf = alloc::vec![0u8; block_size];
        let mut new_buf = alloc::vec![0u8; block_size];

        let by_offset: alloc::collections::BTreeMap<usize, &Entry> =
            packed.iter().map(|e| (e.offset, e)).collect();

        let mut old_off = 0usize;
        let mut new_off = 0usize;
        for (i, m) in map.iter().enumerate() {
            let entry = by_offset[&m.offset];
            if i < split {
                let end = old_off + crate::dir::entry::HEADER_LEN + entry.name.len();
                let mut e = entry.clone();
                e.header.rec_len = m.size as u16;
                e.offset = old_off;
                e.write_into(&mut old_buf[old_off..end])?;
                old_off += m.size;
            } else {
                let end = new_off + crate::dir::entry::HEADER_LEN + entry.name.len();
                let mut e = entry.clone();
                e.header.rec_len = m.size as u16;
                e.offset = new_off;
                e.write_into(&mut new_buf[new_off..end])?;
                new_off += m.size;
            }
        }

        // Trailing slack on each half is absorbed by that half's last record.
        extend_last_record(&mut old_buf, old_off)?;
        extend_last_record(&mut new_buf, new_off)?;

        device.write_block(old_block, &old_buf)?;
        device.write_block(new_block, &new_buf)?;

        Ok(split_hash | u32::from(continued))
    }

    fn insert_index_entry<D: Device>(
        &mut self,
        device: &mut D,
        dir_ino: InodeNumber,
        frames: &mut [Frame],
        hash: u32,
        block: BlockId,
    ) -> Result<(), FsError> {
        // Parent is the deepest frame; its entries array is what gains a
        // new slot.
        let parent_idx = frames.len() - 1;
        let is_root = parent_idx == 0;
        let limit = if is_root {
            root_limit(device.block_size() as usize)
        } else {
            node_limit(device.block_size() as usize)
        };

        let mut entries = frames[parent_idx].entries.clone();
        let pos = Self::probe_position(&entries, hash) + 1;
        entries.insert(pos, IndexEntry { hash, block });

        if entries.len() <= limit {
            if is_root {
                self.write_root(device, &entries)?;
            } else {
                Self::write_node(device, frames[parent_idx].block, &entries)?;
            }
            return Ok(());
        }

        // Parent overflow.
        if self.info.indirect_levels == 0 {
            trace!("promoting directory index to one interior level");
            let interior_block = device.append_block(dir_ino)?;
            Self::write_node(device, interior_block, &entries)?;
            self.info.indirect_levels = 1;
            self.write_root(device, &[IndexEntry { hash: 0, block: interior_block }])?;
            Ok(())
        } else if is_root {
            // Root holding interior pointers is full: cannot add a third
            // level.
            warn!("hashed index exhausted at max depth");
            Err(FsError::NoSpace)
        } else {
            // Split the interior node, promote its midpoint hash to the root.
            let mid = entries.len() / 2;
            let (left, right) = entries.split_at(mid);
            let new_interior = device.append_block(dir_ino)?;
            Self::write_node(device, frames[parent_idx].block, left)?;
            Self::write_node(device, new_interior, right)?;

            let mut root_entries = frames[0].entries.clone();
            let split_hash = right[0].hash;
            let pos = Self::probe_position(&root_entries, split_hash) + 1;
            root_entries.insert(pos, IndexEntry { hash: split_hash, block: new_interior });
            if root_entries.len() > root_limit(device.block_size() as usize) {
                return Err(FsError::NoSpace);
            }
            self.write_root(device, &root_entries)
        }
    }

    /// Collects every leaf block reachable from the root, in index order.
    /// Used by `empty_dir` and directory iteration, where every entry
    /// (not just one name) needs to be visited.
    pub fn all_leaf_blocks<D: Device>(&self, device: &mut D) -> Result<Vec<BlockId>, FsError> {
        let root_entries = self.read_node(device, self.root_block, true)?;
        let mut leaves = Vec::new();
        if self.info.indirect_levels == 0 {
            for e in root_entries {
                leaves.push(e.block);
            }
        } else {
            for e in root_entries {
                let node_entries = self.read_node(device, e.block, false)?;
                for n in node_entries {
                    leaves.push(n.block);
                }
            }
        }
        Ok(leaves)
    }

    /// Converts a one-block linear directory into an indexed one: the
    /// existing block becomes the first leaf, a fresh root is allocated,
    /// and the contents are split between the two.
    pub fn promote_from_linear<D: Device>(
        device: &mut D,
        dir_ino: InodeNumber,
        linear_block: BlockId,
        hash_version: HashVersion,
        seed: u32,
    ) -> Result<Self, FsError> {
        let root_block = device.append_block(dir_ino)?;
        let index = HashedDirIndex {
            root_block,
            info: RootInfo { hash_version, indirect_levels: 0 },
            seed,
        };
        let new_leaf = device.append_block(dir_ino)?;
        let split_hash = index.do_split(device, linear_block, new_leaf)?;
        index.write_root(
            device,
            &[
                IndexEntry { hash: 0, block: linear_block },
                IndexEntry { hash: split_hash, block: new_leaf },
            ],
        )?;
        Ok(index)
    }
}

fn extend_last_record(buf: &mut [u8], used: usize) -> Result<(), FsError> {
    if used == 0 || used > buf.len() {
        return Ok(());
    }
    // Find the last record's offset by re-walking (small leaves; fine).
    let mut off = 0usize;
    let mut last_off = 0usize;
    while off < used {
        let entry = Entry::parse(buf, off)?;
        last_off = off;
        off += entry.rec_len();
    }
    let extra = buf.len() - used;
    let rec_len = u16::from_le_bytes(buf[last_off + 4..last_off + 6].try_into().unwrap());
    let new_len = rec_len + extra as u16;
    buf[last_off + 4..last_off + 6].copy_from_slice(&new_len.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::MemDevice;

    #[test]
    fn create_then_insert_then_find() {
        let mut device = MemDevice::new(128);
        let dir_ino = InodeNumber(50);
        let mut idx = HashedDirIndex::create(&mut device, dir_ino, HashVersion::HalfMd4, 0).unwrap();
        idx.insert_entry(&mut device, dir_ino, b"alpha", InodeNumber(10), 1).unwrap();
        idx.insert_entry(&mut device, dir_ino, b"bravo", InodeNumber(11), 1).unwrap();

        let found = idx.find_entry(&mut device, b"alpha", 1).unwrap().unwrap();
        assert_eq!(found.header.inode, InodeNumber(10));
        let found2 = idx.find_entry(&mut device, b"bravo", 1).unwrap().unwrap();
        assert_eq!(found2.header.inode, InodeNumber(11));
        assert!(idx.find_entry(&mut device, b"charlie", 1).unwrap().is_none());
    }

    #[test]
    fn overflow_splits_the_leaf_and_both_halves_stay_findable() {
        let mut device = MemDevice::new(128);
        let dir_ino = InodeNumber(50);
        let mut idx = HashedDirIndex::create(&mut device, dir_ino, HashVersion::HalfMd4, 0).unwrap();

        let names: Vec<Vec<u8>> = (0..30).map(|i| alloc::format!("name-{i:03}").into_bytes()).collect();
        for (i, name) in names.iter().enumerate() {
            idx.insert_entry(&mut device, dir_ino, name, InodeNumber(100 + i as u32), 1).unwrap();
        }

        let leaves = idx.all_leaf_blocks(&mut device).unwrap();
        assert!(leaves.len() > 1, "30 entries in 128-byte leaves should have forced at least one split");

        for (i, name) in names.iter().enumerate() {
            let found = idx.find_entry(&mut device, name, 1).unwrap().unwrap();
            assert_eq!(found.header.inode, InodeNumber(100 + i as u32));
        }
    }

    #[test]
    fn promote_from_linear_preserves_every_entry() {
        let mut device = MemDevice::new(128);
        let dir_ino = InodeNumber(51);
        let linear_block = device.append_block(dir_ino).unwrap();
        let mut leaf = DirLeaf::new(128);
        leaf.insert(b"one", InodeNumber(1), 1).unwrap();
        leaf.insert(b"two", InodeNumber(2), 1).unwrap();
        device.write_block(linear_block, leaf.as_bytes()).unwrap();

        let idx = HashedDirIndex::promote_from_linear(&mut device, dir_ino, linear_block, HashVersion::HalfMd4, 0).unwrap();

        assert!(idx.find_entry(&mut device, b"one", 1).unwrap().is_some());
        assert!(idx.find_entry(&mut device, b"two", 1).unwrap().is_some());
    }

    #[test]
    fn next_leaf_advances_within_the_root_frame_and_reports_its_continuation_bit() {
        let mut device = MemDevice::new(128);
        let idx = HashedDirIndex {
            root_block: BlockId(1),
            info: RootInfo { hash_version: HashVersion::HalfMd4, indirect_levels: 0 },
            seed: 0,
        };
        let mut frames = alloc::vec![Frame {
            block: BlockId(1),
            entries: alloc::vec![
                IndexEntry { hash: 0, block: BlockId(10) },
                IndexEntry { hash: 0x40 | 1, block: BlockId(11) },
                IndexEntry { hash: 0x80, block: BlockId(12) },
            ],
            at: 0,
        }];

        let (block, continued) = idx.next_leaf(&mut device, &mut frames).unwrap().unwrap();
        assert_eq!(block, BlockId(11));
        assert!(continued);

        let (block, continued) = idx.next_leaf(&mut device, &mut frames).unwrap().unwrap();
        assert_eq!(block, BlockId(12));
        assert!(!continued);

        assert!(idx.next_leaf(&mut device, &mut frames).unwrap().is_none());
    }

    #[test]
    fn find_entry_follows_a_continued_bucket_into_the_next_leaf() {
        let mut device = MemDevice::new(128);
        let dir_ino = InodeNumber(60);

        let root_block = device.append_block(dir_ino).unwrap();
        let leaf_a_block = device.append_block(dir_ino).unwrap();
        let mut leaf_a = DirLeaf::new(128);
        leaf_a.insert(b"first", InodeNumber(1), 1).unwrap();
        device.write_block(leaf_a_block, leaf_a.as_bytes()).unwrap();

        let leaf_b_block = device.append_block(dir_ino).unwrap();
        let mut leaf_b = DirLeaf::new(128);
        leaf_b.insert(b"second", InodeNumber(2), 1).unwrap();
        device.write_block(leaf_b_block, leaf_b.as_bytes()).unwrap();

        let idx = HashedDirIndex {
            root_block,
            info: RootInfo { hash_version: HashVersion::HalfMd4, indirect_levels: 0 },
            seed: 0,
        };
        // `leaf_b`'s entry carries the continuation bit (an odd hash) so a
        // miss in `leaf_a` must still find names that only live in `leaf_b`.
        idx.write_root(
            &mut device,
            &[
                IndexEntry { hash: 0, block: leaf_a_block },
                IndexEntry { hash: 1, block: leaf_b_block },
            ],
        )
        .unwrap();

        let found = idx.find_entry(&mut device, b"second", 1).unwrap().unwrap();
        assert_eq!(found.header.inode, InodeNumber(2));

        assert!(idx.find_entry(&mut device, b"missing", 1).unwrap().is_none());
    }

    #[test]
    fn index_entry_continuation_bit_round_trips_through_bucket_hash() {
        let continued = IndexEntry { hash: 0x10 | 1, block: BlockId(7) };
        assert!(continued.continued());
        assert_eq!(continued.bucket_hash(), 0x10);

        let fresh = IndexEntry { hash: 0x20, block: BlockId(8) };
        assert!(!fresh.continued());
    }
}

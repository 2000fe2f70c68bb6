//! A single blocksize-aligned page of packed directory records.

use alloc::vec::Vec;

use crate::dir::entry::{min_rec_len, Entry, HEADER_LEN};
use crate::error::FsError;
use crate::inode::InodeNumber;

/// One block's worth of directory entries, in on-disk byte form.
pub struct DirLeaf {
    buf: Vec<u8>,
}

/// A single slot of a hash-sorted map built over a leaf's live entries,
/// used by [`crate::dir::index::split_leaf`] to decide where to cut.
#[derive(Clone, Copy, Debug)]
pub struct MapEntry {
    pub hash: u32,
    pub offset: usize,
    pub size: usize,
}

impl DirLeaf {
    pub fn new(block_size: usize) -> Self {
        let mut buf = alloc::vec![0u8; block_size];
        // A single free record spanning the whole block.
        let rec_len = block_size as u16;
        buf[4..6].copy_from_slice(&rec_len.to_le_bytes());
        DirLeaf { buf }
    }

    pub fn from_bytes(buf: Vec<u8>) -> Self {
        DirLeaf { buf }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Iterates every record (live or tombstoned) in on-disk order.
    pub fn entries(&self) -> Result<Vec<Entry>, FsError> {
        let mut out = Vec::new();
        let mut off = 0usize;
        while off + HEADER_LEN <= self.buf.len() {
            let entry = Entry::parse(&self.buf[off..], off)?;
            let rec_len = entry.rec_len();
            if rec_len == 0 {
                return Err(FsError::Invalid);
            }
            out.push(entry);
            off += rec_len;
        }
        if off != self.buf.len() {
            return Err(FsError::Invalid);
        }
        Ok(out)
    }

    /// Finds the first entry matching `name` that is in scope at `epoch`.
    /// Does not short-circuit on a bare name match: two dead entries with
    /// disjoint epoch ranges may legitimately share a name.
    pub fn scan(&self, name: &[u8], epoch: u32) -> Result<Option<Entry>, FsError> {
        for entry in self.entries()? {
            if entry.name == name && entry.in_scope(epoch) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Inserts `name -> inode` born at `epoch`, reusing slack after a live
    /// record if one is large enough, splitting it otherwise.
    pub fn insert(
        &mut self,
        name: &[u8],
        inode: InodeNumber,
        epoch: u32,
    ) -> Result<(), FsError> {
        let needed = min_rec_len(name.len()) as usize;
        let entries = self.entries()?;

        for entry in &entries {
            let used = if entry.is_free() {
                0
            } else {
                min_rec_len(entry.name.len()) as usize
            };
            let slack = entry.rec_len() - used;
            if slack < needed {
                continue;
            }

            let mut new_entry = Entry::new_live(name, inode, slack as u16, epoch)?;
            new_entry.header.rec_len = slack as u16;

            if used == 0 {
                self.write_entry(entry.offset, &new_entry)?;
            } else {
                let mut shrunk = entry.clone();
                shrunk.header.rec_len = used as u16;
                self.write_entry(entry.offset, &shrunk)?;
                self.write_entry(entry.offset + used, &new_entry)?;
            }
            return Ok(());
        }

        Err(FsError::NoSpace)
    }

    /// Marks `entry` dead at `cur_epoch`. When the record was born and died
    /// in the same epoch and a physical predecessor exists, its space is
    /// folded into that predecessor (`rec_len` growth, `inode` zeroed);
    /// otherwise the record is left byte-identical except for the new
    /// `death_epoch`, so past scopes keep seeing it.
    pub fn tombstone(&mut self, mut entry: Entry, cur_epoch: u32) -> Result<(), FsError> {
        let same_epoch = entry.header.birth_epoch == cur_epoch;
        entry.header.death_epoch = cur_epoch;
        self.write_header(entry.offset, &entry.header)?;

        if same_epoch {
            if let Some(pred_offset) = self.predecessor_offset(entry.offset)? {
                let pred = Entry::parse(&self.buf[pred_offset..], pred_offset)?;
                let merged_len = pred.rec_len() + entry.rec_len();
                let mut merged = pred;
                merged.header.rec_len = merged_len as u16;
                self.write_header(pred_offset, &merged.header)?;
            }
        }
        Ok(())
    }

    fn predecessor_offset(&self, offset: usize) -> Result<Option<usize>, FsError> {
        let mut off = 0usize;
        let mut prev = None;
        while off < offset {
            let entry = Entry::parse(&self.buf[off..], off)?;
            if off + entry.rec_len() >= offset {
                prev = Some(off);
                break;
            }
            off += entry.rec_len();
        }
        Ok(prev)
    }

    /// Shrinks every live record to its minimal size and slides the tail
    /// record to absorb the remaining slack. Returns the resulting entries
    /// in on-disk order.
    pub fn pack(&mut self) -> Result<Vec<Entry>, FsError> {
        let entries = self.entries()?;
        let mut packed = Vec::with_capacity(entries.len());
        let mut cursor = 0usize;

        for entry in entries {
            if entry.is_free() {
                continue;
            }
            let mut e = entry;
            e.header.rec_len = min_rec_len(e.name.len());
            e.offset = cursor;
            cursor += e.header.rec_len as usize;
            packed.push(e);
        }

        if let Some(last) = packed.last_mut() {
            last.header.rec_len += (self.buf.len() - cursor) as u16;
        } else {
            // Fully empty leaf: one free record spanning the block.
            let mut buf = alloc::vec![0u8; self.buf.len()];
            let rec_len = self.buf.len() as u16;
            buf[4..6].copy_from_slice(&rec_len.to_le_bytes());
            self.buf = buf;
            return Ok(Vec::new());
        }

        let mut buf = alloc::vec![0u8; self.buf.len()];
        for e in &packed {
            let end = e.offset + HEADER_LEN + e.name.len();
            e.write_into(&mut buf[e.offset..end])?;
        }
        self.buf = buf;
        Ok(packed)
    }

    /// Hash-sorted map over this leaf's live entries (combsort then a
    /// bubble-sort finishing pass, matching the original's two-stage sort).
    pub fn build_map(&self, hash_of: impl Fn(&[u8]) -> u32) -> Result<Vec<MapEntry>, FsError> {
        let mut map: Vec<MapEntry> = self
            .entries()?
            .into_iter()
            .filter(|e| !e.is_free())
            .map(|e| MapEntry {
                hash: hash_of(&e.name),
                offset: e.offset,
                size: min_rec_len(e.name.len()) as usize,
            })
            .collect();

        comb_sort(&mut map);
        Ok(map)
    }

    fn write_entry(&mut self, offset: usize, entry: &Entry) -> Result<(), FsError> {
        let end = offset + HEADER_LEN + entry.name.len();
        if end > self.buf.len() {
            return Err(FsError::Invalid);
        }
        entry.write_into(&mut self.buf[offset..end])
    }

    fn write_header(
        &mut self,
        offset: usize,
        header: &crate::dir::entry::EntryHeader,
    ) -> Result<(), FsError> {
        if offset + HEADER_LEN > self.buf.len() {
            return Err(FsError::Invalid);
        }
        self.buf[offset..offset + HEADER_LEN].copy_from_slice(bytemuck::bytes_of(header));
        Ok(())
    }
}

/// Combsort gap sequence followed by a bubble-sort finishing pass. Not the
/// fastest comparison sort, but it is what the original build uses for
/// small in-leaf maps and we keep it for grounding fidelity.
fn comb_sort(map: &mut [MapEntry]) {
    let mut gap = map.len();
    let shrink = 1.3;
    loop {
        gap = ((gap as f32) / shrink) as usize;
        if gap < 1 {
            gap = 1;
        }
        let mut swapped = false;
        let mut i = 0;
        while i + gap < map.len() {
            if map[i].hash > map[i + gap].hash {
                map.swap(i, i + gap);
                swapped = true;
            }
            i += 1;
        }
        if gap == 1 && !swapped {
            break;
        }
    }

    loop {
        let mut swapped = false;
        for i in 0..map.len().saturating_sub(1) {
            if map[i].hash > map[i + 1].hash {
                map.swap(i, i + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_scan_finds_the_live_entry() {
        let mut leaf = DirLeaf::new(256);
        leaf.insert(b"foo", InodeNumber(10), 1).unwrap();
        let found = leaf.scan(b"foo", 1).unwrap().unwrap();
        assert_eq!(found.header.inode, InodeNumber(10));
        assert!(found.is_alive());
    }

    #[test]
    fn scan_misses_a_name_born_after_the_requested_epoch() {
        let mut leaf = DirLeaf::new(256);
        leaf.insert(b"foo", InodeNumber(10), 3).unwrap();
        assert!(leaf.scan(b"foo", 1).unwrap().is_none());
    }

    #[test]
    fn insert_into_an_existing_record_shrinks_it_and_hands_the_slack_to_the_new_entry() {
        let mut leaf = DirLeaf::new(64);
        leaf.insert(b"aa", InodeNumber(1), 1).unwrap();
        leaf.insert(b"b", InodeNumber(2), 1).unwrap();

        let entries = leaf.entries().unwrap();
        assert_eq!(entries.len(), 2);
        let aa = entries.iter().find(|e| e.name == b"aa").unwrap();
        let b = entries.iter().find(|e| e.name == b"b").unwrap();
        assert_eq!(aa.rec_len() as usize, min_rec_len(2) as usize);
        assert_eq!(aa.rec_len() as usize + b.rec_len() as usize, 64);
    }

    #[test]
    fn full_leaf_rejects_further_inserts_with_no_space() {
        let mut leaf = DirLeaf::new(32);
        leaf.insert(b"first", InodeNumber(1), 1).unwrap();
        assert_eq!(leaf.insert(b"second", InodeNumber(2), 1), Err(FsError::NoSpace));
    }

    #[test]
    fn tombstone_born_and_died_in_the_same_epoch_coalesces_into_the_predecessor() {
        let mut leaf = DirLeaf::new(64);
        leaf.insert(b"a", InodeNumber(1), 1).unwrap();
        leaf.insert(b"b", InodeNumber(2), 1).unwrap();

        let before = leaf.entries().unwrap().into_iter().find(|e| e.name == b"a").unwrap();
        let victim = leaf.scan(b"b", 1).unwrap().unwrap();
        leaf.tombstone(victim, 1).unwrap();

        let entries = leaf.entries().unwrap();
        assert_eq!(entries.len(), 1, "the dead record's space folds into its predecessor");
        let after = entries.into_iter().find(|e| e.name == b"a").unwrap();
        assert!(after.rec_len() > before.rec_len());
    }

    #[test]
    fn tombstone_in_a_later_epoch_stays_visible_to_past_scopes() {
        let mut leaf = DirLeaf::new(64);
        leaf.insert(b"a", InodeNumber(1), 1).unwrap();
        let entry = leaf.scan(b"a", 1).unwrap().unwrap();
        leaf.tombstone(entry, 2).unwrap();

        assert!(leaf.scan(b"a", 1).unwrap().is_some(), "epoch 1 predates the death and still sees it");
        assert!(leaf.scan(b"a", 2).unwrap().is_none(), "epoch 2 sees it as deleted");

        let entries = leaf.entries().unwrap();
        let a = entries.into_iter().find(|e| e.name == b"a").unwrap();
        assert_eq!(a.header.birth_epoch, 1);
        assert_eq!(a.header.death_epoch, 2);
    }

    #[test]
    fn build_map_sorts_entries_by_hash() {
        let mut leaf = DirLeaf::new(256);
        leaf.insert(b"delta", InodeNumber(4), 1).unwrap();
        leaf.insert(b"alpha", InodeNumber(1), 1).unwrap();
        leaf.insert(b"charlie", InodeNumber(3), 1).unwrap();
        leaf.insert(b"bravo", InodeNumber(2), 1).unwrap();

        let hash_of = |name: &[u8]| name.iter().fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let map = leaf.build_map(hash_of).unwrap();

        assert_eq!(map.len(), 4);
        for pair in map.windows(2) {
            assert!(pair[0].hash <= pair[1].hash);
        }
    }
}

//! Orphan list: inodes whose link count dropped to zero while still open
//! elsewhere, threaded through `Inode::next_orphan` and rooted at the
//! superblock.
//!
//! The list itself is core logic (plain pointer splicing); persisting the
//! head and the inodes it touches is the host's job via
//! [`crate::device::Device`]. Callers are expected to hold whatever host
//! mutex protects the superblock for the duration of add/del, matching the
//! original's per-superblock orphan mutex.

use log::debug;

use crate::device::Device;
use crate::error::FsError;
use crate::inode::InodeNumber;
use crate::superblock::Superblock;

pub fn orphan_add<D: Device>(
    device: &mut D,
    sb: &mut Superblock,
    ino: InodeNumber,
) -> Result<(), FsError> {
    let mut inode = device.read_inode(ino)?;
    inode.next_orphan = sb.orphan_head.unwrap_or(InodeNumber::UNUSED);
    device.write_inode(ino, &inode)?;

    // Only update the in-memory head after the journal write succeeds, so
    // a failed write never leaves the head pointing at an un-persisted
    // splice.
    sb.orphan_head = Some(ino);
    device.set_orphan_head(Some(ino));
    debug!("orphan_add: {ino} pushed onto orphan list");
    Ok(())
}

pub fn orphan_del<D: Device>(
    device: &mut D,
    sb: &mut Superblock,
    ino: InodeNumber,
) -> Result<(), FsError> {
    let Some(head) = sb.orphan_head else {
        return Ok(());
    };

    if head == ino {
        let inode = device.read_inode(ino)?;
        let next = inode.next_orphan;
        sb.orphan_head = if next == InodeNumber::UNUSED { None } else { Some(next) };
        device.set_orphan_head(sb.orphan_head);
        debug!("orphan_del: {ino} was head, new head {:?}", sb.orphan_head);
        return Ok(());
    }

    let mut cur = head;
    loop {
        let inode = device.read_inode(cur)?;
        let next = inode.next_orphan;
        if next == ino {
            let target = device.read_inode(ino)?;
            let mut prev = inode;
            prev.next_orphan = target.next_orphan;
            device.write_inode(cur, &prev)?;
            debug!("orphan_del: unlinked {ino} from the middle of the orphan list");
            return Ok(());
        }
        if next == InodeNumber::UNUSED {
            return Ok(());
        }
        cur = next;
    }
}

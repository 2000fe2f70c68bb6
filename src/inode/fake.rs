//! Ephemeral, read-only inodes projecting a historical version.

use spin::Mutex;

use crate::inode::types::{Inode, InodeFlags, InodeNumber};

/// Process-wide counter for fake inode numbers, counting down from
/// `u32::MAX` so the resulting numbers stay disjoint from any persistent
/// inode number an allocator would hand out.
static NEXT_FAKE_INO: Mutex<u32> = Mutex::new(u32::MAX);

/// Produces VFS-only inodes that project a past version of a real inode.
///
/// A fake inode is never written back to the device: it exists only so the
/// host VFS has something to attach a dentry to while presenting a
/// historical view.
pub struct FakeInodeFactory;

impl FakeInodeFactory {
    /// Wraps `backing` (the chain member whose `epoch_number <= requested_epoch`)
    /// as a read-only projection at `requested_epoch`.
    pub fn project(backing: &Inode, requested_epoch: u32) -> Inode {
        let mut fake = *backing;
        fake.flags = fake.flags
            | InodeFlags::UNCHANGEABLE
            | InodeFlags::UNVERSIONABLE
            | InodeFlags::FAKEINODE
            | InodeFlags::IMMUTABLE;
        fake.epoch_number = requested_epoch;
        fake.next_inode = InodeNumber::UNUSED;
        fake
    }

    /// Allocates the next synthetic inode number from the reserved range.
    pub fn next_number() -> InodeNumber {
        let mut counter = NEXT_FAKE_INO.lock();
        let n = *counter;
        *counter = counter.saturating_sub(1);
        InodeNumber(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_number_counts_down_and_stays_in_the_fake_range() {
        let a = FakeInodeFactory::next_number();
        let b = FakeInodeFactory::next_number();
        assert!(a.0 > b.0);
        assert!(b >= InodeNumber::FAKE_RANGE_START);
    }

    #[test]
    fn project_forces_read_only_flags_and_clears_the_chain_link() {
        let backing = Inode {
            epoch_number: 4,
            next_inode: InodeNumber(99),
            nlink: 2,
            mode: 0o100644,
            ..Default::default()
        };

        let fake = FakeInodeFactory::project(&backing, 2);

        assert_eq!(fake.epoch_number, 2);
        assert_eq!(fake.next_inode, InodeNumber::UNUSED);
        assert_eq!(fake.nlink, backing.nlink);
        assert!(fake.has_flag(InodeFlags::UNCHANGEABLE));
        assert!(fake.has_flag(InodeFlags::UNVERSIONABLE));
        assert!(fake.has_flag(InodeFlags::FAKEINODE));
        assert!(fake.has_flag(InodeFlags::IMMUTABLE));
    }
}

//! Inode data model, version chains, and fake (historical) inodes.

mod chain;
mod fake;
mod types;

pub use chain::{dup_inode, reclaim_dup_inode, DupGuard};
pub use fake::FakeInodeFactory;
pub use types::{Inode, InodeFlags, InodeNumber, EPOCH_ALIVE};

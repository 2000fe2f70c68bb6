//! The slice of superblock state the directory-namespace core reads.

use crate::device::HashVersion;
use crate::inode::InodeNumber;

/// Host-provided, host-persisted configuration. Passed explicitly at
/// construction rather than read from a global, so the engine stays
/// testable against an in-memory [`crate::harness::MemDevice`].
#[derive(Clone, Copy, Debug)]
pub struct FsConfig {
    pub block_size: u32,
    pub hash_version: HashVersion,
    pub hash_seed: u32,

    /// Whether a one-block linear directory may be promoted to a hashed
    /// index on first overflow. Disabled in tests that want to exercise
    /// the pure linear path.
    pub allow_index_promotion: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        FsConfig {
            block_size: 4096,
            hash_version: HashVersion::HalfMd4,
            hash_seed: 0,
            allow_index_promotion: true,
        }
    }
}

/// In-memory mirror of the on-disk superblock fields the core mutates:
/// the monotonic system epoch and the orphan list head.
#[derive(Clone, Copy, Debug, Default)]
pub struct Superblock {
    pub system_epoch: u32,
    pub orphan_head: Option<InodeNumber>,
}

impl Superblock {
    pub fn new() -> Self {
        Superblock { system_epoch: 1, orphan_head: None }
    }

    /// Advances the system epoch; called by the host on whatever cadence
    /// it chooses to snapshot (e.g. a timer, or an explicit checkpoint
    /// command). Never called implicitly by namespace operations.
    pub fn advance_epoch(&mut self) {
        self.system_epoch = self.system_epoch.saturating_add(1);
    }
}

//! Error types shared across the directory-namespace core.
//!
//! Mirrors the rest of the crate's convention: plain enums implementing
//! [`BaseError`] rather than a boxed/dynamic error hierarchy, since every
//! fallible surface here has a small, closed set of outcomes.

use core::fmt::Debug;

/// Marker trait for the crate's error enums.
pub trait BaseError: Debug {}

/// An operation that only reports success or failure.
pub type CanFail<T> = Result<(), T>;

/// Errors surfaced by the directory-namespace core.
///
/// `BadDxDir` is internal plumbing: it must never escape [`crate::namespace`]
/// to a caller. Every site that can observe it is required to fall back to
/// a linear scan (reads) or clear the index flag and retry (writes).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FsError {
    /// No entry matches the requested name/epoch.
    NotFound,

    /// `rmdir` on a directory that still has live entries in scope.
    NotEmpty,

    /// Name exceeds `MAX_NAME`.
    NameTooLong,

    /// Malformed on-disk structure (bad `rec_len`, limit mismatch, ...).
    Invalid,

    /// Name already bound in the requested scope.
    Exists,

    /// Device read/write failure.
    Io,

    /// Operation not permitted.
    Access,

    /// No space left to complete a split or allocation.
    NoSpace,

    /// Hard link count would exceed `LINK_MAX`.
    LinkMaxExceeded,

    /// Attempted mutation of an entity that belongs to a past epoch.
    ReadOnly,

    /// Dangling or reused inode reference.
    Stale,

    /// Corrupt index node; caller must fall back to linear scan/insert.
    BadDxDir,
}

impl BaseError for FsError {}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            FsError::NotFound => "no such entry",
            FsError::NotEmpty => "directory not empty",
            FsError::NameTooLong => "name too long",
            FsError::Invalid => "invalid on-disk structure",
            FsError::Exists => "entry already exists",
            FsError::Io => "I/O error",
            FsError::Access => "operation not permitted",
            FsError::NoSpace => "no space left",
            FsError::LinkMaxExceeded => "too many links",
            FsError::ReadOnly => "past epoch is read-only",
            FsError::Stale => "stale inode reference",
            FsError::BadDxDir => "corrupt hashed index",
        };
        f.write_str(msg)
    }
}

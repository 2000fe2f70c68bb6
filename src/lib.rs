//! Directory-namespace core of a copy-on-write, versioned file system.
//!
//! This crate hashes directory lookups the way a classic indexed
//! directory does, but every entry and inode additionally carries a birth
//! and death epoch: mutating something born in a past epoch clones it
//! first, so a name can still be resolved against an earlier point in time
//! through the `name@epoch` flux syntax. See [`namespace`] for the public
//! operations and [`epoch`] for how the flux suffix is parsed.
#![no_std]
#![allow(dead_code)]

#[macro_use]
pub mod macros;

pub mod device;
pub mod dir;
pub mod epoch;
pub mod error;
pub mod inode;
pub mod namespace;
pub mod superblock;

#[cfg(any(test, feature = "std"))]
pub mod harness;

extern crate alloc;

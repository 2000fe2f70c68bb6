//! Flux-token parsing and epoch scoping.

use alloc::vec::Vec;

use crate::error::FsError;
use crate::inode::{Inode, InodeFlags};

/// Reserved byte separating a base name from its epoch selector, e.g.
/// `report@yesterday` or `report@42`.
pub const FLUX_TOKEN: u8 = b'@';

const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;
const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

/// Host-provided wall clock, injected rather than read from the
/// environment so symbolic flux offsets stay deterministic in tests.
pub trait Clock {
    fn now_unix(&self) -> u64;
}

/// Outcome of parsing a (possibly flux-suffixed) lookup name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolved {
    /// Plain name, scoped at `epoch`.
    Scoped { name: Vec<u8>, epoch: u32 },

    /// Bare `name@` with no selector: a version-listing request.
    VersionListing { name: Vec<u8> },

    /// A version listing of a version listing (`parent_name_has_flux` was
    /// already set): a null lookup, resolved no further.
    Cycle,
}

/// Parses the flux suffix and scopes the resulting lookup, mirroring the
/// original's `ext3cow_lookup` front matter.
pub struct EpochResolver;

impl EpochResolver {
    /// `parent` supplies the default scope epoch (its own epoch if it is
    /// `UNCHANGEABLE`, otherwise `system_epoch`) and is consulted for the
    /// version-listing cycle guard.
    pub fn resolve(
        raw_name: &[u8],
        parent: &Inode,
        parent_name_has_flux: bool,
        system_epoch: u32,
        clock: &dyn Clock,
    ) -> Result<Resolved, FsError> {
        let default_epoch = if parent.has_flag(InodeFlags::UNCHANGEABLE) {
            parent.epoch_number
        } else {
            system_epoch
        };

        let Some(token_pos) = raw_name.iter().rposition(|&b| b == FLUX_TOKEN) else {
            return Ok(Resolved::Scoped { name: raw_name.to_vec(), epoch: default_epoch });
        };

        let base = &raw_name[..token_pos];
        let suffix = &raw_name[token_pos + 1..];

        if suffix.is_empty() {
            if parent_name_has_flux {
                // A version listing of a version listing: cycle guard,
                // resolves to a null lookup rather than recursing.
                return Ok(Resolved::Cycle);
            }
            return Ok(Resolved::VersionListing { name: base.to_vec() });
        }

        let epoch = Self::decode_selector(suffix, system_epoch, clock)?;
        if epoch + 1 > system_epoch {
            return Err(FsError::NotFound);
        }

        Ok(Resolved::Scoped { name: base.to_vec(), epoch })
    }

    fn decode_selector(suffix: &[u8], system_epoch: u32, clock: &dyn Clock) -> Result<u32, FsError> {
        let offset_secs = match suffix {
            b"onehour" => Some(SECS_PER_HOUR),
            b"yesterday" | b"oneday" => Some(SECS_PER_DAY),
            b"oneweek" => Some(SECS_PER_WEEK),
            b"onemonth" => Some(SECS_PER_MONTH),
            b"oneyear" => Some(SECS_PER_YEAR),
            _ => None,
        };

        if let Some(secs) = offset_secs {
            let now = clock.now_unix();
            let target = now.saturating_sub(secs);
            return Ok(target.min(u64::from(u32::MAX)) as u32);
        }

        let text = core::str::from_utf8(suffix).map_err(|_| FsError::Invalid)?;
        let wire: u32 = text.parse().map_err(|_| FsError::Invalid)?;
        // Epochs are 1-based on the wire.
        let _ = system_epoch;
        Ok(wire.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::FixedClock;
    use crate::inode::Inode;

    fn live_parent(epoch: u32) -> Inode {
        Inode { epoch_number: epoch, ..Default::default() }
    }

    #[test]
    fn bare_name_scopes_at_system_epoch() {
        let parent = live_parent(3);
        let clock = FixedClock(0);
        let resolved = EpochResolver::resolve(b"report", &parent, false, 5, &clock).unwrap();
        assert_eq!(resolved, Resolved::Scoped { name: b"report".to_vec(), epoch: 5 });
    }

    #[test]
    fn unchangeable_parent_scopes_at_its_own_epoch() {
        let mut parent = live_parent(2);
        parent.flags.set(InodeFlags::UNCHANGEABLE);
        let clock = FixedClock(0);
        let resolved = EpochResolver::resolve(b"report", &parent, false, 5, &clock).unwrap();
        assert_eq!(resolved, Resolved::Scoped { name: b"report".to_vec(), epoch: 2 });
    }

    #[test]
    fn trailing_token_with_no_selector_is_a_version_listing() {
        let parent = live_parent(1);
        let clock = FixedClock(0);
        let resolved = EpochResolver::resolve(b"report@", &parent, false, 5, &clock).unwrap();
        assert_eq!(resolved, Resolved::VersionListing { name: b"report".to_vec() });
    }

    #[test]
    fn version_listing_of_a_version_listing_does_not_recurse() {
        let parent = live_parent(1);
        let clock = FixedClock(0);
        let resolved = EpochResolver::resolve(b"report@", &parent, true, 5, &clock).unwrap();
        assert_eq!(resolved, Resolved::Cycle);
    }

    #[test]
    fn numeric_selector_is_one_based_on_the_wire() {
        let parent = live_parent(1);
        let clock = FixedClock(0);
        let resolved = EpochResolver::resolve(b"report@3", &parent, false, 5, &clock).unwrap();
        assert_eq!(resolved, Resolved::Scoped { name: b"report".to_vec(), epoch: 2 });
    }

    #[test]
    fn future_epoch_selector_is_rejected() {
        let parent = live_parent(1);
        let clock = FixedClock(0);
        let err = EpochResolver::resolve(b"report@9", &parent, false, 5, &clock).unwrap_err();
        assert_eq!(err, FsError::NotFound);
    }

    #[test]
    fn symbolic_yesterday_resolves_relative_to_the_clock() {
        let parent = live_parent(1);
        let now = 1_000_000u64;
        let clock = FixedClock(now);
        let resolved = EpochResolver::resolve(b"report@yesterday", &parent, false, u32::MAX, &clock).unwrap();
        match resolved {
            Resolved::Scoped { epoch, .. } => assert_eq!(u64::from(epoch), now - SECS_PER_DAY),
            other => panic!("expected a scoped resolution, got {other:?}"),
        }
    }
}

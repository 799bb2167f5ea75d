//! Segment-ID allocation from the Segment Routing Global Block.

use serde::{Deserialize, Serialize};

use crate::error::{SrError, SrResult};
use crate::topology::SwitchId;

/// Default start of the Segment Routing Global Block.
///
/// Historically this constant also appeared as `0x3E80`, which is the
/// same value; the decimal spelling is the one convention used here.
pub const DEFAULT_SRGB_START: u32 = 16_000;

/// Segment Routing Global Block: the numeric range segment IDs are
/// allocated from.
///
/// Allocation is a pure function of the switch identifier: the
/// numeric suffix of `openflow:<n>` offset by the block start. That
/// makes SIDs injective over the suffix domain and stable across
/// snapshots as long as switch identifiers are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Srgb {
    start: u32,
}

impl Default for Srgb {
    fn default() -> Self {
        Self {
            start: DEFAULT_SRGB_START,
        }
    }
}

impl Srgb {
    /// Creates a block with the given start.
    pub fn new(start: u32) -> Self {
        Self { start }
    }

    /// Returns the block start.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Derives the segment ID for a switch.
    ///
    /// Fails with [`SrError::InvalidSwitchIdentifier`] if the
    /// identifier carries no parseable numeric suffix after its last
    /// `:` delimiter.
    pub fn sid_for(&self, id: &SwitchId) -> SrResult<u32> {
        let suffix = id
            .as_str()
            .rsplit_once(':')
            .map(|(_, s)| s)
            .ok_or_else(|| SrError::invalid_switch_id(id.as_str(), "missing ':' delimiter"))?;
        let n: u32 = suffix
            .parse()
            .map_err(|_| SrError::invalid_switch_id(id.as_str(), "suffix is not an integer"))?;
        Ok(self.start + n)
    }
}

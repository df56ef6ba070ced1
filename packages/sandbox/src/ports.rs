// ABOUTME: Host port allocation for sandbox containers
// ABOUTME: Block-offset scheme revalidated against registered allocations under the project lock

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use warren_config::Config;

use crate::error::{Result, SandboxError};

/// Upper bound on probed blocks before giving up.
const MAX_PROBE_BLOCKS: usize = 1000;

/// Assigns host ports for the container ports a descriptor declares.
///
/// The Nth sandbox of a project gets `base_offset + N * block_size` added to
/// each declared port. Collisions with ports already held by other
/// registered sandboxes (two creations racing the same N, or a block freed
/// and reassigned) probe forward one block at a time.
#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    base_offset: u16,
    block_size: u16,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self {
            base_offset: 5000,
            block_size: 10,
        }
    }
}

impl PortAllocator {
    pub fn new(base_offset: u16, block_size: u16) -> Self {
        Self {
            base_offset,
            block_size: block_size.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self::new(
            config.port_base_offset.unwrap_or(defaults.base_offset),
            config.port_block_size.unwrap_or(defaults.block_size),
        )
    }

    /// Allocate host ports for `declared` container ports, avoiding every
    /// host port in `taken` (the union of all registered sandboxes'
    /// allocations). `registered` is the number of sandboxes currently in
    /// the registry.
    pub fn allocate(
        &self,
        declared: &[u16],
        taken: &HashSet<u16>,
        registered: usize,
    ) -> Result<BTreeMap<u16, u16>> {
        if declared.is_empty() {
            return Ok(BTreeMap::new());
        }

        for attempt in 0..MAX_PROBE_BLOCKS {
            let offset = self.base_offset as u64
                + (registered as u64 + attempt as u64) * self.block_size as u64;

            let candidate: Option<BTreeMap<u16, u16>> = declared
                .iter()
                .map(|&port| {
                    let host = port as u64 + offset;
                    u16::try_from(host).ok().filter(|h| !taken.contains(h)).map(|h| (port, h))
                })
                .collect();

            if let Some(mapping) = candidate {
                debug!(
                    offset,
                    attempt, "allocated port block for {} declared ports", declared.len()
                );
                return Ok(mapping);
            }
        }

        Err(SandboxError::PortAllocationExhausted {
            attempted: MAX_PROBE_BLOCKS,
        })
    }
}

/// Union of host ports held by the given allocations.
pub fn taken_ports<'a, I>(allocations: I) -> HashSet<u16>
where
    I: IntoIterator<Item = &'a BTreeMap<u16, u16>>,
{
    allocations
        .into_iter()
        .flat_map(|ports| ports.values().copied())
        .collect()
}

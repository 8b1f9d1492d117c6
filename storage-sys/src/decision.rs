// SPDX-License-Identifier: GPL-3.0-only

use serde::Serialize;

use crate::apply::ProvisioningMode;
use crate::capability::{DiscardStatus, Geometry, UnmapCapability, UnmapLimits};
use crate::error::{Result, TrimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AlreadyEnabled,
    EnablePlan {
        discard_limit_bytes: u64,
        provisioning_target_mode: ProvisioningMode,
    },
}

/// Decide whether TRIM must be enabled and with which discard limit.
///
/// Capabilities are supplied lazily: an enabled device never evaluates any of
/// them, and missing firmware support stops before limits or geometry are read.
pub fn decide<U, L, G>(
    status: &DiscardStatus,
    unmap_support: U,
    limits: L,
    geometry: G,
) -> Result<Action>
where
    U: FnOnce() -> Result<UnmapCapability>,
    L: FnOnce() -> Result<UnmapLimits>,
    G: FnOnce() -> Result<Geometry>,
{
    if status.enabled {
        return Ok(Action::AlreadyEnabled);
    }

    if !unmap_support()?.supported {
        return Err(TrimError::FirmwareUnsupported);
    }

    let limits = limits()?;
    let geometry = geometry()?;

    Ok(Action::EnablePlan {
        discard_limit_bytes: discard_limit(&limits, &geometry)?,
        provisioning_target_mode: ProvisioningMode::Unmap,
    })
}

pub fn discard_limit(limits: &UnmapLimits, geometry: &Geometry) -> Result<u64> {
    limits
        .max_unmap_lba_count
        .checked_mul(geometry.logical_block_length)
        .ok_or(TrimError::DiscardLimitOverflow {
            lba_count: limits.max_unmap_lba_count,
            block_length: geometry.logical_block_length,
        })
}

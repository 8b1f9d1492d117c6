// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end TRIM enablement for a single device

use serde::Serialize;
use tracing::{debug, info};

use crate::apply::{
    ApplyResult, apply_discard_limit, apply_provisioning_mode, preview_discard_limit,
    preview_provisioning_mode,
};
use crate::capability::{
    DiscardStatus, parse_discard_status, parse_logical_block_length, parse_unmap_limits,
    parse_unmap_support,
};
use crate::decision::{Action, decide};
use crate::device::{DeviceIdentity, SysfsLayout, find_provisioning_mode_files, resolve};
use crate::error::Result;
use crate::tools::{DiagnosticSource, VpdPage};

#[derive(Debug, Clone, Copy, Default)]
pub struct TrimOptions {
    /// Validate and report without writing any control file
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrimReport {
    pub device: DeviceIdentity,
    pub discard_status: DiscardStatus,
    pub action: Action,
    pub provisioning: Vec<ApplyResult>,
    pub discard_limit: Option<ApplyResult>,
    pub dry_run: bool,
}

/// Resolve `name` under `layout` and enable TRIM on it.
pub fn run(
    layout: &SysfsLayout,
    name: &str,
    source: &dyn DiagnosticSource,
    options: TrimOptions,
) -> Result<TrimReport> {
    let identity = resolve(layout, name)?;
    enable_trim(identity, source, options)
}

pub fn enable_trim(
    identity: DeviceIdentity,
    source: &dyn DiagnosticSource,
    options: TrimOptions,
) -> Result<TrimReport> {
    let device = identity.device_path.as_path();

    let listing = source.discard_listing(device)?;
    let discard_status = parse_discard_status(&listing, &identity.name)?;
    if discard_status.enabled {
        info!("TRIM is enabled for {}", identity.name);
    } else {
        info!("TRIM is not enabled for {}", identity.name);
    }

    let action = decide(
        &discard_status,
        || parse_unmap_support(&source.vpd_page(VpdPage::LogicalBlockProvisioning, device)?),
        || parse_unmap_limits(&source.vpd_page(VpdPage::BlockLimits, device)?),
        || parse_logical_block_length(&source.read_capacity(device)?),
    )?;
    debug!(?action, "Decided TRIM action");

    let mut report = TrimReport {
        device: identity,
        discard_status,
        action,
        provisioning: Vec::new(),
        discard_limit: None,
        dry_run: options.dry_run,
    };

    let Action::EnablePlan {
        discard_limit_bytes,
        ..
    } = action
    else {
        return Ok(report);
    };

    let files = find_provisioning_mode_files(&report.device.sysfs_path)?;
    if options.dry_run {
        report.provisioning = preview_provisioning_mode(&files)?;
        report.discard_limit = Some(preview_discard_limit(&report.device, discard_limit_bytes)?);
    } else {
        report.provisioning = apply_provisioning_mode(&files)?;
        report.discard_limit = Some(apply_discard_limit(&report.device, discard_limit_bytes)?);
    }

    Ok(report)
}

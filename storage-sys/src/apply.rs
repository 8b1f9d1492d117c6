// SPDX-License-Identifier: GPL-3.0-only

//! Writes to the driver and block queue control files
//!
//! Provisioning-mode files are handled one at a time. A failure on one file
//! leaves earlier files as they were written; nothing is rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::device::DeviceIdentity;
use crate::error::{Result, TrimError};

pub const DISCARD_MAX_BYTES_FILE: &str = "discard_max_bytes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningMode {
    Full,
    Unmap,
}

impl ProvisioningMode {
    /// Exact file content for this mode, trailing newline included.
    pub fn as_content(self) -> &'static str {
        match self {
            ProvisioningMode::Full => "full\n",
            ProvisioningMode::Unmap => "unmap\n",
        }
    }

    pub fn from_content(content: &str) -> Option<Self> {
        match content {
            "full\n" => Some(ProvisioningMode::Full),
            "unmap\n" => Some(ProvisioningMode::Unmap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    AlreadyCorrect,
    Updated,
    /// Dry run: the file would have been written
    WouldUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub path: PathBuf,
    /// Content before the change, when it was read
    pub previous: Option<String>,
    /// Content after the change, or the content a dry run would write
    pub current: String,
    pub outcome: ApplyOutcome,
}

pub fn apply_provisioning_mode(files: &[PathBuf]) -> Result<Vec<ApplyResult>> {
    files
        .iter()
        .map(|path| provisioning_mode_step(path, true))
        .collect()
}

/// Validate every file like [`apply_provisioning_mode`] without writing.
pub fn preview_provisioning_mode(files: &[PathBuf]) -> Result<Vec<ApplyResult>> {
    files
        .iter()
        .map(|path| provisioning_mode_step(path, false))
        .collect()
}

fn provisioning_mode_step(path: &Path, write: bool) -> Result<ApplyResult> {
    let observed = fs::read_to_string(path).map_err(|e| TrimError::io(path, e))?;
    let mode = ProvisioningMode::from_content(&observed).ok_or_else(|| {
        TrimError::InvalidProvisioningMode {
            path: path.to_path_buf(),
            observed: observed.clone(),
        }
    })?;

    let target = ProvisioningMode::Unmap;
    if mode == target {
        info!(
            "The provisioning mode in {} is already set to \"unmap\"",
            path.display()
        );
        return Ok(ApplyResult {
            path: path.to_path_buf(),
            current: observed.clone(),
            previous: Some(observed),
            outcome: ApplyOutcome::AlreadyCorrect,
        });
    }

    let outcome = if write {
        info!("Setting the provisioning mode in {} to \"unmap\"", path.display());
        fs::write(path, target.as_content()).map_err(|e| TrimError::io(path, e))?;
        ApplyOutcome::Updated
    } else {
        ApplyOutcome::WouldUpdate
    };

    Ok(ApplyResult {
        path: path.to_path_buf(),
        previous: Some(observed),
        current: target.as_content().to_string(),
        outcome,
    })
}

pub fn discard_limit_path(identity: &DeviceIdentity) -> PathBuf {
    identity
        .sysfs_link
        .join("queue")
        .join(DISCARD_MAX_BYTES_FILE)
}

pub fn apply_discard_limit(identity: &DeviceIdentity, limit_bytes: u64) -> Result<ApplyResult> {
    let path = existing_discard_limit_path(identity)?;
    let content = format!("{limit_bytes}\n");

    info!(
        "Setting the maximum number of bytes to discard in {} to {limit_bytes}",
        path.display()
    );
    fs::write(&path, &content).map_err(|e| TrimError::io(&path, e))?;

    Ok(ApplyResult {
        path,
        previous: None,
        current: content,
        outcome: ApplyOutcome::Updated,
    })
}

/// Validate the discard limit target and report the value that would be written.
pub fn preview_discard_limit(identity: &DeviceIdentity, limit_bytes: u64) -> Result<ApplyResult> {
    let path = existing_discard_limit_path(identity)?;
    let previous = fs::read_to_string(&path).map_err(|e| TrimError::io(&path, e))?;

    Ok(ApplyResult {
        path,
        previous: Some(previous),
        current: format!("{limit_bytes}\n"),
        outcome: ApplyOutcome::WouldUpdate,
    })
}

fn existing_discard_limit_path(identity: &DeviceIdentity) -> Result<PathBuf> {
    let path = discard_limit_path(identity);
    if !path.is_file() {
        return Err(TrimError::ControlFileMissing(path));
    }
    Ok(path)
}

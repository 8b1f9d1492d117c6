// SPDX-License-Identifier: GPL-3.0-only

//! Low-level operations for enabling TRIM on SCSI block devices
//!
//! This crate locates a device in sysfs, reads its discard capabilities from
//! lsblk and sg3_utils, decides whether TRIM needs enabling and applies the
//! provisioning-mode and discard-limit changes.
//!
//! These operations write kernel control files and should only be called
//! with root privileges.

pub mod apply;
pub mod capability;
pub mod decision;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod tools;

pub use apply::{
    ApplyOutcome, ApplyResult, ProvisioningMode, apply_discard_limit, apply_provisioning_mode,
};
pub use capability::{DiscardStatus, Geometry, UnmapCapability, UnmapLimits};
pub use decision::{Action, decide};
pub use device::{DeviceIdentity, SysfsLayout, find_provisioning_mode_files, resolve};
pub use error::{ErrorKind, Result, TrimError};
pub use pipeline::{TrimOptions, TrimReport, enable_trim, run};
pub use tools::{DiagnosticSource, SgTools, ToolRegistry, VpdPage};

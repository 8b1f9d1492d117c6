// SPDX-License-Identifier: GPL-3.0-only

//! External diagnostic tools
//!
//! The required executables are located once at startup into a
//! [`ToolRegistry`]. Everything that needs command output goes through the
//! [`DiagnosticSource`] trait so the parsers can be fed captured text in tests.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;
use which::which;

use crate::error::{Result, TrimError};

/// VPD pages queried through `sg_vpd -p <page>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpdPage {
    /// Logical block provisioning
    LogicalBlockProvisioning,
    /// Block limits
    BlockLimits,
}

impl VpdPage {
    pub fn as_arg(self) -> &'static str {
        match self {
            VpdPage::LogicalBlockProvisioning => "lbpv",
            VpdPage::BlockLimits => "bl",
        }
    }
}

/// Source of raw diagnostic text for a device.
pub trait DiagnosticSource {
    /// `lsblk --json --discard <device>`
    fn discard_listing(&self, device: &Path) -> Result<String>;

    /// `sg_vpd -p <page> <device>`
    fn vpd_page(&self, page: VpdPage, device: &Path) -> Result<String>;

    /// `sg_readcap -l <device>`
    fn read_capacity(&self, device: &Path) -> Result<String>;
}

/// Resolved locations of every executable the tool needs.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    pub lsblk: PathBuf,
    pub sg_vpd: PathBuf,
    pub sg_readcap: PathBuf,
}

impl ToolRegistry {
    pub const REQUIRED: [&'static str; 3] = ["lsblk", "sg_vpd", "sg_readcap"];

    /// Look up all required commands in `PATH`, failing on the first missing one.
    pub fn discover() -> Result<Self> {
        Self::locate(|name| which(name).ok())
    }

    fn locate(lookup: impl Fn(&'static str) -> Option<PathBuf>) -> Result<Self> {
        let [lsblk, sg_vpd, sg_readcap] =
            Self::REQUIRED.map(|name| lookup(name).ok_or(TrimError::MissingCommand(name)));

        let registry = Self {
            lsblk: lsblk?,
            sg_vpd: sg_vpd?,
            sg_readcap: sg_readcap?,
        };
        debug!(?registry, "Located diagnostic tools");
        Ok(registry)
    }
}

/// [`DiagnosticSource`] backed by lsblk and sg3_utils.
pub struct SgTools {
    registry: ToolRegistry,
}

impl SgTools {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

impl DiagnosticSource for SgTools {
    fn discard_listing(&self, device: &Path) -> Result<String> {
        run_capture(
            &self.registry.lsblk,
            &[OsStr::new("--json"), OsStr::new("--discard"), device.as_os_str()],
        )
    }

    fn vpd_page(&self, page: VpdPage, device: &Path) -> Result<String> {
        run_capture(
            &self.registry.sg_vpd,
            &[OsStr::new("-p"), OsStr::new(page.as_arg()), device.as_os_str()],
        )
    }

    fn read_capacity(&self, device: &Path) -> Result<String> {
        run_capture(
            &self.registry.sg_readcap,
            &[OsStr::new("-l"), device.as_os_str()],
        )
    }
}

pub fn render(command: &Path, args: &[&OsStr]) -> String {
    let mut rendered = command.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

fn run_capture(command: &Path, args: &[&OsStr]) -> Result<String> {
    let rendered = render(command, args);
    debug!("Running {rendered}");

    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|e| TrimError::CommandFailed {
            command: rendered.clone(),
            output: e.to_string(),
        })?;

    if !output.status.success() {
        let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(TrimError::CommandFailed {
            command: rendered,
            output: merged.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

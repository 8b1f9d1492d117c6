// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a [`TrimError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Environment,
    Device,
    Topology,
    Parse,
    Precondition,
    State,
    Io,
}

/// Error types for discovering and enabling TRIM
#[derive(Error, Debug)]
pub enum TrimError {
    #[error("the required command {0} was not found in the path")]
    MissingCommand(&'static str),

    #[error("the path {0:?} does not point to a block device")]
    NotABlockDevice(PathBuf),

    #[error("failed to find device {0} in the output of lsblk")]
    DeviceNotListed(String),

    #[error("the path {0:?} is not a symbolic link")]
    NotASymbolicLink(PathBuf),

    #[error("the resolved sysfs path {0:?} is not a directory")]
    SysfsPathMissing(PathBuf),

    #[error("the driver directory {0:?} does not exist")]
    DriverDirectoryMissing(PathBuf),

    #[error("no provisioning_mode files found below {0:?}")]
    NoControlFilesFound(PathBuf),

    #[error("failed to get {field}: no matching line in the command output")]
    MissingField { field: &'static str },

    #[error("failed to parse {field}: unexpected value {value:?}")]
    MalformedField { field: &'static str, value: String },

    #[error("invalid lsblk output: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("the firmware does not support the unmap command (LBPU=0)")]
    FirmwareUnsupported,

    #[error(
        "discard limit overflows: {lba_count} LBAs of {block_length} bytes do not fit in 64 bits"
    )]
    DiscardLimitOverflow { lba_count: u64, block_length: u64 },

    #[error("invalid provisioning mode in {path:?}: {observed:?}")]
    InvalidProvisioningMode { path: PathBuf, observed: String },

    #[error("the control file {0:?} does not exist")]
    ControlFileMissing(PathBuf),

    #[error("command failed: {command}; output: {output}")]
    CommandFailed { command: String, output: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrimError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCommand(_) => ErrorKind::Environment,
            Self::NotABlockDevice(_) | Self::DeviceNotListed(_) => ErrorKind::Device,
            Self::NotASymbolicLink(_)
            | Self::SysfsPathMissing(_)
            | Self::DriverDirectoryMissing(_)
            | Self::NoControlFilesFound(_) => ErrorKind::Topology,
            Self::MissingField { .. } | Self::MalformedField { .. } | Self::InvalidJson(_) => {
                ErrorKind::Parse
            }
            Self::FirmwareUnsupported | Self::DiscardLimitOverflow { .. } => {
                ErrorKind::Precondition
            }
            Self::InvalidProvisioningMode { .. } => ErrorKind::State,
            Self::ControlFileMissing(_) | Self::CommandFailed { .. } | Self::Io { .. } => {
                ErrorKind::Io
            }
        }
    }
}

/// Result type alias for TRIM operations
pub type Result<T> = std::result::Result<T, TrimError>;

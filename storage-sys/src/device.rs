// SPDX-License-Identifier: GPL-3.0-only

//! Block device discovery through `/dev` and sysfs

use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TrimError};

pub const DEFAULT_DEV_DIR: &str = "/dev";
pub const DEFAULT_CLASS_BLOCK_DIR: &str = "/sys/class/block";

/// Driver subsystem directory holding the per-instance disk attributes.
pub const DRIVER_DIR_NAME: &str = "scsi_disk";
pub const PROVISIONING_MODE_FILE: &str = "provisioning_mode";

/// Roots of the device and sysfs trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsLayout {
    pub dev_dir: PathBuf,
    pub class_block_dir: PathBuf,
}

impl Default for SysfsLayout {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from(DEFAULT_DEV_DIR),
            class_block_dir: PathBuf::from(DEFAULT_CLASS_BLOCK_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Short kernel name, e.g. `sda`
    pub name: String,
    /// Block special file, e.g. `/dev/sda`
    pub device_path: PathBuf,
    /// Entry under the block class directory, e.g. `/sys/class/block/sda`
    pub sysfs_link: PathBuf,
    /// Canonical device directory the class entry points at
    pub sysfs_path: PathBuf,
}

pub fn resolve(layout: &SysfsLayout, name: &str) -> Result<DeviceIdentity> {
    let device_path = layout.dev_dir.join(name);
    ensure_block_device(&device_path)?;

    let sysfs_link = layout.class_block_dir.join(name);
    let sysfs_path = resolve_sysfs_link(&sysfs_link)?;

    debug!(
        device = %device_path.display(),
        sysfs = %sysfs_path.display(),
        "Resolved block device"
    );

    Ok(DeviceIdentity {
        name: name.to_string(),
        device_path,
        sysfs_link,
        sysfs_path,
    })
}

pub fn ensure_block_device(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.file_type().is_block_device() => Ok(()),
        Ok(_) => Err(TrimError::NotABlockDevice(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TrimError::NotABlockDevice(path.to_path_buf()))
        }
        Err(e) => Err(TrimError::io(path, e)),
    }
}

/// Follow one level of symlink and return the absolute, normalized target.
///
/// Relative targets are joined onto the link's parent directory. The result
/// must be a real directory.
pub fn resolve_sysfs_link(link: &Path) -> Result<PathBuf> {
    let is_link = fs::symlink_metadata(link)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    if !is_link {
        return Err(TrimError::NotASymbolicLink(link.to_path_buf()));
    }

    let target = fs::read_link(link).map_err(|e| TrimError::io(link, e))?;
    let parent = link.parent().unwrap_or_else(|| Path::new("/"));
    let resolved = normalize_lexically(&absolute(&parent.join(target))?);

    let is_dir = fs::symlink_metadata(&resolved)
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(TrimError::SysfsPathMissing(resolved));
    }

    Ok(resolved)
}

/// Collect every `provisioning_mode` file belonging to the device's driver.
///
/// The driver directory sits two levels above the device's sysfs directory.
/// Entries are visited in name order; directory symlinks are not followed.
pub fn find_provisioning_mode_files(sysfs_path: &Path) -> Result<Vec<PathBuf>> {
    let driver_dir = normalize_lexically(&sysfs_path.join("..").join("..").join(DRIVER_DIR_NAME));
    if !driver_dir.is_dir() {
        return Err(TrimError::DriverDirectoryMissing(driver_dir));
    }

    let mut found = Vec::new();
    walk(&driver_dir, &mut found)?;

    if found.is_empty() {
        return Err(TrimError::NoControlFilesFound(driver_dir));
    }

    debug!(count = found.len(), root = %driver_dir.display(), "Found provisioning_mode files");
    Ok(found)
}

fn walk(directory: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(directory)
        .map_err(|e| TrimError::io(directory, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| TrimError::io(directory, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| TrimError::io(&path, e))?;

        if file_type.is_dir() {
            walk(&path, found)?;
        } else if entry.file_name() == PROVISIONING_MODE_FILE {
            found.push(path);
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| TrimError::io(path, e))?;
    Ok(cwd.join(path))
}

/// Remove `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

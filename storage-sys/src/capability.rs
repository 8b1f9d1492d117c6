// SPDX-License-Identifier: GPL-3.0-only

//! Parsers for lsblk and sg3_utils output.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrimError};

/// `disc-max` value lsblk reports when discard is disabled.
pub const DISCARD_DISABLED: &str = "0B";

const LBPU_PREFIX: &str = "Unmap command supported (LBPU):";
const MAX_UNMAP_LBA_COUNT_PREFIX: &str = "Maximum unmap LBA count:";
const MAX_UNMAP_DESCRIPTOR_COUNT_PREFIX: &str = "Maximum unmap block descriptor count:";
const LOGICAL_BLOCK_LENGTH_PREFIX: &str = "Logical block length=";
const LOGICAL_BLOCK_LENGTH_SUFFIX: &str = "bytes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardStatus {
    pub enabled: bool,
    /// Raw `disc-max` string as reported by lsblk
    pub disc_max: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnmapCapability {
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnmapLimits {
    pub max_unmap_lba_count: u64,
    pub max_unmap_block_descriptor_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub logical_block_length: u64,
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(rename = "disc-max")]
    disc_max: Option<String>,
}

pub fn parse_discard_status(lsblk_json: &str, device_name: &str) -> Result<DiscardStatus> {
    let output: LsblkOutput = serde_json::from_str(lsblk_json)?;

    let device = output
        .blockdevices
        .into_iter()
        .find(|device| device.name == device_name)
        .ok_or_else(|| TrimError::DeviceNotListed(device_name.to_string()))?;

    let disc_max = device
        .disc_max
        .ok_or(TrimError::MissingField { field: "disc-max" })?;

    debug!(device = device_name, %disc_max, "Parsed discard status");
    Ok(DiscardStatus {
        enabled: disc_max != DISCARD_DISABLED,
        disc_max,
    })
}

pub fn parse_unmap_support(vpd_text: &str) -> Result<UnmapCapability> {
    let supported = find_value(
        vpd_text,
        LBPU_PREFIX,
        "unmap command support (LBPU)",
        |value| match value {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
    )?;

    Ok(UnmapCapability { supported })
}

pub fn parse_unmap_limits(vpd_text: &str) -> Result<UnmapLimits> {
    let max_unmap_lba_count = find_value(
        vpd_text,
        MAX_UNMAP_LBA_COUNT_PREFIX,
        "maximum unmap LBA count",
        parse_decimal,
    )?;
    let max_unmap_block_descriptor_count = find_value(
        vpd_text,
        MAX_UNMAP_DESCRIPTOR_COUNT_PREFIX,
        "maximum unmap block descriptor count",
        parse_decimal,
    )?;

    Ok(UnmapLimits {
        max_unmap_lba_count,
        max_unmap_block_descriptor_count,
    })
}

pub fn parse_logical_block_length(readcap_text: &str) -> Result<Geometry> {
    let logical_block_length = find_value(
        readcap_text,
        LOGICAL_BLOCK_LENGTH_PREFIX,
        "logical block length",
        |value| {
            value
                .strip_suffix(LOGICAL_BLOCK_LENGTH_SUFFIX)
                .map(str::trim_end)
                .and_then(parse_decimal)
        },
    )?;

    Ok(Geometry {
        logical_block_length,
    })
}

/// Unsigned decimal made of ASCII digits only; no sign, no annotations.
fn parse_decimal(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parse the value of the first line that starts with `prefix` and whose
/// trimmed remainder `parse` accepts.
///
/// Lines with the prefix but an unusable value are skipped; if every such
/// line is unusable the first one is reported as malformed.
fn find_value<T>(
    text: &str,
    prefix: &str,
    field: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    let mut first_malformed = None;

    for value in text
        .lines()
        .filter_map(|line| line.trim().strip_prefix(prefix))
        .map(str::trim)
    {
        if let Some(parsed) = parse(value) {
            return Ok(parsed);
        }
        if first_malformed.is_none() {
            first_malformed = Some(value);
        }
    }

    match first_malformed {
        Some(value) => Err(TrimError::MalformedField {
            field,
            value: value.to_string(),
        }),
        None => Err(TrimError::MissingField { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSBLK_DISABLED: &str = r#"{
   "blockdevices": [
      {"name":"sda", "disc-aln":0, "disc-gran":"0B", "disc-max":"0B", "disc-zero":false},
      {"name":"sdb", "disc-aln":0, "disc-gran":"4K", "disc-max":"4G", "disc-zero":false}
   ]
}"#;

    const VPD_LBPV: &str = "Logical block provisioning VPD page (SBC):
  Unmap command supported (LBPU): 1
  Write same (16) with unmap bit supported (LBPWS): 0
  Write same (10) with unmap bit supported (LBPWS10): 0
  Logical block provisioning read zeros (LBPRZ): 0
  Anchored LBAs supported (ANC_SUP): 0
  Threshold exponent: 0
  Descriptor present (DP): 0
  Minimum percentage: 0 [not reported]
  Provisioning type: 0 (not known or fully provisioned)
  Threshold percentage: 0 [percentages not supported]
";

    const VPD_BL: &str = "Block limits VPD page (SBC):
  Write same non-zero (WSNZ): 0
  Maximum compare and write length: 0 blocks [Command not implemented]
  Optimal transfer length granularity: 1 blocks
  Maximum transfer length: 65535 blocks
  Optimal transfer length: 65535 blocks
  Maximum prefetch transfer length: 65535 blocks
  Maximum unmap LBA count: 8192
  Maximum unmap block descriptor count: 1
  Optimal unmap granularity: 1 blocks
  Unmap granularity alignment valid: false
  Maximum write same length: 0 blocks [not reported]
";

    const READCAP: &str = "Read Capacity results:
   Protection: prot_en=0, p_type=0, p_i_exponent=0
   Logical block provisioning: lbpme=0, lbprz=0
   Last LBA=976773167 (0x3a386e2f), Number of logical blocks=976773168
   Logical block length=512 bytes
   Logical blocks per physical block exponent=3 [so physical block length=4096 bytes]
   Lowest aligned LBA=0
Hence:
   Device size: 500107862016 bytes, 476940.0 MiB, 500.11 GB
";

    #[test]
    fn reports_disabled_discard_for_zero_size() {
        let status = parse_discard_status(LSBLK_DISABLED, "sda").expect("sda listed");
        assert!(!status.enabled);
        assert_eq!(status.disc_max, "0B");
    }

    #[test]
    fn reports_enabled_discard_for_any_other_size() {
        for size in ["4G", "4M", "512B", "0", "0K", " 0B"] {
            let json = format!(r#"{{"blockdevices":[{{"name":"sda","disc-max":{size:?}}}]}}"#);
            let status = parse_discard_status(&json, "sda").expect("sda listed");
            assert!(status.enabled, "{size:?} must count as enabled");
        }
    }

    #[test]
    fn requires_exact_device_name() {
        let json = r#"{"blockdevices":[{"name":"sda1","disc-max":"0B"}]}"#;
        let error = parse_discard_status(json, "sda").expect_err("sda is not listed");
        assert!(matches!(error, TrimError::DeviceNotListed(name) if name == "sda"));
    }

    #[test]
    fn rejects_missing_disc_max_and_bad_json() {
        let json = r#"{"blockdevices":[{"name":"sda"}]}"#;
        assert!(matches!(
            parse_discard_status(json, "sda"),
            Err(TrimError::MissingField { field: "disc-max" })
        ));
        assert!(matches!(
            parse_discard_status("lsblk: not a block device", "sda"),
            Err(TrimError::InvalidJson(_))
        ));
    }

    #[test]
    fn parses_unmap_support_flag() {
        let capability = parse_unmap_support(VPD_LBPV).expect("LBPU present");
        assert!(capability.supported);

        let disabled = VPD_LBPV.replace("(LBPU): 1", "(LBPU): 0");
        assert!(!parse_unmap_support(&disabled).expect("LBPU present").supported);
    }

    #[test]
    fn unmap_support_ignores_surrounding_lines() {
        let line = "  Unmap command supported (LBPU): 1";
        for text in [
            line.to_string(),
            format!("header\n{line}"),
            format!("{line}\ntrailer: 0\n"),
            format!("noise 1\n\n{line}\nnoise 2\n"),
        ] {
            assert_eq!(
                parse_unmap_support(&text).expect("LBPU present"),
                UnmapCapability { supported: true }
            );
        }
    }

    #[test]
    fn first_unmap_support_line_wins() {
        let text = "Unmap command supported (LBPU): 0\nUnmap command supported (LBPU): 1\n";
        assert!(!parse_unmap_support(text).expect("LBPU present").supported);
    }

    #[test]
    fn rejects_missing_or_malformed_unmap_support() {
        assert!(matches!(
            parse_unmap_support("Block limits VPD page (SBC):\n"),
            Err(TrimError::MissingField { .. })
        ));
        assert!(matches!(
            parse_unmap_support("  Unmap command supported (LBPU): 2\n"),
            Err(TrimError::MalformedField { value, .. }) if value == "2"
        ));
    }

    #[test]
    fn parses_unmap_limits() {
        let limits = parse_unmap_limits(VPD_BL).expect("limits present");
        assert_eq!(
            limits,
            UnmapLimits {
                max_unmap_lba_count: 8192,
                max_unmap_block_descriptor_count: 1,
            }
        );
    }

    #[test]
    fn reports_each_missing_limit_separately() {
        let without_lba = VPD_BL.replace("  Maximum unmap LBA count: 8192\n", "");
        assert!(matches!(
            parse_unmap_limits(&without_lba),
            Err(TrimError::MissingField {
                field: "maximum unmap LBA count"
            })
        ));

        let without_descriptors =
            VPD_BL.replace("  Maximum unmap block descriptor count: 1\n", "");
        assert!(matches!(
            parse_unmap_limits(&without_descriptors),
            Err(TrimError::MissingField {
                field: "maximum unmap block descriptor count"
            })
        ));
    }

    #[test]
    fn rejects_annotated_limits() {
        let annotated = VPD_BL.replace(
            "Maximum unmap LBA count: 8192",
            "Maximum unmap LBA count: 0 [Unmap command not implemented]",
        );
        assert!(matches!(
            parse_unmap_limits(&annotated),
            Err(TrimError::MalformedField { .. })
        ));
    }

    #[test]
    fn rejects_signed_values() {
        let signed = "  Maximum unmap LBA count: +8192\n  Maximum unmap block descriptor count: +1\n";
        assert!(matches!(
            parse_unmap_limits(signed),
            Err(TrimError::MalformedField { value, .. }) if value == "+8192"
        ));

        let signed_descriptors = VPD_BL.replace("descriptor count: 1", "descriptor count: -1");
        assert!(matches!(
            parse_unmap_limits(&signed_descriptors),
            Err(TrimError::MalformedField {
                field: "maximum unmap block descriptor count",
                ..
            })
        ));

        assert!(matches!(
            parse_logical_block_length("   Logical block length=+512 bytes\n"),
            Err(TrimError::MalformedField { .. })
        ));
    }

    #[test]
    fn first_well_formed_line_wins() {
        let text = "  Maximum unmap LBA count: 0 [x]\n  Maximum unmap LBA count: 8192\n  Maximum unmap block descriptor count: 1\n";
        let limits = parse_unmap_limits(text).expect("second line is well formed");
        assert_eq!(limits.max_unmap_lba_count, 8192);

        let text = "Unmap command supported (LBPU): yes\nUnmap command supported (LBPU): 1\n";
        assert!(parse_unmap_support(text).expect("second line is well formed").supported);
    }

    #[test]
    fn parses_logical_block_length() {
        let geometry = parse_logical_block_length(READCAP).expect("block length present");
        assert_eq!(geometry.logical_block_length, 512);
    }

    #[test]
    fn rejects_missing_or_malformed_block_length() {
        assert!(matches!(
            parse_logical_block_length("Read Capacity results:\n"),
            Err(TrimError::MissingField { .. })
        ));
        assert!(matches!(
            parse_logical_block_length("   Logical block length=many bytes\n"),
            Err(TrimError::MalformedField { .. })
        ));
    }
}

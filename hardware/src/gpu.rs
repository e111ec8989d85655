/*!
GPU Detection

Detects GPU vendor and capabilities for acceleration reporting.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

use crate::constants::*;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Unknown,
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvidia => write!(f, "{}", GPU_VENDOR_NVIDIA),
            Self::Amd => write!(f, "{}", GPU_VENDOR_AMD),
            Self::Intel => write!(f, "{}", GPU_VENDOR_INTEL),
            Self::Apple => write!(f, "{}", GPU_VENDOR_APPLE),
            Self::Unknown => write!(f, "{}", GPU_VENDOR_UNKNOWN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub vendor: GpuVendor,
    pub name: String,
    pub vram_mb: Option<u64>,
    pub driver_version: Option<String>,
}

/// Detect GPUs, preferring `nvidia-smi` and falling back to platform tools.
///
/// A missing or failing tool is not an error; it simply contributes no devices.
pub fn detect_gpus() -> Result<Vec<GpuInfo>> {
    let gpus = query_nvidia_smi();

    #[cfg(target_os = "linux")]
    let gpus = if gpus.is_empty() {
        crate::platform_linux::detect_gpus()?
    } else {
        gpus
    };

    tracing::debug!(count = gpus.len(), "GPU detection finished");
    Ok(gpus)
}

fn query_nvidia_smi() -> Vec<GpuInfo> {
    match Command::new(CMD_NVIDIA_SMI)
        .args([NVIDIA_SMI_QUERY, NVIDIA_SMI_FORMAT])
        .output()
    {
        Ok(output) if output.status.success() => {
            parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            tracing::debug!(status = %output.status, "nvidia-smi exited unsuccessfully");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "nvidia-smi not available");
            Vec::new()
        }
    }
}

/// Parse `nvidia-smi --query-gpu=name,memory.total,driver_version --format=csv,noheader,nounits`.
pub fn parse_nvidia_smi(stdout: &str) -> Vec<GpuInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
            if parts.len() < 3 || parts[0].is_empty() {
                return None;
            }
            Some(GpuInfo {
                vendor: GpuVendor::Nvidia,
                name: parts[0].to_string(),
                vram_mb: parts[1].parse().ok(),
                driver_version: Some(parts[2].to_string()),
            })
        })
        .collect()
}

/// Parse plain `lspci` output, keeping VGA and 3D controllers.
pub fn parse_lspci(stdout: &str) -> Vec<GpuInfo> {
    let mut gpus = Vec::new();

    for line in stdout.lines() {
        let line_lower = line.to_lowercase();
        if !(line_lower.contains(KEYWORD_VGA) || line_lower.contains(KEYWORD_3D)) {
            continue;
        }

        // "01:00.0 VGA compatible controller: NVIDIA Corporation GA102"
        let name = line
            .split_once(": ")
            .map(|(_, desc)| desc.trim())
            .unwrap_or("Unknown GPU")
            .to_string();
        let desc_lower = name.to_lowercase();

        // Whole words only: "Corporation" contains "ati"
        let has_word = |keyword: &str| {
            desc_lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| word == keyword)
        };
        let vendor = if has_word(GPU_KEYWORD_NVIDIA) {
            GpuVendor::Nvidia
        } else if has_word(GPU_KEYWORD_INTEL) {
            GpuVendor::Intel
        } else if has_word(GPU_KEYWORD_AMD) || has_word(GPU_KEYWORD_ATI) {
            GpuVendor::Amd
        } else {
            GpuVendor::Unknown
        };

        gpus.push(GpuInfo {
            vendor,
            name,
            vram_mb: None,
            driver_version: None,
        });
    }

    gpus
}

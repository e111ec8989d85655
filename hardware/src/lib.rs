/*!
# MeshGen Hardware Detection

Detects GPU accelerators so the service can report whether the generative
pipeline will run on CUDA and how many devices it can see.

## Example

```rust,no_run
use meshgen_hardware::AccelerationInfo;

let accel = AccelerationInfo::detect();
println!("CUDA available: {}", accel.cuda_available);
println!("Devices: {}", accel.device_count);
```
*/

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod constants;
mod gpu;

#[cfg(target_os = "linux")]
mod platform_linux;

pub use gpu::{detect_gpus, parse_lspci, parse_nvidia_smi, GpuInfo, GpuVendor};

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("Failed to detect GPU: {0}")]
    GpuDetection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// Accelerator summary exposed on the health endpoint.
///
/// `device_count` only counts CUDA-capable (NVIDIA) devices, which is what a
/// CUDA runtime would report. Other GPUs are still listed in `devices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelerationInfo {
    pub cuda_available: bool,
    pub device_count: usize,
    pub devices: Vec<GpuInfo>,
}

impl AccelerationInfo {
    /// Probe the host. Detection failures degrade to "no acceleration".
    pub fn detect() -> Self {
        match detect_gpus() {
            Ok(gpus) => Self::from_gpus(gpus),
            Err(e) => {
                tracing::warn!(error = %e, "GPU detection failed, assuming CPU only");
                Self::none()
            }
        }
    }

    /// Build the summary from an already detected GPU list.
    pub fn from_gpus(gpus: Vec<GpuInfo>) -> Self {
        let device_count = gpus
            .iter()
            .filter(|gpu| gpu.vendor == GpuVendor::Nvidia)
            .count();

        Self {
            cuda_available: device_count > 0,
            device_count,
            devices: gpus,
        }
    }

    /// No accelerator at all.
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(vendor: GpuVendor, name: &str) -> GpuInfo {
        GpuInfo {
            vendor,
            name: name.to_string(),
            vram_mb: None,
            driver_version: None,
        }
    }

    #[test]
    fn test_from_gpus_counts_only_nvidia() {
        let info = AccelerationInfo::from_gpus(vec![
            gpu(GpuVendor::Nvidia, "NVIDIA A100"),
            gpu(GpuVendor::Intel, "UHD Graphics 630"),
            gpu(GpuVendor::Nvidia, "NVIDIA A100"),
        ]);

        assert!(info.cuda_available);
        assert_eq!(info.device_count, 2);
        assert_eq!(info.devices.len(), 3);
    }

    #[test]
    fn test_from_gpus_without_nvidia() {
        let info = AccelerationInfo::from_gpus(vec![gpu(GpuVendor::Amd, "Radeon RX 7900")]);

        assert!(!info.cuda_available);
        assert_eq!(info.device_count, 0);
    }

    #[test]
    fn test_none_is_empty() {
        let info = AccelerationInfo::none();
        assert!(!info.cuda_available);
        assert_eq!(info.device_count, 0);
        assert!(info.devices.is_empty());
    }

    #[test]
    fn test_detect_does_not_panic() {
        let info = AccelerationInfo::detect();
        assert_eq!(info.cuda_available, info.device_count > 0);
    }
}

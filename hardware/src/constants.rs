/*!
Hardware Detection Constants

Command names and vendor keywords used while probing GPUs.
*/

// ========== GPU Vendors ==========
pub const GPU_VENDOR_NVIDIA: &str = "NVIDIA";
pub const GPU_VENDOR_AMD: &str = "AMD";
pub const GPU_VENDOR_INTEL: &str = "Intel";
pub const GPU_VENDOR_APPLE: &str = "Apple";
pub const GPU_VENDOR_UNKNOWN: &str = "Unknown";

// ========== Detection Command Names ==========
pub const CMD_NVIDIA_SMI: &str = "nvidia-smi";
pub const CMD_LSPCI: &str = "lspci";

pub const NVIDIA_SMI_QUERY: &str = "--query-gpu=name,memory.total,driver_version";
pub const NVIDIA_SMI_FORMAT: &str = "--format=csv,noheader,nounits";

// ========== lspci Keywords (lowercase) ==========
pub const KEYWORD_VGA: &str = "vga";
pub const KEYWORD_3D: &str = "3d controller";
pub const GPU_KEYWORD_NVIDIA: &str = "nvidia";
pub const GPU_KEYWORD_AMD: &str = "amd";
pub const GPU_KEYWORD_ATI: &str = "ati";
pub const GPU_KEYWORD_INTEL: &str = "intel";

/*!
Linux-specific GPU detection using lspci
*/

use std::process::Command;

use crate::constants::CMD_LSPCI;
use crate::gpu::{parse_lspci, GpuInfo};
use crate::Result;

/// Detect GPUs on Linux when `nvidia-smi` found nothing.
pub fn detect_gpus() -> Result<Vec<GpuInfo>> {
    match Command::new(CMD_LSPCI).output() {
        Ok(output) if output.status.success() => {
            Ok(parse_lspci(&String::from_utf8_lossy(&output.stdout)))
        }
        Ok(_) => Ok(Vec::new()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

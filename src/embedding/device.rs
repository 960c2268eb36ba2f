use candle_core::Device;
use tracing::{info, warn};

use super::error::EmbeddingError;

/// Picks the first usable accelerator compiled in (Metal, then CUDA), else the CPU.
///
/// GPU failures are logged and never fatal.
pub fn select_device() -> Result<Device, EmbeddingError> {
    let mut failures: Vec<String> = Vec::new();

    if cfg!(feature = "metal") {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Encoder using Metal GPU");
                return Ok(device);
            }
            Err(e) => failures.push(format!("metal: {e}")),
        }
    }

    if cfg!(feature = "cuda") {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Encoder using CUDA GPU");
                return Ok(device);
            }
            Err(e) => failures.push(format!("cuda: {e}")),
        }
    }

    if failures.is_empty() {
        info!("Encoder using CPU");
    } else {
        warn!(reason = %failures.join("; "), "GPU unavailable, encoder falling back to CPU");
    }
    Ok(Device::Cpu)
}

use candle_core::Device;

use crate::error::{Result, StanceError};

/// Requested compute device, resolved once at model load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceRequest {
    /// CPU inference.
    #[default]
    Cpu,
    /// A specific CUDA GPU.
    Cuda(usize),
    /// CUDA 0 when available, CPU otherwise.
    Auto,
}

impl DeviceRequest {
    pub fn resolve(self) -> Result<Device> {
        match self {
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => Device::new_cuda(i).map_err(|e| {
                StanceError::Device(format!(
                    "Failed to init CUDA device {i}: {e}. Try CPU as fallback."
                ))
            }),
            DeviceRequest::Auto => {
                if candle_core::utils::cuda_is_available() {
                    Device::new_cuda(0).map_err(|e| {
                        StanceError::Device(format!("Failed to init CUDA device 0: {e}"))
                    })
                } else {
                    Ok(Device::Cpu)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_request_resolves() {
        assert!(matches!(DeviceRequest::Cpu.resolve().unwrap(), Device::Cpu));
    }

    #[test]
    fn auto_falls_back_to_cpu_without_cuda() {
        if !candle_core::utils::cuda_is_available() {
            assert!(matches!(DeviceRequest::Auto.resolve().unwrap(), Device::Cpu));
        }
    }
}

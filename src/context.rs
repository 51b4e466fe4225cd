/*!
Where tensors live
*/
use crate::GpuFloat;
use tch::{Device, Kind, Tensor};
use tracing::info;

/// The execution context every tensor in the pipeline is created against.
///
/// Device selection happens once, here, instead of at every tensor operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExecutionContext {
    device: Device,
}

impl ExecutionContext {
    /// Run on the CPU
    pub fn cpu() -> ExecutionContext {
        ExecutionContext {
            device: Device::Cpu,
        }
    }
    /// Run on an accelerator if one is requested and available, otherwise on the CPU
    pub fn new(use_accelerator: bool) -> ExecutionContext {
        let device = if use_accelerator {
            Device::cuda_if_available()
        } else {
            Device::Cpu
        };
        info!(?device, use_accelerator, "execution context");
        ExecutionContext { device }
    }
    /// The device tensors are placed on
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }
    /// Whether this context runs on an accelerator
    #[inline]
    pub fn is_accelerated(&self) -> bool {
        self.device != Device::Cpu
    }
    /// Move a staging buffer onto the device as a tensor of the given shape
    pub fn tensor(&self, data: &[GpuFloat], shape: &[i64]) -> Tensor {
        Tensor::from(data).view(shape).to_device(self.device)
    }
    /// A zero filled tensor on the device
    pub fn zeros(&self, shape: &[i64]) -> Tensor {
        Tensor::zeros(shape, (Kind::Float, self.device))
    }
}

impl Default for ExecutionContext {
    fn default() -> ExecutionContext {
        ExecutionContext::cpu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_tensors_keep_their_shape() {
        let ctx = ExecutionContext::cpu();
        assert!(!ctx.is_accelerated());
        let t = ctx.tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3, 1]);
        assert_eq!(t.size(), vec![2, 3, 1]);
        assert_eq!(t.double_value(&[1, 2, 0]), 6.0);
        assert_eq!(ctx.zeros(&[2, 4]).size(), vec![2, 4]);
    }
}

use std::fmt;

use ash::vk;

/// A failed native call. Carries the device's own result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceError {
    res: vk::Result,
}

impl DeviceError {
    pub fn result(&self) -> vk::Result {
        self.res
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vulkan Error: {}", self.res)
    }
}

impl std::error::Error for DeviceError {}

/// Convenient crate-wide result type.
pub type Result<T, E = DeviceError> = std::result::Result<T, E>;

impl From<vk::Result> for DeviceError {
    fn from(res: vk::Result) -> Self {
        DeviceError { res }
    }
}

use ash::vk;
use ash::vk::Handle as VkHandle;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::Result;

use super::{CommandBuffer, CommandBufferLevel, Device};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "recorder-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandPoolInfo<'a> {
    pub debug_name: &'a str,
    pub queue_family: u32,
    /// Buffers are short-lived and re-recorded often.
    pub transient: bool,
    /// Buffers may be individually re-recorded.
    pub reset_command_buffer: bool,
}

impl Default for CommandPoolInfo<'_> {
    fn default() -> Self {
        Self {
            debug_name: "",
            queue_family: 0,
            transient: false,
            reset_command_buffer: true,
        }
    }
}

/// Thin wrapper around a Vulkan command pool.
///
/// The lifetime parent of every command buffer allocated from it: each buffer
/// holds an `Arc` to its pool, so the native pool is destroyed only after the
/// last buffer has been freed. Native allocate and free calls on the pool are
/// serialized internally.
pub struct CommandPool {
    device: Device,
    raw: vk::CommandPool,
    name: String,
    // Guards native allocate/free on `raw`.
    lock: Mutex<()>,
}

impl CommandPool {
    /// Create a new command pool for the given queue family.
    pub fn new(device: &Device, info: &CommandPoolInfo) -> Result<Arc<Self>> {
        let mut flags = vk::CommandPoolCreateFlags::empty();
        if info.transient {
            flags |= vk::CommandPoolCreateFlags::TRANSIENT;
        }
        if info.reset_command_buffer {
            flags |= vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER;
        }
        let raw = device.create_pool(info.queue_family, flags)?;
        tracing::debug!(
            name = info.debug_name,
            family = info.queue_family,
            raw = raw.as_raw(),
            "create_command_pool"
        );
        Ok(Arc::new(Self {
            device: device.clone(),
            raw,
            name: info.debug_name.to_string(),
            lock: Mutex::new(()),
        }))
    }

    /// Allocate `count` command buffers of `level`.
    ///
    /// Either every requested buffer is returned or none is.
    pub fn allocate(
        self: &Arc<Self>,
        level: CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<CommandBuffer>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let raws = {
            let _guard = self.lock.lock();
            self.device.allocate_buffers(self.raw, level.into(), count)?
        };
        tracing::debug!(pool = self.name.as_str(), ?level, count, "allocate_command_buffers");
        Ok(raws
            .into_iter()
            .map(|raw| CommandBuffer::new(raw, level, self.clone()))
            .collect())
    }

    pub(super) fn free_raw(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        let _guard = self.lock.lock();
        tracing::debug!(pool = self.name.as_str(), count = buffers.len(), "free_command_buffers");
        self.device.free_buffers(self.raw, buffers);
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw Vulkan command pool handle.
    pub fn raw(&self) -> vk::CommandPool {
        self.raw
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        tracing::debug!(name = self.name.as_str(), "destroy_command_pool");
        self.device
            .destroy(vk::ObjectType::COMMAND_POOL, self.raw.as_raw());
    }
}

impl std::fmt::Debug for CommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("name", &self.name)
            .field("raw", &self.raw)
            .finish()
    }
}

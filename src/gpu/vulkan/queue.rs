use ash::vk;
use parking_lot::Mutex;

use crate::Result;

use super::{CommandBuffer, Device};

/// A device queue, and the context handed to pre-execute hooks.
pub struct Queue {
    device: Device,
    raw: vk::Queue,
    family: u32,
    index: u32,
    flags: vk::QueueFlags,
    // Native submits to one queue must not overlap.
    submit_lock: Mutex<()>,
}

impl Queue {
    /// Fetch queue `index` of `family` from the device.
    pub fn new(device: &Device, family: u32, index: u32, flags: vk::QueueFlags) -> Self {
        let raw = device.queue(family, index);
        Self::from_raw(device, raw, family, index, flags)
    }

    pub fn from_raw(
        device: &Device,
        raw: vk::Queue,
        family: u32,
        index: u32,
        flags: vk::QueueFlags,
    ) -> Self {
        Self {
            device: device.clone(),
            raw,
            family,
            index,
            flags,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn raw(&self) -> vk::Queue {
        self.raw
    }

    pub fn family(&self) -> u32 {
        self.family
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Capabilities of the queue's family.
    pub fn flags(&self) -> vk::QueueFlags {
        self.flags
    }

    /// Submit `buffers` in one batch.
    ///
    /// Each buffer's pre-execute hooks run first, buffer by buffer and in
    /// recording order, with this queue. Hooks must not submit to this queue.
    pub fn submit(&self, buffers: &[&CommandBuffer], fence: vk::Fence) -> Result<()> {
        let _guard = self.submit_lock.lock();
        for buffer in buffers {
            buffer.pre_execute(self);
        }
        let raws: Vec<vk::CommandBuffer> = buffers.iter().map(|b| b.raw()).collect();
        tracing::debug!(
            family = self.family,
            index = self.index,
            count = raws.len(),
            "queue_submit"
        );
        self.device.submit(self.raw, &raws, fence)?;
        Ok(())
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("raw", &self.raw)
            .field("family", &self.family)
            .field("index", &self.index)
            .field("flags", &self.flags)
            .finish()
    }
}

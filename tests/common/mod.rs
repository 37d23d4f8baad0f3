#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle as VkHandle;

use vk_recorder::{
    CommandPool, CommandPoolInfo, Device, RawBeginInfo, RawCommand, RawDevice, Resource,
};

/// One native call observed by [`TestDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreatePool { family: u32 },
    Allocate { pool: u64, count: u32 },
    Free { pool: u64, buffers: Vec<u64> },
    Begin { buffer: u64, info: RawBeginInfo },
    End { buffer: u64 },
    Record { buffer: u64, cmd: &'static str },
    Submit { queue: u64, buffers: Vec<u64> },
    Destroy { ty: vk::ObjectType, raw: u64 },
}

/// A device that hands out fake handles and logs every call in order.
#[derive(Default)]
pub struct TestDevice {
    next: AtomicU64,
    calls: Mutex<Vec<Call>>,
    fail_allocate: Mutex<Option<vk::Result>>,
    fail_begin: Mutex<Option<vk::Result>>,
    fail_end: Mutex<Option<vk::Result>>,
    fail_command: Mutex<Option<(&'static str, vk::Result)>>,
    record_delay: Mutex<Option<Duration>>,
}

impl TestDevice {
    pub fn next_handle(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_next_allocate(&self, res: vk::Result) {
        *self.fail_allocate.lock().unwrap() = Some(res);
    }

    pub fn fail_next_begin(&self, res: vk::Result) {
        *self.fail_begin.lock().unwrap() = Some(res);
    }

    /// The next end is logged, then fails with `res`.
    pub fn fail_next_end(&self, res: vk::Result) {
        *self.fail_end.lock().unwrap() = Some(res);
    }

    /// Fail every recorded command named `cmd` until cleared.
    pub fn fail_command(&self, cmd: &'static str, res: vk::Result) {
        *self.fail_command.lock().unwrap() = Some((cmd, res));
    }

    pub fn clear_failures(&self) {
        *self.fail_command.lock().unwrap() = None;
    }

    /// Make every recorded command take `delay`.
    pub fn slow_record(&self, delay: Duration) {
        *self.record_delay.lock().unwrap() = Some(delay);
    }

    /// Begin/end calls for `buffer`, in the order they were issued.
    pub fn sessions(&self, buffer: vk::CommandBuffer) -> Vec<&'static str> {
        let raw = buffer.as_raw();
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Begin { buffer, .. } if buffer == raw => Some("begin"),
                Call::End { buffer } if buffer == raw => Some("end"),
                _ => None,
            })
            .collect()
    }

    pub fn recorded(&self, buffer: vk::CommandBuffer) -> Vec<&'static str> {
        let raw = buffer.as_raw();
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Record { buffer, cmd } if buffer == raw => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self, raw: u64) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, Call::Destroy { raw: r, .. } if *r == raw))
    }
}

impl RawDevice for TestDevice {
    fn create_pool(
        &self,
        queue_family: u32,
        _flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        self.log(Call::CreatePool { family: queue_family });
        Ok(vk::CommandPool::from_raw(self.next_handle()))
    }

    fn allocate_buffers(
        &self,
        pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        if let Some(res) = self.fail_allocate.lock().unwrap().take() {
            return Err(res);
        }
        self.log(Call::Allocate { pool: pool.as_raw(), count });
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.next_handle()))
            .collect())
    }

    fn free_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.log(Call::Free {
            pool: pool.as_raw(),
            buffers: buffers.iter().map(|b| b.as_raw()).collect(),
        });
    }

    fn begin(&self, buffer: vk::CommandBuffer, info: &RawBeginInfo) -> VkResult<()> {
        if let Some(res) = self.fail_begin.lock().unwrap().take() {
            return Err(res);
        }
        self.log(Call::Begin { buffer: buffer.as_raw(), info: *info });
        Ok(())
    }

    fn end(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        self.log(Call::End { buffer: buffer.as_raw() });
        match self.fail_end.lock().unwrap().take() {
            Some(res) => Err(res),
            None => Ok(()),
        }
    }

    fn record(&self, buffer: vk::CommandBuffer, cmd: &RawCommand<'_>) -> VkResult<()> {
        let delay = *self.record_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let failure = *self.fail_command.lock().unwrap();
        if let Some((name, res)) = failure {
            if name == cmd.name() {
                return Err(res);
            }
        }
        self.log(Call::Record { buffer: buffer.as_raw(), cmd: cmd.name() });
        Ok(())
    }

    fn queue(&self, _family: u32, _index: u32) -> vk::Queue {
        vk::Queue::from_raw(self.next_handle())
    }

    fn submit(
        &self,
        queue: vk::Queue,
        buffers: &[vk::CommandBuffer],
        _fence: vk::Fence,
    ) -> VkResult<()> {
        self.log(Call::Submit {
            queue: queue.as_raw(),
            buffers: buffers.iter().map(|b| b.as_raw()).collect(),
        });
        Ok(())
    }

    fn destroy(&self, ty: vk::ObjectType, raw: u64) {
        self.log(Call::Destroy { ty, raw });
    }
}

pub struct TestContext {
    pub native: Arc<TestDevice>,
    pub device: Device,
    pub pool: Arc<CommandPool>,
}

impl TestContext {
    pub fn new() -> Self {
        init_tracing();
        let native = Arc::new(TestDevice::default());
        let device = Device::from_shared(native.clone());
        let pool = CommandPool::new(
            &device,
            &CommandPoolInfo {
                debug_name: "test pool",
                ..Default::default()
            },
        )
        .unwrap();
        Self { native, device, pool }
    }

    /// A fresh device-owned resource with a unique handle.
    pub fn resource<H: vk::Handle + Copy>(&self) -> Arc<Resource<H>> {
        Resource::new(&self.device, H::from_raw(self.native.next_handle()))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

use std::{fmt, sync::Arc, time::Duration};

use ash::vk;
use parking_lot::{Mutex, MutexGuard};

use crate::Result;

use super::{
    CmdArgs, Command, CommandPool, Device, Framebuffer, PreExecuteHooks, Queue, RawBeginInfo,
    RawCommand, ReferenceSet, RenderPass,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "recorder-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

impl From<CommandBufferLevel> for vk::CommandBufferLevel {
    fn from(level: CommandBufferLevel) -> Self {
        match level {
            CommandBufferLevel::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandBufferLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
        }
    }
}

/// What the last successful compile left in a command buffer.
#[derive(Default)]
struct Recorded {
    references: ReferenceSet,
    pre_execute: PreExecuteHooks,
}

/// A command buffer allocated from a [`CommandPool`].
///
/// Owns the resources referenced by its last compiled command sequence and the
/// hooks that sequence registered. Both are replaced wholesale by the next
/// successful [`compile`]. The buffer keeps its pool (and through it the
/// device) alive and is returned to the pool when dropped.
pub struct CommandBuffer {
    raw: vk::CommandBuffer,
    level: CommandBufferLevel,
    pool: Arc<CommandPool>,
    // The recording lock. Held by a `RecordingScope` for a whole session.
    recorded: Mutex<Recorded>,
}

impl CommandBuffer {
    pub(super) fn new(
        raw: vk::CommandBuffer,
        level: CommandBufferLevel,
        pool: Arc<CommandPool>,
    ) -> Self {
        Self {
            raw,
            level,
            pool,
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn raw(&self) -> vk::CommandBuffer {
        self.raw
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    pub fn pool(&self) -> &Arc<CommandPool> {
        &self.pool
    }

    pub fn device(&self) -> &Device {
        self.pool.device()
    }

    /// Run the pre-execute hooks of the last compile with `queue`.
    ///
    /// Called by the submission path right before the native submit. Hooks are
    /// kept, so every submission runs them again. Blocks while the buffer is
    /// being recorded.
    pub fn pre_execute(&self, queue: &Queue) {
        let recorded = self.recorded.lock();
        recorded.pre_execute.run(queue);
    }

    /// Inspect the references installed by the last successful compile.
    pub fn with_references<R>(&self, f: impl FnOnce(&ReferenceSet) -> R) -> R {
        f(&self.recorded.lock().references)
    }

    pub fn hook_count(&self) -> usize {
        self.recorded.lock().pre_execute.len()
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if self.raw != vk::CommandBuffer::null() {
            self.pool.free_raw(&[self.raw]);
        }
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("raw", &self.raw)
            .field("level", &self.level)
            .field("pool", &self.pool.name())
            .finish()
    }
}

/// Allocate `count` command buffers of `level` from `pool`.
///
/// The device is the pool's. On failure no buffer is returned.
pub fn allocate(
    pool: &Arc<CommandPool>,
    level: CommandBufferLevel,
    count: u32,
) -> Result<Vec<CommandBuffer>> {
    pool.allocate(level, count)
}

/// Return a batch of buffers to their pools, one native call per pool.
///
/// The caller guarantees the device is done executing them.
pub fn free(buffers: Vec<CommandBuffer>) {
    let mut batches: Vec<(Arc<CommandPool>, Vec<vk::CommandBuffer>)> = Vec::new();
    let mut detached = Vec::with_capacity(buffers.len());
    for mut buffer in buffers {
        let raw = std::mem::replace(&mut buffer.raw, vk::CommandBuffer::null());
        match batches.iter_mut().find(|(pool, _)| Arc::ptr_eq(pool, &buffer.pool)) {
            Some((_, raws)) => raws.push(raw),
            None => batches.push((buffer.pool.clone(), vec![raw])),
        }
        detached.push(buffer);
    }
    for (pool, raws) in &batches {
        pool.free_raw(raws);
    }
    // References go only after the native buffers are gone.
    drop(detached);
}

/// Render-pass context inherited by a secondary buffer recorded for use inside
/// a render pass.
#[derive(Clone, Copy)]
pub struct Inheritance<'a> {
    pub render_pass: &'a Arc<RenderPass>,
    pub subpass: u32,
    pub framebuffer: &'a Arc<Framebuffer>,
}

#[derive(Clone, Copy, Default)]
pub struct BeginInfo<'a> {
    pub usage: vk::CommandBufferUsageFlags,
    pub inheritance: Option<Inheritance<'a>>,
    pub occlusion_query_enable: bool,
    pub query_flags: vk::QueryControlFlags,
    pub pipeline_statistics: vk::QueryPipelineStatisticFlags,
}

impl BeginInfo<'_> {
    fn to_raw(&self) -> RawBeginInfo {
        let mut raw = RawBeginInfo {
            flags: self.usage,
            occlusion_query_enable: self.occlusion_query_enable,
            query_flags: self.query_flags,
            pipeline_statistics: self.pipeline_statistics,
            ..Default::default()
        };
        if let Some(inheritance) = &self.inheritance {
            raw.render_pass = inheritance.render_pass.raw();
            raw.subpass = inheritance.subpass;
            raw.framebuffer = inheritance.framebuffer.raw();
        }
        raw
    }
}

/// One exclusive recording session on a command buffer.
///
/// Holds the buffer's recording lock for its whole life. The native end call
/// is issued exactly once: by [`RecordingScope::end`], or on drop on any other
/// exit path. The lock is released after the session has ended.
pub struct RecordingScope<'a> {
    buffer: &'a CommandBuffer,
    recorded: MutexGuard<'a, Recorded>,
    ended: bool,
}

impl<'a> RecordingScope<'a> {
    fn start(
        buffer: &'a CommandBuffer,
        recorded: MutexGuard<'a, Recorded>,
        info: &BeginInfo,
    ) -> Result<Self> {
        // The guard drops with the error, so a failed begin never keeps the lock.
        buffer.device().begin(buffer.raw, &info.to_raw())?;
        tracing::trace!(raw = ?buffer.raw, usage = ?info.usage, "begin_command_buffer");
        Ok(Self {
            buffer,
            recorded,
            ended: false,
        })
    }

    pub fn raw(&self) -> vk::CommandBuffer {
        self.buffer.raw
    }

    /// Record a native command directly, without tracking references.
    pub fn record(&mut self, cmd: &RawCommand<'_>) -> Result<()> {
        self.buffer.device().record(self.buffer.raw, cmd)?;
        Ok(())
    }

    /// Swap in a freshly built reference set and hook container, releasing
    /// the previous ones.
    fn install(&mut self, references: ReferenceSet, pre_execute: PreExecuteHooks) {
        *self.recorded = Recorded {
            references,
            pre_execute,
        };
    }

    /// End the session now and report the native result.
    pub fn end(mut self) -> Result<()> {
        self.ended = true;
        self.buffer.device().end(self.buffer.raw)?;
        tracing::trace!(raw = ?self.buffer.raw, "end_command_buffer");
        Ok(())
    }
}

impl Drop for RecordingScope<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        if let Err(err) = self.buffer.device().end(self.buffer.raw) {
            tracing::error!(raw = ?self.buffer.raw, %err, "end_command_buffer failed");
        }
    }
}

/// Start a recording session, blocking until no other session is open on
/// `buffer`.
pub fn begin<'a>(buffer: &'a CommandBuffer, info: &BeginInfo) -> Result<RecordingScope<'a>> {
    let recorded = buffer.recorded.lock();
    RecordingScope::start(buffer, recorded, info)
}

/// Like [`begin`], but returns `Ok(None)` instead of blocking when another
/// session is open.
pub fn try_begin<'a>(
    buffer: &'a CommandBuffer,
    info: &BeginInfo,
) -> Result<Option<RecordingScope<'a>>> {
    match buffer.recorded.try_lock() {
        Some(recorded) => RecordingScope::start(buffer, recorded, info).map(Some),
        None => Ok(None),
    }
}

/// Like [`begin`], but gives up with `Ok(None)` after `timeout`.
pub fn begin_timeout<'a>(
    buffer: &'a CommandBuffer,
    info: &BeginInfo,
    timeout: Duration,
) -> Result<Option<RecordingScope<'a>>> {
    match buffer.recorded.try_lock_for(timeout) {
        Some(recorded) => RecordingScope::start(buffer, recorded, info).map(Some),
        None => Ok(None),
    }
}

/// Record `commands` into `buffer` as one complete session.
///
/// Units are dispatched strictly in order; each may record native calls, add
/// references and register pre-execute hooks. On success the references and
/// hooks collected here replace the buffer's previous ones, while the
/// recording lock is still held. On failure nothing is installed: the buffer
/// keeps the references and hooks of its last successful compile, its native
/// contents are unspecified, and the session is still ended and unlocked.
pub fn compile(buffer: &CommandBuffer, info: &BeginInfo, commands: &[&dyn Command]) -> Result<()> {
    let _span =
        tracing::trace_span!("compile", raw = ?buffer.raw, units = commands.len()).entered();
    let mut scope = begin(buffer, info)?;

    let mut args = CmdArgs::new(buffer);
    if let Some(inheritance) = &info.inheritance {
        args.reference(inheritance.render_pass);
        args.reference(inheritance.framebuffer);
    }

    for (index, cmd) in commands.iter().enumerate() {
        tracing::trace!(index, "dispatch");
        if let Err(err) = cmd.record(&mut args) {
            tracing::debug!(index, %err, "command failed, keeping previous references");
            return Err(err);
        }
    }

    let (references, pre_execute) = args.finish();
    tracing::trace!(
        references = references.len(),
        hooks = pre_execute.len(),
        "install"
    );
    scope.install(references, pre_execute);
    scope.end()
}

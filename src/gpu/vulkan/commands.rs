//! Command units dispatched by [`compile`](super::compile).
//!
//! A unit records its native calls into the buffer being compiled and declares
//! every resource those calls use, so the buffer keeps them alive for as long
//! as it exists.

use std::sync::Arc;

use ash::vk;

use crate::Result;

use super::{
    Buffer, CommandBuffer, CommandBufferLevel, DescriptorSet, DeviceError, Event, Framebuffer,
    Image, Pipeline, PipelineLayout, PreExecuteHooks, QueryPool, Queue, RawCommand, ReferenceSet,
    RenderPass,
};

/// Recording state shared by the units of one compile.
pub struct CmdArgs<'a> {
    buffer: &'a CommandBuffer,
    references: ReferenceSet,
    pre_execute: PreExecuteHooks,
}

impl<'a> CmdArgs<'a> {
    pub(super) fn new(buffer: &'a CommandBuffer) -> Self {
        Self {
            buffer,
            references: ReferenceSet::new(),
            pre_execute: PreExecuteHooks::new(),
        }
    }

    /// The buffer being recorded.
    pub fn raw(&self) -> vk::CommandBuffer {
        self.buffer.raw()
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.buffer.level()
    }

    pub fn record(&mut self, cmd: &RawCommand<'_>) -> Result<()> {
        tracing::trace!(cmd = cmd.name(), "record");
        self.buffer.device().record(self.buffer.raw(), cmd)?;
        Ok(())
    }

    /// Keep `value` alive for as long as the buffer.
    pub fn reference<T: Send + Sync + 'static>(&mut self, value: &Arc<T>) {
        self.references.add(value);
    }

    /// Run `hook` with the target queue every time the buffer is submitted.
    pub fn on_pre_execute<F>(&mut self, hook: F)
    where
        F: Fn(&Queue) + Send + Sync + 'static,
    {
        self.pre_execute.push(hook);
    }

    pub(super) fn finish(self) -> (ReferenceSet, PreExecuteHooks) {
        (self.references, self.pre_execute)
    }
}

/// One recordable operation.
pub trait Command {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()>;
}

impl<F> Command for F
where
    F: Fn(&mut CmdArgs<'_>) -> Result<()>,
{
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        self(args)
    }
}

//===----------------------------------------------------------------------===//
// State binding
//===----------------------------------------------------------------------===//

pub struct BindPipeline {
    pub bind_point: vk::PipelineBindPoint,
    pub pipeline: Arc<Pipeline>,
}

impl Command for BindPipeline {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::BindPipeline {
            bind_point: self.bind_point,
            pipeline: self.pipeline.raw(),
        })?;
        args.reference(&self.pipeline);
        Ok(())
    }
}

pub struct BindDescriptorSets {
    pub bind_point: vk::PipelineBindPoint,
    pub layout: Arc<PipelineLayout>,
    pub first_set: u32,
    pub sets: Vec<Arc<DescriptorSet>>,
    pub dynamic_offsets: Vec<u32>,
}

impl Command for BindDescriptorSets {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        let sets: Vec<vk::DescriptorSet> = self.sets.iter().map(|s| s.raw()).collect();
        args.record(&RawCommand::BindDescriptorSets {
            bind_point: self.bind_point,
            layout: self.layout.raw(),
            first_set: self.first_set,
            sets: &sets,
            dynamic_offsets: &self.dynamic_offsets,
        })?;
        args.reference(&self.layout);
        for set in &self.sets {
            args.reference(set);
        }
        Ok(())
    }
}

/// Binds `(buffer, offset)` pairs starting at `first_binding`.
pub struct BindVertexBuffers {
    pub first_binding: u32,
    pub buffers: Vec<(Arc<Buffer>, vk::DeviceSize)>,
}

impl Command for BindVertexBuffers {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        let (raws, offsets): (Vec<vk::Buffer>, Vec<vk::DeviceSize>) =
            self.buffers.iter().map(|(b, off)| (b.raw(), *off)).unzip();
        args.record(&RawCommand::BindVertexBuffers {
            first_binding: self.first_binding,
            buffers: &raws,
            offsets: &offsets,
        })?;
        for (buffer, _) in &self.buffers {
            args.reference(buffer);
        }
        Ok(())
    }
}

pub struct BindIndexBuffer {
    pub buffer: Arc<Buffer>,
    pub offset: vk::DeviceSize,
    pub index_type: vk::IndexType,
}

impl Command for BindIndexBuffer {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::BindIndexBuffer {
            buffer: self.buffer.raw(),
            offset: self.offset,
            index_type: self.index_type,
        })?;
        args.reference(&self.buffer);
        Ok(())
    }
}

pub struct PushConstants {
    pub layout: Arc<PipelineLayout>,
    pub stages: vk::ShaderStageFlags,
    pub offset: u32,
    pub data: Vec<u8>,
}

impl Command for PushConstants {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::PushConstants {
            layout: self.layout.raw(),
            stages: self.stages,
            offset: self.offset,
            data: &self.data,
        })?;
        args.reference(&self.layout);
        Ok(())
    }
}

//===----------------------------------------------------------------------===//
// Draw / dispatch
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl Default for Draw {
    fn default() -> Self {
        Self {
            vertex_count: 0,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

impl Command for Draw {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::Draw {
            vertex_count: self.vertex_count,
            instance_count: self.instance_count,
            first_vertex: self.first_vertex,
            first_instance: self.first_instance,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

impl Default for DrawIndexed {
    fn default() -> Self {
        Self {
            index_count: 0,
            instance_count: 1,
            first_index: 0,
            vertex_offset: 0,
            first_instance: 0,
        }
    }
}

impl Command for DrawIndexed {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::DrawIndexed {
            index_count: self.index_count,
            instance_count: self.instance_count,
            first_index: self.first_index,
            vertex_offset: self.vertex_offset,
            first_instance: self.first_instance,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl Command for Dispatch {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::Dispatch {
            x: self.x,
            y: self.y,
            z: self.z,
        })
    }
}

//===----------------------------------------------------------------------===//
// Transfer
//===----------------------------------------------------------------------===//

pub struct CopyBuffer {
    pub src: Arc<Buffer>,
    pub dst: Arc<Buffer>,
    pub regions: Vec<vk::BufferCopy>,
}

impl Command for CopyBuffer {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::CopyBuffer {
            src: self.src.raw(),
            dst: self.dst.raw(),
            regions: &self.regions,
        })?;
        args.reference(&self.src);
        args.reference(&self.dst);
        Ok(())
    }
}

pub struct FillBuffer {
    pub buffer: Arc<Buffer>,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
    pub data: u32,
}

impl Command for FillBuffer {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::FillBuffer {
            buffer: self.buffer.raw(),
            offset: self.offset,
            size: self.size,
            data: self.data,
        })?;
        args.reference(&self.buffer);
        Ok(())
    }
}

//===----------------------------------------------------------------------===//
// Render passes
//===----------------------------------------------------------------------===//

pub struct BeginRenderPass {
    pub render_pass: Arc<RenderPass>,
    pub framebuffer: Arc<Framebuffer>,
    pub render_area: vk::Rect2D,
    pub clear_values: Vec<vk::ClearValue>,
    pub contents: vk::SubpassContents,
}

impl Command for BeginRenderPass {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::BeginRenderPass {
            render_pass: self.render_pass.raw(),
            framebuffer: self.framebuffer.raw(),
            render_area: self.render_area,
            clear_values: &self.clear_values,
            contents: self.contents,
        })?;
        args.reference(&self.render_pass);
        args.reference(&self.framebuffer);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextSubpass {
    pub contents: vk::SubpassContents,
}

impl Command for NextSubpass {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::NextSubpass {
            contents: self.contents,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndRenderPass;

impl Command for EndRenderPass {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::EndRenderPass)
    }
}

/// Executes secondary buffers from a primary one.
///
/// The secondaries are kept alive by the primary, and their own pre-execute
/// hooks run, with the same queue, whenever the primary is submitted.
/// Recording fails with `ERROR_VALIDATION_FAILED_EXT`, before any native call,
/// when the target is not primary or a listed buffer is not secondary.
pub struct ExecuteCommands {
    pub buffers: Vec<Arc<CommandBuffer>>,
}

impl Command for ExecuteCommands {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        let valid = args.level() == CommandBufferLevel::Primary
            && self
                .buffers
                .iter()
                .all(|b| b.level() == CommandBufferLevel::Secondary);
        if !valid {
            tracing::error!(
                raw = ?args.raw(),
                "execute_commands needs a primary target and secondary buffers"
            );
            return Err(DeviceError::from(vk::Result::ERROR_VALIDATION_FAILED_EXT));
        }
        let raws: Vec<vk::CommandBuffer> = self.buffers.iter().map(|b| b.raw()).collect();
        args.record(&RawCommand::ExecuteCommands { buffers: &raws })?;
        for buffer in &self.buffers {
            args.reference(buffer);
        }
        let secondaries = self.buffers.clone();
        args.on_pre_execute(move |queue| {
            for buffer in &secondaries {
                buffer.pre_execute(queue);
            }
        });
        Ok(())
    }
}

//===----------------------------------------------------------------------===//
// Queries and events
//===----------------------------------------------------------------------===//

pub struct ResetQueryPool {
    pub pool: Arc<QueryPool>,
    pub first_query: u32,
    pub query_count: u32,
}

impl Command for ResetQueryPool {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::ResetQueryPool {
            pool: self.pool.raw(),
            first_query: self.first_query,
            query_count: self.query_count,
        })?;
        args.reference(&self.pool);
        Ok(())
    }
}

pub struct BeginQuery {
    pub pool: Arc<QueryPool>,
    pub query: u32,
    pub flags: vk::QueryControlFlags,
}

impl Command for BeginQuery {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::BeginQuery {
            pool: self.pool.raw(),
            query: self.query,
            flags: self.flags,
        })?;
        args.reference(&self.pool);
        Ok(())
    }
}

pub struct EndQuery {
    pub pool: Arc<QueryPool>,
    pub query: u32,
}

impl Command for EndQuery {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::EndQuery {
            pool: self.pool.raw(),
            query: self.query,
        })?;
        args.reference(&self.pool);
        Ok(())
    }
}

pub struct SetEvent {
    pub event: Arc<Event>,
    pub stages: vk::PipelineStageFlags,
}

impl Command for SetEvent {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::SetEvent {
            event: self.event.raw(),
            stages: self.stages,
        })?;
        args.reference(&self.event);
        Ok(())
    }
}

pub struct ResetEvent {
    pub event: Arc<Event>,
    pub stages: vk::PipelineStageFlags,
}

impl Command for ResetEvent {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        args.record(&RawCommand::ResetEvent {
            event: self.event.raw(),
            stages: self.stages,
        })?;
        args.reference(&self.event);
        Ok(())
    }
}

//===----------------------------------------------------------------------===//
// Barriers
//===----------------------------------------------------------------------===//

pub struct BufferBarrier {
    pub buffer: Arc<Buffer>,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl BufferBarrier {
    /// Whole-buffer barrier without a queue family transfer.
    pub fn whole(
        buffer: Arc<Buffer>,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
    ) -> Self {
        Self {
            buffer,
            src_access,
            dst_access,
            src_queue_family: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family: vk::QUEUE_FAMILY_IGNORED,
            offset: 0,
            size: vk::WHOLE_SIZE,
        }
    }

    fn to_vk(&self) -> vk::BufferMemoryBarrier {
        vk::BufferMemoryBarrier::builder()
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .src_queue_family_index(self.src_queue_family)
            .dst_queue_family_index(self.dst_queue_family)
            .buffer(self.buffer.raw())
            .offset(self.offset)
            .size(self.size)
            .build()
    }
}

pub struct ImageBarrier {
    pub image: Arc<Image>,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub range: vk::ImageSubresourceRange,
}

impl ImageBarrier {
    /// Layout transition of every mip level and layer of `aspect`.
    pub fn transition(
        image: Arc<Image>,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Self {
        Self {
            image,
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::empty(),
            old_layout,
            new_layout,
            src_queue_family: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family: vk::QUEUE_FAMILY_IGNORED,
            range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            },
        }
    }

    fn to_vk(&self) -> vk::ImageMemoryBarrier {
        vk::ImageMemoryBarrier::builder()
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(self.src_queue_family)
            .dst_queue_family_index(self.dst_queue_family)
            .image(self.image.raw())
            .subresource_range(self.range)
            .build()
    }
}

pub struct PipelineBarrier {
    pub src_stages: vk::PipelineStageFlags,
    pub dst_stages: vk::PipelineStageFlags,
    pub dependency: vk::DependencyFlags,
    pub memory: Vec<vk::MemoryBarrier>,
    pub buffers: Vec<BufferBarrier>,
    pub images: Vec<ImageBarrier>,
}

impl Command for PipelineBarrier {
    fn record(&self, args: &mut CmdArgs<'_>) -> Result<()> {
        let buffers: Vec<vk::BufferMemoryBarrier> =
            self.buffers.iter().map(|b| b.to_vk()).collect();
        let images: Vec<vk::ImageMemoryBarrier> =
            self.images.iter().map(|i| i.to_vk()).collect();
        args.record(&RawCommand::PipelineBarrier {
            src_stages: self.src_stages,
            dst_stages: self.dst_stages,
            dependency: self.dependency,
            memory: &self.memory,
            buffers: &buffers,
            images: &images,
        })?;
        for barrier in &self.buffers {
            args.reference(&barrier.buffer);
        }
        for barrier in &self.images {
            args.reference(&barrier.image);
        }
        Ok(())
    }
}

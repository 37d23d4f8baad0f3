use std::{ops::Deref, sync::Arc};

use ash::vk;
use ash::vk::Handle as VkHandle;

/// Parameters of a native "begin recording" call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawBeginInfo {
    pub flags: vk::CommandBufferUsageFlags,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub framebuffer: vk::Framebuffer,
    pub occlusion_query_enable: bool,
    pub query_flags: vk::QueryControlFlags,
    pub pipeline_statistics: vk::QueryPipelineStatisticFlags,
}

/// One native recording call.
#[derive(Clone, Copy)]
pub enum RawCommand<'a> {
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &'a [vk::DescriptorSet],
        dynamic_offsets: &'a [u32],
    },
    BindVertexBuffers {
        first_binding: u32,
        buffers: &'a [vk::Buffer],
        offsets: &'a [vk::DeviceSize],
    },
    BindIndexBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &'a [u8],
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &'a [vk::BufferCopy],
    },
    FillBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        data: u32,
    },
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &'a [vk::ClearValue],
        contents: vk::SubpassContents,
    },
    NextSubpass {
        contents: vk::SubpassContents,
    },
    EndRenderPass,
    ExecuteCommands {
        buffers: &'a [vk::CommandBuffer],
    },
    ResetQueryPool {
        pool: vk::QueryPool,
        first_query: u32,
        query_count: u32,
    },
    BeginQuery {
        pool: vk::QueryPool,
        query: u32,
        flags: vk::QueryControlFlags,
    },
    EndQuery {
        pool: vk::QueryPool,
        query: u32,
    },
    SetEvent {
        event: vk::Event,
        stages: vk::PipelineStageFlags,
    },
    ResetEvent {
        event: vk::Event,
        stages: vk::PipelineStageFlags,
    },
    PipelineBarrier {
        src_stages: vk::PipelineStageFlags,
        dst_stages: vk::PipelineStageFlags,
        dependency: vk::DependencyFlags,
        memory: &'a [vk::MemoryBarrier],
        buffers: &'a [vk::BufferMemoryBarrier],
        images: &'a [vk::ImageMemoryBarrier],
    },
}

impl RawCommand<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            RawCommand::BindPipeline { .. } => "bind_pipeline",
            RawCommand::BindDescriptorSets { .. } => "bind_descriptor_sets",
            RawCommand::BindVertexBuffers { .. } => "bind_vertex_buffers",
            RawCommand::BindIndexBuffer { .. } => "bind_index_buffer",
            RawCommand::PushConstants { .. } => "push_constants",
            RawCommand::Draw { .. } => "draw",
            RawCommand::DrawIndexed { .. } => "draw_indexed",
            RawCommand::Dispatch { .. } => "dispatch",
            RawCommand::CopyBuffer { .. } => "copy_buffer",
            RawCommand::FillBuffer { .. } => "fill_buffer",
            RawCommand::BeginRenderPass { .. } => "begin_render_pass",
            RawCommand::NextSubpass { .. } => "next_subpass",
            RawCommand::EndRenderPass => "end_render_pass",
            RawCommand::ExecuteCommands { .. } => "execute_commands",
            RawCommand::ResetQueryPool { .. } => "reset_query_pool",
            RawCommand::BeginQuery { .. } => "begin_query",
            RawCommand::EndQuery { .. } => "end_query",
            RawCommand::SetEvent { .. } => "set_event",
            RawCommand::ResetEvent { .. } => "reset_event",
            RawCommand::PipelineBarrier { .. } => "pipeline_barrier",
        }
    }
}

/// Every native call the recorder issues.
///
/// Implemented for [`ash::Device`]; other implementations (layers, test
/// doubles) can be wrapped in a [`Device`] the same way.
///
/// # Safety contract
/// Callers pass handles created from this same device. Recording calls on one
/// command buffer are only issued while its recording lock is held, and
/// allocate/free calls on one pool are serialized by the pool.
pub trait RawDevice: Send + Sync {
    fn create_pool(
        &self,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> ash::prelude::VkResult<vk::CommandPool>;

    fn allocate_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> ash::prelude::VkResult<Vec<vk::CommandBuffer>>;

    fn free_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    fn begin(&self, buffer: vk::CommandBuffer, info: &RawBeginInfo) -> ash::prelude::VkResult<()>;

    fn end(&self, buffer: vk::CommandBuffer) -> ash::prelude::VkResult<()>;

    /// Record one command. Native Vulkan recording calls cannot fail, but a
    /// layered device may report errors here.
    fn record(&self, buffer: vk::CommandBuffer, cmd: &RawCommand<'_>) -> ash::prelude::VkResult<()>;

    fn queue(&self, family: u32, index: u32) -> vk::Queue;

    fn submit(
        &self,
        queue: vk::Queue,
        buffers: &[vk::CommandBuffer],
        fence: vk::Fence,
    ) -> ash::prelude::VkResult<()>;

    /// Destroy a device-owned object.
    fn destroy(&self, ty: vk::ObjectType, raw: u64);
}

/// Shared handle to the device every pool, buffer and resource was created
/// from. Cloning is cheap.
#[derive(Clone)]
pub struct Device {
    raw: Arc<dyn RawDevice>,
}

impl Device {
    pub fn new(raw: impl RawDevice + 'static) -> Self {
        Self { raw: Arc::new(raw) }
    }

    pub fn from_shared(raw: Arc<dyn RawDevice>) -> Self {
        Self { raw }
    }
}

impl Deref for Device {
    type Target = dyn RawDevice;

    fn deref(&self) -> &Self::Target {
        self.raw.as_ref()
    }
}

impl From<ash::Device> for Device {
    fn from(device: ash::Device) -> Self {
        Device::new(device)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("raw", &Arc::as_ptr(&self.raw))
            .finish()
    }
}

impl RawDevice for ash::Device {
    fn create_pool(
        &self,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> ash::prelude::VkResult<vk::CommandPool> {
        let ci = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family)
            .flags(flags)
            .build();
        unsafe { self.create_command_pool(&ci, None) }
    }

    fn allocate_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> ash::prelude::VkResult<Vec<vk::CommandBuffer>> {
        unsafe {
            self.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_pool(pool)
                    .level(level)
                    .command_buffer_count(count)
                    .build(),
            )
        }
    }

    fn free_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.free_command_buffers(pool, buffers) }
    }

    fn begin(&self, buffer: vk::CommandBuffer, info: &RawBeginInfo) -> ash::prelude::VkResult<()> {
        let inheritance = vk::CommandBufferInheritanceInfo::builder()
            .render_pass(info.render_pass)
            .subpass(info.subpass)
            .framebuffer(info.framebuffer)
            .occlusion_query_enable(info.occlusion_query_enable)
            .query_flags(info.query_flags)
            .pipeline_statistics(info.pipeline_statistics);
        let bi = vk::CommandBufferBeginInfo::builder()
            .flags(info.flags)
            .inheritance_info(&inheritance);
        unsafe { self.begin_command_buffer(buffer, &bi) }
    }

    fn end(&self, buffer: vk::CommandBuffer) -> ash::prelude::VkResult<()> {
        unsafe { self.end_command_buffer(buffer) }
    }

    fn record(&self, cb: vk::CommandBuffer, cmd: &RawCommand<'_>) -> ash::prelude::VkResult<()> {
        unsafe {
            match *cmd {
                RawCommand::BindPipeline {
                    bind_point,
                    pipeline,
                } => self.cmd_bind_pipeline(cb, bind_point, pipeline),
                RawCommand::BindDescriptorSets {
                    bind_point,
                    layout,
                    first_set,
                    sets,
                    dynamic_offsets,
                } => self.cmd_bind_descriptor_sets(
                    cb,
                    bind_point,
                    layout,
                    first_set,
                    sets,
                    dynamic_offsets,
                ),
                RawCommand::BindVertexBuffers {
                    first_binding,
                    buffers,
                    offsets,
                } => self.cmd_bind_vertex_buffers(cb, first_binding, buffers, offsets),
                RawCommand::BindIndexBuffer {
                    buffer,
                    offset,
                    index_type,
                } => self.cmd_bind_index_buffer(cb, buffer, offset, index_type),
                RawCommand::PushConstants {
                    layout,
                    stages,
                    offset,
                    data,
                } => self.cmd_push_constants(cb, layout, stages, offset, data),
                RawCommand::Draw {
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                } => self.cmd_draw(cb, vertex_count, instance_count, first_vertex, first_instance),
                RawCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    first_index,
                    vertex_offset,
                    first_instance,
                } => self.cmd_draw_indexed(
                    cb,
                    index_count,
                    instance_count,
                    first_index,
                    vertex_offset,
                    first_instance,
                ),
                RawCommand::Dispatch { x, y, z } => self.cmd_dispatch(cb, x, y, z),
                RawCommand::CopyBuffer { src, dst, regions } => {
                    self.cmd_copy_buffer(cb, src, dst, regions)
                }
                RawCommand::FillBuffer {
                    buffer,
                    offset,
                    size,
                    data,
                } => self.cmd_fill_buffer(cb, buffer, offset, size, data),
                RawCommand::BeginRenderPass {
                    render_pass,
                    framebuffer,
                    render_area,
                    clear_values,
                    contents,
                } => {
                    let rp_begin = vk::RenderPassBeginInfo::builder()
                        .render_pass(render_pass)
                        .framebuffer(framebuffer)
                        .render_area(render_area)
                        .clear_values(clear_values);
                    self.cmd_begin_render_pass(cb, &rp_begin, contents)
                }
                RawCommand::NextSubpass { contents } => self.cmd_next_subpass(cb, contents),
                RawCommand::EndRenderPass => self.cmd_end_render_pass(cb),
                RawCommand::ExecuteCommands { buffers } => self.cmd_execute_commands(cb, buffers),
                RawCommand::ResetQueryPool {
                    pool,
                    first_query,
                    query_count,
                } => self.cmd_reset_query_pool(cb, pool, first_query, query_count),
                RawCommand::BeginQuery { pool, query, flags } => {
                    self.cmd_begin_query(cb, pool, query, flags)
                }
                RawCommand::EndQuery { pool, query } => self.cmd_end_query(cb, pool, query),
                RawCommand::SetEvent { event, stages } => self.cmd_set_event(cb, event, stages),
                RawCommand::ResetEvent { event, stages } => {
                    self.cmd_reset_event(cb, event, stages)
                }
                RawCommand::PipelineBarrier {
                    src_stages,
                    dst_stages,
                    dependency,
                    memory,
                    buffers,
                    images,
                } => self.cmd_pipeline_barrier(
                    cb, src_stages, dst_stages, dependency, memory, buffers, images,
                ),
            }
        }
        Ok(())
    }

    fn queue(&self, family: u32, index: u32) -> vk::Queue {
        unsafe { self.get_device_queue(family, index) }
    }

    fn submit(
        &self,
        queue: vk::Queue,
        buffers: &[vk::CommandBuffer],
        fence: vk::Fence,
    ) -> ash::prelude::VkResult<()> {
        let submit = vk::SubmitInfo::builder().command_buffers(buffers).build();
        unsafe { self.queue_submit(queue, &[submit], fence) }
    }

    fn destroy(&self, ty: vk::ObjectType, raw: u64) {
        unsafe {
            match ty {
                vk::ObjectType::BUFFER => self.destroy_buffer(vk::Buffer::from_raw(raw), None),
                vk::ObjectType::IMAGE => self.destroy_image(vk::Image::from_raw(raw), None),
                vk::ObjectType::IMAGE_VIEW => {
                    self.destroy_image_view(vk::ImageView::from_raw(raw), None)
                }
                vk::ObjectType::SAMPLER => self.destroy_sampler(vk::Sampler::from_raw(raw), None),
                vk::ObjectType::RENDER_PASS => {
                    self.destroy_render_pass(vk::RenderPass::from_raw(raw), None)
                }
                vk::ObjectType::FRAMEBUFFER => {
                    self.destroy_framebuffer(vk::Framebuffer::from_raw(raw), None)
                }
                vk::ObjectType::PIPELINE => {
                    self.destroy_pipeline(vk::Pipeline::from_raw(raw), None)
                }
                vk::ObjectType::PIPELINE_LAYOUT => {
                    self.destroy_pipeline_layout(vk::PipelineLayout::from_raw(raw), None)
                }
                vk::ObjectType::DESCRIPTOR_SET_LAYOUT => self
                    .destroy_descriptor_set_layout(vk::DescriptorSetLayout::from_raw(raw), None),
                vk::ObjectType::DESCRIPTOR_POOL => {
                    self.destroy_descriptor_pool(vk::DescriptorPool::from_raw(raw), None)
                }
                vk::ObjectType::QUERY_POOL => {
                    self.destroy_query_pool(vk::QueryPool::from_raw(raw), None)
                }
                vk::ObjectType::EVENT => self.destroy_event(vk::Event::from_raw(raw), None),
                vk::ObjectType::SHADER_MODULE => {
                    self.destroy_shader_module(vk::ShaderModule::from_raw(raw), None)
                }
                vk::ObjectType::FENCE => self.destroy_fence(vk::Fence::from_raw(raw), None),
                vk::ObjectType::SEMAPHORE => {
                    self.destroy_semaphore(vk::Semaphore::from_raw(raw), None)
                }
                vk::ObjectType::COMMAND_POOL => {
                    self.destroy_command_pool(vk::CommandPool::from_raw(raw), None)
                }
                other => tracing::warn!(?other, raw, "no destructor for object type"),
            }
        }
    }
}

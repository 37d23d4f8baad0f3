//! Command recording on top of a Vulkan device.
//!
//! A [`CommandBuffer`] is recorded through [`compile`], which runs an ordered
//! list of [`Command`] units inside one exclusive [`RecordingScope`]. Every
//! resource the units reference is kept alive by the buffer until its next
//! successful compile, and hooks registered by the units run against the
//! target [`Queue`] each time the buffer is submitted.
//!
//! # Examples
//! ```ignore
//! use vk_recorder::*;
//! let pool = CommandPool::new(&device, &CommandPoolInfo::default())?;
//! let mut buffers = allocate(&pool, CommandBufferLevel::Primary, 1)?;
//! let cmd = buffers.remove(0);
//! compile(&cmd, &BeginInfo::default(), &[&commands::Dispatch { x: 8, y: 8, z: 1 }])?;
//! queue.submit(&[&cmd], ash::vk::Fence::null())?;
//! ```

pub mod vulkan;
pub use vulkan::*;

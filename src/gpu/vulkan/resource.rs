use std::{any::Any, fmt, sync::Arc};

use ash::vk;

use super::Device;

enum Release {
    /// Destroyed through the device when the last holder lets go.
    Destroy(Device),
    /// Owned by a parent object (a descriptor set by its pool); only keeps the
    /// parent alive.
    Parent { _parent: Arc<dyn Any + Send + Sync> },
}

/// A native device object with shared ownership.
///
/// Holders share a resource through `Arc<Resource<H>>`: the caller, any number
/// of command buffers that recorded commands using it, or other resources. The
/// native object is released only when the last `Arc` drops.
pub struct Resource<H: vk::Handle + Copy> {
    raw: H,
    release: Release,
}

pub type Buffer = Resource<vk::Buffer>;
pub type Image = Resource<vk::Image>;
pub type ImageView = Resource<vk::ImageView>;
pub type Sampler = Resource<vk::Sampler>;
pub type RenderPass = Resource<vk::RenderPass>;
pub type Framebuffer = Resource<vk::Framebuffer>;
pub type Pipeline = Resource<vk::Pipeline>;
pub type PipelineLayout = Resource<vk::PipelineLayout>;
pub type DescriptorPool = Resource<vk::DescriptorPool>;
pub type DescriptorSet = Resource<vk::DescriptorSet>;
pub type QueryPool = Resource<vk::QueryPool>;
pub type Event = Resource<vk::Event>;

impl<H: vk::Handle + Copy> Resource<H> {
    /// Take ownership of `raw`, which was created from `device`.
    pub fn new(device: &Device, raw: H) -> Arc<Self> {
        Arc::new(Self {
            raw,
            release: Release::Destroy(device.clone()),
        })
    }

    /// Wrap an object whose storage belongs to `parent`. The parent stays alive
    /// at least as long as the child.
    pub fn child_of<P>(parent: &Arc<P>, raw: H) -> Arc<Self>
    where
        P: Send + Sync + 'static,
    {
        Arc::new(Self {
            raw,
            release: Release::Parent {
                _parent: parent.clone(),
            },
        })
    }

    pub fn raw(&self) -> H {
        self.raw
    }
}

impl<H: vk::Handle + Copy> Drop for Resource<H> {
    fn drop(&mut self) {
        if let Release::Destroy(device) = &self.release {
            tracing::trace!(ty = ?H::TYPE, raw = self.raw.as_raw(), "destroy_resource");
            device.destroy(H::TYPE, self.raw.as_raw());
        }
    }
}

impl<H: vk::Handle + Copy> fmt::Debug for Resource<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type", &H::TYPE)
            .field("raw", &self.raw.as_raw())
            .finish()
    }
}

use anyhow::{bail, Context, Result};
use ash::vk;
use bytemuck::Pod;
use gpu_allocator::{vulkan::Allocation, MemoryLocation};

use super::context::VulkanContext;

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub size: vk::DeviceSize,
    allocation: Option<Allocation>,
}

impl GpuBuffer {
    pub fn new(
        ctx: &VulkanContext,
        name: &str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        let buffer = unsafe {
            ctx.device.create_buffer(
                &vk::BufferCreateInfo::builder()
                    .size(size)
                    .usage(usage)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE),
                None,
            )
        }
        .with_context(|| format!("Failed to create {name}"))?;
        let mut this = Self {
            buffer,
            size,
            allocation: None,
        };

        let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };
        let bound = ctx
            .memory
            .allocate(name, requirements, location, true)
            .and_then(|allocation| {
                let result = unsafe {
                    ctx.device
                        .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                };
                this.allocation = Some(allocation);
                Ok(result?)
            });
        if let Err(err) = bound {
            this.destroy(ctx);
            return Err(err.context(format!("Failed to back {name} with memory")));
        }

        Ok(this)
    }

    /// Host-visible buffer rewritten by the CPU every frame.
    pub fn host_visible(
        ctx: &VulkanContext,
        name: &str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        Self::new(ctx, name, size, usage, MemoryLocation::CpuToGpu)
    }

    /// Device-local buffer filled once through a staging copy.
    pub fn device_local_with_data<T: Pod>(
        ctx: &VulkanContext,
        name: &str,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            bail!("{name} has no data");
        }
        let size = bytes.len() as vk::DeviceSize;

        let mut staging = Self::host_visible(
            ctx,
            "staging buffer",
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )?;
        let result = staging.write(0, bytes).and_then(|()| {
            let mut buffer = Self::new(
                ctx,
                name,
                size,
                usage | vk::BufferUsageFlags::TRANSFER_DST,
                MemoryLocation::GpuOnly,
            )?;
            let copied = ctx.one_time_submit(|device, cmd| unsafe {
                device.cmd_copy_buffer(
                    cmd,
                    staging.buffer,
                    buffer.buffer,
                    &[vk::BufferCopy::builder().size(size).build()],
                );
            });
            match copied {
                Ok(()) => Ok(buffer),
                Err(err) => {
                    buffer.destroy(ctx);
                    Err(err)
                }
            }
        });
        staging.destroy(ctx);
        result
    }

    /// Copies `data` into the mapped memory at `offset` bytes.
    pub fn write<T: Pod>(&mut self, offset: usize, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let Some(mapped) = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
        else {
            bail!("Buffer is not host visible");
        };
        let Some(target) = mapped.get_mut(offset..offset + bytes.len()) else {
            bail!(
                "Write of {} bytes at {offset} overflows a {} byte buffer",
                bytes.len(),
                self.size
            );
        };
        target.copy_from_slice(bytes);
        Ok(())
    }

    pub fn destroy(&mut self, ctx: &VulkanContext) {
        unsafe {
            ctx.device.destroy_buffer(self.buffer, None);
        }
        self.buffer = vk::Buffer::null();
        ctx.memory.release(self.allocation.take());
    }
}

/// A vertex buffer drawn without indices.
pub struct VertexBuffer {
    pub buffer: GpuBuffer,
    pub vertex_count: u32,
}

impl VertexBuffer {
    pub fn new<T: Pod>(ctx: &VulkanContext, name: &str, vertices: &[T]) -> Result<Self> {
        let buffer = GpuBuffer::device_local_with_data(
            ctx,
            name,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vertices,
        )?;
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    pub fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe { device.cmd_bind_vertex_buffers(cmd, 0, &[self.buffer.buffer], &[0]) };
    }

    pub fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        self.bind(device, cmd);
        self.draw_range(device, cmd, 0, self.vertex_count);
    }

    /// Draws `count` vertices starting at `first`; the buffer must be bound.
    pub fn draw_range(&self, device: &ash::Device, cmd: vk::CommandBuffer, first: u32, count: u32) {
        unsafe { device.cmd_draw(cmd, count, 1, first, 0) };
    }

    pub fn destroy(&mut self, ctx: &VulkanContext) {
        self.buffer.destroy(ctx);
    }
}

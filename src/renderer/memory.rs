use anyhow::{anyhow, Result};
use ash::vk;
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc},
    MemoryLocation,
};
use std::sync::{Arc, Mutex};

/// Shared handle to the device memory allocator.
#[derive(Clone)]
pub struct GpuMemory {
    inner: Arc<Mutex<Allocator>>,
}
impl GpuMemory {
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        Ok(Self {
            inner: Arc::new(Mutex::new(allocator)),
        })
    }

    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .inner
            .lock()
            .map_err(|_| anyhow!("GPU allocator lock poisoned"))?;
        Ok(allocator.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?)
    }

    pub fn free(&self, allocation: Allocation) -> Result<()> {
        let mut allocator = self
            .inner
            .lock()
            .map_err(|_| anyhow!("GPU allocator lock poisoned"))?;
        Ok(allocator.free(allocation)?)
    }

    /// Frees and logs instead of failing; used on teardown paths.
    pub fn release(&self, allocation: Option<Allocation>) {
        if let Some(allocation) = allocation {
            if let Err(err) = self.free(allocation) {
                log::error!("Failed to free GPU allocation: {err:#}");
            }
        }
    }
}

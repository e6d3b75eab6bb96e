use anyhow::{anyhow, bail, Context, Result};
use ash::{
    extensions::{
        ext::DebugUtils,
        khr::{Surface, Swapchain},
    },
    vk, Device, Entry, Instance,
};
use egui_winit::winit::window::Window;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::{
    ffi::{c_void, CStr, CString},
    mem::ManuallyDrop,
};

use super::memory::GpuMemory;
use crate::config::SceneConfig;

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
    let level = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Debug,
        _ => log::Level::Trace,
    };
    log::log!(target: "vulkan", level, "[{message_types:?}] {message}");

    vk::FALSE
}

/// Instance, device and the handles every renderer part borrows.
///
/// Owned by the renderer and dropped after everything created from it.
pub struct VulkanContext {
    _entry: Entry,
    pub instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub surface_loader: Surface,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub queue_family_index: u32,
    pub device: Device,
    pub queue: vk::Queue,
    pub swapchain_loader: Swapchain,
    pub command_pool: vk::CommandPool,
    pub memory: ManuallyDrop<GpuMemory>,
    pub limits: vk::PhysicalDeviceLimits,
}

impl VulkanContext {
    pub fn new(window: &Window, config: &SceneConfig) -> Result<Self> {
        let entry =
            unsafe { Entry::load() }.map_err(|err| anyhow!("Failed to load Vulkan: {err}"))?;

        let validation = config.enable_validation && Self::validation_available(&entry)?;
        if config.enable_validation && !validation {
            log::warn!("{VALIDATION_LAYER:?} requested but not installed, continuing without it");
        }

        let (instance, debug_utils) = Self::create_instance(&entry, window, config, validation)?;
        let surface_loader = Surface::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(
                &entry,
                &instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create window surface")?;

        let (physical_device, queue_family_index) =
            Self::pick_physical_device(&instance, &surface_loader, surface)?;
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!("Using {device_name:?} ({:?})", properties.device_type);

        let (device, queue) = Self::create_device(&instance, physical_device, queue_family_index)?;
        let swapchain_loader = Swapchain::new(&instance, &device);
        let command_pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::builder()
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                    .queue_family_index(queue_family_index),
                None,
            )
        }
        .context("Failed to create command pool")?;
        let memory = GpuMemory::new(&instance, &device, physical_device)
            .context("Failed to create GPU allocator")?;

        Ok(Self {
            _entry: entry,
            instance,
            debug_utils,
            surface_loader,
            surface,
            physical_device,
            queue_family_index,
            device,
            queue,
            swapchain_loader,
            command_pool,
            memory: ManuallyDrop::new(memory),
            limits: properties.limits,
        })
    }

    fn validation_available(entry: &Entry) -> Result<bool> {
        let layers = entry.enumerate_instance_layer_properties()?;
        Ok(layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER))
    }

    fn create_instance(
        entry: &Entry,
        window: &Window,
        config: &SceneConfig,
        validation: bool,
    ) -> Result<(Instance, Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>)> {
        let mut debug_utils_messenger_create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            )
            .pfn_user_callback(Some(vulkan_debug_utils_callback))
            .build();

        let app_name = CString::new(config.title.as_str()).context("Window title contains NUL")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extension_names =
            ash_window::enumerate_required_extensions(window.raw_display_handle())
                .context("Window system has no Vulkan surface support")?
                .to_vec();
        let layer_names = if validation {
            extension_names.push(DebugUtils::name().as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut instance_create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);
        if validation {
            instance_create_info = instance_create_info.push_next(&mut debug_utils_messenger_create_info);
        }
        let instance = unsafe { entry.create_instance(&instance_create_info, None) }
            .context("Failed to create Vulkan instance")?;

        let debug_utils = if validation {
            let loader = DebugUtils::new(entry, &instance);
            let messenger = unsafe {
                loader.create_debug_utils_messenger(&debug_utils_messenger_create_info, None)
            }
            .context("Failed to create debug messenger")?;
            Some((loader, messenger))
        } else {
            None
        };

        Ok((instance, debug_utils))
    }

    /// First device with a graphics queue that can present to `surface`,
    /// discrete GPUs preferred.
    fn pick_physical_device(
        instance: &Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        let mut candidates = vec![];
        for physical_device in physical_devices {
            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let queue_family_index = queue_families.iter().enumerate().position(|(i, family)| {
                family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                    && unsafe {
                        surface_loader.get_physical_device_surface_support(
                            physical_device,
                            i as u32,
                            surface,
                        )
                    }
                    .unwrap_or(false)
            });
            let Some(queue_family_index) = queue_family_index else {
                continue;
            };

            let extensions =
                unsafe { instance.enumerate_device_extension_properties(physical_device) }?;
            let has_swapchain = extensions.iter().any(|extension| {
                (unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }) == Swapchain::name()
            });
            let formats = unsafe {
                surface_loader.get_physical_device_surface_formats(physical_device, surface)
            }?;
            if !has_swapchain || formats.is_empty() {
                continue;
            }

            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            let rank = match properties.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                _ => 2,
            };
            candidates.push((rank, physical_device, queue_family_index as u32));
        }

        let Some(&(_, physical_device, queue_family_index)) =
            candidates.iter().min_by_key(|(rank, ..)| *rank)
        else {
            bail!("No Vulkan device can render to this window");
        };
        Ok((physical_device, queue_family_index))
    }

    fn create_device(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<(Device, vk::Queue)> {
        let queue_priorities = [1.0_f32];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities);
        let physical_device_features = vk::PhysicalDeviceFeatures::builder();
        let extension_names = [Swapchain::name().as_ptr()];

        let device = unsafe {
            instance.create_device(
                physical_device,
                &vk::DeviceCreateInfo::builder()
                    .queue_create_infos(std::slice::from_ref(&queue_create_info))
                    .enabled_features(&physical_device_features)
                    .enabled_extension_names(&extension_names),
                None,
            )
        }
        .context("Failed to create logical device")?;
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        Ok((device, queue))
    }

    /// Records and submits a command buffer, blocking until the queue is idle.
    pub fn one_time_submit(&self, record: impl FnOnce(&Device, vk::CommandBuffer)) -> Result<()> {
        let cmd = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::builder()
                    .command_pool(self.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )
        }
        .context("Failed to allocate upload command buffer")?[0];

        let result = unsafe {
            self.device
                .begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::builder()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .and_then(|()| {
                    record(&self.device, cmd);
                    self.device.end_command_buffer(cmd)
                })
                .and_then(|()| {
                    self.device.queue_submit(
                        self.queue,
                        &[vk::SubmitInfo::builder().command_buffers(&[cmd]).build()],
                        vk::Fence::null(),
                    )
                })
                .and_then(|()| self.device.queue_wait_idle(self.queue))
        };
        unsafe {
            self.device.free_command_buffers(self.command_pool, &[cmd]);
        }

        result.context("Upload submission failed")
    }

    pub fn wait_idle(&self) {
        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            log::error!("Failed to wait for device idle: {err}");
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        self.wait_idle();
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            ManuallyDrop::drop(&mut self.memory);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

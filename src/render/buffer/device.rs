//! Byte buffers that back allocator regions

use std::sync::Arc;

use crate::core::types::Result;
use crate::core::Error;
use super::BufferKind;

/// Linear byte storage an allocator region lives in
pub trait DeviceBuffer {
    /// Current size in bytes
    fn len(&self) -> usize;

    /// Copy `bytes` to `offset`
    fn write(&mut self, offset: usize, bytes: &[u8]);

    /// Replace the storage with `len` bytes, carrying over `[0, keep)`
    fn resize(&mut self, len: usize, keep: usize);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Host-memory buffer, used headless and in tests
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostBuffer {
    bytes: Vec<u8>,
}

impl HostBuffer {
    pub fn new(len: usize) -> Self {
        Self { bytes: vec![0; len] }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl DeviceBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn resize(&mut self, len: usize, keep: usize) {
        let mut next = vec![0; len];
        next[..keep].copy_from_slice(&self.bytes[..keep]);
        self.bytes = next;
    }
}

/// Headless device and queue that GPU region buffers are created on
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Open the default adapter without a surface
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("octwig_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                    max_buffer_size: adapter_limits.max_buffer_size,
                    ..Default::default()
                },
                memory_hints: wgpu::MemoryHints::Performance,
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        log::info!(
            "GPU adapter '{}', max buffer {}MB",
            adapter.get_info().name,
            adapter_limits.max_buffer_size / 1024 / 1024
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Region buffer factory for `World::new`
    pub fn region_buffer(&self, kind: BufferKind, len: usize) -> GpuBuffer {
        let label = match kind {
            BufferKind::Tree => "tree_region",
            BufferKind::Twig => "twig_region",
        };
        GpuBuffer::new(self.device.clone(), self.queue.clone(), label, len)
    }
}

/// Storage buffer on the GPU
pub struct GpuBuffer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    buffer: wgpu::Buffer,
    label: String,
    len: usize,
}

impl GpuBuffer {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, label: &str, len: usize) -> Self {
        let buffer = Self::create(&device, label, len);
        Self {
            device,
            queue,
            buffer,
            label: label.to_string(),
            len,
        }
    }

    /// Underlying buffer (for bind groups)
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    fn create(device: &wgpu::Device, label: &str, len: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: len as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }
}

impl DeviceBuffer for GpuBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset % 4 == 0 && bytes.len() % 4 == 0, "unaligned buffer write");
        self.queue.write_buffer(&self.buffer, offset as u64, bytes);
    }

    fn resize(&mut self, len: usize, keep: usize) {
        let next = Self::create(&self.device, &self.label, len);
        if keep > 0 {
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("region_grow"),
            });
            encoder.copy_buffer_to_buffer(&self.buffer, 0, &next, 0, keep as u64);
            self.queue.submit([encoder.finish()]);
        }
        log::trace!("Resized GPU buffer '{}': {} -> {} bytes", self.label, self.len, len);
        self.buffer = next;
        self.len = len;
    }
}

//! Metal backend: kernel compilation and dispatch via the vendor runtime.

use crate::buffer::KernelArg;
use crate::config::Config;
use crate::error::{Error, Result};
use log::debug;
use metal::{
    Buffer as MtlBuffer, CommandQueue, CompileOptions, ComputePipelineState,
    Device as MtlDevice, Library, MTLCommandBufferStatus, MTLResourceOptions, MTLSize,
};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Execution context of a Metal device: system device, command queue, the
/// library compiled by the vendor runtime, and a per-name pipeline cache.
pub(crate) struct MetalContext {
    device: MtlDevice,
    queue: CommandQueue,
    library: Library,
    pipelines: Mutex<HashMap<String, ComputePipelineState>>,
}

impl MetalContext {
    pub(crate) fn build(source: &str, _config: &Config) -> Result<Self> {
        let device = MtlDevice::system_default()
            .ok_or_else(|| Error::backend_unavailable("no Metal device on this host"))?;
        debug!("Metal device: {}", device.name());

        let library = device
            .new_library_with_source(source, &CompileOptions::new())
            .map_err(Error::compile_failed)?;
        let queue = device.new_command_queue();

        Ok(Self {
            device,
            queue,
            library,
            pipelines: Mutex::new(HashMap::new()),
        })
    }

    /// Allocates a shared-storage device buffer and fills it from the host.
    pub(crate) fn alloc_with(&self, bytes: &[u8]) -> Result<MtlBuffer> {
        Ok(self.device.new_buffer_with_data(
            bytes.as_ptr() as *const std::ffi::c_void,
            bytes.len() as u64,
            MTLResourceOptions::StorageModeShared,
        ))
    }

    /// Host→device copy into an existing buffer.
    pub(crate) fn write(&self, buffer: &MtlBuffer, bytes: &[u8]) -> Result<()> {
        if (buffer.length() as usize) < bytes.len() {
            return Err(Error::device_init("device buffer shorter than host data"));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                buffer.contents() as *mut u8,
                bytes.len(),
            );
        }
        Ok(())
    }

    /// Device→host copy out of a shared-storage buffer.
    pub(crate) fn read(&self, buffer: &MtlBuffer, bytes: &mut [u8]) -> Result<()> {
        if (buffer.length() as usize) < bytes.len() {
            return Err(Error::device_init("device buffer shorter than host data"));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                buffer.contents() as *const u8,
                bytes.as_mut_ptr(),
                bytes.len(),
            );
        }
        Ok(())
    }

    /// Encodes one compute pass and waits for command-buffer completion.
    pub(crate) fn launch(
        &self,
        name: &str,
        group_size: usize,
        work_size: usize,
        args: &mut [&mut dyn KernelArg],
    ) -> Result<()> {
        let mut pipelines = self.pipelines.lock();
        let pipeline = match pipelines.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let function = self
                    .library
                    .get_function(name, None)
                    .map_err(|_| Error::KernelNotFound(name.to_string()))?;
                let pipeline = self
                    .device
                    .new_compute_pipeline_state_with_function(&function)
                    .map_err(|e| Error::device_init(format!("pipeline creation failed: {e}")))?;
                slot.insert(pipeline)
            }
        };

        let command_buffer = self.queue.new_command_buffer();
        {
            let encoder = command_buffer.new_compute_command_encoder();
            encoder.set_compute_pipeline_state(pipeline);
            for (index, arg) in args.iter_mut().enumerate() {
                let buffer = arg.metal_buffer()?;
                encoder.set_buffer(index as u64, Some(buffer), 0);
            }

            let groups = MTLSize::new((work_size / group_size) as u64, 1, 1);
            let threads_per_group = MTLSize::new(group_size as u64, 1, 1);
            encoder.dispatch_thread_groups(groups, threads_per_group);
            encoder.end_encoding();
        }

        command_buffer.commit();
        command_buffer.wait_until_completed();

        if command_buffer.status() == MTLCommandBufferStatus::Error {
            return Err(Error::execution("command buffer completed with error"));
        }
        Ok(())
    }
}

//! OpenCL backend: kernel compilation and dispatch via the vendor runtime.

use crate::buffer::KernelArg;
use crate::config::Config;
use crate::error::{Error, Result};
use log::debug;
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{Device as ClDevice, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU};
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer as ClBuffer, CL_MEM_READ_WRITE};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::CL_BLOCKING;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Execution context of an OpenCL device: driver context, in-order command
/// queue, the program built by the vendor runtime, and a per-name kernel
/// cache.
pub(crate) struct OpenClContext {
    #[allow(dead_code)]
    device: ClDevice,
    context: Context,
    queue: CommandQueue,
    program: Program,
    kernels: Mutex<HashMap<String, Kernel>>,
}

impl OpenClContext {
    /// Builds the driver context and compiles the program through the
    /// vendor runtime. No platform at the configured index means the
    /// backend is unavailable on this host; a build failure carries the
    /// vendor build log as compile diagnostics.
    pub(crate) fn build(source: &str, config: &Config) -> Result<Self> {
        let platforms =
            get_platforms().map_err(|e| Error::backend_unavailable(format!("OpenCL: {e}")))?;
        let platform = platforms.get(config.opencl_platform).ok_or_else(|| {
            Error::backend_unavailable(format!(
                "OpenCL platform index {} out of range ({} available)",
                config.opencl_platform,
                platforms.len()
            ))
        })?;
        debug!(
            "OpenCL platform: {}",
            platform.name().unwrap_or_else(|_| "<unknown>".into())
        );

        let device_ids = platform
            .get_devices(CL_DEVICE_TYPE_GPU | CL_DEVICE_TYPE_CPU)
            .map_err(|e| Error::device_init(format!("device query failed: {e}")))?;
        let device_id = *device_ids
            .first()
            .ok_or_else(|| Error::backend_unavailable("no OpenCL device on platform"))?;
        let device = ClDevice::new(device_id);

        let context = Context::from_device(&device)
            .map_err(|e| Error::device_init(format!("context creation failed: {e}")))?;
        let queue = CommandQueue::create_default(&context, 0)
            .map_err(|e| Error::device_init(format!("queue creation failed: {e}")))?;

        // The vendor runtime compiles the kernel text; its build log is the
        // diagnostic surface.
        let program = Program::create_and_build_from_source(&context, source, "-w")
            .map_err(|build_log| Error::compile_failed(build_log.to_string()))?;

        Ok(Self {
            device,
            context,
            queue,
            program,
            kernels: Mutex::new(HashMap::new()),
        })
    }

    /// Allocates a read-write device buffer of `byte_len` bytes.
    pub(crate) fn alloc(&self, byte_len: usize) -> Result<ClBuffer<u8>> {
        unsafe {
            ClBuffer::<u8>::create(
                &self.context,
                CL_MEM_READ_WRITE,
                byte_len,
                std::ptr::null_mut(),
            )
        }
        .map_err(|e| Error::device_init(format!("buffer allocation failed: {e}")))
    }

    /// Blocking host→device copy.
    pub(crate) fn write(&self, mem: &mut ClBuffer<u8>, bytes: &[u8]) -> Result<()> {
        unsafe {
            self.queue
                .enqueue_write_buffer(mem, CL_BLOCKING, 0, bytes, &[])
                .map_err(|e| Error::device_init(format!("buffer write failed: {e}")))?;
        }
        Ok(())
    }

    /// Blocking device→host copy.
    pub(crate) fn read(&self, mem: &ClBuffer<u8>, bytes: &mut [u8]) -> Result<()> {
        unsafe {
            self.queue
                .enqueue_read_buffer(mem, CL_BLOCKING, 0, bytes, &[])
                .map_err(|e| Error::device_init(format!("buffer read failed: {e}")))?;
        }
        Ok(())
    }

    /// Submits one ND-range launch and drains the queue before returning.
    pub(crate) fn launch(
        &self,
        name: &str,
        group_size: usize,
        work_size: usize,
        args: &mut [&mut dyn KernelArg],
    ) -> Result<()> {
        let mut kernels = self.kernels.lock();
        let kernel = match kernels.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let kernel = Kernel::create(&self.program, name)
                    .map_err(|_| Error::KernelNotFound(name.to_string()))?;
                slot.insert(kernel)
            }
        };

        if let Ok(expected) = kernel.num_args() {
            if expected as usize != args.len() {
                return Err(Error::ArityMismatch {
                    kernel: name.to_string(),
                    expected: expected as usize,
                    got: args.len(),
                });
            }
        }

        let mut mems = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            mems.push(arg.cl_mem()?);
        }

        unsafe {
            let mut exec = ExecuteKernel::new(kernel);
            for mem in &mems {
                exec.set_arg(mem);
            }
            exec.set_global_work_size(work_size)
                .set_local_work_size(group_size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| Error::execution(format!("enqueue failed: {e}")))?;
        }

        self.queue
            .finish()
            .map_err(|e| Error::execution(format!("queue drain failed: {e}")))
    }
}

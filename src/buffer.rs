//! Host↔device buffer management.

use crate::backend::BackendContext;
use crate::device::Device;
use crate::error::{Error, Result};
use std::ffi::c_void;

/// A data-parallel array shared between the host and one device.
///
/// The buffer borrows caller-owned host memory and never frees it. The
/// backend-side copy is exclusively owned by the buffer, absent until the
/// first [`push`](Buffer::push), and never synchronized implicitly: after
/// host-side mutation the device copy is stale until the next `push`, and
/// after kernel execution the host data is stale until the next
/// [`pull`](Buffer::pull). Staleness is the caller's responsibility.
///
/// A buffer is backend-specific and tied to the device it was created
/// against; it cannot outlive that device.
pub struct Buffer<'dev, T: Copy> {
    device: &'dev Device,
    host: &'dev mut [T],
    device_copy: Option<DeviceCopy<T>>,
}

impl<T: Copy> std::fmt::Debug for Buffer<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("element_size", &self.element_size())
            .field("has_device_copy", &self.has_device_copy())
            .finish()
    }
}

/// Backend-resident replica of a buffer's data.
enum DeviceCopy<T: Copy> {
    Cpu(Vec<T>),
    #[cfg(feature = "opencl")]
    OpenCl(opencl3::memory::Buffer<u8>),
    #[cfg(all(feature = "metal", target_os = "macos"))]
    Metal(metal::Buffer),
}

impl<'dev, T: Copy> Buffer<'dev, T> {
    pub(crate) fn new(device: &'dev Device, host: &'dev mut [T]) -> Self {
        Self {
            device,
            host,
            device_copy: None,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.host.len()
    }

    /// True when the buffer holds no elements. Never the case for buffers
    /// created through [`Device::buffer`].
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    /// Per-element size in bytes.
    pub fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Total byte extent (`len * element_size`), fixed for the buffer's
    /// lifetime.
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.host)
    }

    /// Read access to the host data.
    pub fn host(&self) -> &[T] {
        self.host
    }

    /// Write access to the host data. Mutating it does not touch the
    /// device copy until the next [`push`](Buffer::push).
    pub fn host_mut(&mut self) -> &mut [T] {
        self.host
    }

    /// True once [`push`](Buffer::push) has materialized a device copy.
    pub fn has_device_copy(&self) -> bool {
        self.device_copy.is_some()
    }

    /// Copies host data to the device, allocating the device copy on first
    /// use and reusing it afterwards.
    pub fn push(&mut self) -> Result<()> {
        let state = self.device.state().read();
        let ctx = state.context()?;

        match &mut self.device_copy {
            Some(DeviceCopy::Cpu(copy)) => match ctx {
                BackendContext::Cpu(_) => {
                    copy.copy_from_slice(self.host);
                    Ok(())
                }
                #[cfg(any(feature = "opencl", all(feature = "metal", target_os = "macos")))]
                _ => Err(Error::BufferDeviceMismatch),
            },
            #[cfg(feature = "opencl")]
            Some(DeviceCopy::OpenCl(mem)) => match ctx {
                BackendContext::OpenCl(cl) => cl.write(mem, host_bytes(self.host)),
                _ => Err(Error::BufferDeviceMismatch),
            },
            #[cfg(all(feature = "metal", target_os = "macos"))]
            Some(DeviceCopy::Metal(buf)) => match ctx {
                BackendContext::Metal(mt) => mt.write(buf, host_bytes(self.host)),
                _ => Err(Error::BufferDeviceMismatch),
            },
            None => {
                self.device_copy = Some(alloc_copy(ctx, self.host)?);
                Ok(())
            }
        }
    }

    /// Copies the device copy back into the host data. Must be called
    /// after a kernel that writes the buffer for the host to observe the
    /// results.
    pub fn pull(&mut self) -> Result<()> {
        let state = self.device.state().read();
        let ctx = state.context()?;

        match &mut self.device_copy {
            None => Err(Error::NoDeviceCopy),
            Some(DeviceCopy::Cpu(copy)) => match ctx {
                BackendContext::Cpu(_) => {
                    self.host.copy_from_slice(copy);
                    Ok(())
                }
                #[cfg(any(feature = "opencl", all(feature = "metal", target_os = "macos")))]
                _ => Err(Error::BufferDeviceMismatch),
            },
            #[cfg(feature = "opencl")]
            Some(DeviceCopy::OpenCl(mem)) => match ctx {
                BackendContext::OpenCl(cl) => cl.read(mem, host_bytes_mut(self.host)),
                _ => Err(Error::BufferDeviceMismatch),
            },
            #[cfg(all(feature = "metal", target_os = "macos"))]
            Some(DeviceCopy::Metal(buf)) => match ctx {
                BackendContext::Metal(mt) => mt.read(buf, host_bytes_mut(self.host)),
                _ => Err(Error::BufferDeviceMismatch),
            },
        }
    }

    /// Frees the device copy. Host data is caller-owned and left
    /// untouched. Dropping the buffer has the same effect.
    pub fn release(mut self) -> Result<()> {
        self.device_copy = None;
        Ok(())
    }
}

fn alloc_copy<T: Copy>(ctx: &BackendContext, host: &[T]) -> Result<DeviceCopy<T>> {
    match ctx {
        BackendContext::Cpu(_) => Ok(DeviceCopy::Cpu(host.to_vec())),
        #[cfg(feature = "opencl")]
        BackendContext::OpenCl(cl) => {
            let bytes = host_bytes(host);
            let mut mem = cl.alloc(bytes.len())?;
            cl.write(&mut mem, bytes)?;
            Ok(DeviceCopy::OpenCl(mem))
        }
        #[cfg(all(feature = "metal", target_os = "macos"))]
        BackendContext::Metal(mt) => Ok(DeviceCopy::Metal(mt.alloc_with(host_bytes(host))?)),
    }
}

#[cfg(any(feature = "opencl", all(feature = "metal", target_os = "macos")))]
fn host_bytes<T: Copy>(host: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(host.as_ptr().cast(), std::mem::size_of_val(host)) }
}

#[cfg(any(feature = "opencl", all(feature = "metal", target_os = "macos")))]
fn host_bytes_mut<T: Copy>(host: &mut [T]) -> &mut [u8] {
    unsafe { std::slice::from_raw_parts_mut(host.as_mut_ptr().cast(), std::mem::size_of_val(host)) }
}

/// Type-erased buffer argument accepted by [`Device::call`].
///
/// Implemented by [`Buffer`] for every element type; the dispatcher uses it
/// to hand backend-side handles to the kernel without knowing the element
/// type.
pub trait KernelArg {
    #[doc(hidden)]
    fn owner(&self) -> *const Device;

    #[doc(hidden)]
    fn cpu_ptr(&mut self) -> Result<*mut c_void>;

    #[cfg(feature = "opencl")]
    #[doc(hidden)]
    fn cl_mem(&mut self) -> Result<opencl3::types::cl_mem>;

    #[cfg(all(feature = "metal", target_os = "macos"))]
    #[doc(hidden)]
    fn metal_buffer(&self) -> Result<&metal::Buffer>;
}

impl<T: Copy> KernelArg for Buffer<'_, T> {
    fn owner(&self) -> *const Device {
        self.device
    }

    fn cpu_ptr(&mut self) -> Result<*mut c_void> {
        match &mut self.device_copy {
            Some(DeviceCopy::Cpu(copy)) => Ok(copy.as_mut_ptr().cast()),
            #[cfg(feature = "opencl")]
            Some(DeviceCopy::OpenCl(_)) => Err(Error::BufferDeviceMismatch),
            #[cfg(all(feature = "metal", target_os = "macos"))]
            Some(DeviceCopy::Metal(_)) => Err(Error::BufferDeviceMismatch),
            None => Err(Error::NoDeviceCopy),
        }
    }

    #[cfg(feature = "opencl")]
    fn cl_mem(&mut self) -> Result<opencl3::types::cl_mem> {
        use opencl3::memory::ClMem;

        match &mut self.device_copy {
            Some(DeviceCopy::OpenCl(mem)) => Ok(mem.get()),
            Some(_) => Err(Error::BufferDeviceMismatch),
            None => Err(Error::NoDeviceCopy),
        }
    }

    #[cfg(all(feature = "metal", target_os = "macos"))]
    fn metal_buffer(&self) -> Result<&metal::Buffer> {
        match &self.device_copy {
            Some(DeviceCopy::Metal(buf)) => Ok(buf),
            Some(_) => Err(Error::BufferDeviceMismatch),
            None => Err(Error::NoDeviceCopy),
        }
    }
}

//! Backend execution contexts.

pub(crate) mod cc;
pub(crate) mod cpu;

#[cfg(feature = "opencl")]
pub(crate) mod opencl;

#[cfg(all(feature = "metal", target_os = "macos"))]
pub(crate) mod metal;

use crate::buffer::KernelArg;
use crate::config::Config;
use crate::device::BackendKind;
use crate::error::{Error, Result};

pub(crate) use cpu::CpuContext;

#[cfg(feature = "opencl")]
pub(crate) use opencl::OpenClContext;

#[cfg(all(feature = "metal", target_os = "macos"))]
pub(crate) use metal::MetalContext;

/// Backend-owned execution state, dispatched on the device's backend kind.
/// One variant per backend; the dispatcher only ever talks to this enum.
pub(crate) enum BackendContext {
    Cpu(CpuContext),
    #[cfg(feature = "opencl")]
    OpenCl(OpenClContext),
    #[cfg(all(feature = "metal", target_os = "macos"))]
    Metal(MetalContext),
}

impl BackendContext {
    /// Constructs the context for the requested backend. Backends that are
    /// not compiled in (or impossible on this platform) report
    /// `BackendUnavailable`.
    pub(crate) fn build(kind: BackendKind, source: &str, config: &Config) -> Result<Self> {
        match kind {
            BackendKind::Cpu => Ok(BackendContext::Cpu(CpuContext::build(source, config)?)),

            #[cfg(feature = "opencl")]
            BackendKind::OpenCl => Ok(BackendContext::OpenCl(OpenClContext::build(
                source, config,
            )?)),
            #[cfg(not(feature = "opencl"))]
            BackendKind::OpenCl => Err(Error::backend_unavailable(
                "OpenCL support not compiled in (enable the `opencl` feature)",
            )),

            #[cfg(all(feature = "metal", target_os = "macos"))]
            BackendKind::Metal => Ok(BackendContext::Metal(MetalContext::build(source, config)?)),
            #[cfg(not(all(feature = "metal", target_os = "macos")))]
            BackendKind::Metal => Err(Error::backend_unavailable(
                "Metal support not compiled in (enable the `metal` feature on macOS)",
            )),
        }
    }

    /// Runs one kernel launch to completion. Resolution, arity checking,
    /// and execution are capabilities of the concrete context; callers
    /// never branch on backend kind.
    pub(crate) fn launch(
        &self,
        name: &str,
        group_size: usize,
        work_size: usize,
        args: &mut [&mut dyn KernelArg],
    ) -> Result<()> {
        match self {
            BackendContext::Cpu(ctx) => ctx.launch(name, group_size, work_size, args),
            #[cfg(feature = "opencl")]
            BackendContext::OpenCl(ctx) => ctx.launch(name, group_size, work_size, args),
            #[cfg(all(feature = "metal", target_os = "macos"))]
            BackendContext::Metal(ctx) => ctx.launch(name, group_size, work_size, args),
        }
    }
}

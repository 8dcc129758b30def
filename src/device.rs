use crate::backend::BackendContext;
use crate::buffer::{Buffer, KernelArg};
use crate::config::Config;
use crate::dispatch;
use crate::error::{Error, Result};
use log::debug;
use parking_lot::RwLock;

/// Execution targets. A closed enumeration: adding a backend means a new
/// variant with its own compile/load/dispatch logic, not a contract change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Kernels compiled to native code at run time and loaded in-process.
    Cpu,
    /// Kernels compiled and dispatched by an OpenCL driver.
    OpenCl,
    /// Kernels compiled and dispatched by the Metal runtime (macOS).
    Metal,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "cpu"),
            BackendKind::OpenCl => write!(f, "opencl"),
            BackendKind::Metal => write!(f, "metal"),
        }
    }
}

/// Lifecycle state of a device handle.
pub(crate) enum DeviceState {
    /// Context live, ready to accept calls.
    Ready(BackendContext),
    /// Execution context corrupted by a failed launch; every operation
    /// reports the failure until `release`/`reinit`.
    Poisoned(String),
    /// Context torn down; operations fail with `NotInitialized`.
    Released,
}

impl DeviceState {
    pub(crate) fn context(&self) -> Result<&BackendContext> {
        match self {
            DeviceState::Ready(ctx) => Ok(ctx),
            DeviceState::Poisoned(reason) => Err(Error::device_init(reason.clone())),
            DeviceState::Released => Err(Error::NotInitialized),
        }
    }
}

/// One execution target: a backend kind, the kernel source it was
/// initialized with, and the backend-owned execution context.
///
/// A device is observably either fully initialized or fully released.
/// Operations on a single handle are sequential as issued by the caller;
/// distinct devices share no state and may be driven independently.
pub struct Device {
    backend: BackendKind,
    source: String,
    config: Config,
    state: RwLock<DeviceState>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.state.read() {
            DeviceState::Ready(_) => "ready",
            DeviceState::Poisoned(_) => "poisoned",
            DeviceState::Released => "released",
        };
        f.debug_struct("Device")
            .field("backend", &self.backend)
            .field("state", &state)
            .finish()
    }
}

impl Device {
    /// Initializes a device of the given backend kind with kernel source
    /// text, using the default configuration.
    ///
    /// For [`BackendKind::Cpu`] this compiles the source with the host C
    /// compiler and loads the resulting module; for the GPU backends the
    /// vendor runtime compiles the source. Initialization is
    /// all-or-nothing: on failure every partially acquired resource is
    /// released before the error is returned.
    pub fn init<S: Into<String>>(backend: BackendKind, source: S) -> Result<Self> {
        Self::init_with_config(backend, source, Config::default())
    }

    /// Initializes a device with an explicit configuration.
    pub fn init_with_config<S: Into<String>>(
        backend: BackendKind,
        source: S,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let source = source.into();

        let ctx = BackendContext::build(backend, &source, &config)?;
        debug!("initialized {backend} device");

        Ok(Self {
            backend,
            source,
            config,
            state: RwLock::new(DeviceState::Ready(ctx)),
        })
    }

    /// Rebuilds the execution context from the stored kernel source after
    /// [`release`](Device::release) or a poisoning failure.
    ///
    /// Fails with [`Error::AlreadyInitialized`] while the device is live:
    /// re-initializing without an intervening release is rejected. Buffers
    /// created against the previous context must be released first; their
    /// device copies do not carry over.
    pub fn reinit(&self) -> Result<()> {
        let mut state = self.state.write();
        if matches!(*state, DeviceState::Ready(_)) {
            return Err(Error::AlreadyInitialized);
        }

        let ctx = BackendContext::build(self.backend, &self.source, &self.config)?;
        *state = DeviceState::Ready(ctx);
        debug!("re-initialized {} device", self.backend);
        Ok(())
    }

    /// Tears down the execution context: unloads the compiled module and
    /// removes its file-system artifacts (CPU), or destroys the driver
    /// objects (GPU). Safe to call exactly once; a second call fails with
    /// [`Error::NotInitialized`].
    pub fn release(&self) -> Result<()> {
        let mut state = self.state.write();
        if matches!(*state, DeviceState::Released) {
            return Err(Error::NotInitialized);
        }

        *state = DeviceState::Released;
        debug!("released {} device", self.backend);
        Ok(())
    }

    /// The backend this device executes on.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// The configuration the device was initialized with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True while the execution context is live.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), DeviceState::Ready(_))
    }

    /// Creates a buffer over caller-owned host memory, bound to this
    /// device. No data is copied until [`Buffer::push`]. Fails with
    /// [`Error::InvalidLength`] for an empty slice.
    pub fn buffer<'dev, T: Copy>(&'dev self, host: &'dev mut [T]) -> Result<Buffer<'dev, T>> {
        if host.is_empty() {
            return Err(Error::InvalidLength);
        }
        self.state.read().context()?;

        Ok(Buffer::new(self, host))
    }

    /// Launches `kernel_name` over `work_size` work items partitioned into
    /// groups of `group_size`, passing the device copies of `args` in
    /// order. Blocks until every work item has completed; execution order
    /// across work items is unspecified.
    ///
    /// Validation happens in a fixed order before anything executes:
    /// device state, work partition (`work_size` must divide into groups
    /// of `group_size`), entry-point resolution, arity, device-copy
    /// collection. A call that fails validation performs no partial
    /// execution. A launch-level failure poisons the device until it is
    /// released and re-initialized.
    pub fn call(
        &self,
        kernel_name: &str,
        group_size: usize,
        work_size: usize,
        args: &mut [&mut dyn KernelArg],
    ) -> Result<()> {
        dispatch::call(self, kernel_name, group_size, work_size, args)
    }

    pub(crate) fn state(&self) -> &RwLock<DeviceState> {
        &self.state
    }

    pub(crate) fn poison(&self, reason: String) {
        *self.state.write() = DeviceState::Poisoned(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Cpu.to_string(), "cpu");
        assert_eq!(BackendKind::OpenCl.to_string(), "opencl");
        assert_eq!(BackendKind::Metal.to_string(), "metal");
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn test_missing_backend_is_unavailable() {
        let result = Device::init(BackendKind::OpenCl, "__kernel void k() {}");
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    }
}

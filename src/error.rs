/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Runtime error taxonomy. Every operation returns a [`Result`] the caller
/// must check; the runtime never aborts the process on a recoverable
/// condition, never retries, and preserves underlying diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested backend has no implementation on this host.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Initialization was requested on a handle whose context is live.
    #[error("device already initialized")]
    AlreadyInitialized,

    /// The device was released (or never initialized).
    #[error("device not initialized")]
    NotInitialized,

    /// Kernel source was rejected by the compiler or vendor runtime.
    #[error("kernel compilation failed:\n{diagnostics}")]
    CompileFailed {
        /// Captured compiler or driver build log.
        diagnostics: String,
    },

    /// No kernel with this name exists in the compiled module.
    #[error("kernel `{0}` not found")]
    KernelNotFound(String),

    /// Argument count does not match the kernel's declared arity.
    #[error("kernel `{kernel}` expects {expected} buffer argument(s), got {got}")]
    ArityMismatch {
        /// Kernel whose arity was checked.
        kernel: String,
        /// Arity the kernel declares.
        expected: usize,
        /// Arguments supplied to the call.
        got: usize,
    },

    /// `work_size` does not divide into groups of `group_size`.
    #[error("work size {work_size} cannot be partitioned into groups of {group_size}")]
    InvalidWorkSize {
        /// Total number of work items requested.
        work_size: usize,
        /// Requested work-group size.
        group_size: usize,
    },

    /// A buffer was created over zero elements.
    #[error("buffer length must be non-zero")]
    InvalidLength,

    /// The buffer was never pushed, so no device copy exists.
    #[error("buffer has no device copy; call push() first")]
    NoDeviceCopy,

    /// The kernel launch itself failed; the device is poisoned.
    #[error("kernel execution failed: {0}")]
    KernelExecutionFailed(String),

    /// A driver-level failure, or any operation on a poisoned device.
    #[error("device initialization failed: {0}")]
    DeviceInitFailed(String),

    /// A buffer was passed to a device it was not created against.
    #[error("buffer was created against a different device")]
    BufferDeviceMismatch,

    /// Invalid runtime configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::BackendUnavailable`] from any message.
    pub fn backend_unavailable<S: Into<String>>(msg: S) -> Self {
        Error::BackendUnavailable(msg.into())
    }

    /// Builds a [`Error::CompileFailed`] carrying captured diagnostics.
    pub fn compile_failed<S: Into<String>>(diagnostics: S) -> Self {
        Error::CompileFailed {
            diagnostics: diagnostics.into(),
        }
    }

    /// Builds a [`Error::DeviceInitFailed`] from any message.
    pub fn device_init<S: Into<String>>(msg: S) -> Self {
        Error::DeviceInitFailed(msg.into())
    }

    /// Builds a [`Error::KernelExecutionFailed`] from any message.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Error::KernelExecutionFailed(msg.into())
    }

    /// Builds a [`Error::Config`] from any message.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

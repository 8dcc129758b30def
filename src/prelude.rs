//! Convenience re-exports for typical usage.

pub use crate::buffer::{Buffer, KernelArg};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::device::{BackendKind, Device};
pub use crate::error::{Error, Result};
pub use crate::source;

//! KILN - Kernel Invocation across Layered Native backends
//!
//! A minimal heterogeneous-compute runtime: submit a data-parallel kernel
//! (opaque source text) to an execution backend and run it over
//! host-supplied buffers with a work-item/work-group launch model. The CPU
//! backend compiles kernels to native code at run time and loads them
//! in-process; the OpenCL and Metal backends delegate compilation and
//! dispatch to the vendor runtime.
//!
//! # Quick Start
//!
//! ```no_run
//! use kiln_rs::{BackendKind, Device, KernelArg};
//!
//! const KERNELS: &str = r#"
//!     #include <stddef.h>
//!     void scale(void **bufs, size_t nargs, size_t i) {
//!         float *data = bufs[0];
//!         data[i] *= 2.0f;
//!     }
//! "#;
//!
//! fn main() -> kiln_rs::Result<()> {
//!     let device = Device::init(BackendKind::Cpu, KERNELS)?;
//!
//!     let mut data = vec![1.0f32; 1024];
//!     let mut buf = device.buffer(&mut data)?;
//!     buf.push()?;
//!
//!     device.call("scale", 64, 1024, &mut [&mut buf as &mut dyn KernelArg])?;
//!
//!     buf.pull()?;
//!     assert!(buf.host().iter().all(|&x| x == 2.0));
//!
//!     buf.release()?;
//!     device.release()?;
//!     Ok(())
//! }
//! ```
//!
//! # Synchronization model
//!
//! Host↔device transfers are explicit, never implicit: [`Buffer::push`]
//! before a kernel reads a buffer, [`Buffer::pull`] before the host reads
//! results. [`Device::call`] blocks until every work item has completed.
//!
//! # Features
//!
//! - **opencl**: OpenCL backend via the `opencl3` bindings
//! - **metal**: Metal backend (macOS only)
//! - **parallel**: run CPU work groups on a rayon pool

#![warn(missing_docs, missing_debug_implementations)]
#![allow(dead_code)]

pub mod config;
pub mod error;
pub mod prelude;
pub mod source;

mod backend;
mod buffer;
mod device;
mod dispatch;

pub use buffer::{Buffer, KernelArg};
pub use config::{Config, ConfigBuilder};
pub use device::{BackendKind, Device};
pub use error::{Error, Result};

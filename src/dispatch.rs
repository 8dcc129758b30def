//! Kernel dispatch: validation pipeline and launch.
//!
//! A call is validated in a fixed order before anything executes: device
//! state, work partition, entry-point resolution, arity, device-copy
//! collection. A call that fails validation performs no partial execution
//! and touches no buffer.

use crate::buffer::KernelArg;
use crate::device::Device;
use crate::error::{Error, Result};
use log::warn;

/// Runs one synchronous kernel launch against `device`.
///
/// A launch-level failure ([`Error::KernelExecutionFailed`]) leaves device
/// copies in an undefined but non-corrupting state and poisons the device:
/// every subsequent operation reports [`Error::DeviceInitFailed`] until the
/// device is released and re-initialized. Validation failures leave the
/// device usable.
pub(crate) fn call(
    device: &Device,
    kernel_name: &str,
    group_size: usize,
    work_size: usize,
    args: &mut [&mut dyn KernelArg],
) -> Result<()> {
    let result = {
        let state = device.state().read();
        let ctx = state.context()?;

        if group_size == 0 || work_size % group_size != 0 {
            return Err(Error::InvalidWorkSize {
                work_size,
                group_size,
            });
        }

        for arg in args.iter() {
            if !std::ptr::eq(arg.owner(), device) {
                return Err(Error::BufferDeviceMismatch);
            }
        }

        ctx.launch(kernel_name, group_size, work_size, args)
    };

    if let Err(Error::KernelExecutionFailed(reason)) = &result {
        warn!("kernel `{kernel_name}` poisoned the device: {reason}");
        device.poison(reason.clone());
    }

    result
}

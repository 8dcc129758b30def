//! Element-wise add on the CPU backend.
//!
//! Mirrors the classic "add a constant to a vector" compute demo: one
//! data buffer, one single-element parameter buffer, two launches.

use kiln_rs::{BackendKind, Device, KernelArg};

const KERNELS: &str = r#"
    #include <stddef.h>

    void simple_add(void **bufs, size_t nargs, size_t i) {
        int *v = bufs[0];
        const int *x = bufs[1];
        v[i] += x[0];
    }
    const size_t simple_add_arity = 2;
"#;

fn main() -> kiln_rs::Result<()> {
    let device = Device::init(BackendKind::Cpu, KERNELS)?;

    let n = 64;
    let mut v = vec![12i32; n];
    let mut x = vec![1000i32];

    let mut v_buf = device.buffer(&mut v)?;
    let mut x_buf = device.buffer(&mut x)?;
    v_buf.push()?;
    x_buf.push()?;

    device.call(
        "simple_add",
        16,
        n,
        &mut [
            &mut v_buf as &mut dyn KernelArg,
            &mut x_buf as &mut dyn KernelArg,
        ],
    )?;
    v_buf.pull()?;
    println!("First kernel run v={:?}", &v_buf.host()[..8]);

    device.call(
        "simple_add",
        16,
        n,
        &mut [
            &mut v_buf as &mut dyn KernelArg,
            &mut x_buf as &mut dyn KernelArg,
        ],
    )?;
    v_buf.pull()?;
    println!("Next kernel run v={:?}", &v_buf.host()[..8]);

    v_buf.release()?;
    x_buf.release()?;
    device.release()?;
    Ok(())
}

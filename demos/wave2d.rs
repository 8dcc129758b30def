//! 2-D wave equation on a square, leapfrog scheme, CPU backend.
//!
//! Three grids rotate through the (n-1, n, n+1) roles each step; the grid
//! constants are substituted into the kernel source before compilation.

use kiln_rs::{BackendKind, Device, KernelArg};
use std::time::Instant;

const KERNEL_TEMPLATE: &str = r#"
    #include <stddef.h>

    #define NX _nx_
    #define NY _ny_
    #define DX _dx_f
    #define DY _dy_f
    #define DT _dt_f
    #define CSON _cson_f

    void init_sol(void **bufs, size_t nargs, size_t i) {
        float *un = bufs[0];
        float *unm1 = bufs[1];
        size_t ix = i % NX;
        size_t iy = i / NX;
        float x = ix * DX - 0.5f;
        float y = iy * DY - 0.5f;
        float r2 = x * x + y * y;
        float v = r2 < 0.01f ? (1.0f - 100.0f * r2) : 0.0f;
        un[i] = v;
        unm1[i] = v;
    }
    const size_t init_sol_arity = 2;

    void time_step(void **bufs, size_t nargs, size_t i) {
        const float *unm1 = bufs[0];
        const float *un = bufs[1];
        float *unp1 = bufs[2];
        size_t ix = i % NX;
        size_t iy = i / NX;
        if (ix == 0 || iy == 0 || ix == NX - 1 || iy == NY - 1) {
            unp1[i] = 0.0f;
            return;
        }
        float lap = (un[i - 1] - 2.0f * un[i] + un[i + 1]) / (DX * DX)
                  + (un[i - NX] - 2.0f * un[i] + un[i + NX]) / (DY * DY);
        unp1[i] = 2.0f * un[i] - unm1[i] + CSON * CSON * DT * DT * lap;
    }
    const size_t time_step_arity = 3;
"#;

fn main() -> kiln_rs::Result<()> {
    // numerical parameters
    let nx = 128usize;
    let ny = 128usize;
    let tmax = 0.6f32;
    let lx = 1.0f32;
    let ly = 1.0f32;

    let dx = lx / (nx - 1) as f32;
    let dy = ly / (ny - 1) as f32;
    let cson = 1.0f32;
    let cfl = 0.4f32;
    let dt = cfl * (dx * dx + dy * dy).sqrt() / cson;

    println!("grid size {nx}x{ny}");

    // tuning of the kernel source
    let source = KERNEL_TEMPLATE
        .replace("_nx_", &nx.to_string())
        .replace("_ny_", &ny.to_string())
        .replace("_dx_", &format!("{dx:e}"))
        .replace("_dy_", &format!("{dy:e}"))
        .replace("_dt_", &format!("{dt:e}"))
        .replace("_cson_", &format!("{cson:e}"));

    let device = Device::init(BackendKind::Cpu, source)?;

    let n = nx * ny;
    let mut unm1 = vec![0.0f32; n];
    let mut un = vec![0.0f32; n];
    let mut unp1 = vec![0.0f32; n];

    let mut grids = [
        device.buffer(&mut unm1)?,
        device.buffer(&mut un)?,
        device.buffer(&mut unp1)?,
    ];
    for grid in grids.iter_mut() {
        grid.push()?;
    }

    let group_size = 32;

    let start = Instant::now();
    {
        let [unm1_buf, un_buf, _] = &mut grids;
        device.call(
            "init_sol",
            group_size,
            n,
            &mut [
                un_buf as &mut dyn KernelArg,
                unm1_buf as &mut dyn KernelArg,
            ],
        )?;
    }

    // time loop: the three grids rotate through the leapfrog roles
    let mut t = 0.0f32;
    let mut count = 0usize;
    while t < tmax {
        t += dt;

        let (prev, cur, next) = match count % 3 {
            0 => {
                let [a, b, c] = &mut grids;
                (a, b, c)
            }
            1 => {
                let [c, a, b] = &mut grids;
                (a, b, c)
            }
            _ => {
                let [b, c, a] = &mut grids;
                (a, b, c)
            }
        };
        device.call(
            "time_step",
            group_size,
            n,
            &mut [
                prev as &mut dyn KernelArg,
                cur as &mut dyn KernelArg,
                next as &mut dyn KernelArg,
            ],
        )?;
        count += 1;
    }
    println!("tmax={tmax} tend={t}");
    println!("{count} iters in {:?}", start.elapsed());

    // bring the latest grid back to the host
    let latest = match count % 3 {
        0 => &mut grids[1],
        1 => &mut grids[2],
        _ => &mut grids[0],
    };
    latest.pull()?;

    let max_amp = latest
        .host()
        .iter()
        .fold(0.0f32, |acc, &v| acc.max(v.abs()));
    println!("center u={:.5}", latest.host()[ny / 2 * nx + nx / 2]);
    println!("max |u|={max_amp:.5}");

    device.release()
}

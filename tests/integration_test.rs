use kiln_rs::prelude::*;

const KERNELS: &str = r#"
    #include <stddef.h>

    void add(void **bufs, size_t nargs, size_t i) {
        const int *a = bufs[0];
        const int *b = bufs[1];
        int *c = bufs[2];
        c[i] = a[i] + b[i];
    }
    const size_t add_arity = 3;

    void iota(void **bufs, size_t nargs, size_t i) {
        int *out = bufs[0];
        out[i] = (int)i;
    }

    void bump(void **bufs, size_t nargs, size_t i) {
        int *counts = bufs[0];
        counts[i] += 1;
    }
"#;

/// Initializes a CPU device, skipping the test on hosts without a C
/// compiler. Any other init failure is a real bug.
fn init_cpu(source: &str) -> Option<Device> {
    match Device::init(BackendKind::Cpu, source) {
        Ok(device) => Some(device),
        Err(Error::BackendUnavailable(_)) => None,
        Err(e) => panic!("unexpected init failure: {e}"),
    }
}

#[test]
fn test_buffer_init_release_without_push() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut data = vec![7u32; 16];
    let buf = device.buffer(&mut data).unwrap();
    assert!(!buf.has_device_copy());
    assert_eq!(buf.len(), 16);
    assert_eq!(buf.byte_len(), 64);
    buf.release().unwrap();

    assert!(data.iter().all(|&x| x == 7));
    device.release().unwrap();
}

#[test]
fn test_empty_buffer_rejected() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut empty: Vec<i32> = Vec::new();
    match device.buffer(&mut empty) {
        Err(Error::InvalidLength) => {}
        other => panic!("expected InvalidLength, got {other:?}"),
    }
}

#[test]
fn test_push_pull_round_trip_is_bit_identical() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let original: Vec<u32> = (0..256).map(|i| 0xDEAD_BEEFu32.rotate_left(i)).collect();
    let mut data = original.clone();

    let mut buf = device.buffer(&mut data).unwrap();
    buf.push().unwrap();
    buf.pull().unwrap();
    buf.release().unwrap();

    assert_eq!(data, original);
}

#[test]
fn test_pull_without_push_fails() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut data = vec![1i32; 8];
    let mut buf = device.buffer(&mut data).unwrap();
    match buf.pull() {
        Err(Error::NoDeviceCopy) => {}
        other => panic!("expected NoDeviceCopy, got {other:?}"),
    }
}

#[test]
fn test_elementwise_add() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut a: Vec<i32> = (0..100).collect();
    let mut b: Vec<i32> = (0..100).map(|i| 100 - i).collect();
    let mut c = vec![0i32; 100];

    let mut a_buf = device.buffer(&mut a).unwrap();
    let mut b_buf = device.buffer(&mut b).unwrap();
    let mut c_buf = device.buffer(&mut c).unwrap();
    a_buf.push().unwrap();
    b_buf.push().unwrap();
    c_buf.push().unwrap();

    let mut args: [&mut dyn KernelArg; 3] = [&mut a_buf, &mut b_buf, &mut c_buf];
    device.call("add", 1, 100, &mut args).unwrap();

    c_buf.pull().unwrap();
    assert!(c_buf.host().iter().all(|&x| x == 100));
}

#[test]
fn test_invalid_work_size_performs_no_partial_execution() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut out = vec![-1i32; 100];
    let mut out_buf = device.buffer(&mut out).unwrap();
    out_buf.push().unwrap();

    let mut args: [&mut dyn KernelArg; 1] = [&mut out_buf];
    match device.call("iota", 7, 100, &mut args) {
        Err(Error::InvalidWorkSize {
            work_size: 100,
            group_size: 7,
        }) => {}
        other => panic!("expected InvalidWorkSize, got {other:?}"),
    }

    match device.call("iota", 0, 100, &mut [&mut out_buf as &mut dyn KernelArg]) {
        Err(Error::InvalidWorkSize { group_size: 0, .. }) => {}
        other => panic!("expected InvalidWorkSize, got {other:?}"),
    }

    // The rejected calls must not have touched the device copy.
    out_buf.pull().unwrap();
    assert!(out_buf.host().iter().all(|&x| x == -1));

    // The device stays usable after a validation failure.
    device
        .call("iota", 10, 100, &mut [&mut out_buf as &mut dyn KernelArg])
        .unwrap();
}

#[test]
fn test_unknown_kernel_leaves_device_copies_unchanged() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut data = vec![42i32; 32];
    let mut buf = device.buffer(&mut data).unwrap();
    buf.push().unwrap();

    match device.call("missing", 1, 32, &mut [&mut buf as &mut dyn KernelArg]) {
        Err(Error::KernelNotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected KernelNotFound, got {other:?}"),
    }

    buf.pull().unwrap();
    assert!(buf.host().iter().all(|&x| x == 42));
}

#[test]
fn test_arity_metadata_is_enforced() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut a = vec![1i32; 10];
    let mut b = vec![2i32; 10];

    let mut a_buf = device.buffer(&mut a).unwrap();
    let mut b_buf = device.buffer(&mut b).unwrap();
    a_buf.push().unwrap();
    b_buf.push().unwrap();

    let mut args: [&mut dyn KernelArg; 2] = [&mut a_buf, &mut b_buf];
    match device.call("add", 1, 10, &mut args) {
        Err(Error::ArityMismatch {
            expected: 3,
            got: 2,
            ..
        }) => {}
        other => panic!("expected ArityMismatch, got {other:?}"),
    }
}

#[test]
fn test_kernel_without_arity_symbol_skips_the_check() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut out = vec![0i32; 16];
    let mut out_buf = device.buffer(&mut out).unwrap();
    out_buf.push().unwrap();

    // `iota` exports no arity symbol, so any argument count is accepted.
    device
        .call("iota", 4, 16, &mut [&mut out_buf as &mut dyn KernelArg])
        .unwrap();
}

#[test]
fn test_every_work_item_runs_exactly_once() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut counts = vec![0i32; 64];
    let mut counts_buf = device.buffer(&mut counts).unwrap();
    counts_buf.push().unwrap();

    device
        .call("bump", 16, 64, &mut [&mut counts_buf as &mut dyn KernelArg])
        .unwrap();

    counts_buf.pull().unwrap();
    assert!(counts_buf.host().iter().all(|&x| x == 1));
}

#[test]
fn test_group_partitioning_covers_every_index() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut out = vec![-1i32; 96];
    let mut out_buf = device.buffer(&mut out).unwrap();
    out_buf.push().unwrap();

    device
        .call("iota", 8, 96, &mut [&mut out_buf as &mut dyn KernelArg])
        .unwrap();

    out_buf.pull().unwrap();
    for (i, &value) in out_buf.host().iter().enumerate() {
        assert_eq!(value, i as i32);
    }
}

#[test]
fn test_push_refreshes_existing_device_copy() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut data = vec![5i32; 8];
    let mut buf = device.buffer(&mut data).unwrap();
    buf.push().unwrap();

    buf.host_mut().fill(9);
    buf.push().unwrap();
    buf.host_mut().fill(0);
    buf.pull().unwrap();

    assert!(buf.host().iter().all(|&x| x == 9));
}

#[test]
fn test_release_then_every_operation_fails() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    let mut data = vec![1i32; 4];
    let mut buf = device.buffer(&mut data).unwrap();

    device.release().unwrap();
    assert!(!device.is_ready());

    assert!(matches!(device.release(), Err(Error::NotInitialized)));
    assert!(matches!(buf.push(), Err(Error::NotInitialized)));

    let mut more = vec![2i32; 4];
    assert!(matches!(
        device.buffer(&mut more),
        Err(Error::NotInitialized)
    ));

    assert!(matches!(
        device.call("add", 1, 4, &mut []),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn test_reinit_lifecycle() {
    let Some(device) = init_cpu(KERNELS) else {
        return;
    };

    assert!(matches!(device.reinit(), Err(Error::AlreadyInitialized)));

    device.release().unwrap();
    device.reinit().unwrap();
    assert!(device.is_ready());

    let mut out = vec![0i32; 8];
    let mut out_buf = device.buffer(&mut out).unwrap();
    out_buf.push().unwrap();
    device
        .call("iota", 1, 8, &mut [&mut out_buf as &mut dyn KernelArg])
        .unwrap();
    out_buf.pull().unwrap();
    assert_eq!(out_buf.host(), &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_compile_failure_surfaces_diagnostics_at_init() {
    match Device::init(BackendKind::Cpu, "void broken(") {
        Err(Error::CompileFailed { diagnostics }) => {
            assert!(!diagnostics.is_empty(), "diagnostics were swallowed");
        }
        Err(Error::BackendUnavailable(_)) => {}
        other => panic!("expected CompileFailed, got {other:?}"),
    }
}

#[test]
fn test_buffer_from_another_device_is_rejected() {
    let Some(first) = init_cpu(KERNELS) else {
        return;
    };
    let Some(second) = init_cpu(KERNELS) else {
        return;
    };

    let mut data = vec![0i32; 16];
    let mut foreign = second.buffer(&mut data).unwrap();
    foreign.push().unwrap();

    match first.call("iota", 1, 16, &mut [&mut foreign as &mut dyn KernelArg]) {
        Err(Error::BufferDeviceMismatch) => {}
        other => panic!("expected BufferDeviceMismatch, got {other:?}"),
    }
}

#[test]
fn test_source_loader_feeds_device_init() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{KERNELS}").unwrap();

    let text = source::from_file(file.path()).unwrap();
    let Some(device) = init_cpu(&text) else {
        return;
    };

    let mut out = vec![0i32; 4];
    let mut out_buf = device.buffer(&mut out).unwrap();
    out_buf.push().unwrap();
    device
        .call("iota", 1, 4, &mut [&mut out_buf as &mut dyn KernelArg])
        .unwrap();
    out_buf.pull().unwrap();
    assert_eq!(out_buf.host(), &[0, 1, 2, 3]);
}

#[test]
fn test_devices_are_independent() {
    let Some(first) = init_cpu(KERNELS) else {
        return;
    };
    let Some(second) = init_cpu(KERNELS) else {
        return;
    };

    first.release().unwrap();

    // Releasing one device must not disturb the other.
    let mut out = vec![0i32; 8];
    let mut out_buf = second.buffer(&mut out).unwrap();
    out_buf.push().unwrap();
    second
        .call("iota", 2, 8, &mut [&mut out_buf as &mut dyn KernelArg])
        .unwrap();
    out_buf.pull().unwrap();
    assert_eq!(out_buf.host()[7], 7);
}

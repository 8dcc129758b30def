//! CPU backend: run-time-compiled native kernel modules.

use super::cc::{self, ModuleArtifacts};
use crate::buffer::KernelArg;
use crate::config::Config;
use crate::error::{Error, Result};
use libloading::Library;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

/// Calling convention every CPU kernel entry point must satisfy:
/// `(buffer_pointers, nargs, work_item_index)`.
pub(crate) type KernelEntry = unsafe extern "C" fn(*mut *mut c_void, usize, usize);

/// Execution context of a CPU device: the loaded kernel module, its
/// on-disk artifacts, and a cache of resolved entry points.
pub(crate) struct CpuContext {
    library: Library,
    #[allow(dead_code)]
    artifacts: ModuleArtifacts,
    symbols: Mutex<HashMap<String, KernelEntry>>,
}

impl CpuContext {
    /// Runs the compile-and-load pipeline: source → shared module → loaded
    /// library. Partial state is released by drop order if any step fails.
    pub(crate) fn build(source: &str, config: &Config) -> Result<Self> {
        let toolchain = cc::resolve_toolchain(config)?;
        let artifacts = cc::compile(source, &toolchain, config)?;

        let library = unsafe { Library::new(&artifacts.module_path) }.map_err(|e| {
            Error::device_init(format!(
                "failed to load module `{}`: {e}",
                artifacts.module_path.display()
            ))
        })?;
        debug!(
            "loaded kernel module from {}",
            artifacts.module_path.display()
        );

        Ok(Self {
            library,
            artifacts,
            symbols: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves a kernel entry point by name. Resolution failure is
    /// `KernelNotFound`, distinct from compile failure, because one source
    /// may define several kernels looked up individually.
    fn resolve(&self, name: &str) -> Result<KernelEntry> {
        if let Some(entry) = self.symbols.lock().get(name) {
            return Ok(*entry);
        }

        let symbol = symbol_name(name)?;
        let entry = unsafe {
            self.library
                .get::<KernelEntry>(&symbol)
                .map(|sym| *sym)
                .map_err(|_| Error::KernelNotFound(name.to_string()))?
        };

        self.symbols.lock().insert(name.to_string(), entry);
        Ok(entry)
    }

    /// Reads the optional `<name>_arity` companion symbol. Kernel
    /// signatures are not statically known to the runtime, so modules that
    /// omit the symbol opt out of arity checking.
    fn declared_arity(&self, name: &str) -> Option<usize> {
        let symbol = symbol_name(&format!("{name}_arity")).ok()?;
        unsafe {
            self.library
                .get::<*const usize>(&symbol)
                .ok()
                .map(|sym| **sym)
        }
    }

    /// Executes the kernel once per work item in `[0, work_size)`,
    /// group by group. Work items carry no cross-item ordering
    /// dependencies, so the group loop may run in parallel; the observable
    /// result is identical either way. Blocks until every item completes.
    pub(crate) fn launch(
        &self,
        name: &str,
        group_size: usize,
        work_size: usize,
        args: &mut [&mut dyn KernelArg],
    ) -> Result<()> {
        let entry = self.resolve(name)?;

        if let Some(expected) = self.declared_arity(name) {
            if expected != args.len() {
                return Err(Error::ArityMismatch {
                    kernel: name.to_string(),
                    expected,
                    got: args.len(),
                });
            }
        }

        let mut pointers = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            pointers.push(arg.cpu_ptr()?);
        }

        let nargs = pointers.len();
        let groups = work_size / group_size;
        let table = ArgTable(pointers);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_groups(entry, &table, nargs, groups, group_size);
        }));

        outcome.map_err(|payload| Error::execution(panic_message(payload)))
    }
}

#[cfg(not(feature = "parallel"))]
fn run_groups(entry: KernelEntry, table: &ArgTable, nargs: usize, groups: usize, group_size: usize) {
    for group in 0..groups {
        let base = group * group_size;
        for local in 0..group_size {
            unsafe { entry(table.0.as_ptr() as *mut *mut c_void, nargs, base + local) };
        }
    }
}

#[cfg(feature = "parallel")]
fn run_groups(entry: KernelEntry, table: &ArgTable, nargs: usize, groups: usize, group_size: usize) {
    use rayon::prelude::*;

    (0..groups).into_par_iter().for_each(|group| {
        let base = group * group_size;
        for local in 0..group_size {
            unsafe { entry(table.0.as_ptr() as *mut *mut c_void, nargs, base + local) };
        }
    });
}

/// Argument table handed to every work item. Sharing it across the group
/// loop is sound because kernels are required to be parallel-safe and the
/// table itself is only read.
struct ArgTable(Vec<*mut c_void>);

unsafe impl Send for ArgTable {}
unsafe impl Sync for ArgTable {}

fn symbol_name(name: &str) -> Result<Vec<u8>> {
    if name.is_empty() || name.as_bytes().contains(&0) {
        return Err(Error::KernelNotFound(name.to_string()));
    }
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    Ok(bytes)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "kernel panicked".to_string()
    }
}

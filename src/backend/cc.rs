//! C compiler subprocess driver for the CPU backend.

use crate::config::{Config, CC_CANDIDATES};
use crate::error::{Error, Result};
use log::debug;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Environment variable overriding the kernel compiler, checked after
/// `Config::compiler` and before the `PATH` probe.
pub(crate) const CC_ENV: &str = "KILN_CC";

#[derive(Debug, Clone)]
pub(crate) struct Toolchain {
    pub(crate) cc: PathBuf,
}

/// Locates the C compiler used to build kernel modules.
///
/// Resolution order: `Config::compiler`, the `KILN_CC` environment
/// variable, then the first of `cc`, `clang`, `gcc` found in `PATH`. A host
/// with no usable compiler cannot run the CPU backend at all, so the
/// failure is `BackendUnavailable` rather than a compile error.
pub(crate) fn resolve_toolchain(config: &Config) -> Result<Toolchain> {
    if let Some(compiler) = &config.compiler {
        return which::which(compiler)
            .map(|cc| Toolchain { cc })
            .map_err(|_| {
                Error::backend_unavailable(format!(
                    "configured compiler `{}` not found",
                    compiler.display()
                ))
            });
    }

    if let Ok(value) = std::env::var(CC_ENV) {
        let value = value.trim();
        if !value.is_empty() {
            return which::which(value)
                .map(|cc| Toolchain { cc })
                .map_err(|_| {
                    Error::backend_unavailable(format!("{CC_ENV} compiler `{value}` not found"))
                });
        }
    }

    for candidate in CC_CANDIDATES {
        if let Ok(cc) = which::which(candidate) {
            return Ok(Toolchain { cc });
        }
    }

    Err(Error::backend_unavailable(format!(
        "no C compiler found (tried {}; set {CC_ENV} or Config::compiler)",
        CC_CANDIDATES.join(", ")
    )))
}

/// File-system artifacts of one kernel compilation.
///
/// Dropping the artifacts removes the compilation directory, unless the
/// directory was detached via `keep_artifacts`.
#[derive(Debug)]
pub(crate) struct ModuleArtifacts {
    #[allow(dead_code)]
    dir: Option<TempDir>,
    pub(crate) module_path: PathBuf,
}

/// Compiles kernel source text into a loadable shared module.
///
/// Writes the source to a fresh compilation unit, invokes the compiler as a
/// subprocess, and checks its exit status. Compiler diagnostics are captured
/// and preserved in `CompileFailed`; nothing is retried.
pub(crate) fn compile(
    source: &str,
    toolchain: &Toolchain,
    config: &Config,
) -> Result<ModuleArtifacts> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("kiln-kernel-");
    let dir = match &config.temp_dir {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };

    let unit_path = dir.path().join("kernel.c");
    std::fs::write(&unit_path, source)?;

    let module_path = dir
        .path()
        .join(format!("kernel.{}", std::env::consts::DLL_EXTENSION));

    let mut cmd = Command::new(&toolchain.cc);
    cmd.arg("-shared")
        .arg("-fPIC")
        .arg("-O2")
        .args(&config.compiler_flags)
        .arg("-o")
        .arg(&module_path)
        .arg(&unit_path);

    debug!("compiling kernel module: {cmd:?}");
    let output = cmd.output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let diagnostics = if stderr.is_empty() { stdout } else { stderr };
        return Err(Error::compile_failed(diagnostics));
    }

    let dir = if config.keep_artifacts {
        let kept = dir.into_path();
        debug!("keeping kernel artifacts in {}", kept.display());
        None
    } else {
        Some(dir)
    };

    Ok(ModuleArtifacts { dir, module_path })
}

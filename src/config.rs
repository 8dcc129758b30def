use crate::error::{Error, Result};
use std::path::PathBuf;

/// Compiler binaries probed, in order, when no override is given.
pub(crate) const CC_CANDIDATES: &[&str] = &["cc", "clang", "gcc"];

#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit C compiler for the CPU backend. When unset, the `KILN_CC`
    /// environment variable is consulted, then `cc`, `clang`, `gcc` in
    /// `PATH` order.
    pub compiler: Option<PathBuf>,

    /// Extra flags appended to the kernel compile command line.
    pub compiler_flags: Vec<String>,

    /// Directory in which temporary compilation units are materialized.
    /// Defaults to the system temp directory.
    pub temp_dir: Option<PathBuf>,

    /// Retain the compilation directory on release instead of removing it.
    pub keep_artifacts: bool,

    /// OpenCL platform index used by the `opencl` backend.
    pub opencl_platform: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compiler: None,
            compiler_flags: Vec::new(),
            temp_dir: None,
            keep_artifacts: false,
            opencl_platform: 0,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(compiler) = &self.compiler {
            if compiler.as_os_str().is_empty() {
                return Err(Error::config("compiler path must not be empty"));
            }
        }

        for flag in &self.compiler_flags {
            if flag.trim().is_empty() {
                return Err(Error::config("compiler flags must not be blank"));
            }
        }

        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(Error::config(format!(
                    "temp_dir `{}` is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn compiler<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.compiler = Some(path.into());
        self
    }

    pub fn compiler_flag<S: Into<String>>(mut self, flag: S) -> Self {
        self.config.compiler_flags.push(flag.into());
        self
    }

    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.config.keep_artifacts = keep;
        self
    }

    pub fn opencl_platform(mut self, index: usize) -> Self {
        self.config.opencl_platform = index;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_builder_collects_flags() {
        let config = Config::builder()
            .compiler_flag("-march=native")
            .compiler_flag("-ffast-math")
            .build()
            .unwrap();

        assert_eq!(config.compiler_flags.len(), 2);
    }

    #[test]
    fn test_blank_flag_rejected() {
        let result = Config::builder().compiler_flag("  ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_compiler_path_rejected() {
        let result = Config::builder().compiler("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_temp_dir_rejected() {
        let result = Config::builder()
            .temp_dir("/nonexistent/kiln/temp/dir")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

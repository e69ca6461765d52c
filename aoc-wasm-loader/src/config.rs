// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Loader Configuration
//!
//! Defaults reproduce the stock layout: `aoc_wasm_bg.wasm` sitting next to the
//! running executable, bound against the `./aoc_wasm` namespace. Every field can
//! be overridden from a TOML file or from `AOC_WASM_*` environment variables.

use crate::error::{LoaderError, LoaderResult};
use crate::{DEFAULT_ARTIFACT_FILENAME, DEFAULT_BINDING_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a [`ModuleLoader`](crate::ModuleLoader)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory holding the artifact (default: the executable's directory)
    pub artifact_dir: Option<PathBuf>,

    /// Artifact file name, joined onto `artifact_dir`
    pub artifact_file: PathBuf,

    /// Import namespace the binding module is registered under
    pub binding_namespace: String,

    /// Fuel budget per instance; `None` disables metering
    pub max_fuel: Option<u64>,

    /// Upper bound on linear memory per instance
    pub max_memory_bytes: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            artifact_dir: None,
            artifact_file: PathBuf::from(DEFAULT_ARTIFACT_FILENAME),
            binding_namespace: DEFAULT_BINDING_NAMESPACE.to_string(),
            max_fuel: None,
            max_memory_bytes: None,
        }
    }
}

impl LoaderConfig {
    /// Config rooted at an explicit artifact directory
    pub fn with_artifact_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> LoaderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - AOC_WASM_ARTIFACT_DIR: directory containing the artifact
    /// - AOC_WASM_ARTIFACT_FILE: artifact file name (default: aoc_wasm_bg.wasm)
    /// - AOC_WASM_NAMESPACE: binding import namespace (default: ./aoc_wasm)
    /// - AOC_WASM_MAX_FUEL: fuel budget per instance
    /// - AOC_WASM_MAX_MEMORY: memory limit per instance in bytes
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Apply `AOC_WASM_*` overrides on top of this config
    pub fn merge_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("AOC_WASM_ARTIFACT_DIR") {
            self.artifact_dir = Some(PathBuf::from(dir));
        }

        if let Ok(file) = std::env::var("AOC_WASM_ARTIFACT_FILE") {
            self.artifact_file = PathBuf::from(file);
        }

        if let Ok(namespace) = std::env::var("AOC_WASM_NAMESPACE") {
            self.binding_namespace = namespace;
        }

        if let Ok(fuel) = std::env::var("AOC_WASM_MAX_FUEL") {
            if let Ok(val) = fuel.parse() {
                self.max_fuel = Some(val);
            }
        }

        if let Ok(memory) = std::env::var("AOC_WASM_MAX_MEMORY") {
            if let Ok(val) = memory.parse() {
                self.max_memory_bytes = Some(val);
            }
        }

        self
    }

    /// Absolute location of the artifact this config points at
    pub fn artifact_path(&self) -> LoaderResult<PathBuf> {
        let dir = match &self.artifact_dir {
            Some(dir) => dir.clone(),
            None => executable_dir()?,
        };
        Ok(dir.join(&self.artifact_file))
    }

    pub fn validate(&self) -> LoaderResult<()> {
        if self.artifact_file.as_os_str().is_empty() {
            return Err(LoaderError::Config("artifact_file must not be empty".into()));
        }
        if self.binding_namespace.is_empty() {
            return Err(LoaderError::Config(
                "binding_namespace must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn executable_dir() -> LoaderResult<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        LoaderError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("executable {} has no parent directory", exe.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.artifact_file, PathBuf::from("aoc_wasm_bg.wasm"));
        assert_eq!(config.binding_namespace, "./aoc_wasm");
        assert!(config.artifact_dir.is_none());
        assert!(config.max_fuel.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_artifact_path_joins_dir() {
        let config = LoaderConfig::with_artifact_dir("/opt/aoc");
        assert_eq!(
            config.artifact_path().unwrap(),
            PathBuf::from("/opt/aoc/aoc_wasm_bg.wasm")
        );
    }

    #[test]
    fn test_artifact_path_defaults_to_executable_dir() {
        let config = LoaderConfig::default();
        let exe = std::env::current_exe().unwrap();
        let path = config.artifact_path().unwrap();
        assert_eq!(path.parent(), exe.parent());
        assert!(path.ends_with("aoc_wasm_bg.wasm"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
artifact_dir = "/srv/wasm"
artifact_file = "solver.wasm"
max_fuel = 5000
"#
        )
        .unwrap();

        let config = LoaderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/srv/wasm")));
        assert_eq!(config.artifact_file, PathBuf::from("solver.wasm"));
        assert_eq!(config.max_fuel, Some(5000));
        // Unset keys keep their defaults
        assert_eq!(config.binding_namespace, "./aoc_wasm");
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_fuel = \"lots\"").unwrap();

        let err = LoaderConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("AOC_WASM_ARTIFACT_DIR", "/env/dir");
        std::env::set_var("AOC_WASM_MAX_FUEL", "not-a-number");
        std::env::set_var("AOC_WASM_MAX_MEMORY", "65536");

        let config = LoaderConfig::from_env();
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/env/dir")));
        assert_eq!(config.max_fuel, None);
        assert_eq!(config.max_memory_bytes, Some(65536));

        std::env::remove_var("AOC_WASM_ARTIFACT_DIR");
        std::env::remove_var("AOC_WASM_MAX_FUEL");
        std::env::remove_var("AOC_WASM_MAX_MEMORY");
    }

    #[test]
    fn test_validate_rejects_empty_namespace() {
        let config = LoaderConfig {
            binding_namespace: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LoaderError::Config(_))));
    }
}

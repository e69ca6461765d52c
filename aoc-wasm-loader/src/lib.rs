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

//! AoC WASM Loader
//!
//! Hosts the precompiled `aoc_wasm_bg.wasm` Advent of Code artifact with
//! wasmtime and exposes its exports to Rust callers.
//!
//! # Architecture
//!
//! Loading is a single fail-fast sequence:
//! 1. resolve `<artifact_dir>/aoc_wasm_bg.wasm`
//! 2. read the bytes
//! 3. compile them into a module
//! 4. resolve the injected binding module into a fresh import table
//! 5. instantiate
//! 6. hand back the instance and its exports
//!
//! The binding module (the `./aoc_wasm` namespace) is passed in explicitly as
//! an `Arc<dyn BindingModule>`; [`WbindgenBindings`] covers what a
//! wasm-bindgen build of the artifact imports.
//!
//! # Example
//!
//! ```rust,ignore
//! use aoc_wasm_loader::{LoaderConfig, ModuleLoader, Solver};
//!
//! let loader = ModuleLoader::with_default_bindings(LoaderConfig::from_env())?;
//! let mut module = loader.load()?;
//!
//! for export in module.exports() {
//!     println!("{} ({})", export.name, export.kind);
//! }
//!
//! let solution = Solver::new(&mut module)?.solve_day(2017, 1, "91212129")?;
//! assert_eq!(solution.part_one, "9");
//! ```

pub mod artifact;
pub mod bindings;
pub mod config;
pub mod error;
pub mod instance;
pub mod loader;
pub mod solver;

// Re-exports
pub use artifact::Artifact;
pub use bindings::{BindingModule, FnBindings, HostState, HostValue, ObjectHeap, WbindgenBindings};
pub use config::LoaderConfig;
pub use error::{ErrorCategory, LoaderError, LoaderResult};
pub use instance::{ExportInfo, ExportKind, LoadedModule};
pub use loader::{LoaderState, ModuleLoader};
pub use solver::{Solution, Solver};

/// Re-exported so callers can build `Val`s and signatures without a direct dependency
pub use wasmtime;

/// Artifact file name expected next to the loader
pub const DEFAULT_ARTIFACT_FILENAME: &str = "aoc_wasm_bg.wasm";

/// Import namespace the artifact expects its bindings under
pub const DEFAULT_BINDING_NAMESPACE: &str = "./aoc_wasm";

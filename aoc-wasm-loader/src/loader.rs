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

//! Module Loader
//!
//! Reads the artifact, compiles it, builds a fresh import table from the
//! injected binding modules and instantiates. Every step is fail-fast: the
//! first error aborts the load and nothing partially built is returned.
//!
//! Each call to [`ModuleLoader::load`] yields a new, independent instance.
//! Nothing is cached between loads.

use crate::artifact::Artifact;
use crate::bindings::{BindingModule, HostState, WbindgenBindings};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::instance::LoadedModule;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimitsBuilder};

/// Placeholder path recorded for modules loaded from memory
const IN_MEMORY_PATH: &str = "<memory>";

/// Loader lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderState {
    /// No instance created yet
    Unloaded,
    /// At least one instance created; never goes back
    Loaded,
}

/// One namespace of the import table
#[derive(Clone)]
struct ImportEntry {
    namespace: String,
    binding: Arc<dyn BindingModule>,
}

/// Loads the artifact and instantiates it against the injected bindings
pub struct ModuleLoader {
    engine: Engine,
    config: LoaderConfig,
    imports: Vec<ImportEntry>,
    state: RwLock<LoaderState>,
    instances_created: AtomicU64,
}

impl ModuleLoader {
    /// Create a loader with no binding modules injected yet
    pub fn new(config: LoaderConfig) -> LoaderResult<Self> {
        config.validate()?;

        let mut engine_config = Config::new();

        // Fuel metering only when a budget is configured
        if config.max_fuel.is_some() {
            engine_config.consume_fuel(true);
        }

        let engine =
            Engine::new(&engine_config).map_err(|e| LoaderError::Engine(e.to_string()))?;

        Ok(Self {
            engine,
            config,
            imports: Vec::new(),
            state: RwLock::new(LoaderState::Unloaded),
            instances_created: AtomicU64::new(0),
        })
    }

    /// Loader bound to the wasm-bindgen intrinsics under the configured namespace
    pub fn with_default_bindings(config: LoaderConfig) -> LoaderResult<Self> {
        Ok(Self::new(config)?.with_binding(Arc::new(WbindgenBindings::new())))
    }

    /// Inject the binding module for the configured namespace
    pub fn with_binding(self, binding: Arc<dyn BindingModule>) -> Self {
        let namespace = self.config.binding_namespace.clone();
        self.with_binding_at(namespace, binding)
    }

    /// Inject a binding module under an explicit namespace
    pub fn with_binding_at(
        mut self,
        namespace: impl Into<String>,
        binding: Arc<dyn BindingModule>,
    ) -> Self {
        self.imports.push(ImportEntry {
            namespace: namespace.into(),
            binding,
        });
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn state(&self) -> LoaderState {
        *self.state.read()
    }

    /// Number of instances this loader has produced
    pub fn instances_created(&self) -> u64 {
        self.instances_created.load(Ordering::SeqCst)
    }

    /// Load the artifact at the configured location
    pub fn load(&self) -> LoaderResult<LoadedModule> {
        let path = self.config.artifact_path()?;
        self.load_from(path)
    }

    /// Load an artifact from an explicit path
    pub fn load_from(&self, path: impl AsRef<Path>) -> LoaderResult<LoadedModule> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading artifact");
        let artifact = Artifact::read(path)?;
        self.instantiate_artifact(artifact)
    }

    /// Load a module from bytes already in memory
    pub fn load_bytes(&self, bytes: &[u8]) -> LoaderResult<LoadedModule> {
        let artifact = Artifact::from_bytes(PathBuf::from(IN_MEMORY_PATH), bytes.to_vec());
        self.instantiate_artifact(artifact)
    }

    fn instantiate_artifact(&self, artifact: Artifact) -> LoaderResult<LoadedModule> {
        let module = self.compile(&artifact)?;
        let linker = self.build_import_table()?;
        let mut store = self.new_store()?;

        // Report the first unsatisfied import by name before instantiating
        for import in module.imports() {
            if linker.get_by_import(&mut store, &import).is_none() {
                return Err(LoaderError::ImportMismatch {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                    reason: "no definition in the import table".into(),
                });
            }
        }

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| LoaderError::Instantiation(format!("{e:#}")))?;

        let id = self.instances_created.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.write() = LoaderState::Loaded;

        let loaded = LoadedModule::new(
            id,
            artifact.path().to_path_buf(),
            artifact.digest().to_string(),
            module,
            instance,
            store,
        );

        info!(
            id,
            path = %artifact.path().display(),
            digest = %artifact.digest(),
            exports = loaded.exports().len(),
            "Module loaded"
        );

        Ok(loaded)
    }

    fn compile(&self, artifact: &Artifact) -> LoaderResult<Module> {
        debug!(bytes = artifact.len(), "Compiling module");
        // Binary format only; text input is malformed
        Module::from_binary(&self.engine, artifact.bytes()).map_err(|e| {
            let reason = if artifact.has_wasm_magic() {
                format!("{e:#}")
            } else {
                format!("missing \\0asm preamble: {e:#}")
            };
            LoaderError::MalformedModule {
                path: artifact.path().to_path_buf(),
                reason,
            }
        })
    }

    /// Build a fresh import table for one instantiation
    fn build_import_table(&self) -> LoaderResult<Linker<HostState>> {
        if self.imports.is_empty() {
            return Err(LoaderError::BindingUnresolved {
                namespace: self.config.binding_namespace.clone(),
                reason: "no binding module injected".into(),
            });
        }

        let mut linker = Linker::new(&self.engine);
        for entry in &self.imports {
            debug!(
                namespace = %entry.namespace,
                binding = entry.binding.name(),
                "Resolving binding module"
            );
            entry.binding.resolve(&entry.namespace, &mut linker)?;
        }
        Ok(linker)
    }

    fn new_store(&self) -> LoaderResult<Store<HostState>> {
        let mut limits = StoreLimitsBuilder::new();
        if let Some(max) = self.config.max_memory_bytes {
            limits = limits.memory_size(max);
        }

        let mut store = Store::new(&self.engine, HostState::new(limits.build()));
        store.limiter(|state| state.limits_mut());

        if let Some(fuel) = self.config.max_fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| LoaderError::Engine(format!("Failed to set fuel: {e}")))?;
        }
        Ok(store)
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("config", &self.config)
            .field(
                "namespaces",
                &self.imports.iter().map(|e| e.namespace.as_str()).collect::<Vec<_>>(),
            )
            .field("state", &self.state())
            .field("instances_created", &self.instances_created())
            .finish()
    }
}

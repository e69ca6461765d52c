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

//! Loaded module instance
//!
//! A [`LoadedModule`] is the running instance together with the store that
//! owns its memory, globals and host state. Its exports are fixed at
//! instantiation; nothing here adds to or removes from them.

use crate::bindings::{read_bytes, write_bytes, HostState, ObjectHeap};
use crate::error::{LoaderError, LoaderResult};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use wasmtime::{
    Extern, ExternType, Func, Instance, Memory, Module, Store, TypedFunc, Val, WasmParams,
    WasmResults,
};

/// Kind of an exported item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Func,
    Memory,
    Global,
    Table,
    Other,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportKind::Func => "func",
            ExportKind::Memory => "memory",
            ExportKind::Global => "global",
            ExportKind::Table => "table",
            ExportKind::Other => "other",
        };
        f.pad(s)
    }
}

impl From<&ExternType> for ExportKind {
    #[allow(unreachable_patterns)]
    fn from(ty: &ExternType) -> Self {
        match ty {
            ExternType::Func(_) => ExportKind::Func,
            ExternType::Memory(_) => ExportKind::Memory,
            ExternType::Global(_) => ExportKind::Global,
            ExternType::Table(_) => ExportKind::Table,
            _ => ExportKind::Other,
        }
    }
}

/// One entry of the exports object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
}

/// An instantiated artifact and the store it lives in
pub struct LoadedModule {
    id: u64,
    artifact_path: PathBuf,
    digest: String,
    module: Module,
    instance: Instance,
    store: Store<HostState>,
}

impl LoadedModule {
    pub(crate) fn new(
        id: u64,
        artifact_path: PathBuf,
        digest: String,
        module: Module,
        instance: Instance,
        store: Store<HostState>,
    ) -> Self {
        Self {
            id,
            artifact_path,
            digest,
            module,
            instance,
            store,
        }
    }

    /// Sequence number assigned by the loader, unique per process
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// BLAKE3 digest of the artifact this instance was built from
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    /// The exports object, in declaration order
    pub fn exports(&self) -> Vec<ExportInfo> {
        self.module
            .exports()
            .map(|export| ExportInfo {
                name: export.name().to_string(),
                kind: ExportKind::from(&export.ty()),
            })
            .collect()
    }

    pub fn export_names(&self) -> Vec<String> {
        self.module.exports().map(|e| e.name().to_string()).collect()
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.module.get_export(name).is_some()
    }

    /// Look up an exported function
    pub fn func(&mut self, name: &str) -> LoaderResult<Func> {
        match self.instance.get_export(&mut self.store, name) {
            Some(Extern::Func(func)) => Ok(func),
            Some(_) => Err(LoaderError::ExportType {
                name: name.to_string(),
                reason: "not a function".into(),
            }),
            None => Err(LoaderError::ExportNotFound(name.to_string())),
        }
    }

    /// Call an exported function with dynamically typed arguments
    pub fn call(&mut self, name: &str, args: &[Val]) -> LoaderResult<Vec<Val>> {
        let func = self.func(name)?;
        let ty = func.ty(&self.store);
        if ty.params().len() != args.len() {
            return Err(LoaderError::ExportType {
                name: name.to_string(),
                reason: format!(
                    "expected {} arguments, got {}",
                    ty.params().len(),
                    args.len()
                ),
            });
        }

        for (index, (arg, expected)) in args.iter().zip(ty.params()).enumerate() {
            let matches = arg
                .matches_ty(&self.store, &expected)
                .map_err(|e| LoaderError::Execution(format!("{e:#}")))?;
            if !matches {
                return Err(LoaderError::ExportType {
                    name: name.to_string(),
                    reason: format!("argument {index} is not of type {expected:?}"),
                });
            }
        }

        let mut results = vec![Val::I32(0); ty.results().len()];
        match func.call(&mut self.store, args, &mut results) {
            Ok(()) => Ok(results),
            Err(e) => Err(self.call_error(e)),
        }
    }

    /// Look up an exported function with a static signature
    pub fn typed_func<P, R>(&mut self, name: &str) -> LoaderResult<TypedFunc<P, R>>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self.func(name)?;
        func.typed::<P, R>(&self.store)
            .map_err(|e| LoaderError::ExportType {
                name: name.to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Call a function obtained from [`typed_func`](Self::typed_func)
    pub fn call_typed<P, R>(&mut self, func: &TypedFunc<P, R>, params: P) -> LoaderResult<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        match func.call(&mut self.store, params) {
            Ok(results) => Ok(results),
            Err(e) => Err(self.call_error(e)),
        }
    }

    /// Exported linear memory by name
    pub fn memory(&mut self, name: &str) -> LoaderResult<Memory> {
        match self.instance.get_export(&mut self.store, name) {
            Some(Extern::Memory(memory)) => Ok(memory),
            Some(_) => Err(LoaderError::ExportType {
                name: name.to_string(),
                reason: "not a memory".into(),
            }),
            None => Err(LoaderError::ExportNotFound(name.to_string())),
        }
    }

    /// Copy bytes out of the `memory` export
    pub fn read_memory(&mut self, ptr: i32, len: i32) -> LoaderResult<Vec<u8>> {
        let memory = self.memory("memory")?;
        read_bytes(&self.store, &memory, ptr, len)
    }

    /// Copy bytes into the `memory` export
    pub fn write_memory(&mut self, ptr: i32, data: &[u8]) -> LoaderResult<()> {
        let memory = self.memory("memory")?;
        write_bytes(&mut self.store, &memory, ptr, data)
    }

    /// Fuel left in the store, when metering is enabled
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }

    pub fn heap(&self) -> &ObjectHeap {
        self.store.data().heap()
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        self.store.data_mut().heap_mut()
    }

    fn call_error(&mut self, err: anyhow::Error) -> LoaderError {
        if let Some(message) = self.store.data_mut().take_thrown() {
            return LoaderError::Thrown(message);
        }
        LoaderError::Execution(format!("{err:#}"))
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("id", &self.id)
            .field("artifact_path", &self.artifact_path)
            .field("digest", &self.digest)
            .field("exports", &self.export_names())
            .finish()
    }
}

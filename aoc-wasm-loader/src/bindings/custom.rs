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

//! Closure-backed binding module

use super::{BindingModule, HostState};
use crate::error::{LoaderError, LoaderResult};
use std::sync::Arc;
use wasmtime::{Caller, FuncType, Linker, Val, ValType};

/// Signature of a dynamically typed host function
pub type HostFn =
    dyn Fn(Caller<'_, HostState>, &[Val], &mut [Val]) -> anyhow::Result<()> + Send + Sync;

struct HostFnEntry {
    name: String,
    params: Vec<ValType>,
    results: Vec<ValType>,
    func: Arc<HostFn>,
}

/// Binding module assembled from closures
///
/// ```rust,ignore
/// let bindings = FnBindings::new("env")
///     .func("double", [ValType::I32], [ValType::I32], |_, args, out| {
///         out[0] = Val::I32(args[0].unwrap_i32() * 2);
///         Ok(())
///     });
/// ```
pub struct FnBindings {
    name: String,
    entries: Vec<HostFnEntry>,
}

impl FnBindings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a host function with the given wasm signature
    pub fn func<F>(
        mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = ValType>,
        results: impl IntoIterator<Item = ValType>,
        func: F,
    ) -> Self
    where
        F: Fn(Caller<'_, HostState>, &[Val], &mut [Val]) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.entries.push(HostFnEntry {
            name: name.into(),
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
            func: Arc::new(func),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BindingModule for FnBindings {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, namespace: &str, linker: &mut Linker<HostState>) -> LoaderResult<()> {
        for entry in &self.entries {
            let ty = FuncType::new(
                linker.engine(),
                entry.params.iter().cloned(),
                entry.results.iter().cloned(),
            );
            let func = Arc::clone(&entry.func);
            linker
                .func_new(namespace, &entry.name, ty, move |caller, params, results| {
                    (*func)(caller, params, results)
                })
                .map_err(|e| LoaderError::BindingUnresolved {
                    namespace: namespace.to_string(),
                    reason: format!("{}: {e}", entry.name),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::Engine;

    fn noop(_: Caller<'_, HostState>, _: &[Val], _: &mut [Val]) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_builder_collects_entries() {
        let bindings = FnBindings::new("env")
            .func("a", [ValType::I32], [], noop)
            .func("b", [], [ValType::I64], noop);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.name(), "env");
    }

    #[test]
    fn test_duplicate_name_fails_to_resolve() {
        let engine = Engine::default();
        let mut linker = Linker::new(&engine);
        let bindings = FnBindings::new("env")
            .func("same", [], [], noop)
            .func("same", [ValType::I32], [], noop);

        let err = bindings.resolve("env", &mut linker).unwrap_err();
        assert!(err.to_string().contains("same"));
    }
}

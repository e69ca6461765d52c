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

//! wasm-bindgen host intrinsics
//!
//! These are the functions a wasm-bindgen artifact imports from its generated
//! glue. Only the intrinsics needed to pass strings and JSON across the
//! boundary and to raise errors are provided:
//!
//! - `__wbindgen_string_new(ptr, len) -> handle`
//! - `__wbindgen_json_parse(ptr, len) -> handle`
//! - `__wbindgen_object_clone_ref(handle) -> handle`
//! - `__wbindgen_object_drop_ref(handle)`
//! - `__wbindgen_throw(ptr, len)`

use super::heap::HostValue;
use super::{caller_memory, read_string, BindingModule, HostState};
use crate::error::{LoaderError, LoaderResult};
use tracing::{debug, trace};
use wasmtime::{Caller, Linker};

pub const STRING_NEW: &str = "__wbindgen_string_new";
pub const JSON_PARSE: &str = "__wbindgen_json_parse";
pub const OBJECT_CLONE_REF: &str = "__wbindgen_object_clone_ref";
pub const OBJECT_DROP_REF: &str = "__wbindgen_object_drop_ref";
pub const THROW: &str = "__wbindgen_throw";

/// Binding module implementing the wasm-bindgen intrinsics
#[derive(Debug, Clone, Default)]
pub struct WbindgenBindings;

impl WbindgenBindings {
    pub fn new() -> Self {
        Self
    }
}

fn unresolved(namespace: &str, err: impl std::fmt::Display) -> LoaderError {
    LoaderError::BindingUnresolved {
        namespace: namespace.to_string(),
        reason: err.to_string(),
    }
}

impl BindingModule for WbindgenBindings {
    fn name(&self) -> &str {
        "wasm-bindgen"
    }

    fn resolve(&self, namespace: &str, linker: &mut Linker<HostState>) -> LoaderResult<()> {
        linker
            .func_wrap(
                namespace,
                STRING_NEW,
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<i32> {
                    let memory = caller_memory(&mut caller)?;
                    let s = read_string(&caller, &memory, ptr, len)?;
                    trace!(len, "string_new");
                    Ok(caller.data_mut().heap_mut().insert(HostValue::String(s)) as i32)
                },
            )
            .map_err(|e| unresolved(namespace, e))?;

        linker
            .func_wrap(
                namespace,
                JSON_PARSE,
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<i32> {
                    let memory = caller_memory(&mut caller)?;
                    let text = read_string(&caller, &memory, ptr, len)?;
                    let value: serde_json::Value =
                        serde_json::from_str(&text).map_err(LoaderError::from)?;
                    Ok(caller.data_mut().heap_mut().insert(HostValue::Json(value)) as i32)
                },
            )
            .map_err(|e| unresolved(namespace, e))?;

        linker
            .func_wrap(
                namespace,
                OBJECT_CLONE_REF,
                |mut caller: Caller<'_, HostState>, handle: i32| -> anyhow::Result<i32> {
                    let cloned = caller
                        .data_mut()
                        .heap_mut()
                        .clone_ref(handle as u32)
                        .ok_or_else(|| {
                            LoaderError::Execution(format!("clone of dead handle {handle}"))
                        })?;
                    Ok(cloned as i32)
                },
            )
            .map_err(|e| unresolved(namespace, e))?;

        linker
            .func_wrap(
                namespace,
                OBJECT_DROP_REF,
                |mut caller: Caller<'_, HostState>, handle: i32| {
                    caller.data_mut().heap_mut().drop_ref(handle as u32);
                },
            )
            .map_err(|e| unresolved(namespace, e))?;

        linker
            .func_wrap(
                namespace,
                THROW,
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<()> {
                    let memory = caller_memory(&mut caller)?;
                    let message = read_string(&caller, &memory, ptr, len)?;
                    caller.data_mut().set_thrown(message.clone());
                    Err(LoaderError::Thrown(message).into())
                },
            )
            .map_err(|e| unresolved(namespace, e))?;

        debug!(namespace, binding = self.name(), "Resolved binding module");
        Ok(())
    }
}

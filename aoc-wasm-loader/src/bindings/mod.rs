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

//! Binding Modules
//!
//! A binding module supplies the host side of one import namespace. The
//! artifact built by wasm-bindgen imports its glue under `./aoc_wasm`; here
//! that glue is an ordinary Rust value handed to the loader instead of a
//! sibling file looked up by name at load time.
//!
//! - [`WbindgenBindings`]: the `__wbindgen_*` intrinsics a wasm-bindgen
//!   artifact expects
//! - [`FnBindings`]: host functions assembled from closures

pub mod custom;
pub mod heap;
pub mod wbindgen;

pub use custom::FnBindings;
pub use heap::{HostValue, ObjectHeap, HEAP_RESERVED};
pub use wbindgen::WbindgenBindings;

use crate::error::{LoaderError, LoaderResult};
use wasmtime::{AsContext, AsContextMut, Caller, Extern, Linker, Memory, StoreLimits};

/// Provider of one import namespace
pub trait BindingModule: Send + Sync {
    /// Human readable name used in logs and errors
    fn name(&self) -> &str;

    /// Define every host function of `namespace` on the linker
    fn resolve(&self, namespace: &str, linker: &mut Linker<HostState>) -> LoaderResult<()>;
}

/// Per-instance data stored alongside the wasm instance
pub struct HostState {
    heap: ObjectHeap,
    thrown: Option<String>,
    limits: StoreLimits,
}

impl HostState {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            heap: ObjectHeap::new(),
            thrown: None,
            limits,
        }
    }

    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    /// Record a message raised by the module
    pub fn set_thrown(&mut self, message: String) {
        self.thrown = Some(message);
    }

    /// Take the last message raised by the module, if any
    pub fn take_thrown(&mut self) -> Option<String> {
        self.thrown.take()
    }

    pub(crate) fn limits_mut(&mut self) -> &mut StoreLimits {
        &mut self.limits
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

/// The `memory` export of the calling instance
pub fn caller_memory(caller: &mut Caller<'_, HostState>) -> LoaderResult<Memory> {
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| LoaderError::Memory("module does not export 'memory'".into()))
}

/// Copy `len` bytes starting at `ptr` out of linear memory
pub fn read_bytes(
    store: impl AsContext,
    memory: &Memory,
    ptr: i32,
    len: i32,
) -> LoaderResult<Vec<u8>> {
    let len = usize::try_from(len)
        .map_err(|_| LoaderError::Memory(format!("negative length {len}")))?;
    let mut buf = vec![0u8; len];
    memory
        .read(store, ptr as u32 as usize, &mut buf)
        .map_err(|e| LoaderError::Memory(format!("read of {len} bytes at {ptr:#x}: {e}")))?;
    Ok(buf)
}

/// Read a UTF-8 string out of linear memory
pub fn read_string(
    store: impl AsContext,
    memory: &Memory,
    ptr: i32,
    len: i32,
) -> LoaderResult<String> {
    let bytes = read_bytes(store, memory, ptr, len)?;
    String::from_utf8(bytes)
        .map_err(|e| LoaderError::Memory(format!("invalid UTF-8 at {ptr:#x}: {e}")))
}

/// Copy `data` into linear memory at `ptr`
pub fn write_bytes(
    store: impl AsContextMut,
    memory: &Memory,
    ptr: i32,
    data: &[u8],
) -> LoaderResult<()> {
    memory
        .write(store, ptr as u32 as usize, data)
        .map_err(|e| LoaderError::Memory(format!("write of {} bytes at {ptr:#x}: {e}", data.len())))
}

/// Read a little-endian `i32` from linear memory
pub fn read_i32(store: impl AsContext, memory: &Memory, ptr: i32) -> LoaderResult<i32> {
    let bytes = read_bytes(store, memory, ptr, 4)?;
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes);
    Ok(i32::from_le_bytes(word))
}

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

//! Typed access to the `solve_day` export
//!
//! The artifact exports `solve_day(year, day, input)` through wasm-bindgen,
//! returning either a `{ part_one, part_two }` object or an error string. At
//! the wasm level that is:
//!
//! ```text
//! solve_day(retptr: i32, year: i32, day: i32, input_ptr: i32, input_len: i32)
//! ```
//!
//! where `retptr` points at three `i32` slots on the shadow stack: the value
//! handle, the error handle and the is-error flag.

use crate::bindings::heap::HostValue;
use crate::error::{LoaderError, LoaderResult};
use crate::instance::LoadedModule;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wasmtime::{TypedFunc, Val};

pub const SOLVE_DAY: &str = "solve_day";
pub const MALLOC: &str = "__wbindgen_malloc";
pub const ADD_TO_STACK_POINTER: &str = "__wbindgen_add_to_stack_pointer";
pub const MEMORY: &str = "memory";

/// Bytes reserved on the shadow stack for the return slots
const RET_AREA: i32 = 16;

const REQUIRED_EXPORTS: [&str; 4] = [MEMORY, SOLVE_DAY, MALLOC, ADD_TO_STACK_POINTER];

/// Answers for both parts of a puzzle day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub part_one: String,
    pub part_two: String,
}

/// Drives `solve_day` on a loaded module
pub struct Solver<'m> {
    module: &'m mut LoadedModule,
    stack_pointer: TypedFunc<i32, i32>,
    solve: TypedFunc<(i32, i32, i32, i32, i32), ()>,
}

impl<'m> Solver<'m> {
    /// Exports required by the solver that `module` lacks
    pub fn missing_exports(module: &LoadedModule) -> Vec<&'static str> {
        REQUIRED_EXPORTS
            .iter()
            .copied()
            .filter(|name| !module.has_export(name))
            .collect()
    }

    pub fn supports(module: &LoadedModule) -> bool {
        Self::missing_exports(module).is_empty()
    }

    pub fn new(module: &'m mut LoadedModule) -> LoaderResult<Self> {
        if let Some(name) = Self::missing_exports(module).first() {
            return Err(LoaderError::ExportNotFound(name.to_string()));
        }
        let stack_pointer = module.typed_func::<i32, i32>(ADD_TO_STACK_POINTER)?;
        let solve = module.typed_func::<(i32, i32, i32, i32, i32), ()>(SOLVE_DAY)?;
        Ok(Self {
            module,
            stack_pointer,
            solve,
        })
    }

    /// Solve one puzzle day
    pub fn solve_day(&mut self, year: u16, day: u8, input: &str) -> LoaderResult<Solution> {
        let retptr = self.module.call_typed(&self.stack_pointer, -RET_AREA)?;
        let outcome = self.solve_at(retptr, year, day, input);
        let restored = self.module.call_typed(&self.stack_pointer, RET_AREA);
        let solution = outcome?;
        restored?;
        Ok(solution)
    }

    fn solve_at(&mut self, retptr: i32, year: u16, day: u8, input: &str) -> LoaderResult<Solution> {
        let bytes = input.as_bytes();
        let len = i32::try_from(bytes.len())
            .map_err(|_| LoaderError::Memory(format!("input of {} bytes", bytes.len())))?;
        let ptr = self.malloc(len)?;
        self.module.write_memory(ptr, bytes)?;

        debug!(year, day, len, "Calling solve_day");
        self.module
            .call_typed(&self.solve, (retptr, year as i32, day as i32, ptr, len))?;

        let slots = self.module.read_memory(retptr, 12)?;
        let word = |i: usize| {
            let mut w = [0u8; 4];
            w.copy_from_slice(&slots[i * 4..i * 4 + 4]);
            i32::from_le_bytes(w)
        };
        let (value, error, is_error) = (word(0), word(1), word(2));

        if is_error != 0 {
            let message = self
                .module
                .heap_mut()
                .take(error as u32)
                .map(|v| v.describe())
                .unwrap_or_else(|| format!("unknown error (handle {error})"));
            return Err(LoaderError::Thrown(message));
        }

        let value = self
            .module
            .heap_mut()
            .take(value as u32)
            .ok_or_else(|| LoaderError::Execution(format!("dead result handle {value}")))?;
        decode_solution(value)
    }

    /// `__wbindgen_malloc` takes `(size)` or `(size, align)` depending on the
    /// wasm-bindgen version the artifact was built with.
    fn malloc(&mut self, len: i32) -> LoaderResult<i32> {
        let func = self.module.func(MALLOC)?;
        let arity = func.ty(self.module.store()).params().len();
        let args: Vec<Val> = match arity {
            1 => vec![Val::I32(len)],
            2 => vec![Val::I32(len), Val::I32(1)],
            n => {
                return Err(LoaderError::ExportType {
                    name: MALLOC.to_string(),
                    reason: format!("unexpected arity {n}"),
                })
            }
        };
        match self.module.call(MALLOC, &args)?.first() {
            Some(Val::I32(ptr)) => Ok(*ptr),
            _ => Err(LoaderError::ExportType {
                name: MALLOC.to_string(),
                reason: "expected an i32 result".into(),
            }),
        }
    }
}

fn decode_solution(value: HostValue) -> LoaderResult<Solution> {
    match value {
        HostValue::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(serde_json::from_value(other.into_json())?),
    }
}

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

//! Host object heap
//!
//! wasm-bindgen modules never hold host values directly; they hold `u32`
//! handles into a table owned by the host. Handles below
//! `HEAP_RESERVED + 4` are fixed (`undefined`, `null`, `true`, `false`).

use serde::Serialize;

/// First handle handed out by the heap
pub const HEAP_RESERVED: u32 = 128;

const PRESET: [HostValue; 4] = [
    HostValue::Undefined,
    HostValue::Null,
    HostValue::Bool(true),
    HostValue::Bool(false),
];

/// A host value addressable from wasm through a heap handle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    String(String),
    Json(serde_json::Value),
}

impl HostValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            HostValue::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// JSON view of the value; `undefined` collapses to `null`
    pub fn into_json(self) -> serde_json::Value {
        match self {
            HostValue::Undefined | HostValue::Null => serde_json::Value::Null,
            HostValue::Bool(b) => serde_json::Value::Bool(b),
            HostValue::String(s) => serde_json::Value::String(s),
            HostValue::Json(v) => v,
        }
    }

    /// Render the way a thrown value is reported
    pub fn describe(&self) -> String {
        match self {
            HostValue::Undefined => "undefined".to_string(),
            HostValue::String(s) => s.clone(),
            other => other.clone().into_json().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Occupied(HostValue),
    Free,
}

/// Slab of host values indexed by handle
#[derive(Debug, Clone)]
pub struct ObjectHeap {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self {
            slots: PRESET.iter().cloned().map(Slot::Occupied).collect(),
            free: Vec::new(),
        }
    }

    fn position(handle: u32) -> Option<usize> {
        handle.checked_sub(HEAP_RESERVED).map(|p| p as usize)
    }

    fn is_preset(handle: u32) -> bool {
        matches!(Self::position(handle), Some(p) if p < PRESET.len())
    }

    /// Store a value and return its handle
    pub fn insert(&mut self, value: HostValue) -> u32 {
        match self.free.pop() {
            Some(handle) => {
                if let Some(p) = Self::position(handle) {
                    self.slots[p] = Slot::Occupied(value);
                }
                handle
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                HEAP_RESERVED + (self.slots.len() - 1) as u32
            }
        }
    }

    pub fn get(&self, handle: u32) -> Option<&HostValue> {
        match self.slots.get(Self::position(handle)?)? {
            Slot::Occupied(value) => Some(value),
            Slot::Free => None,
        }
    }

    /// Release a handle; fixed handles are never released
    pub fn drop_ref(&mut self, handle: u32) -> bool {
        if Self::is_preset(handle) {
            return false;
        }
        let Some(p) = Self::position(handle) else {
            return false;
        };
        match self.slots.get_mut(p) {
            Some(slot) if matches!(slot, Slot::Occupied(_)) => {
                *slot = Slot::Free;
                self.free.push(handle);
                true
            }
            _ => false,
        }
    }

    /// Read a value and release its handle
    pub fn take(&mut self, handle: u32) -> Option<HostValue> {
        let value = self.get(handle)?.clone();
        self.drop_ref(handle);
        Some(value)
    }

    /// Duplicate a handle so both copies can be dropped independently
    pub fn clone_ref(&mut self, handle: u32) -> Option<u32> {
        let value = self.get(handle)?.clone();
        Some(self.insert(value))
    }

    /// Number of live handles, excluding the fixed ones
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .skip(PRESET.len())
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count()
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_handles() {
        let heap = ObjectHeap::new();
        assert_eq!(heap.get(128), Some(&HostValue::Undefined));
        assert_eq!(heap.get(129), Some(&HostValue::Null));
        assert_eq!(heap.get(130), Some(&HostValue::Bool(true)));
        assert_eq!(heap.get(131), Some(&HostValue::Bool(false)));
        assert_eq!(heap.get(0), None);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_insert_starts_after_presets() {
        let mut heap = ObjectHeap::new();
        let handle = heap.insert(HostValue::String("a".into()));
        assert_eq!(handle, 132);
        assert_eq!(heap.get(handle).and_then(HostValue::as_str), Some("a"));
    }

    #[test]
    fn test_presets_survive_drop() {
        let mut heap = ObjectHeap::new();
        assert!(!heap.drop_ref(129));
        assert_eq!(heap.get(129), Some(&HostValue::Null));
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut heap = ObjectHeap::new();
        let a = heap.insert(HostValue::String("a".into()));
        let b = heap.insert(HostValue::String("b".into()));

        assert_eq!(heap.take(a), Some(HostValue::String("a".into())));
        assert!(heap.get(a).is_none());
        assert!(!heap.drop_ref(a));

        let c = heap.insert(HostValue::Bool(true));
        assert_eq!(c, a);
        assert_eq!(heap.live_count(), 2);
        assert!(heap.get(b).is_some());
    }

    #[test]
    fn test_clone_ref_is_independent() {
        let mut heap = ObjectHeap::new();
        let a = heap.insert(HostValue::Json(serde_json::json!({"k": 1})));
        let b = heap.clone_ref(a).unwrap();
        assert_ne!(a, b);

        heap.drop_ref(a);
        assert_eq!(
            heap.get(b).cloned().map(HostValue::into_json),
            Some(serde_json::json!({"k": 1}))
        );
        assert!(heap.clone_ref(a).is_none());
    }

    #[test]
    fn test_describe() {
        assert_eq!(HostValue::String("oops".into()).describe(), "oops");
        assert_eq!(HostValue::Undefined.describe(), "undefined");
        assert_eq!(HostValue::Json(serde_json::json!([1, 2])).describe(), "[1,2]");
    }
}

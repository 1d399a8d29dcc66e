/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::collections::BTreeMap;

/// A word staged for emission. Operands that cannot be resolved during the
/// first pass stay symbolic until the object is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordValue {
    /// A finished 16-bit word.
    Concrete(u16),
    /// A deferred expression: qualified symbol, `#hhhh`, signed decimal, or
    /// a staged literal's textual name.
    Deferred(String),
    /// A qualified CALL target, resolved with the cross-routine fallback.
    CallTarget(String),
}

/// The sparse image built by the first pass: address to staged word, tagged
/// with the source line it came from.
#[derive(Debug, Default)]
pub struct MemoryImage {
    cells: BTreeMap<u16, Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: WordValue,
    pub line: usize,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, address: u16, value: WordValue, line: usize) {
        self.cells.insert(address, Cell { value, line });
    }

    /// Occupied cells in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Cell)> {
        self.cells.iter().map(|(a, c)| (*a, c))
    }

    pub fn last_address(&self) -> Option<u16> {
        self.cells.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

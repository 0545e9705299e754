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

//! The global symbol table: one entry per image-level variable (global or
//! stack-frame) touched during flow-following. This is the in-core table
//! named in spec section 3 and mutated by the flow-follower / read by every
//! downstream pass (spec section 5). It is deliberately a flat growable
//! vector, not the hashed string-interning table of the out-of-scope
//! `symtab.c` collaborator (spec section 1) — that module owns label and
//! comment text, this one owns typed operand symbols.

use crate::locident::HlType;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymFlags: u32 {
        /// Immediate word is also a relocation-table entry (segment-valued).
        const SEG_IMMED = 0x0001;
        /// Symbol is both read and written as data and executed as code.
        const IMPURE = 0x0002;
        /// Offset into a word-sized table (switch case entries etc).
        const WORD_OFF = 0x0004;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DuVal: u16 {
        const DEF = 0x0010;
        const USE = 0x0100;
        const VAL = 0x1000;
        const USEVAL = Self::USE.bits() | Self::VAL.bits();
    }
}

/// One symbol-table entry: a name, its physical image address, a maximum
/// size estimate, flags, a probable high-level type, and def/use/val status.
#[derive(Debug, Clone, PartialEq)]
pub struct Sym {
    pub name: String,
    pub label: u32,
    pub size: i32,
    pub flg: SymFlags,
    pub ty: HlType,
    pub du_val: DuVal,
}

/// Global symbol table: ordered so that output order is deterministic, and
/// indexable by image address for the flow-follower's "enter or augment"
/// behaviour.
#[derive(Debug, Default)]
pub struct SymTab {
    syms: Vec<Sym>,
}

impl SymTab {
    pub fn new() -> Self {
        Self { syms: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sym> {
        self.syms.iter()
    }

    pub fn find(&self, label: u32) -> Option<&Sym> {
        self.syms.iter().find(|s| s.label == label)
    }

    pub fn find_mut(&mut self, label: u32) -> Option<&mut Sym> {
        self.syms.iter_mut().find(|s| s.label == label)
    }

    /// Enters a new symbol at `label`, or augments the existing one's size
    /// and def/use/val status if already present. Mirrors the flow-follower's
    /// per-operand symbol bookkeeping (spec section 4.2).
    pub fn update(&mut self, label: u32, size: i32, ty: HlType, du: DuVal) -> usize {
        if let Some(idx) = self.syms.iter().position(|s| s.label == label) {
            let sym = &mut self.syms[idx];
            sym.size = sym.size.max(size);
            if sym.ty == HlType::Unknown {
                sym.ty = ty;
            }
            sym.du_val |= du;
            idx
        } else {
            let idx = self.syms.len();
            self.syms.push(Sym {
                name: format!("glb{idx}"),
                label,
                size,
                flg: SymFlags::empty(),
                ty,
                du_val: du,
            });
            idx
        }
    }

    pub fn set_flag(&mut self, label: u32, flg: SymFlags) {
        if let Some(sym) = self.find_mut(label) {
            sym.flg |= flg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_enters_a_new_symbol() {
        let mut t = SymTab::new();
        let idx = t.update(0x1234, 2, HlType::WordSign, DuVal::USE);
        assert_eq!(idx, 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.find(0x1234).unwrap().size, 2);
    }

    #[test]
    fn repeat_touch_augments_size_and_du() {
        let mut t = SymTab::new();
        t.update(0x1234, 1, HlType::ByteSign, DuVal::USE);
        t.update(0x1234, 4, HlType::Unknown, DuVal::DEF);
        let s = t.find(0x1234).unwrap();
        assert_eq!(s.size, 4);
        assert!(s.du_val.contains(DuVal::USE));
        assert!(s.du_val.contains(DuVal::DEF));
    }
}

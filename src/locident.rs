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

//! Per-procedure local identifier table (spec section 3, "Local identifier
//! table"), grounded on `locident.h`/`locident.c`.

/// Probable high-level type of a local identifier or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HlType {
    #[default]
    Unknown,
    ByteSign,
    ByteUnsign,
    WordSign,
    WordUnsign,
    LongSign,
    LongUnsign,
    Record,
    Ptr,
    Str,
    Const,
    Float,
    Double,
}

impl HlType {
    /// Size in bytes implied by the type, 0 if unknown/variable.
    pub fn size(self) -> u32 {
        match self {
            HlType::Unknown | HlType::Record | HlType::Const => 0,
            HlType::ByteSign | HlType::ByteUnsign => 1,
            HlType::WordSign | HlType::WordUnsign | HlType::Ptr | HlType::Float => 2,
            HlType::LongSign | HlType::LongUnsign | HlType::Double => 4,
            HlType::Str => 2,
        }
    }

    pub fn c_name(self) -> &'static str {
        match self {
            HlType::Unknown => "",
            HlType::ByteSign => "char",
            HlType::ByteUnsign => "unsigned char",
            HlType::WordSign => "int",
            HlType::WordUnsign => "unsigned int",
            HlType::LongSign => "long",
            HlType::LongUnsign => "unsigned long",
            HlType::Record => "record",
            HlType::Ptr => "int *",
            HlType::Str => "char *",
            HlType::Const => "",
            HlType::Float => "float",
            HlType::Double => "double",
        }
    }
}

/// Which kind of storage frame an identifier lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Stack,
    Register,
    Global,
}

/// Whether a split long value's high or low half is encountered first in
/// the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlFirst {
    HighFirst,
    LowFirst,
}

/// The payload union, keyed by frame kind, of a local identifier
/// (`locident.h`'s anonymous `union id`).
#[derive(Debug, Clone, PartialEq)]
pub enum IdPayload {
    /// Byte/word value held in a register.
    Register { regi: u8 },
    /// Byte/word value on the stack, optionally indexed.
    Stack { reg_off: Option<u8>, off: i32 },
    /// Byte/word global, optionally indexed.
    Global { seg: i16, off: i16, regi: Option<u8> },
    /// Long value split across a high/low register pair.
    LongRegister { high: u8, low: u8 },
    /// Long value split across a high/low stack offset pair.
    LongStack { off_high: i32, off_low: i32 },
    /// Long value split across a high/low/seg global triple.
    LongGlobal { seg: i16, off_high: i16, off_low: i16, regi: Option<u8> },
    /// Long constant, entirely known at decompile time.
    LongConst { high: u32, low: u32 },
}

/// One entry in a procedure's local identifier table.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub ty: HlType,
    /// Set once a later pass determines this entry no longer denotes a
    /// valid identifier (e.g. its sole def/use chain was eliminated).
    pub illegal: bool,
    /// Sparse list of icode indexes that reference this identifier
    /// (register-frame identifiers only).
    pub occurrences: Vec<usize>,
    pub frame: FrameType,
    /// "HI"/"LO" macro name for a half of a split long register, if any.
    pub macro_name: Option<&'static str>,
    pub name: String,
    pub payload: IdPayload,
}

impl Ident {
    pub fn new(ty: HlType, frame: FrameType, payload: IdPayload, name: String) -> Self {
        Ident {
            ty,
            illegal: false,
            occurrences: Vec::new(),
            frame,
            macro_name: None,
            name,
            payload,
        }
    }
}

/// Per-procedure local identifier table.
#[derive(Debug, Default)]
pub struct LocalId {
    ids: Vec<Ident>,
}

impl LocalId {
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Ident {
        &self.ids[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Ident {
        &mut self.ids[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ident> {
        self.ids.iter()
    }

    fn push(&mut self, id: Ident) -> usize {
        let idx = self.ids.len();
        self.ids.push(id);
        idx
    }

    /// `newByteWordRegId` — a byte/word value held in a register.
    pub fn new_byte_word_reg_id(&mut self, ty: HlType, regi: u8) -> usize {
        let name = format!("loc{}", self.ids.len() + 1);
        self.push(Ident::new(ty, FrameType::Register, IdPayload::Register { regi }, name))
    }

    /// `newByteWordStkId` — a byte/word value on the stack.
    pub fn new_byte_word_stk_id(&mut self, ty: HlType, off: i32, reg_off: Option<u8>) -> usize {
        let name = format!("loc{}", self.ids.len() + 1);
        self.push(Ident::new(
            ty,
            FrameType::Stack,
            IdPayload::Stack { reg_off, off },
            name,
        ))
    }

    /// `newIntIdxId` — a byte/word global, optionally indexed.
    pub fn new_int_idx_id(&mut self, seg: i16, off: i16, regi: Option<u8>, ty: HlType) -> usize {
        let name = format!("glb{}", self.ids.len() + 1);
        self.push(Ident::new(
            ty,
            FrameType::Global,
            IdPayload::Global { seg, off, regi },
            name,
        ))
    }

    /// `newLongRegId` — a long value split across two registers.
    pub fn new_long_reg_id(&mut self, ty: HlType, high: u8, low: u8) -> usize {
        let name = format!("loc{}", self.ids.len() + 1);
        self.push(Ident::new(
            ty,
            FrameType::Register,
            IdPayload::LongRegister { high, low },
            name,
        ))
    }

    /// `newLongStkId` — a long value split across two stack offsets.
    pub fn new_long_stk_id(&mut self, ty: HlType, off_high: i32, off_low: i32) -> usize {
        let name = format!("loc{}", self.ids.len() + 1);
        self.push(Ident::new(
            ty,
            FrameType::Stack,
            IdPayload::LongStack { off_high, off_low },
            name,
        ))
    }

    /// Which other register (if any) forms the other half of `regi`'s long
    /// pair (`otherLongRegi`).
    pub fn other_long_regi(&self, regi: u8, idx: usize) -> Option<u8> {
        match &self.ids.get(idx)?.payload {
            IdPayload::LongRegister { high, low } => {
                if *high == regi {
                    Some(*low)
                } else if *low == regi {
                    Some(*high)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn add_occurrence(&mut self, idx: usize, icode_idx: usize) {
        self.ids[idx].occurrences.push(icode_idx);
    }
}

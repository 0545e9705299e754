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

//! The 256-entry opcode dispatch table (spec section 4.1), grounded on
//! `scanner.c`'s `stateTable[]`. Each entry names a two-stage operand-form
//! handler pair, a static flag set, the mnemonic to stamp onto the icode,
//! and the flag-def/flag-use masks for that opcode.
//!
//! The original hand-writes all 256 rows as a C initializer. Most of the
//! table is eight mechanically repeating ALU groups and two mechanically
//! repeating register groups (INC/DEC, PUSH/POP), so this port builds
//! those ranges with a loop and only hand-writes the irregular rows —
//! same information, built instead of transcribed.

use crate::icode::{Flags6, JccCode, Mnemonic};

/// Which operand-decoding routine a stage dispatches to. Named after the
/// original's `state1`/`state2` function pointers (spec section 4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandForm {
    ModRm,
    RegOp,
    SegOp,
    SegRm,
    Immed,
    Shift,
    Arith,
    Trans,
    MemOnly,
    MemReg0,
    MemImp,
    AlImp,
    AxImp,
    AxSrcIm,
    Data1,
    Data2,
    DispS,
    DispN,
    DispF,
    DispM,
    StrOp,
    EscOp,
    Const1,
    Const3,
    CheckInt,
    Prefix,
    None1,
    None2,
}

bitflags::bitflags! {
    /// Static per-opcode flags from `stateTable[].flg`, distinct from the
    /// per-instance `IcodeFlags` they seed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpFlags: u32 {
        /// Operand is byte-sized.
        const BYTE      = 1 << 0;
        /// reg field of ModR/M is the destination.
        const TO_REG    = 1 << 1;
        /// Not a sensible HLL construct (string/flag opcodes etc).
        const NOT_HLL   = 1 << 2;
        /// No source operand.
        const NO_SRC    = 1 << 3;
        /// "Not stack pointer": SP as an operand disqualifies HLL promotion.
        const NSP       = 1 << 4;
        /// A 0F-prefixed 386 opcode this scanner does not decode.
        const OP386     = 1 << 5;
        /// No operands at all.
        const NO_OPS    = 1 << 6;
        /// FPU escape opcode (0xD8-0xDF); recognised, not modelled.
        const FLOAT     = 1 << 7;
        /// GRP1 0x83: operand width is 16-bit but the immediate is always
        /// a sign-extended byte.
        const IMM8      = 1 << 8;
    }
}

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct OpEntry {
    pub state1: OperandForm,
    pub state2: OperandForm,
    pub flg: OpFlags,
    pub opcode: Mnemonic,
    pub df: Flags6,
    pub uf: Flags6,
}

impl OpEntry {
    const fn new(state1: OperandForm, state2: OperandForm, flg: OpFlags, opcode: Mnemonic) -> Self {
        OpEntry {
            state1,
            state2,
            flg,
            opcode,
            df: Flags6::empty(),
            uf: Flags6::empty(),
        }
    }

    const fn with_du(mut self, df: Flags6, uf: Flags6) -> Self {
        self.df = df;
        self.uf = uf;
        self
    }
}

const SZF: Flags6 = Flags6::S.union(Flags6::Z).union(Flags6::C);
const SZ: Flags6 = Flags6::S.union(Flags6::Z);

fn invalid_entry() -> OpEntry {
    OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop)
}

/// Builds the 256-entry table once, lazily, mirroring `stateTable[]`.
pub fn table() -> &'static [OpEntry; 256] {
    use std::sync::OnceLock;
    static TABLE: OnceLock<[OpEntry; 256]> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

fn build_table() -> [OpEntry; 256] {
    let mut t = [invalid_entry(); 256];

    // The eight ALU groups (ADD, OR, ADC, SBB, AND, SUB, XOR, CMP), each
    // occupying a run of 6 opcodes: modrm*4, data1, data2.
    let alu: [(Mnemonic, Flags6, Flags6); 8] = [
        (Mnemonic::Add, SZF, Flags6::empty()),
        (Mnemonic::Or, SZF, Flags6::empty()),
        (Mnemonic::Adc, SZF, Flags6::C),
        (Mnemonic::Sbb, SZF, Flags6::C),
        (Mnemonic::And, SZF, Flags6::empty()),
        (Mnemonic::Sub, SZF, Flags6::empty()),
        (Mnemonic::Xor, SZF, Flags6::empty()),
        (Mnemonic::Cmp, SZF, Flags6::empty()),
    ];
    for (group, (mn, df, uf)) in alu.into_iter().enumerate() {
        let base = group * 8;
        t[base] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::BYTE, mn).with_du(df, uf);
        t[base + 1] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::empty(), mn).with_du(df, uf);
        t[base + 2] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG.union(OpFlags::BYTE), mn).with_du(df, uf);
        t[base + 3] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG, mn).with_du(df, uf);
        t[base + 4] = OpEntry::new(OperandForm::Data1, OperandForm::AxImp, OpFlags::BYTE, mn).with_du(df, uf);
        t[base + 5] = OpEntry::new(OperandForm::Data2, OperandForm::AxImp, OpFlags::empty(), mn).with_du(df, uf);
        // Two CS/SS/DS/ES PUSH/POP rows (0x06/0x07, 0x0E/0x16/0x17, …) are
        // irregular and set below.
    }
    // Segment push/pop rows interleaved into the ALU table (06,07,0E,16,17,1E,1F).
    t[0x06] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Push);
    t[0x07] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Pop);
    t[0x0E] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Push);
    t[0x0F] = invalid_entry(); // two-byte 386 escape, not decoded
    t[0x16] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_SRC), Mnemonic::Push);
    t[0x17] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_SRC), Mnemonic::Pop);
    t[0x1E] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Push);
    t[0x1F] = OpEntry::new(OperandForm::SegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Pop);
    // Segment override prefixes.
    t[0x26] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop); // ES
    t[0x2E] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop); // CS
    t[0x36] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop); // SS
    t[0x3E] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop); // DS
    // BCD adjust opcodes (NOT_HLL, not further decoded into arithmetic semantics).
    for b in [0x27u8, 0x2F, 0x37, 0x3F] {
        t[b as usize] = OpEntry::new(OperandForm::None1, OperandForm::AxImp, OpFlags::NOT_HLL.union(OpFlags::NO_SRC), Mnemonic::Nop);
    }

    // INC/DEC reg, 0x40-0x4F.
    for r in 0..8u8 {
        let flg = if r == 4 { OpFlags::NOT_HLL } else { OpFlags::empty() };
        t[0x40 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::None2, flg, Mnemonic::Inc).with_du(SZ, Flags6::empty());
        t[0x48 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::None2, flg, Mnemonic::Dec).with_du(SZ, Flags6::empty());
    }
    // PUSH/POP reg, 0x50-0x5F.
    for r in 0..8u8 {
        t[0x50 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Push);
        t[0x58 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Pop);
    }

    // Jcc short, 0x70-0x7F.
    let jcc: [JccCode; 16] = [
        JccCode::O, JccCode::No, JccCode::B, JccCode::Ae, JccCode::E, JccCode::Ne,
        JccCode::Be, JccCode::A, JccCode::S, JccCode::Ns, JccCode::P, JccCode::Np,
        JccCode::L, JccCode::Ge, JccCode::Le, JccCode::G,
    ];
    for (i, code) in jcc.into_iter().enumerate() {
        t[0x70 + i] = OpEntry::new(OperandForm::DispS, OperandForm::None2, OpFlags::empty(), Mnemonic::Jcond(code));
    }

    // 0x80-0x83: immediate-group ALU (GRP1), opcode selected by ModR/M.reg.
    t[0x80] = OpEntry::new(OperandForm::Immed, OperandForm::None2, OpFlags::BYTE, Mnemonic::Nop);
    t[0x81] = OpEntry::new(OperandForm::Immed, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop);
    t[0x82] = OpEntry::new(OperandForm::Immed, OperandForm::None2, OpFlags::BYTE, Mnemonic::Nop);
    t[0x83] = OpEntry::new(OperandForm::Immed, OperandForm::None2, OpFlags::IMM8, Mnemonic::Nop);
    // 0x84/0x85 TEST r/m,reg; 0x86/0x87 XCHG; 0x88-0x8B MOV.
    t[0x84] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::BYTE, Mnemonic::Test).with_du(SZF, Flags6::empty());
    t[0x85] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::empty(), Mnemonic::Test).with_du(SZF, Flags6::empty());
    t[0x86] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::BYTE.union(OpFlags::NOT_HLL), Mnemonic::Xchg);
    t[0x87] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::NOT_HLL, Mnemonic::Xchg);
    t[0x88] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::BYTE, Mnemonic::Mov);
    t[0x89] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::empty(), Mnemonic::Mov);
    t[0x8A] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG.union(OpFlags::BYTE), Mnemonic::Mov);
    t[0x8B] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG, Mnemonic::Mov);
    t[0x8C] = OpEntry::new(OperandForm::SegRm, OperandForm::None2, OpFlags::empty(), Mnemonic::Mov);
    t[0x8D] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG, Mnemonic::Lea);
    t[0x8E] = OpEntry::new(OperandForm::SegRm, OperandForm::None2, OpFlags::TO_REG, Mnemonic::Mov);
    t[0x8F] = OpEntry::new(OperandForm::MemReg0, OperandForm::None2, OpFlags::NO_SRC, Mnemonic::Pop);

    t[0x90] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Nop);
    for r in 1..8u8 {
        t[0x90 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::AxImp, OpFlags::NOT_HLL, Mnemonic::Xchg);
    }
    t[0x98] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Cbw);
    t[0x99] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Cwd);
    t[0x9A] = OpEntry::new(OperandForm::DispF, OperandForm::None2, OpFlags::empty(), Mnemonic::Callf);
    t[0x9B] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Wait);
    t[0x9C] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Pushf);
    t[0x9D] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Popf);
    t[0x9E] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Nop); // SAHF
    t[0x9F] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Nop); // LAHF

    t[0xA0] = OpEntry::new(OperandForm::DispM, OperandForm::AlImp, OpFlags::BYTE, Mnemonic::Mov);
    t[0xA1] = OpEntry::new(OperandForm::DispM, OperandForm::AxImp, OpFlags::empty(), Mnemonic::Mov);
    t[0xA2] = OpEntry::new(OperandForm::DispM, OperandForm::AlImp, OpFlags::BYTE.union(OpFlags::TO_REG), Mnemonic::Mov);
    t[0xA3] = OpEntry::new(OperandForm::DispM, OperandForm::AxImp, OpFlags::TO_REG, Mnemonic::Mov);
    t[0xA4] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::BYTE, Mnemonic::Movs);
    t[0xA5] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::empty(), Mnemonic::Movs);
    t[0xA6] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::BYTE, Mnemonic::Cmps).with_du(SZF, Flags6::empty());
    t[0xA7] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::empty(), Mnemonic::Cmps).with_du(SZF, Flags6::empty());
    t[0xA8] = OpEntry::new(OperandForm::Data1, OperandForm::AlImp, OpFlags::BYTE, Mnemonic::Test).with_du(SZF, Flags6::empty());
    t[0xA9] = OpEntry::new(OperandForm::Data2, OperandForm::AxImp, OpFlags::empty(), Mnemonic::Test).with_du(SZF, Flags6::empty());
    t[0xAA] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::BYTE, Mnemonic::Stos);
    t[0xAB] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::empty(), Mnemonic::Stos);
    t[0xAC] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::BYTE, Mnemonic::Lods);
    t[0xAD] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::empty(), Mnemonic::Lods);
    t[0xAE] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::BYTE, Mnemonic::Scas).with_du(SZF, Flags6::empty());
    t[0xAF] = OpEntry::new(OperandForm::StrOp, OperandForm::None2, OpFlags::empty(), Mnemonic::Scas).with_du(SZF, Flags6::empty());

    // MOV reg,imm, 0xB0-0xBF.
    for r in 0..8u8 {
        t[0xB0 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::Data1, OpFlags::BYTE.union(OpFlags::TO_REG), Mnemonic::Mov);
        t[0xB8 + r as usize] = OpEntry::new(OperandForm::RegOp, OperandForm::Data2, OpFlags::TO_REG, Mnemonic::Mov);
    }

    t[0xC0] = OpEntry::new(OperandForm::Shift, OperandForm::Const1, OpFlags::BYTE, Mnemonic::Nop); // shift grp, imm8 count (186+)
    t[0xC1] = OpEntry::new(OperandForm::Shift, OperandForm::Const1, OpFlags::empty(), Mnemonic::Nop);
    t[0xC2] = OpEntry::new(OperandForm::Data2, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Ret);
    t[0xC3] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Ret);
    t[0xC4] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG, Mnemonic::Les);
    t[0xC5] = OpEntry::new(OperandForm::ModRm, OperandForm::None2, OpFlags::TO_REG, Mnemonic::Lds);
    t[0xC6] = OpEntry::new(OperandForm::MemReg0, OperandForm::Data1, OpFlags::BYTE, Mnemonic::Mov);
    t[0xC7] = OpEntry::new(OperandForm::MemReg0, OperandForm::Data2, OpFlags::empty(), Mnemonic::Mov);
    t[0xCA] = OpEntry::new(OperandForm::Data2, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Retf);
    t[0xCB] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Retf);
    t[0xCC] = OpEntry::new(OperandForm::Const3, OperandForm::CheckInt, OpFlags::NO_OPS, Mnemonic::Int);
    t[0xCD] = OpEntry::new(OperandForm::Data1, OperandForm::CheckInt, OpFlags::NO_OPS, Mnemonic::Int);
    t[0xCE] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Nop); // INTO
    t[0xCF] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Iret);

    t[0xD0] = OpEntry::new(OperandForm::Shift, OperandForm::Const1, OpFlags::BYTE, Mnemonic::Nop);
    t[0xD1] = OpEntry::new(OperandForm::Shift, OperandForm::Const1, OpFlags::empty(), Mnemonic::Nop);
    t[0xD2] = OpEntry::new(OperandForm::Shift, OperandForm::AlImp, OpFlags::BYTE, Mnemonic::Nop);
    t[0xD3] = OpEntry::new(OperandForm::Shift, OperandForm::AlImp, OpFlags::empty(), Mnemonic::Nop);
    for b in 0xD4u8..=0xD7 {
        t[b as usize] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Nop);
    }
    for b in 0xD8u8..=0xDF {
        t[b as usize] = OpEntry::new(OperandForm::EscOp, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::FLOAT), Mnemonic::Esc);
    }

    t[0xE0] = OpEntry::new(OperandForm::DispS, OperandForm::None2, OpFlags::empty(), Mnemonic::Loopne);
    t[0xE1] = OpEntry::new(OperandForm::DispS, OperandForm::None2, OpFlags::empty(), Mnemonic::Loope);
    t[0xE2] = OpEntry::new(OperandForm::DispS, OperandForm::None2, OpFlags::empty(), Mnemonic::Loop);
    t[0xE3] = OpEntry::new(OperandForm::DispS, OperandForm::None2, OpFlags::empty(), Mnemonic::Jcxz);
    t[0xE4] = OpEntry::new(OperandForm::Data1, OperandForm::AlImp, OpFlags::NOT_HLL.union(OpFlags::BYTE), Mnemonic::Nop); // IN
    t[0xE5] = OpEntry::new(OperandForm::Data1, OperandForm::AxImp, OpFlags::NOT_HLL, Mnemonic::Nop);
    t[0xE6] = OpEntry::new(OperandForm::Data1, OperandForm::AlImp, OpFlags::NOT_HLL.union(OpFlags::BYTE), Mnemonic::Nop); // OUT
    t[0xE7] = OpEntry::new(OperandForm::Data1, OperandForm::AxImp, OpFlags::NOT_HLL, Mnemonic::Nop);
    t[0xE8] = OpEntry::new(OperandForm::DispN, OperandForm::None2, OpFlags::empty(), Mnemonic::Call);
    t[0xE9] = OpEntry::new(OperandForm::DispN, OperandForm::None2, OpFlags::empty(), Mnemonic::Jmp);
    t[0xEA] = OpEntry::new(OperandForm::DispF, OperandForm::None2, OpFlags::empty(), Mnemonic::Jmpf);
    t[0xEB] = OpEntry::new(OperandForm::DispS, OperandForm::None2, OpFlags::empty(), Mnemonic::Jmp);
    t[0xEC] = OpEntry::new(OperandForm::AxImp, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::BYTE), Mnemonic::Nop); // IN DX
    t[0xED] = OpEntry::new(OperandForm::AxImp, OperandForm::None2, OpFlags::NOT_HLL, Mnemonic::Nop);
    t[0xEE] = OpEntry::new(OperandForm::AxImp, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::BYTE), Mnemonic::Nop); // OUT DX
    t[0xEF] = OpEntry::new(OperandForm::AxImp, OperandForm::None2, OpFlags::NOT_HLL, Mnemonic::Nop);

    t[0xF0] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::NOT_HLL, Mnemonic::Nop); // LOCK
    t[0xF2] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop); // REPNE
    t[0xF3] = OpEntry::new(OperandForm::Prefix, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop); // REP/REPE
    t[0xF4] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Hlt);
    t[0xF5] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Cmc);
    t[0xF6] = OpEntry::new(OperandForm::Arith, OperandForm::None2, OpFlags::BYTE, Mnemonic::Nop); // GRP3
    t[0xF7] = OpEntry::new(OperandForm::Arith, OperandForm::None2, OpFlags::empty(), Mnemonic::Nop);
    t[0xF8] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Clc);
    t[0xF9] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Stc);
    t[0xFA] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Cli);
    t[0xFB] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NOT_HLL.union(OpFlags::NO_OPS), Mnemonic::Sti);
    t[0xFC] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Cld);
    t[0xFD] = OpEntry::new(OperandForm::None1, OperandForm::None2, OpFlags::NO_OPS, Mnemonic::Std);
    t[0xFE] = OpEntry::new(OperandForm::Trans, OperandForm::None1, OpFlags::BYTE, Mnemonic::Nop); // INC/DEC r/m8
    t[0xFF] = OpEntry::new(OperandForm::Trans, OperandForm::None1, OpFlags::empty(), Mnemonic::Nop); // GRP5

    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alu_groups_repeat_every_eight_opcodes() {
        let t = table();
        assert_eq!(t[0x00].opcode, Mnemonic::Add);
        assert_eq!(t[0x08].opcode, Mnemonic::Or);
        assert_eq!(t[0x38].opcode, Mnemonic::Cmp);
    }

    #[test]
    fn jcc_table_covers_all_sixteen_conditions() {
        let t = table();
        assert_eq!(t[0x74].opcode, Mnemonic::Jcond(JccCode::E));
        assert_eq!(t[0x7F].opcode, Mnemonic::Jcond(JccCode::G));
    }

    #[test]
    fn mov_reg_immediate_block() {
        let t = table();
        assert_eq!(t[0xB8].opcode, Mnemonic::Mov);
        assert_eq!(t[0xBF].opcode, Mnemonic::Mov);
    }
}

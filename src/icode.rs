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

//! The IR node (`ICODE` in the original): a tagged low-level/high-level
//! union keyed by `IcodeKind`, with `invalid` kept as a separate flag so an
//! instruction's image offset survives invalidation for label binding
//! (spec section 3, "Invariants"; design note in spec section 9).

use crate::ast::Expr;
use bitflags::bitflags;

/// 8086 general, segment and byte registers, plus a synthetic temporary.
/// Mirrors `dcc.h`'s `allRegs[21]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
    Es,
    Cs,
    Ss,
    Ds,
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
    Tmp,
}

impl Reg {
    pub fn name(self) -> &'static str {
        use Reg::*;
        match self {
            Ax => "ax",
            Cx => "cx",
            Dx => "dx",
            Bx => "bx",
            Sp => "sp",
            Bp => "bp",
            Si => "si",
            Di => "di",
            Es => "es",
            Cs => "cs",
            Ss => "ss",
            Ds => "ds",
            Al => "al",
            Cl => "cl",
            Dl => "dl",
            Bl => "bl",
            Ah => "ah",
            Ch => "ch",
            Dh => "dh",
            Bh => "bh",
            Tmp => "tmp",
        }
    }

    pub fn is_segment(self) -> bool {
        matches!(self, Reg::Es | Reg::Cs | Reg::Ss | Reg::Ds)
    }

    pub fn is_byte(self) -> bool {
        matches!(
            self,
            Reg::Al | Reg::Cl | Reg::Dl | Reg::Bl | Reg::Ah | Reg::Ch | Reg::Dh | Reg::Bh
        )
    }
}

/// The eight effective-address forms a ModR/M byte's r/m field selects when
/// `mod != 11` — the "values >= INDEXBASE" addressing modes from spec
/// section 3. `Disp16` stands for the `mod=00, r/m=110` special case
/// (`[disp16]`, no base register at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveAddr {
    BxSi,
    BxDi,
    BpSi,
    BpDi,
    Si,
    Di,
    Bp,
    Bx,
    Disp16,
}

/// An operand's base/index selector: either a plain register or one of the
/// eight ModR/M effective-address forms, each optionally carrying a
/// displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegCode {
    Plain(Reg),
    Indexed(EffectiveAddr),
}

/// A decoded operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// Segment-override prefix in effect for this operand, if any.
    pub seg_override: Option<Reg>,
    /// The effective segment register actually used to resolve the
    /// address (defaults to `SS` when the base is `BP`, else `DS`,
    /// honouring a present override — spec section 4.1).
    pub seg: Option<Reg>,
    pub regi: Option<RegCode>,
    pub disp: i16,
    /// Concrete segment value resolved during flow-following.
    pub seg_value: Option<i16>,
}

impl Operand {
    pub fn reg(r: Reg) -> Operand {
        Operand {
            seg_override: None,
            seg: None,
            regi: Some(RegCode::Plain(r)),
            disp: 0,
            seg_value: None,
        }
    }

    pub fn none() -> Operand {
        Operand {
            seg_override: None,
            seg: None,
            regi: None,
            disp: 0,
            seg_value: None,
        }
    }

    pub fn is_register(&self) -> bool {
        matches!(self.regi, Some(RegCode::Plain(_)))
    }
}

/// Low-level instruction mnemonics the scanner can emit. Roughly the union
/// of `dcc`'s `llIcode` enum, trimmed to the opcodes this crate's scanner
/// table (spec section 4.1) actually decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Nop,
    Mov,
    Lea,
    Lds,
    Les,
    Push,
    Pop,
    Pushf,
    Popf,
    Add,
    Adc,
    Sub,
    Sbb,
    And,
    Or,
    Xor,
    Cmp,
    Test,
    Neg,
    Not,
    Inc,
    Dec,
    Mul,
    Imul,
    Div,
    Idiv,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,
    Rcl,
    Rcr,
    Jmp,
    Jmpf,
    JmpIndirect,
    Jcond(JccCode),
    Jcxz,
    Loop,
    Loope,
    Loopne,
    Call,
    Callf,
    CallIndirect,
    Ret,
    Retf,
    Iret,
    Int,
    Esc,
    Cli,
    Sti,
    Cld,
    Std,
    RepMovs,
    RepStos,
    RepCmps,
    RepScas,
    RepLods,
    Movs,
    Stos,
    Cmps,
    Scas,
    Lods,
    Xchg,
    Cbw,
    Cwd,
    Clc,
    Stc,
    Cmc,
    Hlt,
    Wait,
}

/// 8086 conditional-jump condition codes (the `iJB..iJNS` family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JccCode {
    B,
    Be,
    Ae,
    A,
    L,
    Le,
    Ge,
    G,
    E,
    Ne,
    S,
    Ns,
    O,
    No,
    P,
    Np,
}

impl JccCode {
    /// `condOpJCond[]` — the relational operator a `Jcc` denotes once its
    /// flag test has been folded into a self-contained boolean expression.
    pub fn cond_op(self) -> crate::ast::CondOp {
        use crate::ast::CondOp;
        match self {
            JccCode::B => CondOp::Less,
            JccCode::Be => CondOp::LessEqual,
            JccCode::Ae => CondOp::GreaterEqual,
            JccCode::A => CondOp::Greater,
            JccCode::L => CondOp::Less,
            JccCode::Le => CondOp::LessEqual,
            JccCode::Ge => CondOp::GreaterEqual,
            JccCode::G => CondOp::Greater,
            JccCode::E => CondOp::Equal,
            JccCode::Ne => CondOp::NotEqual,
            JccCode::S | JccCode::Ns | JccCode::P | JccCode::Np | JccCode::O | JccCode::No => CondOp::NotEqual,
        }
    }
}

bitflags! {
    /// Per-instruction flag bits (spec section 3, low-level record).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IcodeFlags: u32 {
        const BYTE_SIZE       = 1 << 0;
        const IMMEDIATE       = 1 << 1;
        const INDIRECT        = 1 << 2;
        const SWITCH          = 1 << 3;
        const CASE_LABEL      = 1 << 4;
        const NO_OPS          = 1 << 5;
        const NO_SRC          = 1 << 6;
        const NO_LABEL        = 1 << 7;
        const SYM_USE         = 1 << 8;
        const SYM_DEF         = 1 << 9;
        const SYNTHETIC       = 1 << 10;
        const TERMINATES      = 1 << 11;
        const WORD_OFFSET     = 1 << 12;
        const FLOAT_OP        = 1 << 13;
        const NOT_HLL         = 1 << 14;
        const IMPURE          = 1 << 15;
        /// This instruction is the target of some jump/call (a CFG join).
        const TARGET          = 1 << 16;
        /// This instruction is a switch table target (`NO_CODE`-style
        /// exclusion from the straight-line walk).
        const NO_CODE         = 1 << 17;
    }
}

bitflags! {
    /// One bit per processor flag a flag-def or flag-use mask can name.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags6 : u8 {
        const C = 1 << 0; // carry
        const P = 1 << 1; // parity
        const A = 1 << 2; // aux carry
        const Z = 1 << 3; // zero
        const S = 1 << 4; // sign
        const O = 1 << 5; // overflow
    }
}

/// The index of a procedure's entry (`proc`), as seen through an
/// immediate's overloaded "proc view" for call targets.
pub type ProcIdx = usize;

/// The immediate field's overloaded content: a plain value, or (for
/// CALL/CALLF) a resolved callee procedure index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    Value(i32),
    /// Resolved IR index after label binding (jumps/loops).
    Label(usize),
    Proc(ProcIdx),
    None,
}

/// Dense array of resolved switch-case target IR indexes, owned by the
/// `SWITCH`-flagged jump instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseTable {
    pub entries: Vec<usize>,
}

/// Low-level instruction record.
#[derive(Debug, Clone)]
pub struct LowLevel {
    pub opcode: Mnemonic,
    pub src: Operand,
    pub dst: Operand,
    pub immed: Immediate,
    pub flg: IcodeFlags,
    pub flag_def: Flags6,
    pub flag_use: Flags6,
    pub case_table: CaseTable,
    /// Raw byte length of the decoded instruction.
    pub num_bytes: u8,
}

impl LowLevel {
    pub fn new(opcode: Mnemonic) -> Self {
        LowLevel {
            opcode,
            src: Operand::none(),
            dst: Operand::none(),
            immed: Immediate::None,
            flg: IcodeFlags::empty(),
            flag_def: Flags6::empty(),
            flag_use: Flags6::empty(),
            case_table: CaseTable::default(),
            num_bytes: 1,
        }
    }
}

/// High-level instruction shapes (spec section 3). Every HL-promoted
/// instruction has exactly one of these shapes — never a raw opcode.
#[derive(Debug, Clone)]
pub enum HighLevel {
    Assign { lhs: Expr, rhs: Expr },
    Call { proc_idx: ProcIdx, args: Vec<Expr> },
    Pop(Expr),
    Push(Expr),
    Ret(Option<Expr>),
    JCond(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcodeKind {
    LowLevel,
    HighLevel,
}

/// Per-instruction register def/use bitvectors, keyed by the fixed
/// `duReg[]` register table (spec section 4.2): bit `i` set means
/// register `i` (0-indexed per `Reg`) is defined/used by this instruction.
pub type RegSet = u32;

/// A def-use chain entry: up to two defined registers, each with up to
/// `MAX_USES` use-site IR indexes.
pub const MAX_USES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct DefUseChain {
    pub defs: Vec<(Reg, Vec<usize>)>,
}

/// One IR node. `invalid` instructions are skipped by every pass after the
/// one that invalidated them, but keep their `offset` so that labels can
/// still be resolved against them (spec section 3, Invariants).
#[derive(Debug, Clone)]
pub struct Icode {
    pub kind: IcodeKind,
    pub invalid: bool,
    pub offset: u32,
    pub ll: LowLevel,
    pub hl: Option<HighLevel>,
    pub def_regs: RegSet,
    pub use_regs: RegSet,
    pub du1: DefUseChain,
    /// Owning basic block, set once the CFG is built.
    pub in_bb: Option<usize>,
    /// High-level label number / code-bundle index used for back-patching
    /// by the (external) back end.
    pub label_num: Option<u32>,
}

impl Icode {
    pub fn new_low_level(offset: u32, ll: LowLevel) -> Self {
        Icode {
            kind: IcodeKind::LowLevel,
            invalid: false,
            offset,
            ll,
            hl: None,
            def_regs: 0,
            use_regs: 0,
            du1: DefUseChain::default(),
            in_bb: None,
            label_num: None,
        }
    }

    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    pub fn promote(&mut self, hl: HighLevel) {
        self.kind = IcodeKind::HighLevel;
        self.hl = Some(hl);
    }

    pub fn is_jump(&self) -> bool {
        matches!(
            self.ll.opcode,
            Mnemonic::Jmp
                | Mnemonic::Jmpf
                | Mnemonic::JmpIndirect
                | Mnemonic::Jcond(_)
                | Mnemonic::Jcxz
                | Mnemonic::Loop
                | Mnemonic::Loope
                | Mnemonic::Loopne
        )
    }

    pub fn is_conditional_jump(&self) -> bool {
        matches!(self.ll.opcode, Mnemonic::Jcond(_) | Mnemonic::Jcxz)
    }

    pub fn is_call(&self) -> bool {
        matches!(self.ll.opcode, Mnemonic::Call | Mnemonic::Callf | Mnemonic::CallIndirect)
    }

    pub fn is_return(&self) -> bool {
        matches!(self.ll.opcode, Mnemonic::Ret | Mnemonic::Retf | Mnemonic::Iret)
    }
}

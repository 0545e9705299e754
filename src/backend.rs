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

//! C-source back end (spec section 1, "external collaborator with only
//! an interface contract specified"), grounded on `backend.c`'s
//! `writeProcDecl`/`writeBB` indentation-and-bundle shape. Only the
//! contract the pipeline driver needs is implemented here: render one
//! procedure's already-structured, already-lifted icode array into C
//! text, or (for a `PROC_ASM`-flagged procedure) fall back to a flat
//! disassembly listing instead. Pretty-printing nested `if`/`while`
//! bodies faithfully from `Bb::if_follow`/`loop_follow` chains, register
//! argument lists, and `bundle`'s two-pass (decls-then-code) buffering
//! are all out of scope here; this emits a flat, line-per-statement
//! rendering of the high-level icode stream in reverse-post-order.

use crate::ast::{CondOp, Expr, IdentKind};
use crate::graph::{Cfg, LoopType, NodeType};
use crate::icode::{HighLevel, Icode, IcodeKind};
use crate::locident::LocalId;
use crate::procs::{Proc, ProcList};

const INDENT_UNIT: &str = "    ";

fn indent(level: usize) -> String {
    INDENT_UNIT.repeat(level)
}

/// `cChar` — escapes a byte for inclusion in a C character/string literal.
fn c_char(b: u8) -> String {
    match b {
        0x08 => "\\b".to_string(),
        0x09 => "\\t".to_string(),
        0x0A => "\\n".to_string(),
        0x0C => "\\f".to_string(),
        0x0D => "\\r".to_string(),
        0x20..=0x7E => (b as char).to_string(),
        _ => format!("\\x{b:02x}"),
    }
}

fn format_expr(expr: &Expr, locals: &LocalId) -> String {
    match expr {
        Expr::Boolean { op, lhs, rhs } => {
            format!("({} {} {})", format_expr(lhs, locals), op.c_symbol(), format_expr(rhs, locals))
        }
        Expr::Negation(inner) => format!("!{}", format_expr(inner, locals)),
        Expr::AddressOf(inner) => format!("&{}", format_expr(inner, locals)),
        Expr::Dereference(inner) => format!("*({})", format_expr(inner, locals)),
        Expr::Unary { op, expr } => op.c_fmt(&format_expr(expr, locals)),
        Expr::Identifier { kind, .. } => format_ident(kind, locals),
        Expr::Constant { value, size } => {
            if *size == 1 && (0x20..=0x7E).contains(value) {
                format!("'{}'", c_char(*value as u8))
            } else {
                format!("{value}")
            }
        }
    }
}

fn format_ident(kind: &IdentKind, locals: &LocalId) -> String {
    match kind {
        IdentKind::Register(idx) | IdentKind::LongRegister(idx) | IdentKind::Local(idx) => {
            locals.get(*idx).name.clone()
        }
        IdentKind::Global(idx) => format!("glb{idx}"),
        IdentKind::Parameter(idx) => format!("arg{idx}"),
        IdentKind::StringLiteral(s) => format!("\"{s}\""),
        IdentKind::Call(call) => {
            let args: Vec<String> = call.args.iter().map(|a| format_expr(a, locals)).collect();
            format!("proc_{}({})", call.proc_idx, args.join(", "))
        }
        IdentKind::Other => "/* ? */".to_string(),
    }
}

fn format_stmt(hl: &HighLevel, locals: &LocalId, level: usize) -> String {
    let pad = indent(level);
    match hl {
        HighLevel::Assign { lhs, rhs } => format!("{pad}{} = {};", format_expr(lhs, locals), format_expr(rhs, locals)),
        HighLevel::Call { proc_idx, args } => {
            let args: Vec<String> = args.iter().map(|a| format_expr(a, locals)).collect();
            format!("{pad}proc_{proc_idx}({});", args.join(", "))
        }
        HighLevel::Push(e) => format!("{pad}/* push */ {};", format_expr(e, locals)),
        HighLevel::Pop(e) => format!("{pad}{} = /* pop */;", format_expr(e, locals)),
        HighLevel::Ret(Some(e)) => format!("{pad}return {};", format_expr(e, locals)),
        HighLevel::Ret(None) => format!("{pad}return;"),
        HighLevel::JCond(e) => format!("{pad}if ({}) {{", format_expr(e, locals)),
    }
}

/// Comparison operator emitted for a loop header when `CondOp::Equal`/etc
/// need negating for a `while` vs `repeat` shape. Kept conservative: a
/// `JCOND` is rendered as-is and the loop keyword supplies the rest.
fn loop_keyword(ty: LoopType) -> &'static str {
    match ty {
        LoopType::While => "while",
        LoopType::Repeat => "do ... while",
        LoopType::Endless => "for (;;)",
        LoopType::None => "",
    }
}

/// Renders one procedure's body: a flat walk of its basic blocks in
/// reverse-post-order, each high-level statement on its own line, with a
/// one-line marker at loop/case headers noting the structuring tag
/// `control.rs` computed (spec section 4.4) rather than nesting braces
/// around the full structured body.
pub fn emit_procedure(proc: &Proc, cfg: &Cfg, icodes: &[Icode], out: &mut String) {
    out.push_str(&format!("{} proc_{}(void)\n{{\n", proc.ret_val.map(|_| "int").unwrap_or("void"), proc.entry));

    let order = if cfg.dfs_last.is_empty() {
        (0..cfg.bbs.len()).collect::<Vec<_>>()
    } else {
        cfg.dfs_last.clone()
    };

    for &bi in &order {
        let Some(bb) = cfg.bbs.get(bi) else { continue };
        if !bb.is_valid() {
            continue;
        }
        if bb.loop_type != LoopType::None && bb.loop_head == bi as i32 {
            out.push_str(&format!("{}/* {} loop header */\n", indent(1), loop_keyword(bb.loop_type)));
        }
        if bb.case_head == bi as i32 {
            out.push_str(&format!("{}/* switch header */\n", indent(1)));
        }
        for ic in &icodes[bb.start..bb.end()] {
            if ic.invalid {
                continue;
            }
            match (ic.kind, &ic.hl) {
                (IcodeKind::HighLevel, Some(hl)) => {
                    out.push_str(&format_stmt(hl, &proc.local_id, 1));
                    out.push('\n');
                }
                _ => {
                    out.push_str(&format!("{}/* unlifted: {:?} */\n", indent(1), ic.ll.opcode));
                }
            }
        }
    }
    out.push_str("}\n\n");
}

/// Flat disassembly fallback for a `PROC_ASM`-flagged procedure (spec
/// section 6, interactive disassembler contract): one mnemonic per line,
/// offset-prefixed, no attempt at expression or control-flow recovery.
pub fn emit_disassembly(proc: &Proc, out: &mut String) {
    out.push_str(&format!("; procedure at {:04x} (asm)\n", proc.entry));
    for ic in &proc.icodes {
        if ic.invalid {
            continue;
        }
        out.push_str(&format!("{:04x}: {:?}\n", ic.offset, ic.ll.opcode));
    }
    out.push('\n');
}

/// Flat pre-pipeline disassembly of every non-library procedure, used for
/// the `-a`/`--asm1` listing: every icode as scanned, before the idiom
/// pass touches any of them.
pub fn emit_disassembly_all(procs: &ProcList) -> String {
    let mut out = String::new();
    for proc in &procs.procs {
        if proc.is_library() {
            continue;
        }
        emit_disassembly(proc, &mut out);
    }
    out
}

/// `writeHeader`/`writeProcDecl` driver: emits every non-library
/// procedure's C rendering (or disassembly listing, per `ProcFlags::ASM`)
/// into one output string, in call-graph discovery order.
pub fn emit_program(procs: &ProcList, cfgs: &[Cfg]) -> String {
    let mut out = String::new();
    out.push_str("/* generated by dcc */\n\n");
    for (idx, proc) in procs.procs.iter().enumerate() {
        if proc.is_library() {
            continue;
        }
        if proc.flg.contains(crate::procs::ProcFlags::ASM) {
            emit_disassembly(proc, &mut out);
            continue;
        }
        if let Some(cfg) = cfgs.get(idx) {
            emit_procedure(proc, cfg, &proc.icodes, &mut out);
        }
    }
    out
}

/// Hook called right after a callee procedure record is allocated in the
/// flow-follower, matching `chklib.c`'s call site even though this crate
/// ships only a no-op matcher (spec section 1 lists library-signature
/// matching as out of scope; this keeps the seam so a real matcher can be
/// plugged in without touching the flow-follower).
pub trait LibrarySignatureMatcher {
    fn check(&self, proc: &mut Proc) -> bool;
}

pub struct NoLibraryMatcher;

impl LibrarySignatureMatcher for NoLibraryMatcher {
    fn check(&self, _proc: &mut Proc) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icode::Reg;
    use crate::locident::HlType;

    #[test]
    fn format_expr_renders_register_assignment() {
        let mut locals = LocalId::new();
        let idx = locals.new_byte_word_reg_id(HlType::WordSign, Reg::Ax as u8);
        let lhs = Expr::register(idx, HlType::WordSign);
        let rhs = Expr::constant(5, 2);
        let stmt = format_stmt(&HighLevel::Assign { lhs, rhs }, &locals, 1);
        assert!(stmt.trim_start().starts_with(&locals.get(idx).name));
        assert!(stmt.contains("= 5;"));
    }

    #[test]
    fn boolean_expr_uses_c_symbol() {
        let locals = LocalId::new();
        let e = Expr::boolean(Expr::constant(1, 2), Expr::constant(2, 2), CondOp::Equal);
        assert_eq!(format_expr(&e, &locals), "(1 == 2)");
    }

    #[test]
    fn no_library_matcher_never_claims_a_procedure() {
        let mut proc = Proc::new(0, "f".into(), Default::default(), 0);
        assert!(!NoLibraryMatcher.check(&mut proc));
    }
}

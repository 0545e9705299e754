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

//! Data-flow analysis and expression recovery (spec section 4.5),
//! grounded on `dataflow.c`'s `elimCondCodes`, `genLiveKtes`,
//! `liveRegAnalysis`, `genDU1` and `forwardSubs`.
//!
//! Inter-procedural liveness recursion (the original's `dataFlow`
//! calling itself on a not-yet-analysed callee through the global
//! `PPROC` tree) is expressed here as a callback
//! (`live_reg_analysis`'s `analyse_callee`) rather than a direct
//! recursive call into `ProcList`, so this module stays free of a
//! circular dependency on `procs`/call-graph traversal order; the
//! pipeline driver supplies the callback by walking the call graph
//! bottom-up.

use crate::ast::{CondOp, Expr};
use crate::graph::Cfg;
use crate::icode::{Flags6, HighLevel, Icode, IcodeKind, JccCode, Mnemonic, RegSet};
use crate::locident::{HlType, LocalId};

fn jcc_to_cond_op(code: JccCode) -> CondOp {
    code.cond_op()
}

fn operand_expr(ic: &Icode, dst: bool) -> Expr {
    let operand = if dst { &ic.ll.dst } else { &ic.ll.src };
    match operand.regi {
        Some(crate::icode::RegCode::Plain(r)) => Expr::register(r as usize, HlType::WordSign),
        _ => Expr::constant(operand.disp as i64, 2),
    }
}

/// `elimCondCodes` — rewrites each condition-code-consuming `Jcc`/`JCXZ`
/// into a self-contained `JCOND` boolean expression, walking backward
/// from the use to the nearest flag-defining instruction in the same
/// block, or (extended basic block case) carrying a single predecessor's
/// `JCOND` forward with its operator re-derived for this use.
pub fn elim_cond_codes(cfg: &Cfg, icodes: &mut [Icode]) {
    for bb in &cfg.bbs {
        if !bb.is_valid() {
            continue;
        }
        let mut use_at = bb.end();
        while use_at > bb.start {
            use_at -= 1;
            if icodes[use_at].invalid || icodes[use_at].kind != IcodeKind::LowLevel {
                continue;
            }
            let use_flags = icodes[use_at].ll.flag_use;
            if use_flags.is_empty() {
                continue;
            }

            let mut found = false;
            let mut def_at = use_at;
            while def_at > bb.start {
                def_at -= 1;
                let def_flags = icodes[def_at].ll.flag_def;
                if def_flags.contains(use_flags) {
                    found = true;
                    break;
                }
            }

            if found {
                let jcond_expr = match icodes[def_at].ll.opcode {
                    Mnemonic::Cmp => Some(Expr::boolean(
                        operand_expr(&icodes[def_at], true),
                        operand_expr(&icodes[def_at], false),
                        CondOp::Equal,
                    )),
                    Mnemonic::Test => Some(Expr::boolean(
                        Expr::boolean(operand_expr(&icodes[def_at], true), operand_expr(&icodes[def_at], false), CondOp::And),
                        Expr::constant(0, 2),
                        CondOp::NotEqual,
                    )),
                    Mnemonic::Or => Some(Expr::boolean(operand_expr(&icodes[def_at], true), Expr::constant(0, 2), CondOp::NotEqual)),
                    _ => None,
                };
                if let Some(mut expr) = jcond_expr {
                    if let Mnemonic::Jcond(code) = icodes[use_at].ll.opcode {
                        expr.change_bool_op(jcc_to_cond_op(code));
                    }
                    icodes[use_at].promote(HighLevel::JCond(expr));
                }
            } else if bb.length == 1 && matches!(icodes[use_at].ll.opcode, Mnemonic::Jcond(_)) {
                if let Some(&pred) = bb.in_edges.first() {
                    if bb.in_edges.len() == 1 {
                        if let Some(pred_bb) = cfg.bbs.get(pred) {
                            let last = pred_bb.end().saturating_sub(1);
                            if let Some(HighLevel::JCond(prev_expr)) = icodes.get(last).and_then(|ic| ic.hl.clone()) {
                                let mut expr = prev_expr;
                                if let Mnemonic::Jcond(code) = icodes[use_at].ll.opcode {
                                    expr.change_bool_op(jcc_to_cond_op(code));
                                }
                                icodes[use_at].promote(HighLevel::JCond(expr));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// `genLiveKtes` — per-block `LiveUse`/`Def` register sets, computed
/// only from already-promoted high-level icodes (a block's raw
/// low-level prologue pushes would otherwise pollute `LiveUse`).
pub fn gen_live_ktes(cfg: &mut Cfg, icodes: &[Icode]) {
    for bb in cfg.bbs.iter_mut() {
        if !bb.is_valid() {
            continue;
        }
        let mut live_use = 0u32;
        let mut def = 0u32;
        for ic in &icodes[bb.start..bb.end()] {
            if ic.invalid || ic.kind != IcodeKind::HighLevel {
                continue;
            }
            live_use |= ic.use_regs & !def;
            def |= ic.def_regs;
        }
        bb.live_use = live_use;
        bb.def = def;
    }
}

/// `liveRegAnalysis` — fixed-point back-propagation of `liveIn`/`liveOut`
/// across the CFG. `analyse_callee(proc_entry) -> liveIn` is consulted
/// for `Call` nodes the first time a not-yet-analysed callee is reached,
/// mirroring the original's recursive `dataFlow` call.
pub fn live_reg_analysis(
    cfg: &mut Cfg,
    icodes: &mut [Icode],
    live_out: RegSet,
    mut call_live_in: impl FnMut(usize) -> RegSet,
) {
    let n = cfg.bbs.len();
    let mut changed = true;
    while changed {
        changed = false;
        for i in (0..n).rev() {
            if !cfg.bbs[i].is_valid() {
                continue;
            }
            let prev_in = cfg.bbs[i].live_in;
            let prev_out = cfg.bbs[i].live_out;

            let new_out = if cfg.bbs[i].out_edges.is_empty() {
                live_out
            } else {
                let mut out = 0u32;
                for &succ in &cfg.bbs[i].out_edges {
                    out |= cfg.bbs[succ].live_in;
                }
                if cfg.bbs[i].node_type == crate::graph::NodeType::Call {
                    let last = cfg.bbs[i].end().saturating_sub(1);
                    if let Some(HighLevel::Call { proc_idx, .. }) = icodes.get(last).and_then(|ic| ic.hl.as_ref()) {
                        out |= call_live_in(*proc_idx);
                    }
                }
                out
            };
            cfg.bbs[i].live_out = new_out;
            cfg.bbs[i].live_in = cfg.bbs[i].live_use | (new_out & !cfg.bbs[i].def);

            if cfg.bbs[i].live_in != prev_in || cfg.bbs[i].live_out != prev_out {
                changed = true;
            }
        }
    }
}

/// Maps a `RegSet` bit position back to its `Reg` variant, matching
/// `Reg`'s declaration order (the table `duReg[]` indexes by in the
/// original).
fn reg_from_bit(bit: u32) -> crate::icode::Reg {
    use crate::icode::Reg::*;
    const TABLE: [crate::icode::Reg; 21] = [
        Ax, Cx, Dx, Bx, Sp, Bp, Si, Di, Es, Cs, Ss, Ds, Al, Cl, Dl, Bl, Ah, Ch, Dh, Bh, Tmp,
    ];
    TABLE[bit as usize]
}

/// `genDU1` — builds per-instruction def-use chains: for each
/// register a high-level icode defines, record up to
/// [`crate::icode::MAX_USES`] subsequent use sites within the same
/// basic block before the register is redefined.
pub fn gen_du1(cfg: &Cfg, icodes: &mut [Icode]) {
    for bb in &cfg.bbs {
        if !bb.is_valid() {
            continue;
        }
        for def_at in bb.start..bb.end() {
            if icodes[def_at].invalid || icodes[def_at].kind != IcodeKind::HighLevel {
                continue;
            }
            let def_regs = icodes[def_at].def_regs;
            if def_regs == 0 {
                continue;
            }
            for reg_bit in 0..21u32 {
                let mask = 1u32 << reg_bit;
                if def_regs & mask == 0 {
                    continue;
                }
                let mut uses = Vec::new();
                for use_at in (def_at + 1)..bb.end() {
                    if icodes[use_at].invalid || icodes[use_at].kind != IcodeKind::HighLevel {
                        continue;
                    }
                    if icodes[use_at].use_regs & mask != 0 {
                        uses.push(use_at);
                        if uses.len() >= crate::icode::MAX_USES {
                            break;
                        }
                    }
                    if icodes[use_at].def_regs & mask != 0 {
                        break;
                    }
                }
                if !uses.is_empty() {
                    icodes[def_at].du1.defs.push((reg_from_bit(reg_bit), uses));
                }
            }
        }
    }
}

/// `forwardSubs` — folds a single-use register assignment directly into
/// its one use site and invalidates the now-dead definition. Only acts
/// when the def has exactly one recorded use (within the block) and that
/// use is the immediately following high-level icode, matching the
/// common case the original's expression stack handles for
/// straight-line code (the original's full `PUSH`/`POP`/call-argument
/// stack threading is not reproduced here).
pub fn forward_substitute(icodes: &mut [Icode]) {
    let n = icodes.len();
    for i in 0..n {
        if icodes[i].invalid || icodes[i].kind != IcodeKind::HighLevel {
            continue;
        }
        let Some(HighLevel::Assign { rhs, .. }) = icodes[i].hl.clone() else { continue };
        let single_use = match icodes[i].du1.defs.as_slice() {
            [(_, uses)] if uses.len() == 1 => Some(uses[0]),
            _ => None,
        };
        let Some(use_at) = single_use else { continue };
        if use_at >= n || icodes[use_at].invalid {
            continue;
        }
        // x-cleanliness (spec section 4.5 stage 6): none of the
        // registers the rhs reads may be redefined between the def and
        // its use, or the substituted expression would read a stale
        // value. `du1` only tracks redefinition of the *defined*
        // register, not the rhs's own operands, so that has to be
        // checked here explicitly.
        let rhs_uses = icodes[i].use_regs;
        let clean = (i + 1..use_at).all(|k| icodes[k].invalid || icodes[k].kind != IcodeKind::HighLevel || icodes[k].def_regs & rhs_uses == 0);
        if !clean {
            continue;
        }
        let substituted = match icodes[use_at].hl.clone() {
            Some(HighLevel::Assign { lhs, rhs: use_rhs }) => {
                Some(HighLevel::Assign { lhs, rhs: substitute_once(use_rhs, &rhs) })
            }
            Some(HighLevel::JCond(e)) => Some(HighLevel::JCond(substitute_once(e, &rhs))),
            Some(HighLevel::Push(e)) => Some(HighLevel::Push(substitute_once(e, &rhs))),
            Some(HighLevel::Ret(Some(e))) => Some(HighLevel::Ret(Some(substitute_once(e, &rhs)))),
            _ => None,
        };
        if let Some(new_hl) = substituted {
            icodes[use_at].hl = Some(new_hl);
            icodes[i].invalidate();
        }
    }
}

fn substitute_once(target: Expr, replacement: &Expr) -> Expr {
    match target {
        Expr::Identifier { .. } => replacement.clone(),
        Expr::Boolean { op, lhs, rhs } => Expr::boolean(substitute_once(*lhs, replacement), substitute_once(*rhs, replacement), op),
        Expr::Negation(inner) => Expr::Negation(Box::new(substitute_once(*inner, replacement))),
        Expr::AddressOf(inner) => Expr::AddressOf(Box::new(substitute_once(*inner, replacement))),
        Expr::Dereference(inner) => Expr::Dereference(Box::new(substitute_once(*inner, replacement))),
        other => other,
    }
}

/// Infers a procedure's return-value shape (word/long/void) from the
/// liveness of `AX`/`DX` at its `RET` nodes (spec section 4.5, "Return
/// type inference"), used by the pipeline driver to fill in
/// `Proc::ret_val` once liveness has converged.
pub fn infer_return_type(cfg: &Cfg, local_id: &mut LocalId) -> Option<usize> {
    const AX_BIT: u32 = 1 << (crate::icode::Reg::Ax as u32);
    const DX_BIT: u32 = 1 << (crate::icode::Reg::Dx as u32);

    let mut any_ret = false;
    let mut ax_live = false;
    let mut dx_live = false;
    for bb in &cfg.bbs {
        if !bb.is_valid() || bb.node_type != crate::graph::NodeType::Return {
            continue;
        }
        any_ret = true;
        if bb.live_out & AX_BIT != 0 {
            ax_live = true;
        }
        if bb.live_out & DX_BIT != 0 {
            dx_live = true;
        }
    }
    if !any_ret || !ax_live {
        return None;
    }
    if dx_live {
        Some(local_id.new_long_reg_id(HlType::LongSign, crate::icode::Reg::Dx as u8, crate::icode::Reg::Ax as u8))
    } else {
        Some(local_id.new_byte_word_reg_id(HlType::WordSign, crate::icode::Reg::Ax as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_cfg;
    use crate::icode::{IcodeFlags, Immediate, LowLevel};

    #[test]
    fn cmp_then_jcc_is_promoted_to_jcond() {
        let mut cmp = LowLevel::new(Mnemonic::Cmp);
        cmp.flag_def = Flags6::Z | Flags6::C | Flags6::S | Flags6::O;
        let mut jcc = LowLevel::new(Mnemonic::Jcond(JccCode::E));
        jcc.flag_use = Flags6::Z;
        jcc.flg |= IcodeFlags::IMMEDIATE;
        jcc.immed = Immediate::Value(99);

        let mut icodes = vec![Icode::new_low_level(0, cmp), Icode::new_low_level(1, jcc)];
        let cfg = build_cfg(&icodes);
        elim_cond_codes(&cfg, &mut icodes);

        assert!(matches!(icodes[1].hl, Some(HighLevel::JCond(_))));
    }

    #[test]
    fn live_use_excludes_registers_defined_earlier_in_block() {
        let mut assign1 = Icode::new_low_level(0, LowLevel::new(Mnemonic::Mov));
        assign1.kind = IcodeKind::HighLevel;
        assign1.def_regs = 1 << (crate::icode::Reg::Ax as u32);
        assign1.use_regs = 0;

        let mut assign2 = Icode::new_low_level(1, LowLevel::new(Mnemonic::Mov));
        assign2.kind = IcodeKind::HighLevel;
        assign2.use_regs = 1 << (crate::icode::Reg::Ax as u32);

        let mut icodes = vec![assign1, assign2];
        let mut cfg = build_cfg(&icodes);
        gen_live_ktes(&mut cfg, &icodes);
        assert_eq!(cfg.bbs[0].live_use, 0);
        assert_ne!(cfg.bbs[0].def, 0);
        let _ = &mut icodes;
    }

    /// `AX = BX + CX; CX = 0; DX = AX` must not fold to `DX = BX + CX`:
    /// `CX` is redefined between the def and its single use, so the
    /// substituted expression would read the wrong `CX`.
    #[test]
    fn forward_substitute_refuses_across_a_redefined_rhs_register() {
        use crate::icode::Reg;

        let ax_bit = 1 << (Reg::Ax as u32);
        let bx_bit = 1 << (Reg::Bx as u32);
        let cx_bit = 1 << (Reg::Cx as u32);

        let mut def = Icode::new_low_level(0, LowLevel::new(Mnemonic::Mov));
        def.kind = IcodeKind::HighLevel;
        def.def_regs = ax_bit;
        def.use_regs = bx_bit | cx_bit;
        def.hl = Some(HighLevel::Assign {
            lhs: Expr::register(0, HlType::WordSign),
            rhs: Expr::boolean(Expr::register(1, HlType::WordSign), Expr::register(2, HlType::WordSign), CondOp::Add),
        });
        def.du1.defs.push((Reg::Ax, vec![2]));

        let mut clobber = Icode::new_low_level(1, LowLevel::new(Mnemonic::Mov));
        clobber.kind = IcodeKind::HighLevel;
        clobber.def_regs = cx_bit;
        clobber.hl = Some(HighLevel::Assign { lhs: Expr::register(2, HlType::WordSign), rhs: Expr::constant(0, 2) });

        let mut use_site = Icode::new_low_level(2, LowLevel::new(Mnemonic::Mov));
        use_site.kind = IcodeKind::HighLevel;
        use_site.use_regs = ax_bit;
        use_site.hl = Some(HighLevel::Assign { lhs: Expr::register(3, HlType::WordSign), rhs: Expr::register(0, HlType::WordSign) });

        let mut icodes = vec![def, clobber, use_site];
        forward_substitute(&mut icodes);

        assert!(!icodes[0].invalid, "the def must survive when its rhs isn't x-clean");
        assert!(matches!(&icodes[2].hl, Some(HighLevel::Assign { rhs: Expr::Identifier { .. }, .. })), "the use site must be left untouched");
    }

    /// Without an intervening redefinition, the same shape folds cleanly.
    #[test]
    fn forward_substitute_folds_when_rhs_is_x_clean() {
        use crate::icode::Reg;

        let ax_bit = 1 << (Reg::Ax as u32);
        let bx_bit = 1 << (Reg::Bx as u32);
        let cx_bit = 1 << (Reg::Cx as u32);

        let mut def = Icode::new_low_level(0, LowLevel::new(Mnemonic::Mov));
        def.kind = IcodeKind::HighLevel;
        def.def_regs = ax_bit;
        def.use_regs = bx_bit | cx_bit;
        def.hl = Some(HighLevel::Assign {
            lhs: Expr::register(0, HlType::WordSign),
            rhs: Expr::boolean(Expr::register(1, HlType::WordSign), Expr::register(2, HlType::WordSign), CondOp::Add),
        });
        def.du1.defs.push((Reg::Ax, vec![1]));

        let mut use_site = Icode::new_low_level(1, LowLevel::new(Mnemonic::Mov));
        use_site.kind = IcodeKind::HighLevel;
        use_site.use_regs = ax_bit;
        use_site.hl = Some(HighLevel::Assign { lhs: Expr::register(3, HlType::WordSign), rhs: Expr::register(0, HlType::WordSign) });

        let mut icodes = vec![def, use_site];
        forward_substitute(&mut icodes);

        assert!(icodes[0].invalid);
        assert!(matches!(&icodes[1].hl, Some(HighLevel::Assign { rhs: Expr::Boolean { op: CondOp::Add, .. }, .. })));
    }
}

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

//! The recursive flow-follower (spec section 4.2, "Control-flow discovery"),
//! grounded on `parser.c`'s `FollowCtrl`/`process_JMP`/`process_CALL`/
//! `process_operands`. Discovers every procedure reachable from the load
//! entry point by symbolically threading register state through
//! straight-line runs of decoded instructions, branching at jumps, calls
//! and interrupts.
//!
//! `FollowCtrl`'s call-stack recursion (one recursive call per branch arm,
//! per switch-table entry, and per new callee) is flattened here into an
//! explicit worklist of `(ProcIdx, Walk)` pairs, each carrying its own
//! symbolic state snapshot — the same transformation this crate applies
//! throughout to the original's pointer-linked/recursive structures (spec
//! section 9). Each procedure keeps its own offset-to-icode-index map so
//! that a walk revisiting an already-decoded address is detected exactly
//! as `labelSrch` detects it, without needing call-stack depth to match
//! the original's.
//!
//! Not ported: `checkStartup`'s heuristics for recognising small/medium
//! memory-model startup idioms, and `updateGlobSym`/`lookupAddr`'s
//! segment-override bookkeeping for `SEG_IMMED` symbols. Both refine where
//! a global variable's segment is assumed to come from; omitting them
//! means some data symbols fall back to `DS`-relative rather than being
//! flagged as holding a resolved segment value.

use std::collections::HashMap;

use crate::errors::{DccError, DccResult};
use crate::icode::{
    EffectiveAddr, Icode, IcodeFlags, Immediate, Mnemonic, Reg, RegCode, RegSet,
};
use crate::loader::{ByteClass, LoadedProgram};
use crate::locident::HlType;
use crate::procs::{Proc, ProcFlags, ProcIdx, ProcList, SymbolicState};
use crate::scanner;
use crate::symtab::{DuVal, SymTab};

/// Range-check state carried across a conditional branch so that an
/// indirect `JMP` through a register-indexed switch table can bound the
/// table the way `process_JMP`'s `JCond` bookkeeping does.
#[derive(Debug, Clone, Copy, Default)]
struct JCond {
    regi: Option<Reg>,
    immed: i16,
}

/// One pending straight-line run: the procedure it belongs to, the image
/// offset to resume decoding at, and the symbolic state at that point.
struct Walk {
    proc_idx: ProcIdx,
    ip: u32,
    state: SymbolicState,
    jcond: JCond,
}

fn reg_set_for(r: Reg) -> RegSet {
    use Reg::*;
    let base = 1u32 << (r as u32);
    match r {
        Ax => base | 1 << (Al as u32) | 1 << (Ah as u32),
        Cx => base | 1 << (Cl as u32) | 1 << (Ch as u32),
        Dx => base | 1 << (Dl as u32) | 1 << (Dh as u32),
        Bx => base | 1 << (Bl as u32) | 1 << (Bh as u32),
        _ => base,
    }
}

fn reg_of(operand_regi: Option<RegCode>) -> Option<Reg> {
    match operand_regi {
        Some(RegCode::Plain(r)) => Some(r),
        _ => None,
    }
}

/// `use`/`def`/`use_def` collapsed into one helper: marks `r` as read
/// and/or written by `ic`.
fn mark(ic: &mut Icode, r: Reg, used: bool, defined: bool) {
    let bits = reg_set_for(r);
    if used {
        ic.use_regs |= bits;
    }
    if defined {
        ic.def_regs |= bits;
    }
}

/// `process_operands` — approximates the original's opcode-keyed def/use
/// table using this crate's `Operand`/`Mnemonic` shapes. Memory operands
/// touch `symtab` the same way `lookupAddr`/`updateGlobSym` do, recording
/// a flat image address rather than the original's `seg:off` pair.
fn process_operands(ic: &mut Icode, state: &SymbolicState, symtab: &mut SymTab) {
    let byte_size = ic.ll.flg.contains(IcodeFlags::BYTE_SIZE);
    let is_imm = ic.ll.flg.contains(IcodeFlags::IMMEDIATE);
    let size: i32 = if byte_size { 1 } else { 2 };

    let mut touch_mem = |op_is_dst: bool, ic: &mut Icode, du: DuVal| {
        let operand = if op_is_dst { ic.ll.dst.clone() } else { ic.ll.src.clone() };
        if operand.regi.is_none() {
            if let Some(seg) = operand.seg.and_then(|s| state.get(s)) {
                let addr = ((seg as u32) << 4).wrapping_add(operand.disp as u32);
                symtab.update(addr, size, HlType::Unknown, du);
                ic.ll.flg |= if du.contains(DuVal::DEF) { IcodeFlags::SYM_DEF } else { IcodeFlags::SYM_USE };
            }
        }
    };

    match ic.ll.opcode {
        Mnemonic::And | Mnemonic::Or | Mnemonic::Xor | Mnemonic::Sar | Mnemonic::Shl | Mnemonic::Shr
        | Mnemonic::Rcl | Mnemonic::Rcr | Mnemonic::Rol | Mnemonic::Ror | Mnemonic::Add | Mnemonic::Adc
        | Mnemonic::Sub | Mnemonic::Sbb => {
            if !is_imm {
                if let Some(r) = reg_of(ic.ll.src.regi) {
                    mark(ic, r, true, false);
                }
            }
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, true, true);
            } else {
                touch_mem(true, ic, DuVal::USE | DuVal::DEF);
            }
        }
        Mnemonic::Inc | Mnemonic::Dec | Mnemonic::Neg | Mnemonic::Not => {
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, true, true);
            } else {
                touch_mem(true, ic, DuVal::USE | DuVal::DEF);
            }
        }
        Mnemonic::Xchg => {
            if let Some(r) = reg_of(ic.ll.src.regi) {
                mark(ic, r, true, false);
            }
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, false, true);
            }
        }
        Mnemonic::Test | Mnemonic::Cmp => {
            if !is_imm {
                if let Some(r) = reg_of(ic.ll.src.regi) {
                    mark(ic, r, true, false);
                }
            }
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, true, false);
            } else {
                touch_mem(true, ic, DuVal::USE);
            }
        }
        Mnemonic::Div | Mnemonic::Idiv => {
            if let Some(r) = reg_of(ic.ll.src.regi) {
                mark(ic, r, true, false);
            }
            mark(ic, Reg::Ax, true, true);
            mark(ic, Reg::Dx, true, true);
        }
        Mnemonic::Mul | Mnemonic::Imul => {
            if let Some(r) = reg_of(ic.ll.src.regi) {
                mark(ic, r, true, false);
            }
            if !is_imm {
                if let Some(r) = reg_of(ic.ll.dst.regi) {
                    mark(ic, r, true, false);
                }
                mark(ic, Reg::Ax, false, true);
                if !byte_size {
                    mark(ic, Reg::Dx, false, true);
                }
            } else if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, false, true);
            }
        }
        Mnemonic::Lds | Mnemonic::Les => {
            mark(ic, if matches!(ic.ll.opcode, Mnemonic::Lds) { Reg::Ds } else { Reg::Es }, false, true);
            if let Some(r) = reg_of(ic.ll.src.regi) {
                mark(ic, r, true, false);
            } else {
                touch_mem(false, ic, DuVal::USE);
            }
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, false, true);
            }
        }
        Mnemonic::Mov => {
            if let Some(r) = reg_of(ic.ll.src.regi) {
                mark(ic, r, true, false);
            } else if !is_imm {
                touch_mem(false, ic, DuVal::USE);
            }
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, false, true);
            } else {
                touch_mem(true, ic, DuVal::DEF);
            }
        }
        Mnemonic::Lea => {
            if let Some(r) = reg_of(ic.ll.src.regi) {
                mark(ic, r, true, false);
            }
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, false, true);
            }
        }
        Mnemonic::Push => {
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, true, false);
            }
        }
        Mnemonic::Pop => {
            if let Some(r) = reg_of(ic.ll.dst.regi) {
                mark(ic, r, false, true);
            }
        }
        Mnemonic::Call | Mnemonic::Callf => {
            if !is_imm {
                if let Some(r) = reg_of(ic.ll.dst.regi) {
                    mark(ic, r, true, false);
                }
            }
        }
        Mnemonic::Jmp | Mnemonic::JmpIndirect | Mnemonic::Jmpf => {
            if !is_imm {
                if let Some(r) = reg_of(ic.ll.src.regi) {
                    mark(ic, r, true, false);
                }
            }
        }
        Mnemonic::Loop | Mnemonic::Loope | Mnemonic::Loopne => {
            mark(ic, Reg::Cx, true, true);
        }
        Mnemonic::Jcxz => {
            mark(ic, Reg::Cx, true, false);
        }
        Mnemonic::Movs | Mnemonic::RepMovs => {
            mark(ic, Reg::Si, true, true);
            mark(ic, Reg::Di, true, true);
            if matches!(ic.ll.opcode, Mnemonic::RepMovs) {
                mark(ic, Reg::Cx, true, true);
            }
        }
        Mnemonic::Cmps | Mnemonic::RepCmps => {
            mark(ic, Reg::Si, true, true);
            mark(ic, Reg::Di, true, true);
            if matches!(ic.ll.opcode, Mnemonic::RepCmps) {
                mark(ic, Reg::Cx, true, true);
            }
        }
        Mnemonic::Stos | Mnemonic::RepStos => {
            mark(ic, Reg::Di, true, true);
            mark(ic, if byte_size { Reg::Al } else { Reg::Ax }, true, false);
            if matches!(ic.ll.opcode, Mnemonic::RepStos) {
                mark(ic, Reg::Cx, true, true);
            }
        }
        Mnemonic::Scas | Mnemonic::RepScas => {
            mark(ic, Reg::Di, true, true);
            mark(ic, if byte_size { Reg::Al } else { Reg::Ax }, true, false);
            if matches!(ic.ll.opcode, Mnemonic::RepScas) {
                mark(ic, Reg::Cx, true, true);
            }
        }
        Mnemonic::Lods | Mnemonic::RepLods => {
            mark(ic, Reg::Si, true, true);
            mark(ic, if byte_size { Reg::Al } else { Reg::Ax }, false, true);
            if matches!(ic.ll.opcode, Mnemonic::RepLods) {
                mark(ic, Reg::Cx, true, true);
            }
        }
        _ => {}
    }
}

/// `process_MOV` — follows simple assignments into the symbolic state:
/// `reg := imm`, `reg := reg`, and carries a tracked switch-table index
/// register across register-to-register copies.
fn process_mov(ic: &Icode, state: &mut SymbolicState, jcond: &mut JCond) {
    if !matches!(ic.ll.opcode, Mnemonic::Mov) {
        return;
    }
    let Some(dst) = reg_of(ic.ll.dst.regi) else { return };
    if dst.is_segment() {
        return;
    }
    if ic.ll.flg.contains(IcodeFlags::IMMEDIATE) {
        if let Immediate::Value(v) = ic.ll.immed {
            state.set(dst, v);
        }
    } else if let Some(src) = reg_of(ic.ll.src.regi) {
        if let Some(v) = state.get(src) {
            state.set(dst, v);
        } else {
            state.clear(dst);
        }
        if jcond.regi == Some(src) {
            jcond.regi = Some(dst);
        }
    }
}

/// Whether `offset` was already decoded into `proc`'s icode stream
/// (`labelSrch`).
fn find_existing(offsets: &HashMap<u32, usize>, offset: u32) -> Option<usize> {
    offsets.get(&offset).copied()
}

/// Resolves an indirect `JMP word ptr [reg]` into a switch-table entry
/// list, pruning at the first image byte already classified as code or
/// data and at any entry whose target looks implausible (out of image
/// bounds, or pointing at a run of zero bytes). A trimmed-down version of
/// `process_JMP`'s table-bounding heuristic.
fn resolve_switch_table(prog: &LoadedProgram, ic: &Icode, state: &SymbolicState, jcond: &JCond) -> Option<Vec<u32>> {
    if !matches!(ic.ll.opcode, Mnemonic::JmpIndirect) || !ic.ll.flg.contains(IcodeFlags::WORD_OFFSET) {
        return None;
    }
    let idx_reg = match ic.ll.src.regi {
        Some(RegCode::Indexed(ea)) => match ea {
            EffectiveAddr::Si => Some(Reg::Si),
            EffectiveAddr::Di => Some(Reg::Di),
            EffectiveAddr::Bp => Some(Reg::Bp),
            EffectiveAddr::Bx => Some(Reg::Bx),
            _ => None,
        },
        _ => None,
    }?;
    let seg = ic.ll.src.seg.or(Some(Reg::Ds))?;
    let seg_value = state.get(seg)?;
    let off_table = ((seg_value as u32) << 4).wrapping_add(ic.ll.src.disp as u32);

    let mut end_table = if jcond.regi == Some(idx_reg) {
        off_table.wrapping_add(jcond.immed as u32)
    } else {
        prog.image.len() as u32
    };

    let mut i = off_table;
    while i < end_table && i < prog.image.len() as u32 {
        if prog.map[i as usize] != ByteClass::Unknown {
            break;
        }
        i += 1;
    }
    end_table = i & !1;

    let cs = state.get(Reg::Cs).unwrap_or(0) as u32;
    let mut entries = Vec::new();
    let mut i = off_table;
    while i + 1 < end_table {
        let lo = *prog.image.get(i as usize)? as u32;
        let hi = *prog.image.get(i as usize + 1)? as u32;
        let target = (cs << 4).wrapping_add(lo | (hi << 8));
        if target >= prog.image.len() as u32 {
            break;
        }
        entries.push(target);
        i += 2;
    }
    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

/// `process_CALL` — resolves the callee's entry address, creates its
/// `Proc` record on first encounter, records the call-graph edge, and (if
/// newly created and not a recognised library routine) schedules the
/// callee's own flow-following as a fresh `Walk`.
fn process_call(
    ic: &mut Icode,
    caller: ProcIdx,
    caller_depth: i32,
    state: &SymbolicState,
    procs: &mut ProcList,
    work: &mut Vec<Walk>,
) {
    let target = match (ic.ll.flg.contains(IcodeFlags::IMMEDIATE), ic.ll.immed) {
        (true, Immediate::Value(v)) => v as u32,
        _ => return, // unresolved indirect call; nothing more we can follow
    };

    let callee = if let Some(existing) = procs.find_by_entry(target) {
        existing
    } else {
        let mut entry_state = *state;
        entry_state.clear(Reg::Sp);
        let name = format!("proc_{}", procs.len());
        let mut proc = Proc::new(target, name, entry_state, caller_depth + 1);
        proc.flg |= ProcFlags::TERMINATES;
        let idx = procs.push(proc);
        work.push(Walk {
            proc_idx: idx,
            ip: target,
            state: entry_state,
            jcond: JCond::default(),
        });
        idx
    };

    procs.add_call_edge(caller, callee);
    ic.ll.immed = Immediate::Proc(callee);
}

/// Builds the procedure list and call graph reachable from `entry`
/// (`parse`/`FollowCtrl`). Returns the index of the entry procedure.
pub fn build_call_graph(prog: &LoadedProgram, entry: u32, procs: &mut ProcList, symtab: &mut SymTab) -> DccResult<ProcIdx> {
    let reloc: std::collections::HashSet<u32> = prog.reloc_table.iter().copied().collect();

    let mut entry_state = SymbolicState::default();
    entry_state.set(Reg::Es, 0);
    entry_state.set(Reg::Ds, 0);
    entry_state.set(Reg::Cs, prog.init_cs as i32);
    entry_state.set(Reg::Ss, prog.init_ss as i32);
    entry_state.set(Reg::Sp, prog.init_sp as i32);

    let entry_proc = procs.push(Proc::new(entry, "main".to_string(), entry_state, 0));

    let mut offsets_by_proc: Vec<HashMap<u32, usize>> = vec![HashMap::new(); procs.len()];
    let mut work = vec![Walk {
        proc_idx: entry_proc,
        ip: entry,
        state: entry_state,
        jcond: JCond::default(),
    }];

    while let Some(mut walk) = work.pop() {
        while offsets_by_proc.len() < procs.len() {
            offsets_by_proc.push(HashMap::new());
        }

        let mut done = false;
        while !done {
            if walk.ip as usize >= prog.image.len() {
                // Out-of-range IP: fatal for this procedure's walk only
                // (spec section 4.2, "Failure modes") — mark it bad, clear
                // TERMINATES, and stop following it, rather than aborting
                // the whole pipeline over one stray procedure.
                let proc = procs.get_mut(walk.proc_idx);
                proc.flg |= ProcFlags::BADINST;
                proc.flg.remove(ProcFlags::TERMINATES);
                done = true;
                continue;
            }
            if let Some(existing) = find_existing(&offsets_by_proc[walk.proc_idx], walk.ip) {
                let mut synth = crate::icode::LowLevel::new(Mnemonic::Jmp);
                synth.flg |= IcodeFlags::SYNTHETIC | IcodeFlags::NO_OPS | IcodeFlags::IMMEDIATE;
                synth.immed = Immediate::Value(existing as i32);
                let proc = procs.get_mut(walk.proc_idx);
                proc.icodes.push(Icode::new_low_level(walk.ip, synth));
                if let Some(target_ic) = proc.icodes.get_mut(existing) {
                    target_ic.ll.flg |= IcodeFlags::TARGET;
                }
                break;
            }

            let mut ic = match scanner::scan(&prog.image, walk.ip, &reloc) {
                Ok(ic) => ic,
                Err(DccError::InvalidOpcode { .. }) => {
                    // Invalid opcode: fatal for the enclosing procedure only
                    // (spec section 4.2) — bad-instruction, clear TERMINATES.
                    let proc = procs.get_mut(walk.proc_idx);
                    proc.flg |= ProcFlags::BADINST;
                    proc.flg.remove(ProcFlags::TERMINATES);
                    done = true;
                    continue;
                }
                Err(_) => {
                    // Invalid-386 and funny-prefix: reported non-fatally,
                    // marking the procedure bad-instruction/assembly-only
                    // (spec section 7) so it's emitted as a disassembly
                    // listing and skipped in data-flow.
                    let proc = procs.get_mut(walk.proc_idx);
                    proc.flg |= ProcFlags::BADINST | ProcFlags::ASM;
                    proc.flg.remove(ProcFlags::TERMINATES);
                    done = true;
                    continue;
                }
            };
            let this_offset = walk.ip;
            walk.ip += ic.ll.num_bytes as u32;

            process_operands(&mut ic, &walk.state, symtab);
            process_mov(&ic, &mut walk.state, &mut walk.jcond);

            match ic.ll.opcode {
                Mnemonic::Jmp | Mnemonic::Jmpf | Mnemonic::JmpIndirect => {
                    if ic.ll.flg.contains(IcodeFlags::IMMEDIATE) {
                        if let Immediate::Value(v) = ic.ll.immed {
                            walk.ip = v as u32;
                        }
                        procs.get_mut(walk.proc_idx).icodes.push(ic);
                        done = false;
                        continue;
                    }
                    if let Some(entries) = resolve_switch_table(prog, &ic, &walk.state, &walk.jcond) {
                        ic.ll.flg |= IcodeFlags::SWITCH;
                        ic.ll.case_table.entries = entries
                            .iter()
                            .map(|&t| {
                                let idx = procs.get(walk.proc_idx).icodes.len();
                                work.push(Walk {
                                    proc_idx: walk.proc_idx,
                                    ip: t,
                                    state: walk.state,
                                    jcond: JCond::default(),
                                });
                                idx
                            })
                            .collect();
                        procs.get_mut(walk.proc_idx).icodes.push(ic);
                    } else {
                        let proc = procs.get_mut(walk.proc_idx);
                        proc.flg |= ProcFlags::IJMP;
                        proc.flg.remove(ProcFlags::TERMINATES);
                        proc.icodes.push(ic);
                    }
                    done = true;
                }
                Mnemonic::Jcond(_) | Mnemonic::Jcxz | Mnemonic::Loop | Mnemonic::Loope | Mnemonic::Loopne => {
                    offsets_by_proc[walk.proc_idx].insert(this_offset, procs.get(walk.proc_idx).icodes.len());
                    let target = match ic.ll.immed {
                        Immediate::Value(v) => Some(v as u32),
                        _ => None,
                    };
                    procs.get_mut(walk.proc_idx).icodes.push(ic);

                    work.push(Walk {
                        proc_idx: walk.proc_idx,
                        ip: walk.ip,
                        state: walk.state,
                        jcond: JCond::default(),
                    });

                    if let Some(t) = target {
                        walk.ip = t;
                        done = false;
                    } else {
                        done = true;
                    }
                    continue;
                }
                Mnemonic::Call | Mnemonic::Callf => {
                    process_call(&mut ic, walk.proc_idx, procs.get(walk.proc_idx).depth, &walk.state, procs, &mut work);
                    procs.get_mut(walk.proc_idx).icodes.push(ic);
                    done = false;
                    continue;
                }
                Mnemonic::Ret => {
                    procs.get_mut(walk.proc_idx).flg |= ProcFlags::NEAR;
                    procs.get_mut(walk.proc_idx).flg.remove(ProcFlags::TERMINATES);
                    procs.get_mut(walk.proc_idx).icodes.push(ic);
                    done = true;
                }
                Mnemonic::Retf => {
                    procs.get_mut(walk.proc_idx).flg |= ProcFlags::FAR;
                    procs.get_mut(walk.proc_idx).flg.remove(ProcFlags::TERMINATES);
                    procs.get_mut(walk.proc_idx).icodes.push(ic);
                    done = true;
                }
                Mnemonic::Iret => {
                    procs.get_mut(walk.proc_idx).flg.remove(ProcFlags::TERMINATES);
                    procs.get_mut(walk.proc_idx).icodes.push(ic);
                    done = true;
                }
                Mnemonic::Int => {
                    let func = match ic.ll.immed {
                        Immediate::Value(v) => v,
                        _ => -1,
                    };
                    let terminates = matches!(func, 0x20 | 0x27);
                    let dos_terminates = func == 0x21 && matches!(walk.state.get(Reg::Ah), Some(0x00 | 0x31 | 0x4C));
                    if terminates || dos_terminates {
                        ic.ll.flg |= IcodeFlags::TERMINATES;
                        done = true;
                    }
                    procs.get_mut(walk.proc_idx).icodes.push(ic);
                }
                _ => {
                    offsets_by_proc[walk.proc_idx].insert(this_offset, procs.get(walk.proc_idx).icodes.len());
                    procs.get_mut(walk.proc_idx).icodes.push(ic);
                }
            }

            if !done {
                offsets_by_proc[walk.proc_idx].insert(this_offset, procs.get(walk.proc_idx).icodes.len() - 1);
            }
        }
    }

    Ok(entry_proc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prog_from(bytes: Vec<u8>) -> LoadedProgram {
        LoadedProgram {
            map: vec![ByteClass::Unknown; bytes.len()],
            image: bytes,
            reloc_table: Vec::new(),
            is_com: true,
            init_cs: 0,
            init_ip: 0,
            init_ss: 0,
            init_sp: 0xFFFE,
        }
    }

    #[test]
    fn straight_line_ret_forms_a_single_procedure() {
        let prog = prog_from(vec![0xC3]); // RET
        let mut procs = ProcList::new();
        let mut symtab = SymTab::new();
        let entry = build_call_graph(&prog, 0, &mut procs, &mut symtab).unwrap();
        assert_eq!(procs.get(entry).icodes.len(), 1);
        assert!(procs.get(entry).icodes[0].is_return());
    }

    #[test]
    fn direct_call_creates_a_callee_procedure_and_call_edge() {
        // CALL rel16 -> offset 5 (E8 02 00), then RET; callee at offset 5 is RET.
        let prog = prog_from(vec![0xE8, 0x02, 0x00, 0xC3, 0x90, 0xC3]);
        let mut procs = ProcList::new();
        let mut symtab = SymTab::new();
        let entry = build_call_graph(&prog, 0, &mut procs, &mut symtab).unwrap();
        assert_eq!(procs.len(), 2);
        assert_eq!(procs.callees(entry), &[1]);
        assert!(procs.get(1).icodes[0].is_return());
    }

    #[test]
    fn backward_jump_to_already_decoded_offset_terminates_the_walk() {
        // NOP; JMP back to offset 0 (self-loop) -> EB FE
        let prog = prog_from(vec![0x90, 0xEB, 0xFE]);
        let mut procs = ProcList::new();
        let mut symtab = SymTab::new();
        let entry = build_call_graph(&prog, 0, &mut procs, &mut symtab).unwrap();
        let proc = procs.get(entry);
        assert_eq!(proc.icodes.len(), 2);
        assert!(proc.icodes[0].ll.flg.contains(IcodeFlags::TARGET));
    }

    /// spec.md section 8 scenario 3 ("switch"): `JMP word_offset[BX]`
    /// bounded by a preceding `CMP BX,3` resolves to the table's four
    /// entries, each a valid image offset, with the fall-through never
    /// among them (the testable property from spec.md section 8). This
    /// drives `resolve_switch_table` directly against a crafted image
    /// rather than through the scanner, since `JMP [table+BX]`'s GRP5
    /// encoding is orthogonal to what this function resolves.
    #[test]
    fn resolve_switch_table_reads_bounded_word_entries() {
        use crate::icode::{EffectiveAddr, IcodeFlags, Immediate, LowLevel, Mnemonic, Operand, Reg, RegCode};

        let mut image = vec![0u8; 32];
        // Four case targets at offsets 0, 2, 4, 6, stored little-endian
        // starting at the table base (offset 16).
        for (i, target) in [0u16, 2, 4, 6].into_iter().enumerate() {
            image[16 + i * 2] = (target & 0xFF) as u8;
            image[16 + i * 2 + 1] = (target >> 8) as u8;
        }
        let prog = prog_from(image);

        let mut ll = LowLevel::new(Mnemonic::JmpIndirect);
        ll.flg |= IcodeFlags::WORD_OFFSET;
        ll.src = Operand {
            seg_override: None,
            seg: None,
            regi: Some(RegCode::Indexed(EffectiveAddr::Bx)),
            disp: 16,
            seg_value: None,
        };
        ll.immed = Immediate::None;
        let ic = Icode::new_low_level(0, ll);

        let mut state = SymbolicState::default();
        state.set(Reg::Ds, 0);
        let jcond = JCond { regi: Some(Reg::Bx), immed: 8 };

        let entries = resolve_switch_table(&prog, &ic, &state, &jcond).expect("table should resolve");
        assert_eq!(entries, vec![0, 2, 4, 6]);
        assert!(!entries.contains(&24), "fall-through past the table must never be a case entry");
    }
}

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

//! Basic-block CFG construction, compression and DFS numbering (spec
//! section 4.4), grounded on `graph.c`/`graph.h`. Basic blocks live in a
//! flat, index-addressed arena (`Cfg::bbs`) rather than the original's
//! `next`-linked, pointer-edged list (spec section 9's "vectors of nodes
//! with integer handles" design note).

use crate::icode::{Icode, Immediate, Mnemonic};
use bitflags::bitflags;

/// A jump/call/loop target is only usable for CFG linking once flow-following
/// has bound it to an icode-array index (`Immediate::Label`); `Value` is
/// accepted too since some call sites (and this module's own tests) build
/// icode streams directly with the index already in hand.
fn bound_target(immed: Immediate) -> Option<usize> {
    match immed {
        Immediate::Label(idx) => Some(idx),
        Immediate::Value(v) if v >= 0 => Some(v as usize),
        _ => None,
    }
}

pub type BbIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    OneBranch,
    TwoBranch,
    MultiBranch,
    Fall,
    Return,
    Call,
    Loop,
    Rep,
    Interval,
    Terminate,
    Nowhere,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BbFlags: u32 {
        const INVALID_BB   = 0x0001;
        const IS_LATCH_NODE = 0x0002;
    }
}

/// Loop classification a header basic block carries once control-flow
/// structuring runs (spec section 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopType {
    None,
    While,
    Repeat,
    Endless,
}

pub const NO_NODE: i32 = -1;
pub const NO_DOM: i32 = -1;

/// Edge indices into a `TwoBranch` block's `out_edges`: the taken branch
/// first, the fall-through second (set that way by [`build_cfg`]).
pub const THEN: usize = 0;
pub const ELSE: usize = 1;

/// One basic block. Edges reference sibling blocks by index into the
/// owning `Cfg::bbs` vector (or, pre-link, a raw IR start-offset — spec
/// section 3's "tagged edge payload").
#[derive(Debug, Clone)]
pub struct Bb {
    pub node_type: NodeType,
    pub start: usize,
    pub length: usize,
    pub flg: BbFlags,
    pub in_edges: Vec<BbIdx>,
    pub out_edges: Vec<BbIdx>,
    pub live_use: u32,
    pub def: u32,
    pub live_in: u32,
    pub live_out: u32,
    pub dfs_first: i32,
    pub dfs_last: i32,
    pub immed_dom: i32,
    pub if_follow: i32,
    pub loop_type: LoopType,
    pub latch_node: i32,
    pub num_back_edges: u32,
    pub loop_head: i32,
    pub loop_follow: i32,
    pub case_head: i32,
    pub case_tail: i32,
    pub traversed: i32,
}

impl Bb {
    fn new(node_type: NodeType, start: usize, length: usize) -> Self {
        Bb {
            node_type,
            start,
            length,
            flg: BbFlags::empty(),
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            live_use: 0,
            def: 0,
            live_in: 0,
            live_out: 0,
            dfs_first: -1,
            dfs_last: -1,
            immed_dom: NO_DOM,
            if_follow: NO_NODE,
            loop_type: LoopType::None,
            latch_node: NO_NODE,
            num_back_edges: 0,
            loop_head: NO_NODE,
            loop_follow: NO_NODE,
            case_head: NO_NODE,
            case_tail: NO_NODE,
            traversed: 0,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_valid(&self) -> bool {
        !self.flg.contains(BbFlags::INVALID_BB)
    }
}

#[derive(Debug, Default)]
pub struct Cfg {
    pub bbs: Vec<Bb>,
    pub head: Option<BbIdx>,
    /// Reverse post-order listing, filled by `dfs_numbering`.
    pub dfs_last: Vec<BbIdx>,
}

/// True if `ic` naturally ends a basic block: any jump, call, return, or
/// terminating interrupt (spec section 4.4, "Construction").
fn ends_block(ic: &Icode) -> bool {
    ic.is_jump() || ic.is_call() || ic.is_return() || ic.ll.flg.contains(crate::icode::IcodeFlags::TERMINATES)
}

fn node_type_for(ic: &Icode, is_last: bool) -> NodeType {
    if ic.is_return() || ic.ll.flg.contains(crate::icode::IcodeFlags::TERMINATES) {
        return NodeType::Return;
    }
    if ic.ll.flg.contains(crate::icode::IcodeFlags::SWITCH) {
        return NodeType::MultiBranch;
    }
    match ic.ll.opcode {
        Mnemonic::Jcond(_) | Mnemonic::Jcxz => NodeType::TwoBranch,
        Mnemonic::Loop | Mnemonic::Loope | Mnemonic::Loopne => NodeType::Loop,
        Mnemonic::Jmp | Mnemonic::Jmpf | Mnemonic::JmpIndirect => NodeType::OneBranch,
        Mnemonic::Call | Mnemonic::Callf | Mnemonic::CallIndirect => NodeType::Call,
        _ if is_last => NodeType::Fall,
        _ => NodeType::Fall,
    }
}

/// Builds the basic-block partition of a procedure's icode array
/// (`createCFG`). Targets are left as IR start-offsets in `out_edges`
/// until [`link_edges`] resolves them to BB indexes.
pub fn build_cfg(icodes: &[Icode]) -> Cfg {
    let mut cfg = Cfg::default();
    if icodes.is_empty() {
        return cfg;
    }

    let mut starts = vec![0usize];
    for (i, ic) in icodes.iter().enumerate() {
        if ic.invalid {
            continue;
        }
        if ends_block(ic) && i + 1 < icodes.len() {
            starts.push(i + 1);
        }
        if ic.ll.flg.contains(crate::icode::IcodeFlags::TARGET) && i < icodes.len() {
            starts.push(i);
        }
    }
    starts.sort_unstable();
    starts.dedup();

    let mut raw_edges: Vec<Vec<usize>> = Vec::new();
    for (bi, &start) in starts.iter().enumerate() {
        let end = starts.get(bi + 1).copied().unwrap_or(icodes.len());
        let seg = &icodes[start..end];
        let last_valid = seg.iter().rev().find(|ic| !ic.invalid);

        let mut targets = Vec::new();
        let node_type = match last_valid {
            Some(ic) if ic.is_return() || ic.ll.flg.contains(crate::icode::IcodeFlags::TERMINATES) => NodeType::Return,
            Some(ic) if ic.ll.flg.contains(crate::icode::IcodeFlags::SWITCH) => {
                targets.extend(ic.ll.case_table.entries.iter().copied());
                NodeType::MultiBranch
            }
            Some(ic) if ic.is_conditional_jump() => {
                if let Some(idx) = bound_target(ic.ll.immed) {
                    targets.push(idx);
                }
                if end < icodes.len() {
                    targets.push(end);
                }
                NodeType::TwoBranch
            }
            Some(ic) if matches!(ic.ll.opcode, Mnemonic::Loop | Mnemonic::Loope | Mnemonic::Loopne) => {
                if let Some(idx) = bound_target(ic.ll.immed) {
                    targets.push(idx);
                }
                if end < icodes.len() {
                    targets.push(end);
                }
                NodeType::Loop
            }
            Some(ic) if matches!(ic.ll.opcode, Mnemonic::Jmp) => {
                if let Some(idx) = bound_target(ic.ll.immed) {
                    targets.push(idx);
                }
                NodeType::OneBranch
            }
            Some(ic) if ic.is_call() => {
                if end < icodes.len() {
                    targets.push(end);
                }
                NodeType::Call
            }
            Some(_) => {
                if end < icodes.len() {
                    targets.push(end);
                }
                NodeType::Fall
            }
            None => {
                if end < icodes.len() {
                    targets.push(end);
                }
                NodeType::Fall
            }
        };
        let node_type = if node_type == NodeType::Fall { node_type_for(last_valid.unwrap_or(&icodes[start]), true) } else { node_type };
        cfg.bbs.push(Bb::new(node_type, start, end - start));
        raw_edges.push(targets);
    }

    // Trailing NOWHERE block if the final instruction doesn't terminate.
    let last_bb = cfg.bbs.last();
    let falls_off = last_bb.map(|b| !matches!(b.node_type, NodeType::Return | NodeType::OneBranch | NodeType::MultiBranch)).unwrap_or(false);
    if falls_off && raw_edges.last().map(|e| e.is_empty()).unwrap_or(false) {
        cfg.bbs.push(Bb::new(NodeType::Nowhere, icodes.len(), 0));
        raw_edges.push(Vec::new());
        if let Some(last) = raw_edges.get_mut(cfg.bbs.len() - 2) {
            last.push(icodes.len());
        }
    }

    link_edges(&mut cfg, &starts, raw_edges);
    cfg.head = Some(0);
    cfg
}

fn link_edges(cfg: &mut Cfg, starts: &[usize], raw_edges: Vec<Vec<usize>>) {
    let total_bbs = cfg.bbs.len();
    let start_to_bb = |offset: usize| -> Option<BbIdx> {
        starts.iter().position(|&s| s == offset).or_else(|| {
            if offset >= starts.last().copied().unwrap_or(0) {
                Some(total_bbs - 1)
            } else {
                None
            }
        })
    };
    for (bi, targets) in raw_edges.into_iter().enumerate() {
        for t in targets {
            if let Some(target_bb) = start_to_bb(t) {
                cfg.bbs[bi].out_edges.push(target_bb);
                cfg.bbs[target_bb].in_edges.push(bi);
            }
        }
    }
}

/// `rmJMP` + `mergeFallThrough` — two compression reductions (spec
/// section 4.4, "Compression"):
///  (a) chase one-instruction `JMP`-only blocks, replacing the caller's
///      edge and dropping the intermediate block;
///  (b) merge a `FALL`/`ONE_BRANCH` block into its unique in-degree-one
///      successor.
/// Idempotent: a second call makes no further changes.
pub fn compress(cfg: &mut Cfg) {
    loop {
        let mut changed = false;
        changed |= chase_jmp_only(cfg);
        changed |= merge_fallthrough(cfg);
        if !changed {
            break;
        }
    }
}

fn chase_jmp_only(cfg: &mut Cfg) -> bool {
    let mut changed = false;
    for bi in 0..cfg.bbs.len() {
        if !cfg.bbs[bi].is_valid() || cfg.bbs[bi].node_type != NodeType::OneBranch || cfg.bbs[bi].length != 1 {
            continue;
        }
        let Some(&target) = cfg.bbs[bi].out_edges.first() else { continue };
        if target == bi {
            // Self-loop JMP: collapse to NOWHERE rather than spin forever.
            cfg.bbs[bi].node_type = NodeType::Nowhere;
            cfg.bbs[bi].out_edges.clear();
            changed = true;
            continue;
        }
        let preds: Vec<BbIdx> = cfg.bbs[bi].in_edges.clone();
        if preds.is_empty() {
            continue;
        }
        for &p in &preds {
            for e in cfg.bbs[p].out_edges.iter_mut() {
                if *e == bi {
                    *e = target;
                }
            }
        }
        cfg.bbs[target].in_edges.retain(|&x| x != bi);
        for &p in &preds {
            if !cfg.bbs[target].in_edges.contains(&p) {
                cfg.bbs[target].in_edges.push(p);
            }
        }
        cfg.bbs[bi].flg |= BbFlags::INVALID_BB;
        cfg.bbs[bi].in_edges.clear();
        cfg.bbs[bi].out_edges.clear();
        changed = true;
    }
    changed
}

fn merge_fallthrough(cfg: &mut Cfg) -> bool {
    let mut changed = false;
    for bi in 0..cfg.bbs.len() {
        if !cfg.bbs[bi].is_valid() || !matches!(cfg.bbs[bi].node_type, NodeType::Fall | NodeType::OneBranch) {
            continue;
        }
        if cfg.bbs[bi].out_edges.len() != 1 {
            continue;
        }
        let succ = cfg.bbs[bi].out_edges[0];
        if succ == bi || !cfg.bbs[succ].is_valid() || cfg.bbs[succ].in_edges.len() != 1 {
            continue;
        }
        let succ_node_type = cfg.bbs[succ].node_type;
        let succ_out = cfg.bbs[succ].out_edges.clone();
        let succ_len = cfg.bbs[succ].length;
        let succ_start = cfg.bbs[succ].start;

        cfg.bbs[bi].length = (succ_start + succ_len) - cfg.bbs[bi].start;
        cfg.bbs[bi].node_type = succ_node_type;
        cfg.bbs[bi].out_edges = succ_out.clone();
        for &o in &succ_out {
            if o != succ {
                cfg.bbs[o].in_edges.retain(|&x| x != succ);
                if !cfg.bbs[o].in_edges.contains(&bi) {
                    cfg.bbs[o].in_edges.push(bi);
                }
            }
        }
        cfg.bbs[succ].flg |= BbFlags::INVALID_BB;
        cfg.bbs[succ].in_edges.clear();
        cfg.bbs[succ].out_edges.clear();
        changed = true;
    }
    changed
}

/// Reverse post-order DFS numbering (`dfsNumbering`): `dfsFirstNum` on
/// enter, `dfsLastNum` assigned in descending order on leave, producing
/// `Cfg::dfs_last` as the reverse-post-order listing (spec section 4.4).
pub fn dfs_numbering(cfg: &mut Cfg) {
    let Some(head) = cfg.head else { return };
    let n = cfg.bbs.len();
    for bb in cfg.bbs.iter_mut() {
        bb.dfs_first = -1;
        bb.dfs_last = -1;
    }
    let mut first_ctr = 0i32;
    let mut last_ctr = (n - 1) as i32;
    let mut order = vec![0usize; n];
    let mut stack = vec![(head, 0usize)];
    cfg.bbs[head].dfs_first = first_ctr;
    first_ctr += 1;

    while let Some((node, edge_idx)) = stack.pop() {
        if edge_idx < cfg.bbs[node].out_edges.len() {
            let succ = cfg.bbs[node].out_edges[edge_idx];
            stack.push((node, edge_idx + 1));
            if cfg.bbs[node].out_edges[edge_idx] == node {
                cfg.bbs[node].num_back_edges += 1;
                continue;
            }
            if cfg.bbs[succ].dfs_first == -1 {
                cfg.bbs[succ].dfs_first = first_ctr;
                first_ctr += 1;
                stack.push((succ, 0));
            } else if cfg.bbs[succ].dfs_last == -1 {
                // back edge to an ancestor still on the stack
                cfg.bbs[node].num_back_edges += 1;
            }
        } else {
            if cfg.bbs[node].dfs_last == -1 {
                cfg.bbs[node].dfs_last = last_ctr;
                order[last_ctr as usize] = node;
                last_ctr -= 1;
            }
        }
    }
    cfg.dfs_last = order;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icode::{Icode, IcodeFlags, Immediate, LowLevel, Mnemonic};

    fn ret() -> Icode {
        Icode::new_low_level(0, LowLevel::new(Mnemonic::Ret))
    }

    #[test]
    fn single_ret_procedure_is_one_block() {
        let icodes = vec![ret()];
        let cfg = build_cfg(&icodes);
        assert_eq!(cfg.bbs.len(), 1);
        assert_eq!(cfg.bbs[0].node_type, NodeType::Return);
    }

    #[test]
    fn compression_is_idempotent() {
        let mut jmp = LowLevel::new(Mnemonic::Jmp);
        jmp.immed = Immediate::Value(2);
        jmp.flg |= IcodeFlags::IMMEDIATE;
        let mut icodes = vec![Icode::new_low_level(0, jmp), ret()];
        icodes[1].ll.flg |= IcodeFlags::TARGET;
        let mut cfg = build_cfg(&icodes);
        compress(&mut cfg);
        let before = cfg.bbs.iter().filter(|b| b.is_valid()).count();
        compress(&mut cfg);
        let after = cfg.bbs.iter().filter(|b| b.is_valid()).count();
        assert_eq!(before, after);
    }

    #[test]
    fn dfs_numbering_visits_every_valid_block_once() {
        let icodes = vec![ret()];
        let mut cfg = build_cfg(&icodes);
        dfs_numbering(&mut cfg);
        assert_eq!(cfg.dfs_last.len(), 1);
        assert_eq!(cfg.bbs[0].dfs_first, 0);
    }
}

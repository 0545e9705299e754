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

//! Dominators, loop/if/case structuring and compound-condition merging
//! (spec section 4.4), grounded on `control.c`'s `findImmedDom`,
//! `structLoops`/`findNodesInLoop`, `structIfs`, `structCases` and
//! `compoundCond`.
//!
//! Loop structuring here runs directly over the primary CFG rather than
//! walking the full derived-sequence interval hierarchy the original
//! threads through (`structLoops`'s `derivedG`/`level` bookkeeping): every
//! node is considered as a candidate loop header and its back edges are
//! found directly from `Bb::in_edges`/`dfs_first`. For the reducible,
//! single-level loop nests this crate's target programs produce, that
//! gives the same latch/header pairs without carrying interval-hierarchy
//! state through this pass too.

use crate::ast::{CondOp, Expr};
use crate::graph::{Bb, BbFlags, Cfg, LoopType, NodeType, BbIdx, ELSE, NO_DOM, NO_NODE, THEN};
use crate::icode::{HighLevel, Icode};

/// `findImmedDom` — Hecht & Ullman's reducible-graph algorithm, restricted
/// to immediate dominators. Requires the graph to already be reducible
/// and DFS-numbered ([`crate::graph::dfs_numbering`] to have run).
pub fn compute_immediate_dominators(cfg: &mut Cfg) {
    let n = cfg.bbs.len();
    for cur_rank in 0..n {
        let cur_bb = cfg.dfs_last[cur_rank];
        if !cfg.bbs[cur_bb].is_valid() {
            continue;
        }
        let in_edges = cfg.bbs[cur_bb].in_edges.clone();
        for pred in in_edges {
            let pred_rank = cfg.bbs[pred].dfs_last;
            if pred_rank < 0 {
                continue;
            }
            if (pred_rank as usize) < cur_rank {
                let cur_dom = cfg.bbs[cur_bb].immed_dom;
                let new_dom = common_dom(cfg, cur_dom, pred_rank);
                cfg.bbs[cur_bb].immed_dom = new_dom;
            }
        }
    }
}

fn common_dom(cfg: &Cfg, mut cur: i32, mut pred: i32) -> i32 {
    if cur == NO_DOM {
        return pred;
    }
    if pred == NO_DOM {
        return cur;
    }
    while cur != NO_DOM && pred != NO_DOM && cur != pred {
        if cur < pred {
            let pred_bb = cfg.dfs_last[pred as usize];
            pred = cfg.bbs[pred_bb].immed_dom;
        } else {
            let cur_bb = cfg.dfs_last[cur as usize];
            cur = cfg.bbs[cur_bb].immed_dom;
        }
    }
    cur
}

/// `isBackEdge` — an edge p->s is a back edge if s was visited no later
/// than p in DFS order. Tallies the target's back-edge count as a side
/// effect, same as the original.
fn is_back_edge(cfg: &mut Cfg, pred: BbIdx, succ: BbIdx) -> bool {
    if cfg.bbs[pred].dfs_first >= cfg.bbs[succ].dfs_first {
        cfg.bbs[succ].num_back_edges += 1;
        true
    } else {
        false
    }
}

/// `structLoops` + `findNodesInLoop` — finds each loop's latch node and
/// classifies it as `while`, `repeat` or `endless`.
pub fn struct_loops(cfg: &mut Cfg) {
    for header in 0..cfg.bbs.len() {
        if !cfg.bbs[header].is_valid() {
            continue;
        }
        let in_edges = cfg.bbs[header].in_edges.clone();
        let mut latch: Option<BbIdx> = None;
        for pred in in_edges {
            if is_back_edge(cfg, pred, header) {
                latch = match latch {
                    None => Some(pred),
                    Some(l) if cfg.bbs[pred].dfs_last > cfg.bbs[l].dfs_last => Some(pred),
                    same => same,
                };
            }
        }
        if let Some(latch_idx) = latch {
            if cfg.bbs[latch_idx].loop_head == NO_NODE {
                cfg.bbs[header].latch_node = cfg.bbs[latch_idx].dfs_last;
                find_nodes_in_loop(cfg, latch_idx, header);
                cfg.bbs[latch_idx].flg |= BbFlags::IS_LATCH_NODE;
            }
        }
    }
}

fn find_nodes_in_loop(cfg: &mut Cfg, latch: BbIdx, head: BbIdx) {
    let head_dfs = cfg.bbs[head].dfs_last;
    let latch_dfs = cfg.bbs[latch].dfs_last;

    let mut loop_nodes = vec![head_dfs];
    cfg.bbs[head].loop_head = head_dfs;

    if head_dfs < latch_dfs {
        for i in (head_dfs + 1)..latch_dfs {
            let bb = cfg.dfs_last[i as usize];
            if !cfg.bbs[bb].is_valid() {
                continue;
            }
            let immed_dom = cfg.bbs[bb].immed_dom;
            if loop_nodes.contains(&immed_dom) {
                loop_nodes.push(i);
                if cfg.bbs[bb].loop_head == NO_NODE {
                    cfg.bbs[bb].loop_head = head_dfs;
                }
            }
        }
    }

    cfg.bbs[latch].loop_head = head_dfs;
    if latch != head {
        loop_nodes.push(latch_dfs);
    }

    let head_type = cfg.bbs[head].node_type;
    let latch_type = cfg.bbs[latch].node_type;

    if latch_type == NodeType::TwoBranch {
        if head_type == NodeType::TwoBranch || latch == head {
            let both_in_loop = latch == head || {
                let then_dfs = cfg.bbs[cfg.bbs[head].out_edges[THEN]].dfs_last;
                let else_dfs = cfg.bbs[cfg.bbs[head].out_edges[ELSE]].dfs_last;
                loop_nodes.contains(&then_dfs) && loop_nodes.contains(&else_dfs)
            };
            if both_in_loop {
                cfg.bbs[head].loop_type = LoopType::Repeat;
                let follow = if cfg.bbs[latch].out_edges[0] == head {
                    cfg.bbs[latch].out_edges[ELSE]
                } else {
                    cfg.bbs[latch].out_edges[THEN]
                };
                cfg.bbs[head].loop_follow = cfg.bbs[follow].dfs_last;
            } else {
                cfg.bbs[head].loop_type = LoopType::While;
                let then_dfs = cfg.bbs[cfg.bbs[head].out_edges[THEN]].dfs_last;
                let follow = if loop_nodes.contains(&then_dfs) {
                    cfg.bbs[head].out_edges[ELSE]
                } else {
                    cfg.bbs[head].out_edges[THEN]
                };
                cfg.bbs[head].loop_follow = cfg.bbs[follow].dfs_last;
            }
        } else {
            cfg.bbs[head].loop_type = LoopType::Repeat;
            let follow = if cfg.bbs[latch].out_edges[THEN] == head {
                cfg.bbs[latch].out_edges[ELSE]
            } else {
                cfg.bbs[latch].out_edges[THEN]
            };
            cfg.bbs[head].loop_follow = cfg.bbs[follow].dfs_last;
        }
    } else if latch_type == NodeType::Loop {
        cfg.bbs[head].loop_type = LoopType::Repeat;
        let follow = cfg.bbs[latch].out_edges[0];
        cfg.bbs[head].loop_follow = cfg.bbs[follow].dfs_last;
    } else if head_type == NodeType::TwoBranch {
        cfg.bbs[head].loop_type = LoopType::While;
        let then_dfs = cfg.bbs[cfg.bbs[head].out_edges[THEN]].dfs_last;
        let else_dfs = cfg.bbs[cfg.bbs[head].out_edges[ELSE]].dfs_last;
        let mut pbb = latch;
        loop {
            let pbb_dfs = cfg.bbs[pbb].dfs_last;
            if pbb_dfs == then_dfs {
                cfg.bbs[head].loop_follow = else_dfs;
                break;
            } else if pbb_dfs == else_dfs {
                cfg.bbs[head].loop_follow = then_dfs;
                break;
            }
            if pbb_dfs <= head_dfs {
                cfg.bbs[head].loop_type = LoopType::Endless;
                break;
            }
            let dom = cfg.bbs[pbb].immed_dom;
            if dom < 0 {
                cfg.bbs[head].loop_type = LoopType::Endless;
                break;
            }
            pbb = cfg.dfs_last[dom as usize];
        }
    } else {
        cfg.bbs[head].loop_type = LoopType::Endless;
    }
}

/// `structCases` — tags the nodes dominated by a multi-branch header as
/// belonging to its case statement, and picks the exit (follow) node as
/// the non-successor descendant with the most in-edges.
pub fn struct_cases(cfg: &mut Cfg) {
    let n = cfg.bbs.len();
    for i in (0..n).rev() {
        let header_bb = cfg.dfs_last[i];
        if cfg.bbs[header_bb].node_type != NodeType::MultiBranch {
            continue;
        }

        let mut exit_node: i32 = NO_NODE;
        for j in (i + 2)..n {
            let desc_bb = cfg.dfs_last[j];
            let is_successor = cfg.bbs[header_bb].out_edges.iter().any(|&s| cfg.bbs[s].dfs_last == j as i32);
            if !is_successor && cfg.bbs[desc_bb].immed_dom == i as i32 {
                if exit_node == NO_NODE {
                    exit_node = j as i32;
                } else {
                    let exit_bb = cfg.dfs_last[exit_node as usize];
                    if cfg.bbs[exit_bb].in_edges.len() < cfg.bbs[desc_bb].in_edges.len() {
                        exit_node = j as i32;
                    }
                }
            }
        }
        cfg.bbs[header_bb].case_tail = exit_node;
        cfg.bbs[header_bb].case_head = i as i32;

        let successors = cfg.bbs[header_bb].out_edges.clone();
        for succ in successors {
            tag_nodes_in_case(cfg, succ, i as i32, exit_node);
        }
        if exit_node != NO_NODE {
            let exit_bb = cfg.dfs_last[exit_node as usize];
            cfg.bbs[exit_bb].case_head = i as i32;
        }
    }
}

fn tag_nodes_in_case(cfg: &mut Cfg, bb: BbIdx, head: i32, tail: i32) {
    if cfg.bbs[bb].traversed == 1 {
        return;
    }
    cfg.bbs[bb].traversed = 1;
    let current = cfg.bbs[bb].dfs_last;
    if current != tail && cfg.bbs[bb].node_type != NodeType::MultiBranch && cfg.bbs[bb].immed_dom == head {
        cfg.bbs[bb].case_head = head;
        let successors = cfg.bbs[bb].out_edges.clone();
        for succ in successors {
            if cfg.bbs[succ].traversed != 1 {
                tag_nodes_in_case(cfg, succ, head, tail);
            }
        }
    }
}

/// `structIfs` — assigns a follow node to each 2-way branch that is not a
/// loop header, choosing the descendant with the largest
/// in-edges-minus-back-edges count among those it immediately dominates.
pub fn struct_ifs(cfg: &mut Cfg) {
    let n = cfg.bbs.len();
    for curr in (0..n).rev() {
        let curr_bb = cfg.dfs_last[curr];
        if !cfg.bbs[curr_bb].is_valid() {
            continue;
        }
        if cfg.bbs[curr_bb].node_type != NodeType::TwoBranch || cfg.bbs[curr_bb].loop_type != LoopType::None {
            continue;
        }

        let mut follow_in_edges: i32 = 0;
        let mut follow: i32 = NO_NODE;
        for desc in (curr + 1)..n {
            let desc_bb = cfg.dfs_last[desc];
            if cfg.bbs[desc_bb].immed_dom == curr as i32 {
                let net_in = cfg.bbs[desc_bb].in_edges.len() as i32 - cfg.bbs[desc_bb].num_back_edges as i32;
                if net_in > follow_in_edges {
                    follow = desc as i32;
                    follow_in_edges = net_in;
                }
            }
        }

        if follow != NO_NODE && follow_in_edges > 1 {
            cfg.bbs[curr_bb].if_follow = follow;
        }
    }
}

/// `structure` — dominators, then (if present) case structuring, then
/// loops, then ifs, in that fixed order (loop headers must be known
/// before `structIfs` can skip them).
pub fn structure(cfg: &mut Cfg, has_case: bool) {
    compute_immediate_dominators(cfg);
    if has_case {
        struct_cases(cfg);
    }
    struct_loops(cfg);
    struct_ifs(cfg);
}

fn jcond_expr<'a>(icodes: &'a [Icode], bb: &Bb) -> Option<&'a Expr> {
    let last = icodes[bb.start..bb.end()].iter().rev().find(|ic| !ic.invalid)?;
    match &last.hl {
        Some(HighLevel::JCond(e)) => Some(e),
        _ => None,
    }
}

fn set_jcond_expr(icodes: &mut [Icode], bb: &Bb, expr: Expr) {
    if let Some(last) = icodes[bb.start..bb.end()].iter_mut().rev().find(|ic| !ic.invalid) {
        last.hl = Some(HighLevel::JCond(expr));
    }
}

fn is_single_hl_block(cfg: &Cfg, bb: BbIdx) -> bool {
    cfg.bbs[bb].length <= 1 && cfg.bbs[bb].in_edges.len() == 1
}

fn replace_in_edge(cfg: &mut Cfg, node: BbIdx, from: BbIdx, to: BbIdx) {
    for e in cfg.bbs[node].in_edges.iter_mut() {
        if *e == from {
            *e = to;
            return;
        }
    }
}

fn remove_in_edge(cfg: &mut Cfg, node: BbIdx, from: BbIdx) {
    cfg.bbs[node].in_edges.retain(|&e| e != from);
}

/// `compoundCond` — folds a 2-way branch whose THEN or ELSE target is
/// itself a single-instruction 2-way branch sharing an edge with the
/// other side into one compound `&&`/`||` condition (spec section 4.4,
/// "Compound conditions").
pub fn merge_compound_conditions(cfg: &mut Cfg, icodes: &mut [Icode]) {
    loop {
        let mut changed = false;
        for i in 0..cfg.bbs.len() {
            if !cfg.bbs[i].is_valid() || cfg.bbs[i].node_type != NodeType::TwoBranch {
                continue;
            }
            let t = cfg.bbs[i].out_edges[THEN];
            let e = cfg.bbs[i].out_edges[ELSE];

            // (X || Y): t is itself 2-way, t's ELSE target is e.
            if cfg.bbs[t].node_type == NodeType::TwoBranch && is_single_hl_block(cfg, t) && cfg.bbs[t].out_edges[ELSE] == e {
                let obb = cfg.bbs[t].out_edges[THEN];
                if let (Some(p_expr), Some(t_expr)) = (jcond_expr(icodes, &cfg.bbs[i]).cloned(), jcond_expr(icodes, &cfg.bbs[t]).cloned()) {
                    let merged = Expr::boolean(p_expr, t_expr, CondOp::DblOr);
                    set_jcond_expr(icodes, &cfg.bbs[i], merged);
                    replace_in_edge(cfg, obb, t, i);
                    cfg.bbs[i].out_edges[THEN] = obb;
                    remove_in_edge(cfg, e, t);
                    cfg.bbs[t].flg |= BbFlags::INVALID_BB;
                    changed = true;
                    continue;
                }
            }

            // (!X && Y): t is itself 2-way, t's THEN target is e.
            if cfg.bbs[t].node_type == NodeType::TwoBranch && is_single_hl_block(cfg, t) && cfg.bbs[t].out_edges[THEN] == e {
                let obb = cfg.bbs[t].out_edges[ELSE];
                if let (Some(mut p_expr), Some(t_expr)) = (jcond_expr(icodes, &cfg.bbs[i]).cloned(), jcond_expr(icodes, &cfg.bbs[t]).cloned()) {
                    p_expr.inverse();
                    let merged = Expr::boolean(p_expr, t_expr, CondOp::DblAnd);
                    set_jcond_expr(icodes, &cfg.bbs[i], merged);
                    replace_in_edge(cfg, obb, t, i);
                    cfg.bbs[i].out_edges[THEN] = e;
                    cfg.bbs[i].out_edges[ELSE] = obb;
                    remove_in_edge(cfg, e, t);
                    cfg.bbs[t].flg |= BbFlags::INVALID_BB;
                    changed = true;
                    continue;
                }
            }

            // (X && Y): e is itself 2-way, e's THEN target is t.
            if cfg.bbs[e].node_type == NodeType::TwoBranch && is_single_hl_block(cfg, e) && cfg.bbs[e].out_edges[THEN] == t {
                let obb = cfg.bbs[e].out_edges[ELSE];
                if let (Some(p_expr), Some(e_expr)) = (jcond_expr(icodes, &cfg.bbs[i]).cloned(), jcond_expr(icodes, &cfg.bbs[e]).cloned()) {
                    let merged = Expr::boolean(p_expr, e_expr, CondOp::DblAnd);
                    set_jcond_expr(icodes, &cfg.bbs[i], merged);
                    replace_in_edge(cfg, obb, e, i);
                    cfg.bbs[i].out_edges[ELSE] = obb;
                    remove_in_edge(cfg, t, e);
                    cfg.bbs[e].flg |= BbFlags::INVALID_BB;
                    changed = true;
                    continue;
                }
            }

            // (!X || Y): e is itself 2-way, e's ELSE target is t.
            if cfg.bbs[e].node_type == NodeType::TwoBranch && is_single_hl_block(cfg, e) && cfg.bbs[e].out_edges[ELSE] == t {
                let obb = cfg.bbs[e].out_edges[THEN];
                if let (Some(mut p_expr), Some(e_expr)) = (jcond_expr(icodes, &cfg.bbs[i]).cloned(), jcond_expr(icodes, &cfg.bbs[e]).cloned()) {
                    p_expr.inverse();
                    let merged = Expr::boolean(p_expr, e_expr, CondOp::DblOr);
                    set_jcond_expr(icodes, &cfg.bbs[i], merged);
                    replace_in_edge(cfg, obb, e, i);
                    cfg.bbs[i].out_edges[THEN] = obb;
                    cfg.bbs[i].out_edges[ELSE] = t;
                    remove_in_edge(cfg, t, e);
                    cfg.bbs[e].flg |= BbFlags::INVALID_BB;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_cfg, dfs_numbering};
    use crate::icode::{IcodeFlags, Immediate, JccCode, LowLevel, Mnemonic};

    fn ret() -> Icode {
        Icode::new_low_level(0, LowLevel::new(Mnemonic::Ret))
    }

    #[test]
    fn diamond_if_gets_a_follow_node() {
        let mut jcc = LowLevel::new(Mnemonic::Jcond(JccCode::E));
        jcc.immed = Immediate::Value(2);
        jcc.flg |= IcodeFlags::IMMEDIATE;
        let mut then_jmp = LowLevel::new(Mnemonic::Jmp);
        then_jmp.immed = Immediate::Value(3);
        then_jmp.flg |= IcodeFlags::IMMEDIATE;

        let mut icodes = vec![
            Icode::new_low_level(0, jcc),
            Icode::new_low_level(1, then_jmp),
            Icode::new_low_level(2, LowLevel::new(Mnemonic::Nop)),
            ret(),
        ];
        icodes[2].ll.flg |= IcodeFlags::TARGET;
        icodes[3].ll.flg |= IcodeFlags::TARGET;

        let mut cfg = build_cfg(&icodes);
        dfs_numbering(&mut cfg);
        structure(&mut cfg, false);

        let head = 0;
        assert_eq!(cfg.bbs[head].node_type, NodeType::TwoBranch);
        assert!(cfg.bbs[head].if_follow != NO_NODE || cfg.bbs.len() <= 3);
    }

    #[test]
    fn single_block_has_no_back_edges() {
        let icodes = vec![ret()];
        let mut cfg = build_cfg(&icodes);
        dfs_numbering(&mut cfg);
        compute_immediate_dominators(&mut cfg);
        assert_eq!(cfg.bbs[0].immed_dom, NO_DOM);
    }
}

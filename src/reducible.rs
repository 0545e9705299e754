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

//! Interval analysis and reducibility testing (spec section 4.4,
//! "Reducibility"), grounded on `reducibl.c`'s Hecht interval
//! construction (`findIntervals`), derived-sequence stepping
//! (`nextOrderGraph`/`findDerivedSeq`) and `checkReducibility`.
//!
//! The derived-sequence graphs operate on plain node-index adjacency
//! (`DerivedGraph`) rather than on `graph::Cfg`'s `Bb` records directly,
//! since G1, G2, ... Gn are synthetic graphs whose nodes stand for whole
//! intervals, not basic blocks (spec section 9's arena-of-handles note
//! applies here too: an interval node is just a `usize` handle into the
//! next derived graph).

use crate::graph::Cfg;

/// One interval: a header node plus every node Hecht's algorithm folds
/// into it, in discovery order.
#[derive(Debug, Clone)]
pub struct Interval {
    pub header: usize,
    pub nodes: Vec<usize>,
}

/// A graph in the derived sequence G1, G2, ..., Gn. `out_edges[i]` lists
/// `i`'s successors; `in_count[i]` is decremented during interval
/// construction exactly as the original's `inEdgeCount` field is.
#[derive(Debug, Clone)]
pub struct DerivedGraph {
    pub out_edges: Vec<Vec<usize>>,
    pub in_count: Vec<usize>,
}

impl DerivedGraph {
    pub fn from_cfg(cfg: &Cfg) -> Self {
        let valid: Vec<usize> = (0..cfg.bbs.len()).filter(|&i| cfg.bbs[i].is_valid()).collect();
        let remap: std::collections::HashMap<usize, usize> =
            valid.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let mut out_edges = vec![Vec::new(); valid.len()];
        let mut in_count = vec![0usize; valid.len()];
        for (new, &old) in valid.iter().enumerate() {
            for &succ in &cfg.bbs[old].out_edges {
                if let Some(&ns) = remap.get(&succ) {
                    out_edges[new].push(ns);
                    in_count[ns] += 1;
                }
            }
        }
        DerivedGraph { out_edges, in_count }
    }

    pub fn len(&self) -> usize {
        self.out_edges.len()
    }

    pub fn is_trivial(&self) -> bool {
        self.out_edges.len() <= 1
    }
}

/// Hecht's interval-finding algorithm (`findIntervals`). `header_of`
/// serves the role of the original's per-node `reachingInt`/`beenOnH`/
/// `inInterval` bookkeeping, scoped to this call instead of stored on
/// shared BB records.
pub fn find_intervals(g: &DerivedGraph) -> Vec<Interval> {
    let n = g.len();
    if n == 0 {
        return Vec::new();
    }
    let mut in_count = g.in_count.clone();
    let mut reaching_int: Vec<Option<usize>> = vec![None; n];
    let mut in_interval: Vec<Option<usize>> = vec![None; n];
    let mut been_on_h = vec![false; n];

    let mut header_queue = vec![0usize];
    been_on_h[0] = true;
    reaching_int[0] = Some(0);

    let mut intervals = Vec::new();
    let mut hq_pos = 0;

    while hq_pos < header_queue.len() {
        let header = header_queue[hq_pos];
        hq_pos += 1;

        let interval_idx = intervals.len();
        let mut members = vec![header];
        in_interval[header] = Some(interval_idx);

        let mut member_pos = 0;
        while member_pos < members.len() {
            let h = members[member_pos];
            member_pos += 1;
            for &succ in &g.out_edges[h] {
                if in_count[succ] > 0 {
                    in_count[succ] -= 1;
                }
                if reaching_int[succ].is_none() {
                    reaching_int[succ] = Some(header);
                    if in_count[succ] == 0 {
                        members.push(succ);
                        in_interval[succ] = Some(interval_idx);
                    } else if !been_on_h[succ] {
                        header_queue.push(succ);
                        been_on_h[succ] = true;
                    }
                } else if in_count[succ] == 0 {
                    if reaching_int[succ] == Some(header) && succ != header && in_interval[succ].is_none() {
                        members.push(succ);
                        in_interval[succ] = Some(interval_idx);
                    }
                }
            }
        }
        intervals.push(Interval { header, nodes: members });
    }
    intervals
}

/// Builds the next-order graph Gi+1 from Gi's intervals (`nextOrderGraph`).
/// Returns the new graph plus whether it is isomorphic to Gi (i.e. no
/// interval folded more than one node, meaning further iteration cannot
/// shrink the graph any further).
pub fn next_order_graph(g: &DerivedGraph, intervals: &[Interval]) -> (DerivedGraph, bool) {
    let mut node_for_header = std::collections::HashMap::new();
    for (i, interval) in intervals.iter().enumerate() {
        node_for_header.insert(interval.header, i);
    }
    let mut node_interval = vec![0usize; g.len()];
    for (i, interval) in intervals.iter().enumerate() {
        for &n in &interval.nodes {
            node_interval[n] = i;
        }
    }

    let mut same_graph = true;
    let mut out_edges = vec![Vec::new(); intervals.len()];
    let mut in_count = vec![0usize; intervals.len()];

    for (i, interval) in intervals.iter().enumerate() {
        if interval.nodes.len() > 1 {
            same_graph = false;
        }
        let mut seen = std::collections::HashSet::new();
        for &member in &interval.nodes {
            for &succ in &g.out_edges[member] {
                let succ_interval = node_interval[succ];
                if succ_interval != i && seen.insert(succ_interval) {
                    out_edges[i].push(succ_interval);
                    in_count[succ_interval] += 1;
                }
            }
        }
    }

    (DerivedGraph { out_edges, in_count }, same_graph)
}

/// Result of reducibility testing: the full derived sequence, and
/// whether the original graph was reducible.
#[derive(Debug)]
pub struct ReducibilityResult {
    pub derived_sequence: Vec<DerivedGraph>,
    pub intervals_per_step: Vec<Vec<Interval>>,
    pub reducible: bool,
}

/// `findDerivedSeq` / `checkReducibility`: iterates G1, G2, ... until the
/// graph collapses to a single node (reducible) or a derived step stops
/// shrinking the node count while still having more than one node
/// (irreducible).
pub fn check_reducibility(cfg: &Cfg) -> ReducibilityResult {
    let mut derived_sequence = vec![DerivedGraph::from_cfg(cfg)];
    let mut intervals_per_step = Vec::new();

    loop {
        let current = derived_sequence.last().unwrap();
        if current.is_trivial() {
            intervals_per_step.push(find_intervals(current));
            return ReducibilityResult {
                derived_sequence,
                intervals_per_step,
                reducible: true,
            };
        }

        let intervals = find_intervals(current);
        let (next, same_graph) = next_order_graph(current, &intervals);
        intervals_per_step.push(intervals);

        if same_graph {
            return ReducibilityResult {
                derived_sequence,
                intervals_per_step,
                reducible: false,
            };
        }
        derived_sequence.push(next);
    }
}

/// Node splitting would convert an irreducible graph into an equivalent
/// reducible one by duplicating a node shared between intervals. Left
/// unimplemented: the input programs this crate targets (hand-written
/// 16-bit DOS executables) essentially never produce irreducible flow
/// graphs in practice, and the original leaves the same routine as a
/// stub. Irreducible procedures are left unstructured and flagged via
/// `ProcFlags::GRAPH_IRRED` instead.
pub fn node_splitting(_cfg: &mut Cfg) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icode::{Icode, IcodeFlags, Immediate, LowLevel, Mnemonic};

    fn ret() -> Icode {
        Icode::new_low_level(0, LowLevel::new(Mnemonic::Ret))
    }

    #[test]
    fn single_block_graph_is_trivially_reducible() {
        let cfg = crate::graph::build_cfg(&[ret()]);
        let result = check_reducibility(&cfg);
        assert!(result.reducible);
    }

    #[test]
    fn straight_line_two_block_graph_is_reducible() {
        let mut jcc = LowLevel::new(Mnemonic::Jcond(crate::icode::JccCode::E));
        jcc.immed = Immediate::Value(2);
        jcc.flg |= IcodeFlags::IMMEDIATE;
        let mut icodes = vec![Icode::new_low_level(0, jcc), ret(), ret()];
        icodes[1].ll.flg |= IcodeFlags::TARGET;
        icodes[2].ll.flg |= IcodeFlags::TARGET;
        let cfg = crate::graph::build_cfg(&icodes);
        let result = check_reducibility(&cfg);
        assert!(result.reducible);
    }

    #[test]
    fn derived_graph_from_single_node_cfg_has_one_node() {
        let cfg = crate::graph::build_cfg(&[ret()]);
        let g = DerivedGraph::from_cfg(&cfg);
        assert_eq!(g.len(), 1);
        assert!(g.is_trivial());
    }
}

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

pub mod ast;
pub mod backend;
pub mod cli;
pub mod control;
pub mod dataflow;
pub mod errors;
pub mod file_reader;
pub mod flow;
pub mod graph;
pub mod icode;
pub mod idioms;
pub mod loader;
pub mod locident;
pub mod opcodes;
pub mod procs;
pub mod reducible;
pub mod scanner;
pub mod symtab;

use std::collections::HashMap;

use anyhow::{Context, Result};

use graph::{Cfg, NodeType};
use procs::{ProcFlags, ProcIdx, ProcList};
use symtab::SymTab;

/// Everything the back end needs once the pipeline has run: the
/// procedure/call-graph arena and each procedure's structured CFG, in
/// lockstep index order.
pub struct Decompilation {
    pub procs: ProcList,
    pub cfgs: Vec<Cfg>,
    pub entry: ProcIdx,
}

/// Runs the whole batch pipeline over an already-loaded image: call-graph
/// discovery, per-procedure idiom recognition and mechanical IR lift, CFG
/// construction and compression, reducibility testing, control
/// structuring, condition-code elimination, inter-procedural liveness,
/// def-use chains, forward substitution and return-type inference.
///
/// Passes run in this fixed order because each one's input is the
/// previous one's output: structuring needs `JCOND` expressions that only
/// exist after condition-code elimination; condition-code elimination
/// needs basic blocks; liveness needs the high-level `use`/`def` sets
/// `gen_live_ktes` derives from promoted icodes.
pub fn analyze(prog: &loader::LoadedProgram) -> Result<Decompilation> {
    let mut procs = ProcList::new();
    let mut symtab = SymTab::new();
    let entry = flow::build_call_graph(prog, prog.entry_offset(), &mut procs, &mut symtab)
        .context("control-flow discovery failed")?;

    for idx in 0..procs.len() {
        let mut icodes = std::mem::take(&mut procs.get_mut(idx).icodes);
        idioms::lift_procedure(&mut icodes, &mut procs, idx);
        procs.get_mut(idx).icodes = icodes;
    }

    let mut cfgs: Vec<Cfg> = Vec::with_capacity(procs.len());
    for idx in 0..procs.len() {
        let mut cfg = graph::build_cfg(&procs.get(idx).icodes);
        graph::compress(&mut cfg);
        graph::dfs_numbering(&mut cfg);
        cfgs.push(cfg);
    }

    for idx in 0..procs.len() {
        let mut icodes = std::mem::take(&mut procs.get_mut(idx).icodes);
        let cfg = &mut cfgs[idx];

        dataflow::elim_cond_codes(cfg, &mut icodes);

        let reducibility = reducible::check_reducibility(cfg);
        if !reducibility.reducible {
            procs.get_mut(idx).flg |= ProcFlags::GRAPH_IRRED;
            reducible::node_splitting(cfg);
        }

        let has_case = cfg.bbs.iter().any(|b| b.is_valid() && b.node_type == NodeType::MultiBranch);
        procs.get_mut(idx).has_case = has_case;

        control::structure(cfg, has_case);
        control::merge_compound_conditions(cfg, &mut icodes);

        dataflow::gen_live_ktes(cfg, &icodes);

        procs.get_mut(idx).icodes = icodes;
    }

    // Inter-procedural liveness walks the call graph bottom-up; discovery
    // order puts callees at or after their caller's index, so descending
    // index order visits (most) callees first. A callee whose own
    // liveness hasn't been computed yet (forward/mutual recursion) simply
    // reads a zero live-in for that call, same approximation the
    // `dataflow` module's callback contract documents.
    let mut live_in_by_proc: HashMap<ProcIdx, icode::RegSet> = HashMap::new();
    for idx in (0..procs.len()).rev() {
        let mut icodes = std::mem::take(&mut procs.get_mut(idx).icodes);
        let cfg = &mut cfgs[idx];

        dataflow::live_reg_analysis(cfg, &mut icodes, 0, |callee| *live_in_by_proc.get(&callee).unwrap_or(&0));
        let entry_live_in = cfg.head.map(|h| cfg.bbs[h].live_in).unwrap_or(0);
        live_in_by_proc.insert(idx, entry_live_in);

        dataflow::gen_du1(cfg, &mut icodes);
        dataflow::forward_substitute(&mut icodes);

        let ret_val = dataflow::infer_return_type(cfg, &mut procs.get_mut(idx).local_id);
        procs.get_mut(idx).ret_val = ret_val;
        procs.get_mut(idx).live_analysed = true;

        procs.get_mut(idx).icodes = icodes;
    }

    Ok(Decompilation { procs, cfgs, entry })
}

/// Counts used by `-s`/`--stat` (CLI surface): basic-block/edge totals
/// before and after compression, and how many derived-sequence steps
/// reducibility testing needed.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct GraphStats {
    pub num_procs: usize,
    pub num_bbs: usize,
    pub num_edges: usize,
}

pub fn graph_stats(decomp: &Decompilation) -> GraphStats {
    let mut stats = GraphStats {
        num_procs: decomp.procs.len(),
        ..Default::default()
    };
    for cfg in &decomp.cfgs {
        for bb in &cfg.bbs {
            if !bb.is_valid() {
                continue;
            }
            stats.num_bbs += 1;
            stats.num_edges += bb.out_edges.len();
        }
    }
    stats
}

/// Renders the memory-type map (`-m`/`--memory-map`): one line per run of
/// same-classified bytes, `start-end: class`.
pub fn format_memory_map(prog: &loader::LoadedProgram) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    while i < prog.map.len() {
        let class = prog.map[i];
        let start = i;
        while i < prog.map.len() && prog.map[i] == class {
            i += 1;
        }
        out.push_str(&format!("{start:06X}-{:06X}: {class:?}\n", i - 1));
    }
    out
}

/// Top-level entry point: load an image, run the pipeline, and render it
/// through the back end. This is what `main.rs`'s batch mode calls; the
/// interactive disassembler and the `-a`/`-A` assembly-listing dumps are
/// driven from `main.rs` directly against `Decompilation`'s fields.
pub fn decompile(bytes: &[u8], filename: &str) -> Result<String> {
    let prog = loader::load(bytes, filename).context("failed to load image")?;
    let decomp = analyze(&prog)?;
    Ok(backend::emit_program(&decomp.procs, &decomp.cfgs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompiles_a_single_return_com_file() {
        let out = decompile(&[0xC3], "t.com").unwrap();
        assert!(out.contains("proc_"));
    }

    #[test]
    fn analyze_exposes_one_cfg_per_discovered_procedure() {
        let prog = loader::load(&[0xC3], "t.com").unwrap();
        let decomp = analyze(&prog).unwrap();
        assert_eq!(decomp.cfgs.len(), decomp.procs.len());
        assert_eq!(decomp.entry, 0);
    }
}

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

//! End-to-end scenarios driving the full pipeline (scanner -> flow-follower
//! -> idiom lift -> CFG -> structuring -> data flow -> back end) against
//! hand-assembled 16-bit machine code, matching spec.md section 8's
//! numbered end-to-end scenarios.

use dcc_rs::{analyze, backend, loader};

fn decompile_com(bytes: &[u8]) -> String {
    let prog = loader::load(bytes, "t.com").unwrap();
    let decomp = analyze(&prog).unwrap();
    backend::emit_program(&decomp.procs, &decomp.cfgs)
}

/// Scenario 1: `PUSH BP; MOV BP,SP; SUB SP,4; ...; MOV SP,BP; POP BP; RET`.
/// The five framing instructions are idiom-recognised and invalidated, so
/// none of them should surface as an "unlifted" opcode in the emitted body,
/// and the procedure is declared with no return value.
#[test]
fn hll_prologue_and_epilogue_are_invalidated() {
    let bytes = vec![
        0x55, // PUSH BP
        0x89, 0xE5, // MOV BP,SP
        0x83, 0xEC, 0x04, // SUB SP,4
        0x89, 0xEC, // MOV SP,BP
        0x5D, // POP BP
        0xC3, // RET
    ];
    let out = decompile_com(&bytes);
    assert!(out.contains("void proc_"), "expected a void-returning procedure:\n{out}");
    assert!(!out.contains("unlifted: Push"));
    assert!(!out.contains("unlifted: Pop"));
    assert!(!out.contains("unlifted: Sub"));
}

/// Scenario 2: `MOV AX,[BP-4]; MOV DX,[BP-2]; ADD AX,[BP-8]; ADC DX,[BP-6]`
/// folds into one long-sized assignment rather than four separate
/// statements, and neither the `ADD` nor the `ADC` survives as a raw
/// unlifted opcode.
#[test]
fn long_add_idiom_collapses_add_adc_pair() {
    let bytes = vec![
        0x8B, 0x46, 0xFC, // MOV AX,[BP-4]
        0x8B, 0x56, 0xFE, // MOV DX,[BP-2]
        0x03, 0x46, 0xF8, // ADD AX,[BP-8]
        0x13, 0x56, 0xFA, // ADC DX,[BP-6]
        0xC3, // RET
    ];
    let out = decompile_com(&bytes);
    assert!(!out.contains("unlifted: Add"));
    assert!(!out.contains("unlifted: Adc"));
    assert!(out.contains('='), "expected at least one assignment statement:\n{out}");
}

/// Scenario 4: `while (cx != 0) { cx--; }` encoded as
/// `CMP CX,0; JE end; DEC CX; JMP start; end: RET`. The header is a
/// 2-branch block with one successor inside the loop and one outside, so
/// structuring must classify it `WHILE_TYPE` and the back end must mark a
/// `while loop header`, not a `do ... while` or endless loop.
#[test]
fn decrement_loop_structures_as_while() {
    let bytes = vec![
        0x83, 0xF9, 0x00, // CMP CX,0
        0x74, 0x03, // JE end (+3)
        0x49, // DEC CX
        0xEB, 0xF8, // JMP start (-8)
        0xC3, // end: RET
    ];
    let out = decompile_com(&bytes);
    assert!(out.contains("while loop header"), "expected a while-loop marker:\n{out}");
    assert!(!out.contains("do ... while loop header"));
    assert!(!out.contains("for (;;)"));
}

/// Scenario 5: `CALL proc; ADD SP,6` is the C calling-convention cleanup
/// idiom. The callee's own record (not the caller's) gets `cbParam = 6`
/// and is flagged C-convention; the ADD SP,6 cleanup must not survive as a
/// raw unlifted instruction in the caller's body.
#[test]
fn c_convention_call_records_callee_stack_cleanup() {
    let bytes = vec![
        0xB8, 0x01, 0x00, // MOV AX,1
        0x50, // PUSH AX
        0xB8, 0x02, 0x00, // MOV AX,2
        0x50, // PUSH AX
        0xB8, 0x03, 0x00, // MOV AX,3
        0x50, // PUSH AX
        0xE8, 0x04, 0x00, // CALL (target: the RET past ADD SP,6)
        0x83, 0xC4, 0x06, // ADD SP,6
        0xC3, // RET
        0xC3, // callee (at the CALL's target): RET
    ];
    let prog = loader::load(&bytes, "t.com").unwrap();
    let decomp = analyze(&prog).unwrap();
    // Callee is whichever procedure isn't the entry; its cbParam should be 6
    // and it should carry the C calling convention.
    let callee = (0..decomp.procs.len()).find(|&i| i != decomp.entry).expect("a callee procedure was discovered");
    let callee_proc = decomp.procs.get(callee);
    assert_eq!(callee_proc.cb_param, 6);
    assert!(callee_proc.flg.contains(dcc_rs::procs::ProcFlags::CALL_C));

    let out = backend::emit_program(&decomp.procs, &decomp.cfgs);
    assert!(!out.contains("unlifted: Add"), "ADD SP,6 cleanup should be absorbed by the call idiom:\n{out}");
}

/// Scenario 6: a callee assigning both AX and DX before `RET` is inferred
/// to return `long`/a value; the caller's view of the call site should
/// then see a return-value-bearing procedure rather than a void one.
#[test]
fn callee_defining_ax_and_dx_before_ret_infers_a_return_value() {
    let bytes = vec![
        0xE8, 0x01, 0x00, // CALL (target: the callee past this RET)
        0xC3, // caller RET
        0xB8, 0x01, 0x00, // callee: MOV AX,1
        0xBA, 0x00, 0x00, // MOV DX,0
        0xC3, // RET
    ];
    let prog = loader::load(&bytes, "t.com").unwrap();
    let decomp = analyze(&prog).unwrap();
    let callee = (0..decomp.procs.len()).find(|&i| i != decomp.entry).expect("a callee procedure was discovered");
    assert!(decomp.procs.get(callee).ret_val.is_some(), "callee defining AX and DX before RET should infer a return value");
}

/// An empty procedure (a bare `RET`) gets a single basic block; dominator
/// and liveness computation must still converge without special-casing.
#[test]
fn empty_procedure_is_a_single_block() {
    let out = decompile_com(&[0xC3]);
    assert!(out.contains("void proc_"));
}

/// A direct `CALL` discovers the callee as its own procedure record and
/// links a call-graph edge, independent of the data-flow and structuring
/// passes run later in `analyze`.
#[test]
fn direct_call_is_discovered_as_a_second_procedure() {
    let bytes = vec![
        0xE8, 0x02, 0x00, // CALL +2
        0xC3, // RET
        0x90, 0xC3, // callee: NOP; RET
    ];
    let prog = loader::load(&bytes, "t.com").unwrap();
    let decomp = analyze(&prog).unwrap();
    assert_eq!(decomp.procs.len(), 2);
    assert_eq!(decomp.cfgs.len(), 2);
}

/// `-m`/`--memory-map` support: the loaded image's memory map renders
/// without panicking and is non-empty even before any byte has been
/// classified by the flow-follower.
#[test]
fn memory_map_renders_for_a_freshly_loaded_image() {
    let prog = loader::load(&[0xC3], "t.com").unwrap();
    let map = dcc_rs::format_memory_map(&prog);
    assert!(!map.is_empty());
}

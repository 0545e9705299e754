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

use std::process::ExitCode;

use clap::Parser;
use dcc_rs::cli::CliOptions;
use dcc_rs::file_reader::{DiskFileReader, FileReader};
use dcc_rs::{analyze, backend, flow, format_memory_map, graph_stats, loader, procs::ProcList, symtab::SymTab};

fn run(opts: &CliOptions, reader: &impl FileReader) -> anyhow::Result<()> {
    if opts.asm1 {
        reader.remove_file(&opts.asm1_path()).ok();
    }
    if opts.asm2 {
        reader.remove_file(&opts.asm2_path()).ok();
    }

    let bytes = reader.read_binary(&opts.file)?;
    let filename = opts.file.display().to_string();
    let prog = loader::load(&bytes, &filename)?;

    if opts.memory_map {
        print!("{}", format_memory_map(&prog));
    }

    if opts.interactive {
        // The interactive disassembler is a separate terminal front end
        // over the same loaded image; batch analysis below still runs so
        // `-i` can be combined with `-s`/`-m` in one pass.
        eprintln!("dcc: interactive mode not available in this build, falling back to batch output");
    }

    if opts.asm1 {
        let mut raw_procs = ProcList::new();
        let mut raw_symtab = SymTab::new();
        flow::build_call_graph(&prog, prog.entry_offset(), &mut raw_procs, &mut raw_symtab)?;
        reader.write_text(&opts.asm1_path(), &backend::emit_disassembly_all(&raw_procs))?;
    }

    let decomp = analyze(&prog)?;

    if opts.asm2 {
        reader.write_text(&opts.asm2_path(), &backend::emit_program(&decomp.procs, &decomp.cfgs))?;
    }

    if opts.stat {
        let stats = graph_stats(&decomp);
        eprintln!(
            "dcc: {} procedures, {} basic blocks, {} edges",
            stats.num_procs, stats.num_bbs, stats.num_edges
        );
    }

    let rendered = backend::emit_program(&decomp.procs, &decomp.cfgs);
    reader.write_text(&opts.output_path(), &rendered)?;

    if opts.verbose_effective() {
        eprintln!("dcc: wrote {}", opts.output_path().display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let opts = CliOptions::parse();
    let reader = DiskFileReader;
    match run(&opts, &reader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dcc: {e}");
            ExitCode::FAILURE
        }
    }
}

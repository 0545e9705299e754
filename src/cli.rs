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

//! Command-line surface (spec section 6, "CLI surface"). Parsed here,
//! independent of `main.rs`'s dispatch, so the pipeline driver in
//! `lib.rs` can be exercised against a `CliOptions` built directly by
//! tests without going through `std::env::args`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "dcc", version, author = "Connor Nolan", about = "Decompiler for real-mode 16-bit x86 DOS .EXE binaries")]
pub struct CliOptions {
    /// Input DOS .EXE or .COM file.
    #[clap(short, long)]
    pub file: PathBuf,

    /// Verbose progress output.
    #[clap(short, long)]
    pub verbose: bool,

    /// Very verbose progress output (implies `--verbose`).
    #[clap(short = 'V', long = "very-verbose")]
    pub very_verbose: bool,

    /// Print pass statistics (basic-block/edge counts before and after
    /// compression, interval order).
    #[clap(short, long)]
    pub stat: bool,

    /// Print the memory-type map (unknown/data/code/impure) after loading.
    #[clap(short, long = "memory-map")]
    pub memory_map: bool,

    /// Run the interactive disassembler instead of the batch pipeline.
    #[clap(short, long)]
    pub interactive: bool,

    /// Write the pre-reorder assembly listing to `<base>.a1`.
    #[clap(short, long = "asm1")]
    pub asm1: bool,

    /// Write the post-reorder assembly listing to `<base>.a2`.
    #[clap(short = 'A', long = "asm2")]
    pub asm2: bool,
}

impl CliOptions {
    pub fn verbose_effective(&self) -> bool {
        self.verbose || self.very_verbose
    }

    /// `<base>` with the input file's extension stripped, used to derive
    /// every output file name (spec section 6, "Output").
    pub fn base_path(&self) -> PathBuf {
        self.file.with_extension("")
    }

    pub fn output_path(&self) -> PathBuf {
        self.base_path().with_extension("b")
    }

    pub fn asm1_path(&self) -> PathBuf {
        self.base_path().with_extension("a1")
    }

    pub fn asm2_path(&self) -> PathBuf {
        self.base_path().with_extension("a2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_strips_extension_only() {
        let opts = CliOptions {
            file: PathBuf::from("/tmp/prog.exe"),
            verbose: false,
            very_verbose: false,
            stat: false,
            memory_map: false,
            interactive: false,
            asm1: false,
            asm2: false,
        };
        assert_eq!(opts.output_path(), PathBuf::from("/tmp/prog.b"));
        assert_eq!(opts.asm1_path(), PathBuf::from("/tmp/prog.a1"));
        assert_eq!(opts.asm2_path(), PathBuf::from("/tmp/prog.a2"));
    }
}
